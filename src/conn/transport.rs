use std::io;

use crate::wire::ByteRange;

/// The byte-moving collaborator underneath a connection.
///
/// Implementations own the socket (or an in-process stand-in for tests) and
/// are responsible for framing on the read side: one call, one complete
/// message, meaning the fixed header plus however many tail bytes it
/// declares.
///
/// The connection serializes access: at most one thread is inside
/// `write_ranges` and at most one is inside `read_message` at any time,
/// though both may be entered concurrently with each other.
pub trait Transport: Send + Sync {
    /// Writes every range, in order, completely. May block until the
    /// outbound buffer drains; this is the only blocking point on the send
    /// path.
    fn write_ranges(&self, ranges: &[ByteRange<'_>]) -> io::Result<()>;

    /// Blocks until the next complete message has been read.
    fn read_message(&self) -> io::Result<Vec<u8>>;

    /// False once the peer is gone.
    fn is_alive(&self) -> bool;
}
