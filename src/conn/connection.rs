use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::{Arc, Condvar, Mutex};

use crate::conn::extension::ExtensionRegistry;
use crate::conn::{
    ConnError, Cookie, ExtensionData, MessageClass, MessageHeader, ProtocolError, SeqWidth,
    Transport, is_after, widen,
};
use crate::constants::{
    OPCODE_PING, OPCODE_QUERY_EXTENSION, QUERY_EXT_FIRST_ERROR_OFFSET,
    QUERY_EXT_FIRST_EVENT_OFFSET, QUERY_EXT_MAJOR_OPCODE_OFFSET, QUERY_EXT_PRESENT_OFFSET,
    REQ_PROLOGUE_SIZE,
};
use crate::wire::{
    EncodeError, Extension, ReplyBuffer, RequestBuilder, RequestDescriptor, Segment,
    SegmentDescriptor,
};

/// Resolves an extension name to its server-assigned data. Owned by the
/// connection layer; submitted on an extension's first use.
const QUERY_EXTENSION: RequestDescriptor = RequestDescriptor {
    extension: None,
    opcode: OPCODE_QUERY_EXTENSION,
    expects_reply: true,
    fixed_len: 8,
    segments: &[SegmentDescriptor { elem_size: 1 }],
};

/// No-op round trip. Its reply carries a sequence number, which bounds the
/// completion of every request submitted before it.
const PING: RequestDescriptor = RequestDescriptor {
    extension: None,
    opcode: OPCODE_PING,
    expects_reply: true,
    fixed_len: REQ_PROLOGUE_SIZE,
    segments: &[],
};

#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    /// Width of the on-wire sequence-number space.
    pub seq_width: SeqWidth,

    /// Hard cap on one encoded request, in bytes.
    pub max_request_len: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            seq_width: SeqWidth::U16,
            max_request_len: u16::MAX as usize * 4,
        }
    }
}

/// Outcome of a non-blocking reply check.
#[derive(Debug)]
pub enum PollReply {
    /// Nothing has arrived for the token yet. Polling again has no side
    /// effect.
    Pending,

    /// The resolved outcome; `None` is the no-payload success of a checked
    /// void request.
    Ready(Option<ReplyBuffer>),
}

#[derive(Debug)]
enum EntryState {
    Waiting,
    Done(Result<Option<Vec<u8>>, ProtocolError>),
}

#[derive(Debug)]
struct PendingEntry {
    state: EntryState,
    expects_reply: bool,

    /// Responses to the connection's own probe requests are consumed by the
    /// demultiplexer instead of stored for a caller.
    internal: bool,
}

struct DemuxState {
    pending: BTreeMap<u64, PendingEntry>,
    events: VecDeque<Vec<u8>>,

    /// Next sequence number to assign, full width.
    next_seq: u64,

    /// Highest full-width sequence number seen from the server; the anchor
    /// for widening the low bits incoming messages echo.
    last_read: u64,

    /// Whether some thread is currently blocked in the transport read.
    reading: bool,

    /// First transport failure; terminal for the whole connection.
    fatal: Option<Arc<io::Error>>,
}

type ErrorHandler = Box<dyn Fn(&ProtocolError) + Send + Sync>;

/// One shared protocol connection: assigns sequence numbers, tracks
/// in-flight requests, and demultiplexes whatever the server sends back.
///
/// All methods take `&self`; the connection is meant to be shared across
/// threads. Writes are serialized by a gate held across sequence assignment
/// and the transport write, so sequence order always equals write order.
/// Reads are serialized by a single-reader flag: whichever waiting thread
/// gets there first blocks in the transport with the state lock released,
/// routes what it read, and wakes everyone; waiters whose token resolved
/// return while the rest resume waiting.
pub struct Connection<T: Transport> {
    transport: T,
    config: ConnectionConfig,
    state: Mutex<DemuxState>,
    cond: Condvar,
    write_gate: Mutex<()>,
    extensions: ExtensionRegistry,
    error_handler: Mutex<Option<ErrorHandler>>,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ConnectionConfig::default())
    }

    pub fn with_config(transport: T, config: ConnectionConfig) -> Self {
        Connection {
            transport,
            config,
            state: Mutex::new(DemuxState {
                pending: BTreeMap::new(),
                events: VecDeque::new(),
                next_seq: 1,
                last_read: 0,
                reading: false,
                fatal: None,
            }),
            cond: Condvar::new(),
            write_gate: Mutex::new(()),
            extensions: ExtensionRegistry::new(),
            error_handler: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// True until the transport fails or reports the peer gone.
    pub fn is_alive(&self) -> bool {
        self.state.lock().unwrap().fatal.is_none() && self.transport.is_alive()
    }

    /// Installs the fallback handler for protocol errors that no longer
    /// have a waiting token: unchecked void failures, abandoned cookies,
    /// and errors for unknown sequence numbers.
    ///
    /// The handler runs on whichever thread happens to be demultiplexing,
    /// with no connection locks held apart from the handler slot itself.
    /// Without a handler such errors are logged and dropped.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&ProtocolError) + Send + Sync + 'static,
    {
        *self.error_handler.lock().unwrap() = Some(Box::new(handler));
    }

    /// Submits one request and returns its correlation token.
    ///
    /// The extension, if the request type names one, is resolved first:
    /// a server round trip on its first use, a table lookup afterwards.
    /// `checked` asks for the request's failure to be reported through
    /// [`Connection::await_reply`] even when no reply value is expected;
    /// unchecked void failures go to the fallback handler instead.
    ///
    /// Blocks only on the local transport write, never on the reply.
    pub fn submit(
        &self,
        descriptor: &RequestDescriptor,
        fixed: &[u8],
        segments: &[Segment<'_>],
        checked: bool,
    ) -> Result<Cookie, ConnError> {
        let major_opcode = match descriptor.extension {
            Some(extension) => Some(self.extension_data(extension)?.major_opcode),
            None => None,
        };
        self.submit_resolved(descriptor, major_opcode, fixed, segments, checked, false)
    }

    fn submit_resolved(
        &self,
        descriptor: &RequestDescriptor,
        major_opcode: Option<u8>,
        fixed: &[u8],
        segments: &[Segment<'_>],
        checked: bool,
        internal: bool,
    ) -> Result<Cookie, ConnError> {
        let ranges = RequestBuilder::build(descriptor, major_opcode, fixed, segments)?;
        let total: usize = ranges.iter().map(|range| range.len()).sum();
        if total > self.config.max_request_len {
            return Err(ConnError::Encode(EncodeError::RequestTooLong {
                len: total,
                max: self.config.max_request_len,
            }));
        }

        // The gate is held across both the sequence assignment and the
        // write, so sequence order always equals write order.
        let _gate = self.write_gate.lock().unwrap();
        let sequence = {
            let mut st = self.state.lock().unwrap();
            if let Some(fatal) = &st.fatal {
                return Err(ConnError::Shutdown(fatal.clone()));
            }
            let sequence = st.next_seq;
            st.next_seq += 1;
            if descriptor.expects_reply || checked {
                st.pending.insert(
                    sequence,
                    PendingEntry {
                        state: EntryState::Waiting,
                        expects_reply: descriptor.expects_reply,
                        internal,
                    },
                );
            }
            sequence
        };

        tracing::trace!(
            sequence,
            opcode = descriptor.opcode,
            total,
            "submitting request"
        );
        if let Err(e) = self.transport.write_ranges(&ranges) {
            let mut st = self.state.lock().unwrap();
            st.pending.remove(&sequence);
            return Err(self.fail_locked(&mut st, e));
        }
        Ok(Cookie::new(sequence, descriptor.expects_reply, checked))
    }

    /// Blocks until `cookie`'s reply or error has arrived, and returns it.
    ///
    /// Events and responses for other tokens read along the way are routed
    /// to their own destinations, never blocked past. For a checked void
    /// request this returns `Ok(None)` once a later message proves the
    /// request was processed cleanly; a probe round trip is submitted to
    /// force such a message if nothing else is in flight. Redeeming a
    /// cookie twice (or after discarding it) yields `Ok(None)`.
    pub fn await_reply(&self, cookie: Cookie) -> Result<Option<ReplyBuffer>, ConnError> {
        if cookie.is_checked() && !cookie.expects_reply() {
            self.ensure_probe_after(cookie.sequence())?;
        }
        self.read_until(|st| match st.pending.remove(&cookie.sequence()) {
            None => Some(Ok(None)),
            Some(PendingEntry {
                state: EntryState::Done(outcome),
                ..
            }) => Some(match outcome {
                Ok(bytes) => Ok(bytes.map(ReplyBuffer::new)),
                Err(error) => Err(ConnError::Protocol(error)),
            }),
            Some(entry) => {
                st.pending.insert(cookie.sequence(), entry);
                None
            }
        })?
    }

    /// Non-blocking variant of [`Connection::await_reply`].
    ///
    /// Returns [`PollReply::Pending`] until the token resolves, then the
    /// same outcome on every subsequent call; the entry is only released by
    /// `await_reply` or `discard_reply`. Progress depends on some thread
    /// driving the demultiplexer (`await_reply` or `wait_event`).
    pub fn poll_reply(&self, cookie: &Cookie) -> Result<PollReply, ConnError> {
        let st = self.state.lock().unwrap();
        match st.pending.get(&cookie.sequence()) {
            Some(PendingEntry {
                state: EntryState::Done(outcome),
                ..
            }) => match outcome {
                Ok(bytes) => Ok(PollReply::Ready(bytes.clone().map(ReplyBuffer::new))),
                Err(error) => Err(ConnError::Protocol(error.clone())),
            },
            Some(_) => match &st.fatal {
                Some(fatal) => Err(ConnError::Shutdown(fatal.clone())),
                None => Ok(PollReply::Pending),
            },
            None => Ok(PollReply::Ready(None)),
        }
    }

    /// Abandons a token. A reply arriving later is dropped; an error is
    /// still delivered to the fallback handler, as is an error that had
    /// already arrived.
    pub fn discard_reply(&self, cookie: Cookie) {
        let entry = {
            let mut st = self.state.lock().unwrap();
            st.pending.remove(&cookie.sequence())
        };
        if let Some(PendingEntry {
            state: EntryState::Done(Err(error)),
            ..
        }) = entry
        {
            self.dispatch_fallback(&error);
        }
    }

    /// Pops the oldest queued event, if any.
    pub fn poll_event(&self) -> Result<Option<Vec<u8>>, ConnError> {
        let mut st = self.state.lock().unwrap();
        if let Some(event) = st.events.pop_front() {
            return Ok(Some(event));
        }
        match &st.fatal {
            Some(fatal) => Err(ConnError::Shutdown(fatal.clone())),
            None => Ok(None),
        }
    }

    /// Blocks until an event is available and returns it.
    pub fn wait_event(&self) -> Result<Vec<u8>, ConnError> {
        self.read_until(|st| st.events.pop_front())
    }

    /// The server-assigned data for `extension`, resolving it with a
    /// query-extension round trip on first use. Resolution happens at most
    /// once per connection; concurrent first users share one round trip.
    pub fn extension_data(&self, extension: Extension) -> Result<ExtensionData, ConnError> {
        let cell = self.extensions.cell(extension);
        cell.get_or_try_init(|| self.resolve_extension(extension))
            .map(|data| *data)
    }

    fn resolve_extension(&self, extension: Extension) -> Result<ExtensionData, ConnError> {
        let name = extension.name.as_bytes();
        let mut fixed = [0u8; 8];
        fixed[4..6].copy_from_slice(&(name.len() as u16).to_le_bytes());
        let segment = Segment::counted(name, name.len() as u32);
        let cookie =
            self.submit_resolved(&QUERY_EXTENSION, None, &fixed, &[segment], true, false)?;
        let reply = match self.await_reply(cookie)? {
            Some(reply) => reply,
            None => return Err(ConnError::ExtensionMissing(extension.name)),
        };
        if reply.read_u8(QUERY_EXT_PRESENT_OFFSET)? == 0 {
            return Err(ConnError::ExtensionMissing(extension.name));
        }
        let data = ExtensionData {
            major_opcode: reply.read_u8(QUERY_EXT_MAJOR_OPCODE_OFFSET)?,
            first_event: reply.read_u8(QUERY_EXT_FIRST_EVENT_OFFSET)?,
            first_error: reply.read_u8(QUERY_EXT_FIRST_ERROR_OFFSET)?,
        };
        tracing::debug!(
            name = extension.name,
            major_opcode = data.major_opcode,
            "extension resolved"
        );
        Ok(data)
    }

    /// Makes sure some reply-bearing request newer than `sequence` is in
    /// flight, so a checked void request has a bound to resolve against.
    fn ensure_probe_after(&self, sequence: u64) -> Result<(), ConnError> {
        {
            let st = self.state.lock().unwrap();
            match st.pending.get(&sequence) {
                Some(PendingEntry {
                    state: EntryState::Waiting,
                    ..
                }) => {}
                _ => return Ok(()),
            }
            if st.fatal.is_some() {
                return Ok(());
            }
            if st
                .pending
                .range(sequence + 1..)
                .any(|(_, entry)| entry.expects_reply)
            {
                return Ok(());
            }
        }
        let probe = self.submit_resolved(&PING, None, &[0u8; REQ_PROLOGUE_SIZE], &[], false, true)?;
        tracing::trace!(
            probe = probe.sequence(),
            bounds = sequence,
            "probe submitted for checked void request"
        );
        Ok(())
    }

    /// Core wait loop: returns as soon as `ready` yields, reading and
    /// routing messages with exactly one thread inside the transport at a
    /// time.
    fn read_until<R>(
        &self,
        mut ready: impl FnMut(&mut DemuxState) -> Option<R>,
    ) -> Result<R, ConnError> {
        let mut st = self.state.lock().unwrap();
        loop {
            if let Some(out) = ready(&mut st) {
                return Ok(out);
            }
            if let Some(fatal) = &st.fatal {
                return Err(ConnError::Shutdown(fatal.clone()));
            }
            if st.reading {
                st = self.cond.wait(st).unwrap();
                continue;
            }

            st.reading = true;
            drop(st);
            let message = self.transport.read_message();
            st = self.state.lock().unwrap();
            st.reading = false;
            let orphans = match message {
                Ok(bytes) => self.route(&mut st, bytes),
                Err(e) => {
                    self.fail_locked(&mut st, e);
                    Vec::new()
                }
            };
            self.cond.notify_all();
            if !orphans.is_empty() {
                // Fallback delivery happens with the state lock released;
                // the handler is allowed to call back into the connection.
                drop(st);
                for error in &orphans {
                    self.dispatch_fallback(error);
                }
                st = self.state.lock().unwrap();
            }
        }
    }

    /// Routes one incoming message to its destination: the matching pending
    /// entry, the event queue, or the fallback path. Returns the errors
    /// that belong to nobody so the caller can deliver them unlocked.
    fn route(&self, st: &mut DemuxState, bytes: Vec<u8>) -> Vec<ProtocolError> {
        let mut orphans = Vec::new();
        let header = match MessageHeader::parse(&bytes, self.config.seq_width) {
            Ok(header) => header,
            Err(e) => {
                // An unclassifiable message means framing has been lost;
                // nothing read after it can be trusted.
                self.fail_locked(st, io::Error::new(io::ErrorKind::InvalidData, e));
                return orphans;
            }
        };
        let sequence = widen(st.last_read, header.seq_low, self.config.seq_width);
        st.last_read = sequence;
        self.complete_voids_before(st, sequence);

        match header.class {
            MessageClass::Event(code) => {
                tracing::trace!(code, sequence, "event queued");
                st.events.push_back(bytes);
            }
            MessageClass::Error => {
                let error = ProtocolError {
                    error_code: header.detail,
                    sequence,
                    raw: bytes,
                };
                let internal = matches!(st.pending.get(&sequence), Some(entry) if entry.internal);
                if internal {
                    st.pending.remove(&sequence);
                    orphans.push(error);
                } else if let Some(entry) = st.pending.get_mut(&sequence) {
                    match &entry.state {
                        EntryState::Waiting => entry.state = EntryState::Done(Err(error)),
                        EntryState::Done(_) => {
                            tracing::warn!(sequence, "duplicate response for request; dropped");
                        }
                    }
                } else {
                    tracing::warn!(
                        sequence,
                        code = error.error_code,
                        "error for unknown or abandoned request"
                    );
                    orphans.push(error);
                }
            }
            MessageClass::Reply => {
                let internal = matches!(st.pending.get(&sequence), Some(entry) if entry.internal);
                if internal {
                    tracing::trace!(sequence, "internal round trip complete");
                    st.pending.remove(&sequence);
                } else if let Some(entry) = st.pending.get_mut(&sequence) {
                    match &entry.state {
                        EntryState::Waiting => entry.state = EntryState::Done(Ok(Some(bytes))),
                        EntryState::Done(_) => {
                            tracing::warn!(sequence, "duplicate response for request; dropped");
                        }
                    }
                } else {
                    tracing::warn!(sequence, "reply for unknown or abandoned request; dropped");
                }
            }
        }
        orphans
    }

    /// Requests complete in submission order, so a message numbered
    /// `sequence` proves every earlier checked void request was processed;
    /// had one failed, its error would have arrived first.
    fn complete_voids_before(&self, st: &mut DemuxState, sequence: u64) {
        let ready: Vec<u64> = st
            .pending
            .range(..sequence)
            .filter(|(s, entry)| {
                !entry.expects_reply
                    && matches!(entry.state, EntryState::Waiting)
                    && is_after(sequence, **s, self.config.seq_width)
            })
            .map(|(s, _)| *s)
            .collect();
        for s in ready {
            if let Some(entry) = st.pending.get_mut(&s) {
                entry.state = EntryState::Done(Ok(None));
            }
        }
    }

    fn fail_locked(&self, st: &mut DemuxState, e: io::Error) -> ConnError {
        let fatal = match &st.fatal {
            Some(fatal) => fatal.clone(),
            None => {
                tracing::error!(error = %e, "transport failure; connection is shutting down");
                let fatal = Arc::new(e);
                st.fatal = Some(fatal.clone());
                fatal
            }
        };
        self.cond.notify_all();
        ConnError::Shutdown(fatal)
    }

    fn dispatch_fallback(&self, error: &ProtocolError) {
        let handler = self.error_handler.lock().unwrap();
        match handler.as_ref() {
            Some(handler) => handler(error),
            None => tracing::warn!(
                code = error.error_code,
                sequence = error.sequence,
                "unhandled protocol error"
            ),
        }
    }
}
