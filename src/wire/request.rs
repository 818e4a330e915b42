/// Identity of an extension sub-protocol: a stable name.
///
/// The numeric major opcode the server assigns to an extension is connection
/// state, resolved once per connection on first use; the identity itself
/// never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extension {
    pub name: &'static str,
}

impl Extension {
    pub const fn new(name: &'static str) -> Self {
        Extension { name }
    }
}

/// Shape of one trailing variable-length list of a request type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Byte width of one element.
    pub elem_size: usize,
}

/// Immutable description of one request type, constructed once per command
/// type rather than per call.
#[derive(Debug, Clone, Copy)]
pub struct RequestDescriptor {
    /// `None` for core protocol requests.
    pub extension: Option<Extension>,

    /// The request's opcode within its extension (or within the core
    /// protocol).
    pub opcode: u8,

    /// Whether the server answers this request with a reply.
    pub expects_reply: bool,

    /// Total fixed-header size in bytes, including the 4-byte prologue.
    /// Always a multiple of the wire alignment.
    pub fixed_len: usize,

    /// Shapes of the trailing variable-length lists, in wire order.
    pub segments: &'static [SegmentDescriptor],
}

/// One caller-supplied trailing list for a single call.
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    pub bytes: &'a [u8],

    /// The element count the caller encoded into the fixed header, if the
    /// request type carries one; checked against `bytes` before anything is
    /// transmitted.
    pub count: Option<u32>,
}

impl<'a> Segment<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Segment { bytes, count: None }
    }

    pub fn counted(bytes: &'a [u8], count: u32) -> Self {
        Segment {
            bytes,
            count: Some(count),
        }
    }
}
