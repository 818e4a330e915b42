// Request prologue

/// Byte offset of the major opcode. For a core request this is the request's
/// own opcode; for an extension request it is the extension's server-assigned
/// major opcode.
pub const REQ_MAJOR_OPCODE_OFFSET: usize = 0;

/// Byte offset of the minor opcode. Extension requests carry their opcode
/// here; core requests may use the byte for request-specific detail.
pub const REQ_MINOR_OPCODE_OFFSET: usize = 1;

/// Byte offset of the request length field, a u16 counting the entire
/// request (fixed header plus padded trailing segments) in 4-byte units.
pub const REQ_LENGTH_OFFSET: usize = 2;

/// Size in bytes of the request length field (u16).
pub const REQ_LENGTH_SIZE: usize = 2;

/// Every request's fixed header starts with this 4-byte prologue.
pub const REQ_PROLOGUE_SIZE: usize = 4;

/// Requests and each of their trailing segments are rounded up to this
/// boundary with zero fill, independent of any per-field parse alignment.
pub const WIRE_ALIGN: usize = 4;

// Server-to-client message prologue

/// Every incoming message carries at least this many bytes of fixed header.
/// Errors and events are exactly this size; replies append a variable tail.
pub const MSG_HEADER_SIZE: usize = 32;

/// Byte offset of the response-type discriminator.
pub const MSG_KIND_OFFSET: usize = 0;

/// Byte offset of the detail byte (error code for errors, request-specific
/// detail otherwise).
pub const MSG_DETAIL_OFFSET: usize = 1;

/// Bit of the response-type byte marking a synthetically generated message;
/// masked off before classification.
pub const MSG_SYNTHETIC_BIT: u8 = 0x80;

/// Byte offset of the u16 sequence echo when the connection runs with
/// 16-bit sequence numbers.
pub const MSG_SEQ16_OFFSET: usize = 2;

/// Byte offset of the u32 tail-length field when the sequence echo is 16-bit.
pub const MSG_LEN16_OFFSET: usize = 4;

/// Byte offset of the u32 sequence echo when the connection runs with
/// 32-bit sequence numbers.
pub const MSG_SEQ32_OFFSET: usize = 4;

/// Byte offset of the u32 tail-length field when the sequence echo is 32-bit.
pub const MSG_LEN32_OFFSET: usize = 8;

// Core opcodes owned by the connection layer itself

/// Core request resolving an extension name to its server-assigned data.
pub const OPCODE_QUERY_EXTENSION: u8 = 98;

/// Core no-op round-trip request; its reply bounds the completion of every
/// earlier request on the connection.
pub const OPCODE_PING: u8 = 43;

// Fixed fields of the query-extension reply

pub const QUERY_EXT_PRESENT_OFFSET: usize = 8;
pub const QUERY_EXT_MAJOR_OPCODE_OFFSET: usize = 9;
pub const QUERY_EXT_FIRST_EVENT_OFFSET: usize = 10;
pub const QUERY_EXT_FIRST_ERROR_OFFSET: usize = 11;
