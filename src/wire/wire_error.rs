use std::fmt;

/// Caller-supplied request data was internally inconsistent. Detected
/// locally, before any bytes reach the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The call supplied a different number of trailing segments than the
    /// request type declares.
    SegmentCountMismatch { expected: usize, actual: usize },

    /// A segment's byte length is not a whole number of its elements.
    RaggedSegment {
        index: usize,
        elem_size: usize,
        len: usize,
    },

    /// The caller-declared element count disagrees with the bytes supplied.
    CountMismatch {
        index: usize,
        declared: u32,
        actual: u32,
    },

    /// The fixed header handed to the builder is not the size the request
    /// type declares.
    HeaderSizeMismatch { expected: usize, actual: usize },

    /// The request type's fixed header does not cover the prologue or is
    /// not a multiple of the wire alignment.
    MalformedDescriptor { fixed_len: usize },

    /// An extension request was built without a resolved major opcode.
    UnresolvedExtension,

    /// The encoded request does not fit the length field (or the configured
    /// cap, whichever is smaller).
    RequestTooLong { len: usize, max: usize },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::SegmentCountMismatch { expected, actual } => {
                write!(f, "expected {expected} trailing segments, got {actual}")
            }
            EncodeError::RaggedSegment {
                index,
                elem_size,
                len,
            } => {
                write!(
                    f,
                    "segment {index}: {len} bytes is not a whole number of {elem_size}-byte elements"
                )
            }
            EncodeError::CountMismatch {
                index,
                declared,
                actual,
            } => {
                write!(
                    f,
                    "segment {index}: declared {declared} elements but bytes hold {actual}"
                )
            }
            EncodeError::HeaderSizeMismatch { expected, actual } => {
                write!(f, "fixed header is {actual} bytes, request type declares {expected}")
            }
            EncodeError::MalformedDescriptor { fixed_len } => {
                write!(f, "request type declares an invalid fixed header size {fixed_len}")
            }
            EncodeError::UnresolvedExtension => {
                write!(f, "extension request built before its major opcode was resolved")
            }
            EncodeError::RequestTooLong { len, max } => {
                write!(f, "encoded request is {len} bytes, limit is {max}")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// A reply buffer's declared lengths are internally inconsistent, or a read
/// fell outside it. Surfaced to whoever is walking that buffer; the
/// connection it came from should no longer be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A field read past the end of the buffer.
    OutOfBounds {
        offset: usize,
        len: usize,
        buffer_len: usize,
    },

    /// The message is shorter than the fixed header every message carries.
    TruncatedMessage { len: usize },

    /// Walking the declared field counts ran past the declared total length.
    LengthOverrun { cursor: usize, limit: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::OutOfBounds {
                offset,
                len,
                buffer_len,
            } => {
                write!(
                    f,
                    "read of {len} bytes at offset {offset} exceeds buffer of {buffer_len} bytes"
                )
            }
            DecodeError::TruncatedMessage { len } => {
                write!(f, "message of {len} bytes is shorter than the fixed header")
            }
            DecodeError::LengthOverrun { cursor, limit } => {
                write!(
                    f,
                    "declared field lengths walk to offset {cursor}, past the declared total {limit}"
                )
            }
        }
    }
}

impl std::error::Error for DecodeError {}
