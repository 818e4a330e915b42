use crate::constants::{
    REQ_LENGTH_OFFSET, REQ_MAJOR_OPCODE_OFFSET, REQ_MINOR_OPCODE_OFFSET, REQ_PROLOGUE_SIZE,
    WIRE_ALIGN,
};
use crate::utils::align_pad;
use crate::wire::{ByteRange, EncodeError, RequestDescriptor, Segment};

/// Assembles requests into the ordered byte ranges the transport writes.
///
/// The builder is pure: it validates the caller's fixed header and trailing
/// segments against the request type, patches the prologue (opcodes and the
/// length field), and returns the ranges. Transmission, sequence assignment
/// and the checked/unchecked decision all belong to the connection layer.
pub struct RequestBuilder;

impl RequestBuilder {
    /// Builds the wire form of one request.
    ///
    /// `major_opcode` is the extension's resolved major opcode and must be
    /// present exactly when the request type belongs to an extension. The
    /// returned ranges are, in order: the patched fixed header, then each
    /// segment followed by its zero-fill padding up to the wire alignment.
    ///
    /// Any inconsistency between the declared counts and the bytes supplied
    /// is reported here and nothing is handed to the transport.
    pub fn build<'a>(
        descriptor: &RequestDescriptor,
        major_opcode: Option<u8>,
        fixed: &[u8],
        segments: &[Segment<'a>],
    ) -> Result<Vec<ByteRange<'a>>, EncodeError> {
        if descriptor.fixed_len < REQ_PROLOGUE_SIZE || descriptor.fixed_len % WIRE_ALIGN != 0 {
            return Err(EncodeError::MalformedDescriptor {
                fixed_len: descriptor.fixed_len,
            });
        }
        if fixed.len() != descriptor.fixed_len {
            return Err(EncodeError::HeaderSizeMismatch {
                expected: descriptor.fixed_len,
                actual: fixed.len(),
            });
        }
        if segments.len() != descriptor.segments.len() {
            return Err(EncodeError::SegmentCountMismatch {
                expected: descriptor.segments.len(),
                actual: segments.len(),
            });
        }

        // Validate every segment and size the whole request before anything
        // is assembled; a failing call must leave nothing for the transport.
        let mut cursor = descriptor.fixed_len;
        for (index, (shape, segment)) in
            descriptor.segments.iter().zip(segments.iter()).enumerate()
        {
            if shape.elem_size == 0 || segment.bytes.len() % shape.elem_size != 0 {
                return Err(EncodeError::RaggedSegment {
                    index,
                    elem_size: shape.elem_size,
                    len: segment.bytes.len(),
                });
            }
            let actual = (segment.bytes.len() / shape.elem_size) as u32;
            if let Some(declared) = segment.count
                && declared != actual
            {
                return Err(EncodeError::CountMismatch {
                    index,
                    declared,
                    actual,
                });
            }
            cursor += segment.bytes.len();
            cursor += align_pad(WIRE_ALIGN, cursor);
        }

        let words = cursor / WIRE_ALIGN;
        if words > u16::MAX as usize {
            return Err(EncodeError::RequestTooLong {
                len: cursor,
                max: u16::MAX as usize * WIRE_ALIGN,
            });
        }

        let mut header = fixed.to_vec();
        match descriptor.extension {
            Some(_) => {
                let major = major_opcode.ok_or(EncodeError::UnresolvedExtension)?;
                header[REQ_MAJOR_OPCODE_OFFSET] = major;
                header[REQ_MINOR_OPCODE_OFFSET] = descriptor.opcode;
            }
            None => {
                header[REQ_MAJOR_OPCODE_OFFSET] = descriptor.opcode;
            }
        }
        header[REQ_LENGTH_OFFSET..REQ_LENGTH_OFFSET + 2]
            .copy_from_slice(&(words as u16).to_le_bytes());

        let mut ranges = Vec::with_capacity(1 + 2 * segments.len());
        ranges.push(ByteRange::owned(header));
        let mut written = descriptor.fixed_len;
        for segment in segments {
            if !segment.bytes.is_empty() {
                ranges.push(ByteRange::borrowed(segment.bytes));
                written += segment.bytes.len();
            }
            // Trailing request data is always rounded to the wire alignment,
            // regardless of the element type's natural alignment.
            let pad = align_pad(WIRE_ALIGN, written);
            if pad != 0 {
                ranges.push(ByteRange::zeroed(pad));
                written += pad;
            }
        }
        debug_assert_eq!(written, cursor);

        Ok(ranges)
    }
}
