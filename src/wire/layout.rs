use crate::constants::WIRE_ALIGN;
use crate::utils::{align_pad, align_up};
use crate::wire::{DecodeError, ReplyBuffer};

/// Where a variable-length field's element count comes from: a value known
/// at schema time, or a fixed field read from the enclosing structure
/// (offset relative to the structure's start).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountSource {
    Literal(u32),
    FieldU8(usize),
    FieldU16(usize),
    FieldU32(usize),
}

/// Element type of one variable-length field.
#[derive(Debug, Clone, Copy)]
pub enum ElemType {
    /// Elements of a known size; `align` is the element type's natural
    /// alignment (1, 2, 4 or 8).
    Fixed { size: usize, align: usize },

    /// Elements that size themselves: each one is walked with its own
    /// schema to find where the next begins.
    Var(&'static StructSchema),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub count: CountSource,
    pub elem: ElemType,
}

impl FieldDef {
    /// The alignment the cursor must reach before this field starts.
    fn align(&self) -> usize {
        match self.elem {
            ElemType::Fixed { align, .. } => align,
            ElemType::Var(schema) => schema.align,
        }
    }
}

/// Layout of one structure: a fixed-size part followed by zero or more
/// variable-length fields. Used both for whole reply tails and for the
/// self-sized elements nested inside them.
#[derive(Debug)]
pub struct StructSchema {
    /// Bytes of the fixed part, internal padding included.
    pub fixed_size: usize,

    /// Natural alignment of the fixed part; what list elements of this type
    /// are aligned to.
    pub align: usize,

    pub fields: &'static [FieldDef],
}

/// Denomination of a reply header's tail-length field. The unit varies by
/// reply type, so it is part of each reply's schema rather than a protocol
/// constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    /// The field counts 4-byte units.
    Words4,
    /// The field counts raw bytes.
    Bytes,
}

impl LengthUnit {
    pub fn scale(self, raw: u32) -> usize {
        match self {
            LengthUnit::Words4 => raw as usize * WIRE_ALIGN,
            LengthUnit::Bytes => raw as usize,
        }
    }
}

/// Shape of one reply type: its fixed header and the variable fields behind
/// it.
#[derive(Debug)]
pub struct ReplySchema {
    /// Size of the fixed header; the tail starts here.
    pub header_size: usize,

    /// How this reply type's tail-length field is denominated.
    pub length_unit: LengthUnit,

    pub fields: &'static [FieldDef],
}

/// Resolved location of one variable-length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    /// Absolute byte offset of the first element.
    pub offset: usize,

    /// Number of elements.
    pub count: u32,

    /// Absolute offset one past the last element's final byte. Valid as the
    /// starting point for locating the next field.
    pub end: usize,
}

/// Result of walking one structure: the per-field spans and the total byte
/// length. Sizing and offset extraction are the same walk, so the two can
/// never drift apart.
#[derive(Debug)]
pub struct StructLayout {
    pub spans: Vec<FieldSpan>,

    /// Bytes consumed from the structure's start through the end of its
    /// last field.
    pub total: usize,
}

impl StructLayout {
    pub fn span(&self, index: usize) -> Option<&FieldSpan> {
        self.spans.get(index)
    }
}

fn resolve_count(
    buf: &ReplyBuffer,
    start: usize,
    source: CountSource,
) -> Result<u32, DecodeError> {
    match source {
        CountSource::Literal(n) => Ok(n),
        CountSource::FieldU8(off) => Ok(buf.read_u8(start + off)? as u32),
        CountSource::FieldU16(off) => Ok(buf.read_u16(start + off)? as u32),
        CountSource::FieldU32(off) => buf.read_u32(start + off),
    }
}

/// Walks one structure beginning at `start`, resolving every field's offset
/// and the total length.
///
/// The cursor begins past the fixed part; before each field it advances to
/// the field's element alignment (relative to the structure's start), then
/// by the field's computed byte length. Variable-size elements recurse with
/// their own schema. Any cursor position past `limit` is protocol
/// corruption: the declared counts promise more bytes than the declared
/// total holds.
pub fn walk_struct(
    buf: &ReplyBuffer,
    start: usize,
    schema: &StructSchema,
    limit: usize,
) -> Result<StructLayout, DecodeError> {
    let mut cursor = start + schema.fixed_size;
    if cursor > limit {
        return Err(DecodeError::LengthOverrun { cursor, limit });
    }

    let mut spans = Vec::with_capacity(schema.fields.len());
    for field in schema.fields {
        cursor += align_pad(field.align(), cursor - start);
        let count = resolve_count(buf, start, field.count)?;
        let offset = cursor;

        match field.elem {
            ElemType::Fixed { size, .. } => {
                let len = (count as usize)
                    .checked_mul(size)
                    .ok_or(DecodeError::LengthOverrun { cursor, limit })?;
                cursor = cursor
                    .checked_add(len)
                    .ok_or(DecodeError::LengthOverrun { cursor, limit })?;
            }
            ElemType::Var(elem_schema) => {
                for _ in 0..count {
                    let elem = walk_struct(buf, cursor, elem_schema, limit)?;
                    cursor += elem.total;
                }
            }
        }
        if cursor > limit {
            return Err(DecodeError::LengthOverrun { cursor, limit });
        }

        spans.push(FieldSpan {
            offset,
            count,
            end: cursor,
        });
    }

    Ok(StructLayout {
        spans,
        total: cursor - start,
    })
}

/// Total byte length of one structure at `start`; shares the walk with
/// [`walk_struct`].
pub fn struct_size(
    buf: &ReplyBuffer,
    start: usize,
    schema: &StructSchema,
    limit: usize,
) -> Result<usize, DecodeError> {
    Ok(walk_struct(buf, start, schema, limit)?.total)
}

/// Walks a whole reply: bounds the walk by the header's declared total
/// length and locates every tail field.
///
/// `tail_len_field` is the raw value of the header's length field, already
/// extracted by whoever classified the message; its denomination comes from
/// the schema. When the field counts 4-byte units the computed total is
/// rounded up to the wire alignment, which is how a tail of, say, 17 bytes
/// of data occupies 20 on the wire.
pub fn walk_reply(
    buf: &ReplyBuffer,
    schema: &ReplySchema,
    tail_len_field: u32,
) -> Result<StructLayout, DecodeError> {
    let declared = schema
        .header_size
        .checked_add(schema.length_unit.scale(tail_len_field))
        .ok_or(DecodeError::LengthOverrun {
            cursor: usize::MAX,
            limit: buf.len(),
        })?;
    if declared > buf.len() {
        return Err(DecodeError::OutOfBounds {
            offset: 0,
            len: declared,
            buffer_len: buf.len(),
        });
    }

    let top = StructSchema {
        fixed_size: schema.header_size,
        align: WIRE_ALIGN,
        fields: schema.fields,
    };
    let mut layout = walk_struct(buf, 0, &top, declared)?;
    if schema.length_unit == LengthUnit::Words4 {
        layout.total = align_up(layout.total, WIRE_ALIGN);
        if layout.total > declared {
            return Err(DecodeError::LengthOverrun {
                cursor: layout.total,
                limit: declared,
            });
        }
    }
    Ok(layout)
}
