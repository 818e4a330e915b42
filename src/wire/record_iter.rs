use crate::wire::{DecodeError, ReplyBuffer, StructSchema, struct_size};

/// Location of one record inside a reply buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    pub offset: usize,
    pub len: usize,
}

impl RecordSpan {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

#[derive(Debug, Clone, Copy)]
enum Stride {
    Fixed(usize),
    Var(&'static StructSchema),
}

/// Lazy forward-only walk over a list of records embedded in a reply.
///
/// Each step yields the current record's span and advances by that record's
/// size: a fixed stride, or the size the element's own schema computes.
/// Once exhausted, [`RecordIter::end_offset`] is the starting offset of the
/// next field in the enclosing structure; chaining iterators this way is
/// how successive variable-length fields are located without any absolute
/// offset table.
///
/// There is no going backward; restart by re-deriving the iterator from the
/// buffer and its layout.
#[derive(Debug)]
pub struct RecordIter<'b> {
    buf: &'b ReplyBuffer,
    offset: usize,
    rem: u32,
    stride: Stride,
    limit: usize,
    failed: bool,
}

impl<'b> RecordIter<'b> {
    /// Iterator over `count` records of `elem_size` bytes each, starting at
    /// `offset`.
    pub fn fixed(buf: &'b ReplyBuffer, offset: usize, count: u32, elem_size: usize) -> Self {
        let limit = buf.len();
        RecordIter {
            buf,
            offset,
            rem: count,
            stride: Stride::Fixed(elem_size),
            limit,
            failed: false,
        }
    }

    /// Iterator over `count` self-sized records starting at `offset`; each
    /// record's byte length comes from walking `schema` at its position.
    /// `limit` bounds the walk, normally the reply's declared total length.
    pub fn variable(
        buf: &'b ReplyBuffer,
        offset: usize,
        count: u32,
        schema: &'static StructSchema,
        limit: usize,
    ) -> Self {
        RecordIter {
            buf,
            offset,
            rem: count,
            stride: Stride::Var(schema),
            limit,
            failed: false,
        }
    }

    /// Records not yet visited.
    pub fn remaining(&self) -> u32 {
        self.rem
    }

    /// Absolute offset of the next record (or of the end, once exhausted).
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Consumes the iterator and returns the offset one past the last
    /// record, which is the start position of the enclosing structure's
    /// next field.
    ///
    /// Constant time for fixed-size records; for self-sized records every
    /// remaining element is walked.
    pub fn end_offset(mut self) -> Result<usize, DecodeError> {
        match self.stride {
            Stride::Fixed(size) => {
                let len = (self.rem as usize)
                    .checked_mul(size)
                    .and_then(|len| self.offset.checked_add(len))
                    .ok_or(DecodeError::LengthOverrun {
                        cursor: self.offset,
                        limit: self.limit,
                    })?;
                if len > self.limit {
                    return Err(DecodeError::LengthOverrun {
                        cursor: len,
                        limit: self.limit,
                    });
                }
                Ok(len)
            }
            Stride::Var(_) => {
                for span in &mut self {
                    span?;
                }
                Ok(self.offset)
            }
        }
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Result<RecordSpan, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rem == 0 || self.failed {
            return None;
        }

        let size = match self.stride {
            Stride::Fixed(size) => size,
            Stride::Var(schema) => {
                match struct_size(self.buf, self.offset, schema, self.limit) {
                    Ok(size) => size,
                    Err(e) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
            }
        };

        let end = self.offset + size;
        if end > self.limit {
            self.failed = true;
            return Some(Err(DecodeError::LengthOverrun {
                cursor: end,
                limit: self.limit,
            }));
        }

        let span = RecordSpan {
            offset: self.offset,
            len: size,
        };
        self.offset = end;
        self.rem -= 1;
        Some(Ok(span))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.rem as usize))
        }
    }
}
