use std::borrow::Cow;

use crate::constants::WIRE_ALIGN;

const ZERO_FILL: [u8; WIRE_ALIGN] = [0; WIRE_ALIGN];

/// One contiguous piece of a request on its way to the transport.
///
/// A built request is an ordered list of these: the fixed header, then each
/// trailing segment with its zero-fill padding range. Ranges either borrow
/// the caller's bytes or own patched/generated ones; a zero-length range
/// contributes nothing to the wire.
#[derive(Debug, Clone)]
pub struct ByteRange<'a>(Cow<'a, [u8]>);

impl<'a> ByteRange<'a> {
    pub fn borrowed(bytes: &'a [u8]) -> Self {
        ByteRange(Cow::Borrowed(bytes))
    }

    pub fn owned(bytes: Vec<u8>) -> Self {
        ByteRange(Cow::Owned(bytes))
    }

    /// A zero-filled padding range. `len` never exceeds the wire alignment.
    pub fn zeroed(len: usize) -> ByteRange<'static> {
        debug_assert!(len <= WIRE_ALIGN);
        ByteRange(Cow::Borrowed(&ZERO_FILL[..len]))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for ByteRange<'_> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
