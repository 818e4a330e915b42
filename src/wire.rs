mod byte_range;
mod layout;
mod record_iter;
mod reply_buffer;
mod request;
mod request_builder;
mod wire_error;

pub use byte_range::ByteRange;
pub use layout::{
    CountSource, ElemType, FieldDef, FieldSpan, LengthUnit, ReplySchema, StructLayout,
    StructSchema, struct_size, walk_reply, walk_struct,
};
pub use record_iter::{RecordIter, RecordSpan};
pub use reply_buffer::ReplyBuffer;
pub use request::{Extension, RequestDescriptor, Segment, SegmentDescriptor};
pub use request_builder::RequestBuilder;
pub use wire_error::{DecodeError, EncodeError};
