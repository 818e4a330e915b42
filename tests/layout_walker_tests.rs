use xplex::wire::{
    CountSource, DecodeError, ElemType, FieldDef, LengthUnit, ReplyBuffer, ReplySchema,
    StructSchema, struct_size, walk_reply, walk_struct,
};

// Reply carrying a list of fixed 4-byte records followed by a list of
// one-byte characters; counts live in the fixed header.
static RECORDS_THEN_CHARS_FIELDS: [FieldDef; 2] = [
    FieldDef {
        count: CountSource::FieldU16(8),
        elem: ElemType::Fixed { size: 4, align: 4 },
    },
    FieldDef {
        count: CountSource::FieldU16(10),
        elem: ElemType::Fixed { size: 1, align: 1 },
    },
];
static RECORDS_THEN_CHARS: ReplySchema = ReplySchema {
    header_size: 32,
    length_unit: LengthUnit::Words4,
    fields: &RECORDS_THEN_CHARS_FIELDS,
};

// Self-sized list element: a u16 byte count, two pad bytes, then that many
// bytes of data.
static ITEM_FIELDS: [FieldDef; 1] = [FieldDef {
    count: CountSource::FieldU16(0),
    elem: ElemType::Fixed { size: 1, align: 1 },
}];
static ITEM: StructSchema = StructSchema {
    fixed_size: 4,
    align: 4,
    fields: &ITEM_FIELDS,
};

static ITEM_LIST_FIELDS: [FieldDef; 1] = [FieldDef {
    count: CountSource::FieldU32(8),
    elem: ElemType::Var(&ITEM),
}];
static ITEM_LIST: ReplySchema = ReplySchema {
    header_size: 32,
    length_unit: LengthUnit::Words4,
    fields: &ITEM_LIST_FIELDS,
};

fn reply_with_tail(tail: &[u8]) -> ReplyBuffer {
    let mut bytes = vec![0u8; 32];
    bytes.extend_from_slice(tail);
    ReplyBuffer::new(bytes)
}

fn put_u16(buf: &ReplyBuffer, offset: usize, value: u16) -> ReplyBuffer {
    let mut bytes = buf.clone().into_bytes();
    bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    ReplyBuffer::new(bytes)
}

fn item(data: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; 4];
    bytes[0..2].copy_from_slice(&(data.len() as u16).to_le_bytes());
    bytes.extend_from_slice(data);
    bytes
}

#[test]
fn test_records_then_chars_layout() {
    // 3 records of 4 bytes, 5 chars, 3 bytes of trailing fill: a 20-byte
    // tail declared as 5 words.
    let mut tail = vec![0xaau8; 12];
    tail.extend_from_slice(b"hello");
    tail.extend_from_slice(&[0, 0, 0]);
    let buf = reply_with_tail(&tail);
    let buf = put_u16(&buf, 8, 3);
    let buf = put_u16(&buf, 10, 5);

    let layout = walk_reply(&buf, &RECORDS_THEN_CHARS, 5).unwrap();
    assert_eq!(layout.total, 52);

    let records = layout.span(0).unwrap();
    assert_eq!((records.offset, records.count, records.end), (32, 3, 44));

    let chars = layout.span(1).unwrap();
    assert_eq!((chars.offset, chars.count, chars.end), (44, 5, 49));
    assert_eq!(buf.slice(chars.offset, 5).unwrap(), b"hello");
}

#[test]
fn test_empty_list_consumes_nothing() {
    let buf = reply_with_tail(&[]);
    let layout = walk_reply(&buf, &RECORDS_THEN_CHARS, 0).unwrap();
    assert_eq!(layout.total, 32);
    assert_eq!(layout.span(0).unwrap().offset, layout.span(0).unwrap().end);
    assert_eq!(layout.span(1).unwrap().offset, 32);
}

#[test]
fn test_field_start_is_aligned_to_its_element_type() {
    // 3 chars then a list of u16s: one pad byte before the second field.
    static CHARS_THEN_SHORTS_FIELDS: [FieldDef; 2] = [
        FieldDef {
            count: CountSource::FieldU16(8),
            elem: ElemType::Fixed { size: 1, align: 1 },
        },
        FieldDef {
            count: CountSource::FieldU16(10),
            elem: ElemType::Fixed { size: 2, align: 2 },
        },
    ];
    static CHARS_THEN_SHORTS: ReplySchema = ReplySchema {
        header_size: 32,
        length_unit: LengthUnit::Words4,
        fields: &CHARS_THEN_SHORTS_FIELDS,
    };

    let buf = reply_with_tail(&[0u8; 8]);
    let buf = put_u16(&buf, 8, 3);
    let buf = put_u16(&buf, 10, 2);

    let layout = walk_reply(&buf, &CHARS_THEN_SHORTS, 2).unwrap();
    let chars = layout.span(0).unwrap();
    let shorts = layout.span(1).unwrap();
    assert_eq!(chars.end, 35);
    assert_eq!(shorts.offset, 36);
    assert_eq!(shorts.end, 40);
    assert_eq!(layout.total, 40);
}

#[test]
fn test_self_sized_elements_are_walked_recursively() {
    let mut tail = Vec::new();
    for data in [&[1u8; 4][..], &[2u8; 8], &[], &[3u8; 12]] {
        tail.extend_from_slice(&item(data));
    }
    assert_eq!(tail.len(), 40);

    let mut bytes = vec![0u8; 32];
    bytes[8..12].copy_from_slice(&4u32.to_le_bytes());
    bytes.extend_from_slice(&tail);
    let buf = ReplyBuffer::new(bytes);

    let layout = walk_reply(&buf, &ITEM_LIST, 10).unwrap();
    let items = layout.span(0).unwrap();
    assert_eq!((items.offset, items.count, items.end), (32, 4, 72));
    assert_eq!(layout.total, 72);
}

#[test]
fn test_sizing_and_extraction_share_one_walk() {
    let bytes = item(&[7u8; 6]);
    let buf = ReplyBuffer::new(bytes);

    let size = struct_size(&buf, 0, &ITEM, buf.len()).unwrap();
    let layout = walk_struct(&buf, 0, &ITEM, buf.len()).unwrap();
    assert_eq!(size, layout.total);
    assert_eq!(size, 10);
}

#[test]
fn test_byte_denominated_length_field_is_not_rounded() {
    static RAW_CHARS_FIELDS: [FieldDef; 1] = [FieldDef {
        count: CountSource::FieldU16(8),
        elem: ElemType::Fixed { size: 1, align: 1 },
    }];
    static RAW_CHARS: ReplySchema = ReplySchema {
        header_size: 32,
        length_unit: LengthUnit::Bytes,
        fields: &RAW_CHARS_FIELDS,
    };

    let buf = reply_with_tail(&[0x55u8; 17]);
    let buf = put_u16(&buf, 8, 17);

    let layout = walk_reply(&buf, &RAW_CHARS, 17).unwrap();
    assert_eq!(layout.total, 49);
    assert_eq!(layout.span(0).unwrap().end, 49);
}

#[test]
fn test_count_past_declared_length_is_corruption() {
    let buf = reply_with_tail(&[0u8; 20]);
    let buf = put_u16(&buf, 8, 3);
    // 200 chars cannot fit a 5-word tail.
    let buf = put_u16(&buf, 10, 200);

    let err = walk_reply(&buf, &RECORDS_THEN_CHARS, 5).unwrap_err();
    assert!(matches!(err, DecodeError::LengthOverrun { limit: 52, .. }));
}

#[test]
fn test_count_field_outside_buffer_is_reported() {
    static FAR_COUNT_FIELDS: [FieldDef; 1] = [FieldDef {
        count: CountSource::FieldU32(30),
        elem: ElemType::Fixed { size: 1, align: 1 },
    }];
    static FAR_COUNT: ReplySchema = ReplySchema {
        header_size: 32,
        length_unit: LengthUnit::Words4,
        fields: &FAR_COUNT_FIELDS,
    };

    let buf = ReplyBuffer::new(vec![0u8; 32]);
    let err = walk_reply(&buf, &FAR_COUNT, 0).unwrap_err();
    assert!(matches!(err, DecodeError::OutOfBounds { offset: 30, .. }));
}

#[test]
fn test_declared_total_past_buffer_is_reported() {
    let buf = ReplyBuffer::new(vec![0u8; 32]);
    let err = walk_reply(&buf, &RECORDS_THEN_CHARS, 5).unwrap_err();
    assert!(matches!(err, DecodeError::OutOfBounds { .. }));
}

#[test]
fn test_built_list_length_round_trips_through_the_walker() {
    // The length a request was built with is the length the walker reads
    // back from a reply-shaped buffer.
    for len in [0usize, 1, 3, 4, 13, 32] {
        let data = vec![0x42u8; len];
        let mut tail = data.clone();
        tail.resize(len + xplex::utils::align_pad(4, len), 0);

        let buf = reply_with_tail(&tail);
        let buf = put_u16(&buf, 10, len as u16);
        let buf = put_u16(&buf, 8, 0);

        let layout = walk_reply(&buf, &RECORDS_THEN_CHARS, (tail.len() / 4) as u32).unwrap();
        let chars = layout.span(1).unwrap();
        assert_eq!(chars.count as usize, len);
        assert_eq!(chars.end - chars.offset, len);
    }
}
