use xplex::wire::{
    CountSource, DecodeError, ElemType, FieldDef, LengthUnit, RecordIter, ReplyBuffer,
    ReplySchema, StructSchema, walk_reply,
};

static ITEM_FIELDS: [FieldDef; 1] = [FieldDef {
    count: CountSource::FieldU16(0),
    elem: ElemType::Fixed { size: 1, align: 1 },
}];
static ITEM: StructSchema = StructSchema {
    fixed_size: 4,
    align: 4,
    fields: &ITEM_FIELDS,
};

fn item(data: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; 4];
    bytes[0..2].copy_from_slice(&(data.len() as u16).to_le_bytes());
    bytes.extend_from_slice(data);
    bytes
}

#[test]
fn test_fixed_stride_visits_every_record() {
    let mut bytes = vec![0u8; 32];
    for record in 0u8..3 {
        bytes.extend_from_slice(&[record; 4]);
    }
    let buf = ReplyBuffer::new(bytes);

    let mut iter = RecordIter::fixed(&buf, 32, 3, 4);
    assert_eq!(iter.remaining(), 3);

    let spans: Vec<_> = (&mut iter).map(|span| span.unwrap()).collect();
    assert_eq!(spans.len(), 3);
    assert_eq!(spans[0].offset, 32);
    assert_eq!(spans[1].offset, 36);
    assert_eq!(spans[2].offset, 40);
    assert!(spans.iter().all(|span| span.len == 4));

    assert_eq!(iter.remaining(), 0);
    assert!(iter.next().is_none());
}

#[test]
fn test_fixed_stride_end_offset_is_constant_time_sum() {
    let buf = ReplyBuffer::new(vec![0u8; 56]);
    let iter = RecordIter::fixed(&buf, 32, 6, 4);
    assert_eq!(iter.end_offset().unwrap(), 56);
}

#[test]
fn test_empty_iterator_ends_where_it_starts() {
    let buf = ReplyBuffer::new(vec![0u8; 32]);
    let mut iter = RecordIter::fixed(&buf, 32, 0, 4);
    assert!(iter.next().is_none());

    let iter = RecordIter::fixed(&buf, 32, 0, 4);
    assert_eq!(iter.end_offset().unwrap(), 32);
}

#[test]
fn test_self_sized_records_advance_by_their_own_size() {
    let mut bytes = vec![0u8; 32];
    for data in [&[1u8; 4][..], &[2u8; 8], &[], &[3u8; 12]] {
        bytes.extend_from_slice(&item(data));
    }
    let buf = ReplyBuffer::new(bytes);

    let iter = RecordIter::variable(&buf, 32, 4, &ITEM, buf.len());
    let spans: Vec<_> = iter.map(|span| span.unwrap()).collect();

    assert_eq!(spans.len(), 4);
    let sizes: Vec<_> = spans.iter().map(|span| span.len).collect();
    assert_eq!(sizes, [8, 12, 4, 16]);

    // The end position is the header plus the sum of every record's size.
    let iter = RecordIter::variable(&buf, 32, 4, &ITEM, buf.len());
    let end = iter.end_offset().unwrap();
    assert_eq!(end, 32 + sizes.iter().sum::<usize>());
    assert_eq!(end, buf.len());
}

#[test]
fn test_end_position_chains_to_the_next_field() {
    // Records then chars in one reply: the first field's end position is
    // exactly where the walker places the second field.
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

    let mut bytes = vec![0u8; 32];
    bytes[8..10].copy_from_slice(&3u16.to_le_bytes());
    bytes[10..12].copy_from_slice(&5u16.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 12]);
    bytes.extend_from_slice(b"abcde");
    bytes.extend_from_slice(&[0u8; 3]);
    let buf = ReplyBuffer::new(bytes);

    let layout = walk_reply(&buf, &RECORDS_THEN_CHARS, 5).unwrap();
    let records = layout.span(0).unwrap();

    let end = RecordIter::fixed(&buf, records.offset, records.count, 4)
        .end_offset()
        .unwrap();
    assert_eq!(end, layout.span(1).unwrap().offset);

    let chars = RecordIter::fixed(&buf, end, 5, 1)
        .map(|span| span.unwrap())
        .map(|span| buf.slice(span.offset, span.len).unwrap()[0])
        .collect::<Vec<_>>();
    assert_eq!(chars, b"abcde");
}

#[test]
fn test_record_running_past_the_limit_fails_and_stops() {
    let mut bytes = vec![0u8; 32];
    bytes.extend_from_slice(&item(&[1u8; 4]));
    // Second record claims 100 bytes it does not have.
    let mut bad = vec![0u8; 4];
    bad[0..2].copy_from_slice(&100u16.to_le_bytes());
    bytes.extend_from_slice(&bad);
    let buf = ReplyBuffer::new(bytes);

    let mut iter = RecordIter::variable(&buf, 32, 2, &ITEM, buf.len());
    assert!(iter.next().unwrap().is_ok());
    assert!(matches!(
        iter.next().unwrap(),
        Err(DecodeError::LengthOverrun { .. })
    ));
    assert!(iter.next().is_none());
}
