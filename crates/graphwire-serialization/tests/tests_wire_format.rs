use graphwire_serialization::{
    ByteCursor, FrameHeader, GraphCodec, ProtocolVersion, FRAME_HEADER_BYTE_COUNT, FRAME_MAGIC,
};
use graphwire_structures::{GraphWireError, Value};

#[test]
fn frame_header_layout_is_exact() {
    let codec = GraphCodec::new();
    let frame = codec.encode_package(&Value::from("payload"), 7).unwrap();

    assert_eq!(&frame[0..4], &FRAME_MAGIC);
    let mut cursor = ByteCursor::new(&frame);
    let header = FrameHeader::read_from(&mut cursor).unwrap();
    assert_eq!(
        header.body_length as usize,
        frame.len() - FRAME_HEADER_BYTE_COUNT
    );
    assert_eq!(header.package_id, 7);
    assert_eq!(header.part_id, 0);
    assert_eq!(header.part_count, 1);
    assert_eq!(header.version, ProtocolVersion::SUPPORTED);
}

#[test]
fn default_package_id_is_zero() {
    let codec = GraphCodec::new();
    let frame = codec.encode_to_vec(&Value::from(1i32)).unwrap();
    let mut cursor = ByteCursor::new(&frame);
    let header = FrameHeader::read_from(&mut cursor).unwrap();
    assert_eq!(header.package_id, 0);
}

#[test]
fn string_root_body_is_raw_utf8() {
    let codec = GraphCodec::new();
    let frame = codec.encode_to_vec(&Value::from("hi")).unwrap();
    // Node: id(4) + type tag(4) + "string"(4+6) + body length(4) + body.
    let body = &frame[FRAME_HEADER_BYTE_COUNT..];
    assert_eq!(&body[0..4], &[0, 0, 0, 0]);
    assert_eq!(body[4], 5); // string major kind
    assert_eq!(&body[8..12], &[6, 0, 0, 0]);
    assert_eq!(&body[12..18], b"string");
    assert_eq!(&body[18..22], &[2, 0, 0, 0]);
    assert_eq!(&body[22..], b"hi");
}

#[test]
fn corrupted_magic_is_rejected() {
    let codec = GraphCodec::new();
    let mut frame = codec.encode_to_vec(&Value::from("x")).unwrap();
    frame[0] = b'?';
    assert!(matches!(
        codec.decode_from_slice(&frame),
        Err(GraphWireError::MalformedFrame(_))
    ));
}

#[test]
fn trailing_bytes_are_rejected() {
    let codec = GraphCodec::new();
    let mut frame = codec.encode_to_vec(&Value::from("x")).unwrap();
    frame.push(0xFF);
    assert!(matches!(
        codec.decode_from_slice(&frame),
        Err(GraphWireError::MalformedFrame(_))
    ));
}

#[test]
fn truncated_stream_is_a_malformed_frame() {
    let codec = GraphCodec::new();
    let frame = codec.encode_to_vec(&Value::from("truncate me")).unwrap();
    let mut short = &frame[..frame.len() - 3];
    assert!(matches!(
        codec.deserialize(&mut short),
        Err(GraphWireError::MalformedFrame(_))
    ));
}

#[test]
fn unknown_type_identifier_is_unsupported() {
    struct Mystery;
    let mut encoder = GraphCodec::new();
    encoder.register_surrogate(graphwire_serialization::Surrogate::new::<Mystery>(
        "Mystery",
        |_, _| Ok(()),
        || Mystery,
        |_, _| Ok(()),
    ));
    let frame = encoder.encode_to_vec(&Value::object(Mystery)).unwrap();

    // A decoder that never learned "Mystery" must refuse the frame.
    let decoder = GraphCodec::new();
    assert!(matches!(
        decoder.decode_from_slice(&frame),
        Err(GraphWireError::UnsupportedType(_))
    ));
}

#[test]
fn hostile_array_extents_are_rejected_not_allocated() {
    use graphwire_structures::ArrayValue;
    let codec = GraphCodec::new();
    let mut array = ArrayValue::new("i32", vec![2, 3]).unwrap();
    array.set(&[0, 0], Value::from(1i32)).unwrap();
    let frame = codec.encode_to_vec(&Value::array(array)).unwrap();

    // Node layout: id(4) + type tag(4) + "i32"(4+3) + body len(4) puts the
    // two extents at body offsets 23..31, i.e. frame bytes 59..67.
    let mut oversized = frame.clone();
    oversized[59..63].copy_from_slice(&u32::MAX.to_le_bytes());
    oversized[63..67].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        codec.decode_from_slice(&oversized),
        Err(GraphWireError::MalformedFrame(_))
    ));

    // Extents that multiply out to a huge-but-addressable slot count must
    // fail the same way instead of attempting the allocation.
    let mut large = frame;
    large[59..63].copy_from_slice(&100_000u32.to_le_bytes());
    large[63..67].copy_from_slice(&100_000u32.to_le_bytes());
    assert!(matches!(
        codec.decode_from_slice(&large),
        Err(GraphWireError::MalformedFrame(_))
    ));
}

#[test]
fn hostile_field_count_is_rejected_not_allocated() {
    struct Husk;
    let mut encoder = GraphCodec::new();
    encoder.register_surrogate(graphwire_serialization::Surrogate::new::<Husk>(
        "Husk",
        |_, _| Ok(()),
        || Husk,
        |_, _| Ok(()),
    ));
    let mut frame = encoder.encode_to_vec(&Value::object(Husk)).unwrap();

    // Node layout: id(4) + type tag(4) + "Husk"(4+4) + body len(4) puts the
    // field count at frame bytes 56..60. Claim u32::MAX fields in a 4-byte
    // body; decoding must fail on the missing field data, not pre-allocate.
    frame[56..60].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        encoder.decode_from_slice(&frame),
        Err(GraphWireError::MalformedFrame(_))
    ));
}

#[test]
fn empty_input_is_rejected() {
    let codec = GraphCodec::new();
    assert!(matches!(
        codec.decode_from_slice(&[]),
        Err(GraphWireError::MalformedFrame(_))
    ));
}
