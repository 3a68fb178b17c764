use gguf_edit::gguf::{
    parse, Endian, GgmlType, GgufError, GgufMetadataValueType, GgufReader, MetadataValue, GGUF_MAGIC,
};

fn pad_to_32(data: &mut Vec<u8>) {
    let padded = data.len().div_ceil(32) * 32;
    data.resize(padded, 0);
}

fn create_minimal_gguf_v3() -> Vec<u8> {
    let mut data = Vec::new();
    // Magic
    data.extend_from_slice(&GGUF_MAGIC);
    // Version 3
    data.extend_from_slice(&3u32.to_le_bytes());
    // Tensor count: 0
    data.extend_from_slice(&0u64.to_le_bytes());
    // Metadata count: 1
    data.extend_from_slice(&1u64.to_le_bytes());
    // Metadata: "general.architecture" = "llama"
    let key = b"general.architecture";
    data.extend_from_slice(&(key.len() as u64).to_le_bytes());
    data.extend_from_slice(key);
    // Type: String (8)
    data.extend_from_slice(&8u32.to_le_bytes());
    let value = b"llama";
    data.extend_from_slice(&(value.len() as u64).to_le_bytes());
    data.extend_from_slice(value);
    pad_to_32(&mut data);
    data
}

fn create_minimal_gguf_v2_be() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&GGUF_MAGIC);
    data.extend_from_slice(&2u32.to_be_bytes());
    data.extend_from_slice(&0u64.to_be_bytes());
    data.extend_from_slice(&1u64.to_be_bytes());
    // Metadata: "test.key" = 42 (u32)
    let key = b"test.key";
    data.extend_from_slice(&(key.len() as u64).to_be_bytes());
    data.extend_from_slice(key);
    // Type: Uint32 (4)
    data.extend_from_slice(&4u32.to_be_bytes());
    data.extend_from_slice(&42u32.to_be_bytes());
    pad_to_32(&mut data);
    data
}

#[test]
fn test_read_minimal_gguf() {
    let gguf_data = create_minimal_gguf_v3();
    let reader = GgufReader::new(&gguf_data).unwrap();
    let data = reader.read().unwrap();
    assert_eq!(data.header.version, 3);
    assert_eq!(data.header.tensor_count, 0);
    assert_eq!(data.header.metadata_kv_count, 1);
    assert_eq!(data.endian, Endian::Little);
    assert_eq!(data.get_string("general.architecture"), Some("llama"));
}

#[test]
fn test_read_gguf_v2_big_endian() {
    let gguf_data = create_minimal_gguf_v2_be();
    let data = parse(&gguf_data).unwrap();
    assert_eq!(data.header.version, 2);
    assert_eq!(data.endian, Endian::Big);
    assert_eq!(data.get_u32("test.key"), Some(42));
}

#[test]
fn test_invalid_magic() {
    let bad_data = vec![0x00, 0x00, 0x00, 0x00];
    let result = parse(&bad_data);
    assert!(matches!(result, Err(GgufError::BadMagic([0, 0, 0, 0]))));
}

#[test]
fn test_unsupported_version() {
    let mut data = Vec::new();
    data.extend_from_slice(&GGUF_MAGIC);
    data.extend_from_slice(&99u32.to_le_bytes());
    let result = GgufReader::new(&data);
    assert!(matches!(result, Err(GgufError::UnsupportedVersion(99))));
}

#[test]
fn test_multiple_metadata_types() {
    let mut data = Vec::new();
    // Magic
    data.extend_from_slice(&GGUF_MAGIC);
    // Version 3
    data.extend_from_slice(&3u32.to_le_bytes());
    // Tensor count: 0
    data.extend_from_slice(&0u64.to_le_bytes());
    // Metadata count: 6
    data.extend_from_slice(&6u64.to_le_bytes());

    // Metadata 1: u8
    let key = b"test.u8";
    data.extend_from_slice(&(key.len() as u64).to_le_bytes());
    data.extend_from_slice(key);
    data.extend_from_slice(&0u32.to_le_bytes()); // Type: Uint8
    data.push(255u8);

    // Metadata 2: i32
    let key = b"test.i32";
    data.extend_from_slice(&(key.len() as u64).to_le_bytes());
    data.extend_from_slice(key);
    data.extend_from_slice(&5u32.to_le_bytes()); // Type: Int32
    data.extend_from_slice(&(-42i32).to_le_bytes());

    // Metadata 3: f32
    let key = b"test.f32";
    data.extend_from_slice(&(key.len() as u64).to_le_bytes());
    data.extend_from_slice(key);
    data.extend_from_slice(&6u32.to_le_bytes()); // Type: Float32
    let test_float = 2.5f32;
    data.extend_from_slice(&test_float.to_le_bytes());

    // Metadata 4: bool
    let key = b"test.bool";
    data.extend_from_slice(&(key.len() as u64).to_le_bytes());
    data.extend_from_slice(key);
    data.extend_from_slice(&7u32.to_le_bytes()); // Type: Bool
    data.push(1u8);

    // Metadata 5: u64
    let key = b"test.u64";
    data.extend_from_slice(&(key.len() as u64).to_le_bytes());
    data.extend_from_slice(key);
    data.extend_from_slice(&10u32.to_le_bytes()); // Type: Uint64
    data.extend_from_slice(&0xFFFF_FFFF_FFFF_FFFFu64.to_le_bytes());

    // Metadata 6: array of i16
    let key = b"test.arr";
    data.extend_from_slice(&(key.len() as u64).to_le_bytes());
    data.extend_from_slice(key);
    data.extend_from_slice(&9u32.to_le_bytes()); // Type: Array
    data.extend_from_slice(&3u32.to_le_bytes()); // Element type: Int16
    data.extend_from_slice(&2u64.to_le_bytes());
    data.extend_from_slice(&(-1i16).to_le_bytes());
    data.extend_from_slice(&7i16.to_le_bytes());

    pad_to_32(&mut data);

    let parsed = parse(&data).unwrap();

    assert_eq!(parsed.header.metadata_kv_count, 6);
    assert_eq!(parsed.get("test.u8"), Some(&MetadataValue::Uint8(255)));
    assert_eq!(parsed.get("test.i32"), Some(&MetadataValue::Int32(-42)));
    assert_eq!(parsed.get_u64("test.u64"), Some(0xFFFF_FFFF_FFFF_FFFF));
    assert_eq!(parsed.get_f32("test.f32"), Some(2.5));
    assert_eq!(parsed.get_bool("test.bool"), Some(true));

    let arr = parsed.get_array("test.arr").unwrap();
    assert_eq!(arr.element_type, GgufMetadataValueType::Int16);
    assert_eq!(arr.values, vec![MetadataValue::Int16(-1), MetadataValue::Int16(7)]);

    // keys come back in file order
    let keys: Vec<_> = parsed.metadata.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(
        keys,
        ["test.u8", "test.i32", "test.f32", "test.bool", "test.u64", "test.arr"]
    );
}

#[test]
fn test_tensor_info() {
    let mut data = Vec::new();
    data.extend_from_slice(&GGUF_MAGIC);
    data.extend_from_slice(&3u32.to_le_bytes());
    data.extend_from_slice(&2u64.to_le_bytes());
    data.extend_from_slice(&0u64.to_le_bytes());

    let name = b"token_embd.weight";
    data.extend_from_slice(&(name.len() as u64).to_le_bytes());
    data.extend_from_slice(name);
    data.extend_from_slice(&2u32.to_le_bytes());
    data.extend_from_slice(&4096u64.to_le_bytes());
    data.extend_from_slice(&32000u64.to_le_bytes());
    data.extend_from_slice(&12u32.to_le_bytes()); // Q4_K
    data.extend_from_slice(&0u64.to_le_bytes());

    let name = b"output_norm.weight";
    data.extend_from_slice(&(name.len() as u64).to_le_bytes());
    data.extend_from_slice(name);
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&4096u64.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes()); // F32
    data.extend_from_slice(&73728000u64.to_le_bytes());

    let header_end = data.len();
    pad_to_32(&mut data);

    let parsed = parse(&data).unwrap();
    assert_eq!(parsed.header_range, 0..header_end);
    assert_eq!(parsed.data_offset, data.len());

    let embd = parsed.get_tensor("token_embd.weight").unwrap();
    assert_eq!(embd.dims, vec![4096, 32000]);
    assert_eq!(embd.dtype, 12);
    assert_eq!(embd.ggml_type(), Some(GgmlType::Q4K));
    assert_eq!(embd.data_size(), Some(73728000));

    let norm = &parsed.tensors[1];
    assert_eq!(norm.name, "output_norm.weight");
    assert_eq!(norm.offset, 73728000);
}

#[test]
fn test_duplicate_key_is_malformed() {
    let mut data = Vec::new();
    data.extend_from_slice(&GGUF_MAGIC);
    data.extend_from_slice(&3u32.to_le_bytes());
    data.extend_from_slice(&0u64.to_le_bytes());
    data.extend_from_slice(&2u64.to_le_bytes());
    for _ in 0..2 {
        data.extend_from_slice(&1u64.to_le_bytes());
        data.push(b'k');
        data.extend_from_slice(&0u32.to_le_bytes());
        data.push(1);
    }
    pad_to_32(&mut data);
    assert!(matches!(parse(&data), Err(GgufError::MalformedEntry(_))));
}

#[test]
fn test_unknown_value_type() {
    let mut data = Vec::new();
    data.extend_from_slice(&GGUF_MAGIC);
    data.extend_from_slice(&3u32.to_le_bytes());
    data.extend_from_slice(&0u64.to_le_bytes());
    data.extend_from_slice(&1u64.to_le_bytes());
    data.extend_from_slice(&1u64.to_le_bytes());
    data.push(b'k');
    data.extend_from_slice(&13u32.to_le_bytes());
    data.extend_from_slice(&[0u8; 64]);
    assert!(matches!(parse(&data), Err(GgufError::UnsupportedValueType(13))));
}

#[test]
fn test_unexpected_eof() {
    // Just magic, no version
    let mut data = Vec::new();
    data.extend_from_slice(&GGUF_MAGIC);
    let result = GgufReader::new(&data);
    assert!(matches!(result, Err(GgufError::TruncatedInput { offset: 4, .. })));
}

#[test]
fn test_truncated_metadata_table() {
    let mut data = create_minimal_gguf_v3();
    data.truncate(40);
    assert!(matches!(parse(&data), Err(GgufError::TruncatedInput { .. })));
}

#[test]
fn test_data_offset_alignment() {
    let gguf_data = create_minimal_gguf_v3();
    let data = parse(&gguf_data).unwrap();
    // Data offset should be aligned to 32 bytes (default alignment)
    assert_eq!(data.data_offset % 32, 0);
    assert_eq!(data.alignment, 32);
}
