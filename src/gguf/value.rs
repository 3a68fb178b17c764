//! Typed value codec for the tagged GGUF metadata union

use super::constants::GgufMetadataValueType;
use super::error::GgufError;
use super::primitives::{ByteReader, ByteWriter, Endian};
use super::types::{MetadataArray, MetadataEntry, MetadataValue};

/// Arrays nested deeper than this are rejected as malformed
pub const MAX_ARRAY_DEPTH: usize = 8;

/// Smallest number of bytes one encoded value of this type occupies
const fn min_encoded_size(value_type: GgufMetadataValueType) -> usize {
    match value_type {
        GgufMetadataValueType::Uint8 | GgufMetadataValueType::Int8 | GgufMetadataValueType::Bool => 1,
        GgufMetadataValueType::Uint16 | GgufMetadataValueType::Int16 => 2,
        GgufMetadataValueType::Uint32 | GgufMetadataValueType::Int32 | GgufMetadataValueType::Float32 => 4,
        GgufMetadataValueType::Uint64 | GgufMetadataValueType::Int64 | GgufMetadataValueType::Float64 => 8,
        // u64 length prefix
        GgufMetadataValueType::String => 8,
        // element tag + u64 count
        GgufMetadataValueType::Array => 12,
    }
}

fn read_value_type(reader: &mut ByteReader<'_>) -> Result<GgufMetadataValueType, GgufError> {
    let id = reader.read_u32()?;
    GgufMetadataValueType::try_from(id).map_err(GgufError::UnsupportedValueType)
}

impl MetadataValue {
    /// Decode one payload of the given type from the reader
    pub fn decode(
        value_type: GgufMetadataValueType,
        reader: &mut ByteReader<'_>,
    ) -> Result<Self, GgufError> {
        Self::decode_nested(value_type, reader, 0)
    }

    fn decode_nested(
        value_type: GgufMetadataValueType,
        reader: &mut ByteReader<'_>,
        depth: usize,
    ) -> Result<Self, GgufError> {
        Ok(match value_type {
            GgufMetadataValueType::Uint8 => MetadataValue::Uint8(reader.read_u8()?),
            GgufMetadataValueType::Int8 => MetadataValue::Int8(reader.read_i8()?),
            GgufMetadataValueType::Uint16 => MetadataValue::Uint16(reader.read_u16()?),
            GgufMetadataValueType::Int16 => MetadataValue::Int16(reader.read_i16()?),
            GgufMetadataValueType::Uint32 => MetadataValue::Uint32(reader.read_u32()?),
            GgufMetadataValueType::Int32 => MetadataValue::Int32(reader.read_i32()?),
            GgufMetadataValueType::Float32 => MetadataValue::Float32(reader.read_f32()?),
            GgufMetadataValueType::Bool => MetadataValue::Bool(reader.read_bool()?),
            GgufMetadataValueType::String => MetadataValue::String(reader.read_string()?),
            GgufMetadataValueType::Uint64 => MetadataValue::Uint64(reader.read_u64()?),
            GgufMetadataValueType::Int64 => MetadataValue::Int64(reader.read_i64()?),
            GgufMetadataValueType::Float64 => MetadataValue::Float64(reader.read_f64()?),
            GgufMetadataValueType::Array => {
                MetadataValue::Array(MetadataArray::decode_nested(reader, depth)?)
            }
        })
    }

    /// Encode the payload only; the caller writes the type tag
    pub fn encode(&self, writer: &mut ByteWriter) -> Result<(), GgufError> {
        match self {
            MetadataValue::Uint8(v) => writer.write_u8(*v),
            MetadataValue::Int8(v) => writer.write_i8(*v),
            MetadataValue::Uint16(v) => writer.write_u16(*v),
            MetadataValue::Int16(v) => writer.write_i16(*v),
            MetadataValue::Uint32(v) => writer.write_u32(*v),
            MetadataValue::Int32(v) => writer.write_i32(*v),
            MetadataValue::Float32(v) => writer.write_f32(*v),
            MetadataValue::Bool(v) => writer.write_bool(*v),
            MetadataValue::String(v) => writer.write_string(v),
            MetadataValue::Uint64(v) => writer.write_u64(*v),
            MetadataValue::Int64(v) => writer.write_i64(*v),
            MetadataValue::Float64(v) => writer.write_f64(*v),
            MetadataValue::Array(arr) => arr.encode(writer)?,
        }
        Ok(())
    }
}

impl MetadataArray {
    fn decode_nested(reader: &mut ByteReader<'_>, depth: usize) -> Result<Self, GgufError> {
        if depth >= MAX_ARRAY_DEPTH {
            return Err(GgufError::MalformedEntry(format!(
                "array nesting deeper than {MAX_ARRAY_DEPTH} at offset {}",
                reader.position()
            )));
        }
        let element_type = read_value_type(reader)?;
        let (len, capacity) = reader.read_len(min_encoded_size(element_type))?;

        let mut values = Vec::with_capacity(capacity);
        for _ in 0..len {
            values.push(MetadataValue::decode_nested(element_type, reader, depth + 1)?);
        }
        Ok(Self {
            element_type,
            values,
        })
    }

    /// Element tag, element count taken from `values`, then each payload
    pub fn encode(&self, writer: &mut ByteWriter) -> Result<(), GgufError> {
        writer.write_u32(self.element_type as u32);
        writer.write_u64(self.values.len() as u64);
        for (i, value) in self.values.iter().enumerate() {
            if value.value_type() != self.element_type {
                return Err(GgufError::TypeMismatch(format!(
                    "array element {i} is {} but the array holds {}",
                    value.value_type(),
                    self.element_type
                )));
            }
            value.encode(writer)?;
        }
        Ok(())
    }
}

impl MetadataEntry {
    /// Key string, u32 type tag, payload
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, GgufError> {
        let key = reader.read_string()?;
        let value_type = read_value_type(reader)?;
        let value = MetadataValue::decode(value_type, reader)?;
        Ok(Self { key, value })
    }

    pub fn encode(&self, writer: &mut ByteWriter) -> Result<(), GgufError> {
        writer.write_string(&self.key);
        writer.write_u32(self.value.value_type() as u32);
        self.value.encode(writer)
    }
}

/// Decode a single payload from the start of `bytes`, returning it with the
/// number of bytes consumed
pub fn decode_value(
    value_type: GgufMetadataValueType,
    bytes: &[u8],
    endian: Endian,
) -> Result<(MetadataValue, usize), GgufError> {
    let mut reader = ByteReader::new(bytes, endian);
    let value = MetadataValue::decode(value_type, &mut reader)?;
    Ok((value, reader.position()))
}

/// Encode a payload (without its type tag)
pub fn encode_value(value: &MetadataValue, endian: Endian) -> Result<Vec<u8>, GgufError> {
    let mut writer = ByteWriter::new(endian);
    value.encode(&mut writer)?;
    Ok(writer.into_inner())
}
