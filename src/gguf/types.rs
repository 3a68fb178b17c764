//! In-memory representation of a parsed GGUF header

use std::collections::HashMap;
use std::ops::Range;

use super::constants::{GgmlType, GgufMetadataValueType, GGUF_ALIGNMENT_KEY, GGUF_DEFAULT_ALIGNMENT};
use super::error::GgufError;
use super::primitives::Endian;

/// Fixed-size fields at the start of every GGUF file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GgufHeader {
    pub version: u32,
    pub tensor_count: u64,
    pub metadata_kv_count: u64,
}

/// A typed metadata value
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Uint8(u8),
    Int8(i8),
    Uint16(u16),
    Int16(i16),
    Uint32(u32),
    Int32(i32),
    Float32(f32),
    Bool(bool),
    String(String),
    Array(MetadataArray),
    Uint64(u64),
    Int64(i64),
    Float64(f64),
}

impl MetadataValue {
    pub fn value_type(&self) -> GgufMetadataValueType {
        match self {
            MetadataValue::Uint8(_) => GgufMetadataValueType::Uint8,
            MetadataValue::Int8(_) => GgufMetadataValueType::Int8,
            MetadataValue::Uint16(_) => GgufMetadataValueType::Uint16,
            MetadataValue::Int16(_) => GgufMetadataValueType::Int16,
            MetadataValue::Uint32(_) => GgufMetadataValueType::Uint32,
            MetadataValue::Int32(_) => GgufMetadataValueType::Int32,
            MetadataValue::Float32(_) => GgufMetadataValueType::Float32,
            MetadataValue::Bool(_) => GgufMetadataValueType::Bool,
            MetadataValue::String(_) => GgufMetadataValueType::String,
            MetadataValue::Array(_) => GgufMetadataValueType::Array,
            MetadataValue::Uint64(_) => GgufMetadataValueType::Uint64,
            MetadataValue::Int64(_) => GgufMetadataValueType::Int64,
            MetadataValue::Float64(_) => GgufMetadataValueType::Float64,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&MetadataArray> {
        match self {
            MetadataValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Any unsigned or non-negative signed integer widened to u64
    pub fn to_u64(&self) -> Option<u64> {
        match *self {
            MetadataValue::Uint8(v) => Some(v.into()),
            MetadataValue::Uint16(v) => Some(v.into()),
            MetadataValue::Uint32(v) => Some(v.into()),
            MetadataValue::Uint64(v) => Some(v),
            MetadataValue::Int8(v) => u64::try_from(v).ok(),
            MetadataValue::Int16(v) => u64::try_from(v).ok(),
            MetadataValue::Int32(v) => u64::try_from(v).ok(),
            MetadataValue::Int64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }
}

/// Homogeneous array value; the element type is kept even when empty
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataArray {
    pub element_type: GgufMetadataValueType,
    pub values: Vec<MetadataValue>,
}

impl MetadataArray {
    pub fn new(element_type: GgufMetadataValueType, values: Vec<MetadataValue>) -> Self {
        Self {
            element_type,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One key/value pair of the metadata table, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    pub key: String,
    pub value: MetadataValue,
}

impl MetadataEntry {
    pub fn new(key: impl Into<String>, value: MetadataValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Tensor descriptor from the tensor-info table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    pub name: String,
    pub dims: Vec<u64>,
    /// Raw GGML type id, carried through a rebuild unchanged
    pub dtype: u32,
    /// Offset relative to the start of the tensor-data region
    pub offset: u64,
}

impl TensorInfo {
    pub fn n_dims(&self) -> usize {
        self.dims.len()
    }

    /// The dtype as a known GGML type, `None` for ids this crate has no table entry for
    pub fn ggml_type(&self) -> Option<GgmlType> {
        GgmlType::try_from(self.dtype).ok()
    }

    /// `None` if the product of the dims overflows
    pub fn num_elements(&self) -> Option<u64> {
        self.dims.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d))
    }

    /// Payload size implied by shape and dtype
    ///
    /// `None` for an unknown dtype or a shape whose size overflows `u64`.
    pub fn data_size(&self) -> Option<u64> {
        let ty = self.ggml_type()?;
        let blocks = self.num_elements()?.div_ceil(ty.block_size() as u64);
        blocks.checked_mul(ty.type_size() as u64)
    }
}

/// Parsed GGUF header. Immutable once built by the reader.
#[derive(Debug, Clone)]
pub struct GgufData {
    pub header: GgufHeader,
    pub endian: Endian,
    pub alignment: usize,
    pub metadata: Vec<MetadataEntry>,
    pub tensors: Vec<TensorInfo>,
    /// Bytes from the magic through the last tensor descriptor
    pub header_range: Range<usize>,
    /// Absolute offset where the tensor-data region starts
    pub data_offset: usize,
    pub(crate) metadata_index: HashMap<String, usize>,
    pub(crate) tensor_index: HashMap<String, usize>,
}

impl GgufData {
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata_index
            .get(key)
            .map(|&i| &self.metadata[i].value)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        match self.get(key)? {
            MetadataValue::Uint32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            MetadataValue::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        match self.get(key)? {
            MetadataValue::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            MetadataValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_array(&self, key: &str) -> Option<&MetadataArray> {
        self.get(key)?.as_array()
    }

    pub fn get_tensor(&self, name: &str) -> Option<&TensorInfo> {
        self.tensor_index.get(name).map(|&i| &self.tensors[i])
    }

    /// Size of the tensor-data region in a buffer of `file_len` bytes
    pub fn data_len(&self, file_len: usize) -> usize {
        file_len.saturating_sub(self.data_offset)
    }
}

/// Raw `general.alignment` value; 0 when it is not a non-negative integer
pub(crate) fn declared_alignment(metadata: &[MetadataEntry]) -> Option<u64> {
    metadata
        .iter()
        .find(|e| e.key == GGUF_ALIGNMENT_KEY)
        .map(|e| e.value.to_u64().unwrap_or(0))
}

/// Alignment declared by a metadata table, or the format default
pub(crate) fn alignment_or_default(metadata: &[MetadataEntry]) -> Result<usize, GgufError> {
    match declared_alignment(metadata) {
        None => Ok(GGUF_DEFAULT_ALIGNMENT),
        Some(a) if a > 0 && a.is_power_of_two() => usize::try_from(a).map_err(|_| {
            GgufError::MalformedEntry(format!("alignment {a} does not fit in memory"))
        }),
        Some(a) => Err(GgufError::MalformedEntry(format!(
            "alignment must be a non-zero power of two, got {a}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_data_size() {
        let info = TensorInfo {
            name: "blk.0.attn_q.weight".into(),
            dims: vec![4096, 4096],
            dtype: GgmlType::Q4_0 as u32,
            offset: 0,
        };
        assert_eq!(info.ggml_type(), Some(GgmlType::Q4_0));
        assert_eq!(info.num_elements(), Some(4096 * 4096));
        assert_eq!(info.data_size(), Some(4096 * 4096 / 32 * 18));
    }

    #[test]
    fn test_scalar_tensor_has_one_element() {
        let info = TensorInfo {
            name: "scale".into(),
            dims: vec![],
            dtype: GgmlType::F32 as u32,
            offset: 0,
        };
        assert_eq!(info.num_elements(), Some(1));
        assert_eq!(info.data_size(), Some(4));
    }

    #[test]
    fn test_oversized_shape_has_no_size() {
        let info = TensorInfo {
            name: "huge".into(),
            dims: vec![u64::MAX, 2],
            dtype: GgmlType::F32 as u32,
            offset: 0,
        };
        assert_eq!(info.num_elements(), None);
        assert_eq!(info.data_size(), None);

        // element count fits, byte count does not
        let info = TensorInfo {
            dims: vec![u64::MAX / 2],
            ..info
        };
        assert_eq!(info.num_elements(), Some(u64::MAX / 2));
        assert_eq!(info.data_size(), None);
    }

    #[test]
    fn test_unknown_dtype_has_no_size() {
        let info = TensorInfo {
            name: "w".into(),
            dims: vec![256],
            dtype: 1000,
            offset: 0,
        };
        assert_eq!(info.ggml_type(), None);
        assert_eq!(info.num_elements(), Some(256));
        assert_eq!(info.data_size(), None);
    }

    #[test]
    fn test_alignment_lookup() {
        let mut metadata = vec![MetadataEntry::new("general.name", MetadataValue::String("m".into()))];
        assert_eq!(alignment_or_default(&metadata).unwrap(), 32);

        metadata.push(MetadataEntry::new("general.alignment", MetadataValue::Uint32(64)));
        assert_eq!(alignment_or_default(&metadata).unwrap(), 64);

        metadata[1].value = MetadataValue::Uint32(48);
        assert!(alignment_or_default(&metadata).is_err());

        metadata[1].value = MetadataValue::String("64".into());
        assert!(alignment_or_default(&metadata).is_err());
    }
}
