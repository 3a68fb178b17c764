//! GGUF header parser over an in-memory buffer

use std::collections::HashMap;

use super::constants::{GGUF_MAGIC, GGUF_VERSION_V2, GGUF_VERSION_V3};
use super::error::GgufError;
use super::primitives::{align_offset, ByteReader, Endian};
use super::types::{alignment_or_default, GgufData, GgufHeader, MetadataEntry, TensorInfo};

/// Smallest possible encoded metadata entry: empty key, tag, one-byte payload
const MIN_METADATA_ENTRY_SIZE: usize = 8 + 4 + 1;
/// Smallest possible tensor descriptor: empty name, rank 0, dtype, offset
const MIN_TENSOR_INFO_SIZE: usize = 8 + 4 + 4 + 8;

/// GGUF header reader
///
/// Construction validates the magic and version and settles the byte order;
/// [`GgufReader::read`] decodes the metadata and tensor-info tables.
pub struct GgufReader<'a> {
    reader: ByteReader<'a>,
    version: u32,
}

impl<'a> GgufReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, GgufError> {
        let mut reader = ByteReader::new(bytes, Endian::Little);

        let magic: [u8; 4] = reader
            .take(4)?
            .try_into()
            .map_err(|_| GgufError::MalformedEntry("magic".into()))?;
        if magic != GGUF_MAGIC {
            return Err(GgufError::BadMagic(magic));
        }

        // A little-endian read of a big-endian version leaves the low half zero
        let raw = reader.read_u32()?;
        let (endian, version) = if raw & 0xFFFF != 0 {
            (Endian::Little, raw)
        } else {
            (Endian::Big, raw.swap_bytes())
        };
        if version != GGUF_VERSION_V2 && version != GGUF_VERSION_V3 {
            return Err(GgufError::UnsupportedVersion(version));
        }
        reader.set_endian(endian);

        Ok(Self { reader, version })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn endian(&self) -> Endian {
        self.reader.endian()
    }

    /// Decode both tables and locate the start of the tensor-data region
    pub fn read(mut self) -> Result<GgufData, GgufError> {
        let tensor_count = self.reader.read_u64()?;
        let metadata_kv_count = self.reader.read_u64()?;

        let header = GgufHeader {
            version: self.version,
            tensor_count,
            metadata_kv_count,
        };

        let mut metadata =
            Vec::with_capacity(self.capacity_hint(metadata_kv_count, MIN_METADATA_ENTRY_SIZE));
        let mut metadata_index = HashMap::new();
        for _ in 0..metadata_kv_count {
            let offset = self.reader.position();
            let entry = MetadataEntry::decode(&mut self.reader)?;
            if metadata_index.insert(entry.key.clone(), metadata.len()).is_some() {
                return Err(GgufError::MalformedEntry(format!(
                    "duplicate metadata key {:?} at offset {offset}",
                    entry.key
                )));
            }
            metadata.push(entry);
        }

        let mut tensors = Vec::with_capacity(self.capacity_hint(tensor_count, MIN_TENSOR_INFO_SIZE));
        let mut tensor_index = HashMap::new();
        for _ in 0..tensor_count {
            let offset = self.reader.position();
            let info = self.read_tensor_info()?;
            if tensor_index.insert(info.name.clone(), tensors.len()).is_some() {
                return Err(GgufError::MalformedEntry(format!(
                    "duplicate tensor name {:?} at offset {offset}",
                    info.name
                )));
            }
            tensors.push(info);
        }

        let header_end = self.reader.position();
        let alignment = alignment_or_default(&metadata)?;
        let data_offset = align_offset(header_end, alignment);
        self.skip_padding(data_offset - header_end)?;

        tracing::debug!(
            version = self.version,
            endian = ?self.reader.endian(),
            metadata = metadata.len(),
            tensors = tensors.len(),
            header_end,
            data_offset,
            "parsed GGUF header"
        );

        Ok(GgufData {
            header,
            endian: self.reader.endian(),
            alignment,
            metadata,
            tensors,
            header_range: 0..header_end,
            data_offset,
            metadata_index,
            tensor_index,
        })
    }

    fn capacity_hint(&self, count: u64, min_size: usize) -> usize {
        let max = self.reader.remaining() / min_size;
        usize::try_from(count).map_or(max, |n| n.min(max))
    }

    fn read_tensor_info(&mut self) -> Result<TensorInfo, GgufError> {
        let name = self.reader.read_string()?;

        let n_dims = self.reader.read_u32()?;
        let mut dims = Vec::with_capacity((n_dims as usize).min(self.reader.remaining() / 8));
        for _ in 0..n_dims {
            dims.push(self.reader.read_u64()?);
        }

        let dtype = self.reader.read_u32()?;
        let offset = self.reader.read_u64()?;

        Ok(TensorInfo {
            name,
            dims,
            dtype,
            offset,
        })
    }

    /// Alignment padding must be present and zero-filled
    fn skip_padding(&mut self, len: usize) -> Result<(), GgufError> {
        let start = self.reader.position();
        let padding = self.reader.take(len)?;
        if let Some(i) = padding.iter().position(|&b| b != 0) {
            return Err(GgufError::MalformedEntry(format!(
                "non-zero alignment padding at offset {}",
                start + i
            )));
        }
        Ok(())
    }
}

/// Parse a complete GGUF header from `bytes`
pub fn parse(bytes: &[u8]) -> Result<GgufData, GgufError> {
    GgufReader::new(bytes)?.read()
}
