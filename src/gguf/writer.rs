//! Header rebuilding and output assembly
//!
//! An edited file is the rebuilt header followed by the original tensor-data
//! region, byte for byte. Tensor payloads are never decoded or moved:
//! - metadata entries are re-encoded in their original order and types
//! - surviving tensor descriptors keep their original relative offsets
//! - removed tensors disappear from the table but their bytes stay in the
//!   data region, unreferenced

use std::io::Write;
use std::ops::Range;

use super::edit::{EditRequest, EditedHeader};
use super::error::GgufError;
use super::primitives::{ByteWriter, Endian};
use super::types::{alignment_or_default, GgufData, MetadataEntry, TensorInfo};

/// Magic plus version, copied verbatim from the source header
const PREAMBLE_LEN: usize = 8;

/// Build a new header for `metadata` and `tensors`
///
/// `header_range` is the byte range of the original header inside
/// `original`; its magic and version are reused unchanged. The result is
/// zero-padded to the alignment the metadata declares, so it can be placed
/// directly in front of the original tensor-data region.
pub fn build_header(
    original: &[u8],
    header_range: Range<usize>,
    metadata: &[MetadataEntry],
    tensors: &[TensorInfo],
    endian: Endian,
) -> Result<Vec<u8>, GgufError> {
    if header_range.end > original.len() {
        return Err(GgufError::TruncatedInput {
            offset: original.len(),
            needed: header_range.end - original.len(),
            available: 0,
        });
    }
    if header_range.start != 0 || header_range.len() < PREAMBLE_LEN {
        return Err(GgufError::MalformedEntry(format!(
            "header range {header_range:?} does not cover the magic and version"
        )));
    }
    let alignment = alignment_or_default(metadata)?;

    let mut writer = ByteWriter::with_capacity(endian, header_range.len() + alignment);
    writer.write_bytes(&original[..PREAMBLE_LEN]);
    writer.write_u64(tensors.len() as u64);
    writer.write_u64(metadata.len() as u64);

    for entry in metadata {
        entry.encode(&mut writer)?;
    }
    for info in tensors {
        write_tensor_info(&mut writer, info);
    }

    let table_end = writer.len();
    writer.pad_to(alignment);

    tracing::debug!(
        metadata = metadata.len(),
        tensors = tensors.len(),
        table_end,
        header_len = writer.len(),
        "built GGUF header"
    );

    Ok(writer.into_inner())
}

fn write_tensor_info(writer: &mut ByteWriter, info: &TensorInfo) {
    writer.write_string(&info.name);
    writer.write_u32(info.dims.len() as u32);
    for dim in &info.dims {
        writer.write_u64(*dim);
    }
    writer.write_u32(info.dtype);
    writer.write_u64(info.offset);
}

/// The tensor-data region of `original`, starting at `data_offset`
pub fn tensor_data_region(original: &[u8], data_offset: usize) -> Result<&[u8], GgufError> {
    original
        .get(data_offset..)
        .ok_or_else(|| GgufError::TruncatedInput {
            offset: original.len(),
            needed: data_offset - original.len(),
            available: 0,
        })
}

/// Stream `header` followed by the original tensor-data region into `writer`
///
/// Returns the number of bytes written.
pub fn write_assembled<W: Write>(
    writer: &mut W,
    header: &[u8],
    original: &[u8],
    data_offset: usize,
) -> Result<u64, GgufError> {
    let data = tensor_data_region(original, data_offset)?;
    writer.write_all(header)?;
    writer.write_all(data)?;
    Ok((header.len() + data.len()) as u64)
}

/// Concatenate `header` with `original[data_offset..]`
pub fn assemble(header: &[u8], original: &[u8], data_offset: usize) -> Result<Vec<u8>, GgufError> {
    let data_len = tensor_data_region(original, data_offset)?.len();
    let mut out = Vec::with_capacity(header.len() + data_len);
    write_assembled(&mut out, header, original, data_offset)?;
    Ok(out)
}

impl GgufData {
    /// Header for the tables in `edited`, in this file's byte order
    pub fn build_header(&self, original: &[u8], edited: &EditedHeader) -> Result<Vec<u8>, GgufError> {
        build_header(
            original,
            self.header_range.clone(),
            &edited.metadata,
            &edited.tensors,
            self.endian,
        )
    }

    /// Apply `request` and return the rebuilt header
    pub fn rebuild_header(&self, original: &[u8], request: &EditRequest) -> Result<Vec<u8>, GgufError> {
        let edited = request.apply(self)?;
        self.build_header(original, &edited)
    }

    /// Apply `request` and return the complete edited file
    pub fn rebuild(&self, original: &[u8], request: &EditRequest) -> Result<Vec<u8>, GgufError> {
        let header = self.rebuild_header(original, request)?;
        assemble(&header, original, self.data_offset)
    }
}
