//! Flattened rows for presenting a parsed header to a user

use std::collections::BTreeSet;
use std::fmt::{self, Write};

use crate::config::EditorConfig;
use crate::gguf::{GgufData, GgufMetadataValueType, MetadataValue};

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    pub key: String,
    pub value_type: GgufMetadataValueType,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TensorRow {
    pub name: String,
    pub shape: String,
    pub dtype: String,
    pub offset: u64,
}

/// Render a value for display, eliding array elements past `max_elements`
pub fn format_value(value: &MetadataValue, max_elements: usize) -> String {
    let mut out = String::new();
    if write_value(&mut out, value, max_elements).is_err() {
        out.clear();
    }
    out
}

fn write_value<W: Write>(out: &mut W, value: &MetadataValue, max_elements: usize) -> fmt::Result {
    match value {
        MetadataValue::Uint8(v) => write!(out, "{v}"),
        MetadataValue::Int8(v) => write!(out, "{v}"),
        MetadataValue::Uint16(v) => write!(out, "{v}"),
        MetadataValue::Int16(v) => write!(out, "{v}"),
        MetadataValue::Uint32(v) => write!(out, "{v}"),
        MetadataValue::Int32(v) => write!(out, "{v}"),
        MetadataValue::Uint64(v) => write!(out, "{v}"),
        MetadataValue::Int64(v) => write!(out, "{v}"),
        MetadataValue::Float32(v) => write!(out, "{v}"),
        MetadataValue::Float64(v) => write!(out, "{v}"),
        MetadataValue::Bool(v) => write!(out, "{v}"),
        MetadataValue::String(v) => out.write_str(v),
        MetadataValue::Array(arr) => {
            out.write_char('[')?;
            for (i, item) in arr.values.iter().take(max_elements).enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_value(out, item, max_elements)?;
            }
            if arr.len() > max_elements {
                out.write_str(if max_elements == 0 { "..." } else { ", ..." })?;
            }
            out.write_char(']')
        }
    }
}

pub fn metadata_rows(data: &GgufData, config: &EditorConfig) -> Vec<MetadataRow> {
    data.metadata
        .iter()
        .map(|entry| MetadataRow {
            key: entry.key.clone(),
            value_type: entry.value.value_type(),
            value: format_value(&entry.value, config.max_array_elements),
        })
        .collect()
}

/// Tensor rows in table order, skipping names in `removed`
pub fn tensor_rows(data: &GgufData, removed: &BTreeSet<String>) -> Vec<TensorRow> {
    data.tensors
        .iter()
        .filter(|t| !removed.contains(&t.name))
        .map(|t| TensorRow {
            name: t.name.clone(),
            shape: format!(
                "[{}]",
                t.dims.iter().map(u64::to_string).collect::<Vec<_>>().join(", ")
            ),
            dtype: t
                .ggml_type()
                .map_or_else(|| t.dtype.to_string(), |ty| ty.name().to_string()),
            offset: t.offset,
        })
        .collect()
}
