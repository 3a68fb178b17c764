use std::path::PathBuf;

use super::constants::GgufMetadataValueType;

#[derive(thiserror::Error, Debug)]
pub enum GgufError {
    #[error("Invalid magic: expected \"GGUF\", got {0:02X?}")]
    BadMagic([u8; 4]),
    #[error("Unsupported GGUF version: {0}")]
    UnsupportedVersion(u32),
    #[error("Truncated input at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("Malformed entry: {0}")]
    MalformedEntry(String),
    #[error("Unsupported metadata value type: {0}")]
    UnsupportedValueType(u32),
    #[error("Value {value:?} for key {key:?} does not fit {value_type}")]
    ValueOutOfRange {
        key: String,
        value: String,
        value_type: GgufMetadataValueType,
    },
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Unknown tensor: {0}")]
    UnknownTensor(String),
    #[error("Metadata key {0:?} cannot be edited")]
    ImmutableKey(String),
    #[error("Refusing to overwrite the source file: {0}")]
    SameFile(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
