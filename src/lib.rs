//! gguf-edit: edit GGUF metadata and drop tensors without rewriting tensor data

pub mod config;
pub mod display;
pub mod gguf;

pub use config::{ConfigError, EditorConfig};
pub use gguf::{EditRequest, GgufData, GgufError, GgufFile};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("GGUF error: {0}")]
    Gguf(#[from] gguf::GgufError),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid edit request: {0}")]
    Request(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
