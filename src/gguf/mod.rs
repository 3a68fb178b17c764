//! GGUF header codec and editor

mod coerce;
mod constants;
mod edit;
mod error;
mod primitives;
mod reader;
mod types;
mod value;
mod writer;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub use coerce::{coerce_array, coerce_scalar, coerce_value};
pub use constants::{
    GgmlType, GgufMetadataValueType, GGUF_ALIGNMENT_KEY, GGUF_DEFAULT_ALIGNMENT, GGUF_MAGIC,
    GGUF_VERSION_V2, GGUF_VERSION_V3,
};
pub use edit::{EditRequest, EditedHeader};
pub use error::GgufError;
pub use primitives::{align_offset, ByteReader, ByteWriter, Endian};
pub use reader::{parse, GgufReader};
pub use types::{GgufData, GgufHeader, MetadataArray, MetadataEntry, MetadataValue, TensorInfo};
pub use value::{decode_value, encode_value, MAX_ARRAY_DEPTH};
pub use writer::{assemble, build_header, tensor_data_region, write_assembled};

/// High-level GGUF file handle over a memory-mapped source file
pub struct GgufFile {
    pub data: GgufData,
    path: PathBuf,
    mmap: memmap2::Mmap,
}

impl GgufFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GgufError> {
        let file = File::open(&path)?;
        // SAFETY: memmap2::Mmap ensures safe memory access. The file handle is kept
        // alive for the lifetime of this struct. External modifications to the file
        // could cause undefined behavior, but this is documented in memmap2.
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        let data = parse(&mmap)?;
        Ok(Self {
            data,
            path: path.as_ref().to_path_buf(),
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Length of the tensor-data region in bytes
    pub fn data_len(&self) -> usize {
        self.data.data_len(self.mmap.len())
    }

    /// Write an edited copy to `output`, which must not be the source file
    ///
    /// The output is created (or truncated) only after the new header has been
    /// built, so a failed edit leaves the file system untouched.
    pub fn save_as<P: AsRef<Path>>(&self, output: P, request: &EditRequest) -> Result<u64, GgufError> {
        let output = output.as_ref();
        if same_file(&self.path, output) {
            return Err(GgufError::SameFile(output.to_path_buf()));
        }

        let header = self.data.rebuild_header(&self.mmap, request)?;

        let mut writer = BufWriter::new(File::create(output)?);
        let written = write_assembled(&mut writer, &header, &self.mmap, self.data.data_offset)?;
        writer.flush()?;

        tracing::info!(
            output = %output.display(),
            bytes = written,
            header_len = header.len(),
            "wrote edited GGUF file"
        );
        Ok(written)
    }
}

/// Whether `a` and `b` name the same file, including through hard links
#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// `<stem>_edited.gguf` next to `input`
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    input.with_file_name(format!("{stem}_edited.gguf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/models/llama-7b.Q4_K_M.gguf")),
            PathBuf::from("/models/llama-7b.Q4_K_M_edited.gguf")
        );
        assert_eq!(
            default_output_path(Path::new("weights")),
            PathBuf::from("weights_edited.gguf")
        );
    }

    #[test]
    fn test_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.gguf");
        let b = dir.path().join("b.gguf");
        std::fs::write(&a, b"GGUF").unwrap();
        std::fs::write(&b, b"GGUF").unwrap();

        assert!(same_file(&a, &a));
        assert!(same_file(&a, &dir.path().join(".").join("a.gguf")));
        assert!(!same_file(&a, &b));
        assert!(!same_file(&a, &dir.path().join("missing.gguf")));
    }

    #[cfg(unix)]
    #[test]
    fn test_same_file_through_hard_link() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.gguf");
        let link = dir.path().join("link.gguf");
        std::fs::write(&a, b"GGUF").unwrap();
        std::fs::hard_link(&a, &link).unwrap();
        assert!(same_file(&a, &link));
    }
}
