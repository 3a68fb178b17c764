//! Edit requests: replacement metadata values and tensors to drop

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::coerce::coerce_value;
use super::constants::GGUF_ALIGNMENT_KEY;
use super::error::GgufError;
use super::types::{GgufData, MetadataEntry, TensorInfo};

/// One save operation's worth of edits, built by the caller and consumed whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRequest {
    /// Metadata key to replacement text, coerced into the entry's declared type
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Tensor names excluded from the rebuilt tensor-info table
    #[serde(default, alias = "deleted_tensors")]
    pub removed_tensors: BTreeSet<String>,
}

/// Metadata and tensor tables after an [`EditRequest`] has been applied
#[derive(Debug, Clone, PartialEq)]
pub struct EditedHeader {
    pub metadata: Vec<MetadataEntry>,
    pub tensors: Vec<TensorInfo>,
}

impl EditRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value stored under `key`
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Drop tensor `name` from the tensor-info table
    pub fn remove_tensor(mut self, name: impl Into<String>) -> Self {
        self.removed_tensors.insert(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty() && self.removed_tensors.is_empty()
    }

    /// Produce new tables from `data` without modifying it
    ///
    /// Every key must already exist in the file and every removed tensor must
    /// be present. Tensor descriptors that remain keep their original offsets.
    pub fn apply(&self, data: &GgufData) -> Result<EditedHeader, GgufError> {
        if let Some(key) = self.metadata.keys().find(|k| data.get(k).is_none()) {
            return Err(GgufError::TypeMismatch(format!(
                "metadata key {key:?} does not exist in the file"
            )));
        }
        if let Some(name) = self
            .removed_tensors
            .iter()
            .find(|n| data.get_tensor(n).is_none())
        {
            return Err(GgufError::UnknownTensor(name.clone()));
        }

        let metadata = data
            .metadata
            .iter()
            .map(|entry| match self.metadata.get(&entry.key) {
                None => Ok(entry.clone()),
                Some(text) => {
                    let value = coerce_value(&entry.key, text, &entry.value)?;
                    if entry.key == GGUF_ALIGNMENT_KEY && value != entry.value {
                        return Err(GgufError::ImmutableKey(entry.key.clone()));
                    }
                    Ok(MetadataEntry::new(entry.key.clone(), value))
                }
            })
            .collect::<Result<Vec<_>, GgufError>>()?;

        let tensors: Vec<TensorInfo> = data
            .tensors
            .iter()
            .filter(|t| !self.removed_tensors.contains(&t.name))
            .cloned()
            .collect();

        tracing::debug!(
            edited = self.metadata.len(),
            removed = self.removed_tensors.len(),
            remaining = tensors.len(),
            "applied edit request"
        );

        Ok(EditedHeader { metadata, tensors })
    }
}

impl From<&GgufData> for EditedHeader {
    fn from(data: &GgufData) -> Self {
        Self {
            metadata: data.metadata.clone(),
            tensors: data.tensors.clone(),
        }
    }
}
