//! Raw file storage backing `POST /v1/files` and its CRUD/content endpoints.
//!
//! Kept separate from [`crate::VectorStoreService`]: a file can be uploaded and fetched by content
//! without ever being attached to a vector store, and attaching it (`AttachFileRequest`) only
//! needs its decoded text, not the storage layer itself. Out of scope beyond this trait + default
//! implementation: this is the `FileStore` external collaborator, in-memory only.

use std::sync::Arc;

use dashmap::DashMap;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VectorStoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub filename: String,
    pub purpose: String,
    pub bytes: usize,
    #[serde(with = "jiff::fmt::serde::timestamp::second::required")]
    pub created_at: Timestamp,
    #[serde(skip)]
    pub content: Vec<u8>,
}

/// Collaborator storing raw uploaded file bytes. No built-in implementation ships beyond
/// [`InMemoryFileStore`]; a persistent backend would implement this trait the same way
/// `VectorStoreBackend::Persistent` stores chunk snapshots.
pub trait FileStore: Send + Sync {
    fn create(&self, filename: String, purpose: String, content: Vec<u8>) -> UploadedFile;
    fn get(&self, id: &str) -> Result<UploadedFile>;
    fn delete(&self, id: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryFileStore {
    files: DashMap<String, UploadedFile>,
}

impl InMemoryFileStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl FileStore for InMemoryFileStore {
    fn create(&self, filename: String, purpose: String, content: Vec<u8>) -> UploadedFile {
        let file = UploadedFile {
            id: format!("file_{}", uuid::Uuid::new_v4().simple()),
            filename,
            purpose,
            bytes: content.len(),
            created_at: Timestamp::now(),
            content,
        };

        self.files.insert(file.id.clone(), file.clone());
        file
    }

    fn get(&self, id: &str) -> Result<UploadedFile> {
        self.files.get(id).map(|f| f.clone()).ok_or_else(|| VectorStoreError::FileNotFound(id.to_string()))
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.files.remove(id).map(|_| ()).ok_or_else(|| VectorStoreError::FileNotFound(id.to_string()))
    }
}
