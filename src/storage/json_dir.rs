//! File-backed document sink.
//!
//! ```text
//! <directory>/
//!   raw_fields_article.json
//!   summarized_fields_article.json
//!   gap_analysis.json
//!   comparison_section.json
//! ```
//!
//! Each file holds one pretty-printed JSON array.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use super::{Collection, DocumentSink, StorageError};

/// Writes each collection to `<directory>/<collection>.json`
#[derive(Debug)]
pub struct JsonDirSink {
    directory: PathBuf,
    // Serializes read-modify-write cycles on the collection files
    write_lock: Mutex<()>,
}

impl JsonDirSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file backing `collection`
    pub fn path_for(&self, collection: Collection) -> PathBuf {
        self.directory.join(format!("{}.json", collection.name()))
    }

    /// Read the documents stored for `collection`
    pub async fn read(&self, collection: Collection) -> Result<Vec<Value>, StorageError> {
        let path = self.path_for(collection);
        match fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, collection: Collection, documents: &[Value]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.directory).await?;
        let content = serde_json::to_string_pretty(documents)?;
        fs::write(self.path_for(collection), content).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentSink for JsonDirSink {
    async fn clear(&self, collection: Collection) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.write(collection, &[]).await
    }

    async fn insert_many(
        &self,
        collection: Collection,
        documents: Vec<Value>,
    ) -> Result<usize, StorageError> {
        let _guard = self.write_lock.lock().await;
        let count = documents.len();
        let mut stored = self.read(collection).await?;
        stored.extend(documents);
        self.write(collection, &stored).await?;

        tracing::debug!(
            "Wrote {} documents to {}",
            count,
            self.path_for(collection).display()
        );
        Ok(count)
    }
}
