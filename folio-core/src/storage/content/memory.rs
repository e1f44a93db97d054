use super::{AsyncSink, ContentStore, Digests, StoredFile, compute_digests, stream_with_digest};
use crate::error::{FolioError, Result};
use crate::identifier::{Identifier, IdentifierMinter};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::io::AsyncRead;

#[async_trait]
impl AsyncSink for BytesMut {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.extend_from_slice(chunk);
        Ok(())
    }
}

struct StoredEntry {
    file: StoredFile,
    bytes: Bytes,
}

/// Content store holding file bytes in process memory.
pub struct MemoryContentStore {
    files: RwLock<HashMap<Identifier, StoredEntry>>,
    minter: IdentifierMinter,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            minter: IdentifierMinter::new(),
        }
    }

    fn poisoned() -> FolioError {
        FolioError::Internal("content store lock poisoned".to_string())
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn upload(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        original_filename: &str,
        resource_id: &Identifier,
    ) -> Result<StoredFile> {
        let mut buffer = BytesMut::new();
        let digest = stream_with_digest(reader, &mut buffer).await?;

        let file = StoredFile {
            id: self.minter.mint()?,
            resource_id: resource_id.clone(),
            original_filename: original_filename.to_string(),
            size: digest.len(),
            digests: digest.finalize(),
            created_at: Utc::now(),
        };

        let mut files = self.files.write().map_err(|_| Self::poisoned())?;
        files.insert(
            file.id.clone(),
            StoredEntry {
                file: file.clone(),
                bytes: buffer.freeze(),
            },
        );

        tracing::debug!(
            "Stored file {} ({} bytes) for resource {}",
            file.id,
            file.size,
            resource_id
        );
        Ok(file)
    }

    async fn find_by(&self, id: &Identifier) -> Result<Option<StoredFile>> {
        let files = self.files.read().map_err(|_| Self::poisoned())?;
        Ok(files.get(id).map(|entry| entry.file.clone()))
    }

    async fn read(&self, id: &Identifier) -> Result<Option<Bytes>> {
        let files = self.files.read().map_err(|_| Self::poisoned())?;
        Ok(files.get(id).map(|entry| entry.bytes.clone()))
    }

    async fn delete(&self, id: &Identifier) -> Result<bool> {
        let mut files = self.files.write().map_err(|_| Self::poisoned())?;
        Ok(files.remove(id).is_some())
    }

    async fn find_all_for(&self, resource_id: &Identifier) -> Result<Vec<StoredFile>> {
        let files = self.files.read().map_err(|_| Self::poisoned())?;
        let mut owned: Vec<StoredFile> = files
            .values()
            .filter(|entry| &entry.file.resource_id == resource_id)
            .map(|entry| entry.file.clone())
            .collect();
        owned.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(owned)
    }

    async fn measure(&self, id: &Identifier) -> Result<Option<(u64, Digests)>> {
        let bytes = {
            let files = self.files.read().map_err(|_| Self::poisoned())?;
            match files.get(id) {
                Some(entry) => entry.bytes.clone(),
                None => return Ok(None),
            }
        };
        Ok(Some((bytes.len() as u64, compute_digests(&bytes))))
    }
}
