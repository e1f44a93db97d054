use super::{
    AsyncSink, ContentStore, Digests, MultiDigest, READ_CHUNK_SIZE, StoredFile,
    stream_with_digest,
};
use crate::error::Result;
use crate::identifier::{Identifier, IdentifierMinter};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

const CONTENT_FILE: &str = "content";
const DESCRIPTOR_FILE: &str = "file.json";

#[async_trait]
impl AsyncSink for fs::File {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.write_all(chunk).await?;
        Ok(())
    }
}

/// DiskContentStore keeps each file in its own directory:
/// `files/{file_id}/content` plus a `file.json` descriptor.
///
/// Uploads are assembled under `staging/{file_id}` and moved into place with
/// a single directory rename, so readers see either the whole file or none.
pub struct DiskContentStore {
    base_path: PathBuf,
    minter: IdentifierMinter,
}

impl DiskContentStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(base_path.join("files"))?;
        std::fs::create_dir_all(base_path.join("staging"))?;
        std::fs::create_dir_all(base_path.join("trash"))?;
        tracing::info!("Opened content store at {:?}", base_path);
        Ok(Self {
            base_path,
            minter: IdentifierMinter::new(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn file_dir(&self, id: &Identifier) -> PathBuf {
        self.base_path.join("files").join(id.as_str())
    }

    fn staging_dir(&self, id: &Identifier) -> PathBuf {
        self.base_path.join("staging").join(id.as_str())
    }

    async fn stage(
        &self,
        staging: &Path,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        file: StoredFile,
    ) -> Result<StoredFile> {
        fs::create_dir_all(staging).await?;

        let mut content = fs::File::create(staging.join(CONTENT_FILE)).await?;
        let digest = stream_with_digest(reader, &mut content).await?;
        content.sync_all().await?;
        drop(content);

        let file = StoredFile {
            size: digest.len(),
            digests: digest.finalize(),
            ..file
        };

        let descriptor = serde_json::to_vec_pretty(&file)?;
        fs::write(staging.join(DESCRIPTOR_FILE), descriptor).await?;
        Ok(file)
    }

    async fn read_descriptor(&self, dir: &Path) -> Result<Option<StoredFile>> {
        match fs::read(dir.join(DESCRIPTOR_FILE)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ContentStore for DiskContentStore {
    async fn upload(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        original_filename: &str,
        resource_id: &Identifier,
    ) -> Result<StoredFile> {
        let id = self.minter.mint()?;
        let staging = self.staging_dir(&id);
        let pending = StoredFile {
            id: id.clone(),
            resource_id: resource_id.clone(),
            original_filename: original_filename.to_string(),
            size: 0,
            digests: Digests::new(),
            created_at: Utc::now(),
        };

        let staged = match self.stage(&staging, reader, pending).await {
            Ok(file) => file,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging).await {
                    tracing::warn!("Failed to clean staging for {}: {}", id, cleanup);
                }
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&staging, self.file_dir(&id)).await {
            if let Err(cleanup) = fs::remove_dir_all(&staging).await {
                tracing::warn!("Failed to clean staging for {}: {}", id, cleanup);
            }
            return Err(e.into());
        }

        tracing::debug!(
            "Stored file {} ({} bytes) for resource {}",
            id,
            staged.size,
            resource_id
        );
        Ok(staged)
    }

    async fn find_by(&self, id: &Identifier) -> Result<Option<StoredFile>> {
        self.read_descriptor(&self.file_dir(id)).await
    }

    async fn read(&self, id: &Identifier) -> Result<Option<Bytes>> {
        match fs::read(self.file_dir(id).join(CONTENT_FILE)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &Identifier) -> Result<bool> {
        let trash = self
            .base_path
            .join("trash")
            .join(format!("{}.{}", id, ulid::Ulid::new()));

        match fs::rename(self.file_dir(id), &trash).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = fs::remove_dir_all(&trash).await {
            tracing::warn!("Deleted file {} but could not purge {:?}: {}", id, trash, e);
        }
        tracing::debug!("Deleted file {}", id);
        Ok(true)
    }

    async fn find_all_for(&self, resource_id: &Identifier) -> Result<Vec<StoredFile>> {
        let mut owned = Vec::new();
        let mut entries = fs::read_dir(self.base_path.join("files")).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(file) = self.read_descriptor(&entry.path()).await? {
                if &file.resource_id == resource_id {
                    owned.push(file);
                }
            }
        }

        owned.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(owned)
    }

    async fn measure(&self, id: &Identifier) -> Result<Option<(u64, Digests)>> {
        let mut content = match fs::File::open(self.file_dir(id).join(CONTENT_FILE)).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut digest = MultiDigest::new();
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let n = content.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            digest.update(&buf[..n]);
        }

        Ok(Some((digest.len(), digest.finalize())))
    }
}
