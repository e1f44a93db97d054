use crate::{ContentStore, FolioError, Identifier, MetadataStore, Resource, Result, StoredFile};
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Uploads a file for a stored resource and records the new file id on it.
#[derive(Clone)]
pub struct AttachFileOperation {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
}

pub struct AttachFileOperationRequest {
    pub resource_id: Identifier,
    /// Multi-valued identifier attribute that collects the resource's files.
    pub attribute: String,
    pub original_filename: String,
    pub body: Box<dyn AsyncRead + Unpin + Send>,
}

#[derive(Debug, Clone)]
pub struct AttachFileOperationResult {
    pub resource: Resource,
    pub file: StoredFile,
}

impl AttachFileOperation {
    pub fn new(metadata: Arc<dyn MetadataStore>, content: Arc<dyn ContentStore>) -> Self {
        Self { metadata, content }
    }

    pub async fn run(
        &self,
        request: AttachFileOperationRequest,
    ) -> Result<AttachFileOperationResult> {
        let AttachFileOperationRequest {
            resource_id,
            attribute,
            original_filename,
            mut body,
        } = request;

        if self.metadata.find_by(&resource_id)?.is_none() {
            return Err(FolioError::ResourceNotFound(resource_id));
        }

        let file = self
            .content
            .upload(&mut *body, &original_filename, &resource_id)
            .await?;

        // Append against the stored copy, which may have changed during the upload
        let recorded = self.metadata.update(&resource_id, &mut |resource| {
            resource.push(attribute.clone(), file.id.clone());
            Ok(())
        });
        let resource = match recorded {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                tracing::warn!(
                    "Resource vanished during upload, removing file. resource={} file={}",
                    resource_id,
                    file.id
                );
                self.remove_orphan(&file).await;
                return Err(FolioError::ResourceNotFound(resource_id));
            }
            Err(error) => {
                tracing::warn!(
                    "Failed to record file on resource, removing upload. resource={} attribute={} file={} error={}",
                    resource_id,
                    attribute,
                    file.id,
                    error
                );
                self.remove_orphan(&file).await;
                return Err(error);
            }
        };

        tracing::debug!(
            "Attached file {} ({} bytes) to {} {}",
            file.id,
            file.size,
            resource.kind(),
            resource_id
        );
        Ok(AttachFileOperationResult { resource, file })
    }

    async fn remove_orphan(&self, file: &StoredFile) {
        if let Err(cleanup) = self.content.delete(&file.id).await {
            tracing::warn!("Failed to remove orphaned file {}: {}", file.id, cleanup);
        }
    }
}
