use crate::{ContentStore, Identifier, MetadataStore, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct DeleteResourceOperation {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
}

#[derive(Debug, Clone)]
pub struct DeleteResourceOperationRequest {
    pub id: Identifier,
    /// Also remove every file uploaded for the resource.
    pub delete_files: bool,
}

#[derive(Debug, Clone)]
pub struct DeleteResourceOperationResult {
    pub id: Identifier,
    pub files_deleted: usize,
}

#[derive(Debug, Clone)]
pub enum DeleteResourceOperationOutcome {
    Deleted(DeleteResourceOperationResult),
    NotFound,
}

impl DeleteResourceOperation {
    pub fn new(metadata: Arc<dyn MetadataStore>, content: Arc<dyn ContentStore>) -> Self {
        Self { metadata, content }
    }

    /// Records that still reference the deleted resource are left untouched;
    /// their references simply stop resolving.
    pub async fn run(
        &self,
        request: DeleteResourceOperationRequest,
    ) -> Result<DeleteResourceOperationOutcome> {
        let DeleteResourceOperationRequest { id, delete_files } = request;

        if !self.metadata.delete(&id)? {
            return Ok(DeleteResourceOperationOutcome::NotFound);
        }

        let mut files_deleted = 0;
        if delete_files {
            for file in self.content.find_all_for(&id).await? {
                match self.content.delete(&file.id).await {
                    Ok(true) => files_deleted += 1,
                    Ok(false) => {}
                    Err(error) => tracing::warn!(
                        "Failed to delete file of removed resource. resource={} file={} error={}",
                        id,
                        file.id,
                        error
                    ),
                }
            }
        }

        tracing::debug!("Deleted resource {} with {} files", id, files_deleted);
        Ok(DeleteResourceOperationOutcome::Deleted(
            DeleteResourceOperationResult { id, files_deleted },
        ))
    }
}
