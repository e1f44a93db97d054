use crate::{ContentStore, Identifier, MetadataStore, Resource, Result, StoredFile};
use std::sync::Arc;

#[derive(Clone)]
pub struct ReadResourceOperation {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
}

#[derive(Debug, Clone)]
pub struct ReadResourceOperationRequest {
    pub id: Identifier,
    pub include_files: bool,
}

#[derive(Debug, Clone)]
pub struct ReadResourceOperationResult {
    pub resource: Resource,
    /// Files uploaded for the resource, oldest first. Empty unless
    /// `include_files` was set.
    pub files: Vec<StoredFile>,
}

#[derive(Debug, Clone)]
pub enum ReadResourceOperationOutcome {
    Found(ReadResourceOperationResult),
    NotFound,
}

impl ReadResourceOperation {
    pub fn new(metadata: Arc<dyn MetadataStore>, content: Arc<dyn ContentStore>) -> Self {
        Self { metadata, content }
    }

    pub async fn run(
        &self,
        request: ReadResourceOperationRequest,
    ) -> Result<ReadResourceOperationOutcome> {
        let ReadResourceOperationRequest { id, include_files } = request;

        let Some(resource) = self.metadata.find_by(&id)? else {
            return Ok(ReadResourceOperationOutcome::NotFound);
        };

        let files = if include_files {
            self.content.find_all_for(&id).await?
        } else {
            Vec::new()
        };

        Ok(ReadResourceOperationOutcome::Found(
            ReadResourceOperationResult { resource, files },
        ))
    }
}
