use crate::{MetadataStore, Resource, Result, SchemaRegistry, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct CreateResourceOperation {
    metadata: Arc<dyn MetadataStore>,
    schemas: Arc<SchemaRegistry>,
}

#[derive(Debug, Clone)]
pub struct CreateResourceOperationRequest {
    pub kind: String,
    pub attributes: Vec<(String, Vec<Value>)>,
}

#[derive(Debug, Clone)]
pub struct CreateResourceOperationResult {
    pub resource: Resource,
}

impl CreateResourceOperation {
    pub fn new(metadata: Arc<dyn MetadataStore>, schemas: Arc<SchemaRegistry>) -> Self {
        Self { metadata, schemas }
    }

    pub async fn run(
        &self,
        request: CreateResourceOperationRequest,
    ) -> Result<CreateResourceOperationResult> {
        let CreateResourceOperationRequest { kind, attributes } = request;

        let draft = self.schemas.schema(&kind)?.build(attributes)?;
        let resource = self.metadata.save(draft)?;

        tracing::debug!(
            "Created {} {}",
            resource.kind(),
            resource.persisted_id()?
        );
        Ok(CreateResourceOperationResult { resource })
    }
}
