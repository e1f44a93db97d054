use crate::config::{Config, ContentBackend, MetadataBackend};
use crate::error::Result;
use crate::resource::SchemaRegistry;
use crate::storage::{
    ContentStore, DiskContentStore, MemoryContentStore, MemoryMetadataStore, MetadataStore,
    SqliteMetadataStore,
};
use std::sync::Arc;

/// The store handles an application works with, built once at startup and
/// passed to whatever needs them.
#[derive(Clone)]
pub struct Stores {
    pub metadata: Arc<dyn MetadataStore>,
    pub content: Arc<dyn ContentStore>,
    pub schemas: Arc<SchemaRegistry>,
}

impl Stores {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        content: Arc<dyn ContentStore>,
        schemas: Arc<SchemaRegistry>,
    ) -> Self {
        Self {
            metadata,
            content,
            schemas,
        }
    }

    pub fn from_config(config: &Config, schemas: SchemaRegistry) -> Result<Self> {
        let schemas = Arc::new(schemas.with_unknown_attributes(config.metadata.unknown_attributes));

        let metadata: Arc<dyn MetadataStore> = match config.metadata.backend {
            MetadataBackend::Memory => Arc::new(MemoryMetadataStore::with_strategy(
                schemas.clone(),
                config.metadata.inverse_index,
            )),
            MetadataBackend::Sqlite => Arc::new(SqliteMetadataStore::new(
                &config.metadata.path,
                schemas.clone(),
            )?),
        };

        let content: Arc<dyn ContentStore> = match config.content.backend {
            ContentBackend::Memory => Arc::new(MemoryContentStore::new()),
            ContentBackend::Disk => Arc::new(DiskContentStore::new(config.content.path.clone())?),
        };

        tracing::info!(
            "Stores ready: metadata={:?} content={:?} kinds={}",
            config.metadata.backend,
            config.content.backend,
            schemas.kinds().collect::<Vec<_>>().join(",")
        );

        Ok(Self::new(metadata, content, schemas))
    }
}
