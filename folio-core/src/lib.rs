//! Folio Core - persistence for structured resources and the files attached to them
//!
//! Two independent stores behind traits:
//! - a metadata store for kind-tagged, multi-valued resources with forward and
//!   inverse references (in-memory or SQLite)
//! - a content store for uploaded bytes with MD5/SHA-256/SHA-512 verification
//!   (in-memory or local disk)

pub mod config;
pub mod error;
pub mod identifier;
pub mod operations;
pub mod references;
pub mod resource;
pub mod storage;
pub mod stores;

pub use config::{Config, ContentBackend, ContentConfig, MetadataBackend, MetadataConfig};
pub use error::{FolioError, Result, ValidationErrors};
pub use identifier::{Identifier, IdentifierMinter};
pub use references::ReferenceResolver;
pub use resource::{
    AttributeSpec, Cardinality, Resource, ResourceSchema, SchemaRegistry, UnknownAttributes,
    Value, ValueType,
};
pub use storage::{
    ContentStore, DigestAlgorithm, Digests, DiskContentStore, FileExpectation,
    InverseIndexStrategy, MemoryContentStore, MemoryMetadataStore, MetadataStore, ResourceIter,
    SqliteMetadataStore, StoredFile, compute_digests,
};
pub use stores::Stores;
