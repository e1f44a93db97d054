//! Storage adapters for Folio
//!
//! Provides resource metadata persistence and file content storage.

pub mod content;
pub mod metadata;

pub use content::{
    ContentStore, DigestAlgorithm, Digests, DiskContentStore, FileExpectation,
    MemoryContentStore, StoredFile, compute_digests,
};
pub use metadata::{
    InverseIndexStrategy, MemoryMetadataStore, MetadataStore, ResourceIter, SqliteMetadataStore,
};
