//! Binary content storage for files that belong to resources.

#[cfg(test)]
pub(crate) mod conformance;
pub mod digest;
pub mod disk;
pub mod memory;

use crate::error::Result;
use crate::identifier::Identifier;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::io::{AsyncRead, AsyncReadExt};

pub use digest::{DigestAlgorithm, Digests, MultiDigest, compute_digests};
pub use disk::DiskContentStore;
pub use memory::MemoryContentStore;

/// Read size used while streaming uploads and checksums.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Descriptor of an uploaded file. The bytes themselves stay in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: Identifier,
    pub resource_id: Identifier,
    pub original_filename: String,
    pub size: u64,
    pub digests: Digests,
    pub created_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn digest(&self, algorithm: DigestAlgorithm) -> Option<&str> {
        self.digests.get(&algorithm).map(String::as_str)
    }
}

/// Caller-supplied expectations for [`ContentStore::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileExpectation {
    pub size: Option<u64>,
    /// Algorithm name (`md5`, `sha256`, ...) to expected hex digest.
    #[serde(default)]
    pub digests: BTreeMap<String, String>,
}

impl FileExpectation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn digest(mut self, algorithm: impl Into<String>, hex: impl Into<String>) -> Self {
        self.digests.insert(algorithm.into(), hex.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_none() && self.digests.is_empty()
    }

    /// Compare against freshly computed size and digests. Any mismatch or
    /// unsupported algorithm name is a plain `false`, and so is an empty
    /// expectation, which asserts nothing.
    pub fn matches(&self, size: u64, digests: &Digests) -> bool {
        if self.is_empty() {
            return false;
        }

        if self.size.is_some_and(|expected| expected != size) {
            return false;
        }

        self.digests.iter().all(|(name, expected)| {
            let Ok(algorithm) = name.parse::<DigestAlgorithm>() else {
                return false;
            };
            digests
                .get(&algorithm)
                .is_some_and(|actual| actual.eq_ignore_ascii_case(expected.trim()))
        })
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Consume `reader` to the end and persist it as a new file owned by
    /// `resource_id`. A failed upload leaves nothing findable.
    async fn upload(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        original_filename: &str,
        resource_id: &Identifier,
    ) -> Result<StoredFile>;

    async fn find_by(&self, id: &Identifier) -> Result<Option<StoredFile>>;

    async fn read(&self, id: &Identifier) -> Result<Option<Bytes>>;

    /// Returns whether anything was removed.
    async fn delete(&self, id: &Identifier) -> Result<bool>;

    /// Every file uploaded for `resource_id`, oldest first.
    async fn find_all_for(&self, resource_id: &Identifier) -> Result<Vec<StoredFile>>;

    /// Size and every digest recomputed from the stored bytes.
    async fn measure(&self, id: &Identifier) -> Result<Option<(u64, Digests)>>;

    /// Digests recomputed from the stored bytes for the requested algorithms.
    async fn checksum(
        &self,
        id: &Identifier,
        algorithms: &[DigestAlgorithm],
    ) -> Result<Option<Digests>> {
        let Some((_, digests)) = self.measure(id).await? else {
            return Ok(None);
        };
        Ok(Some(
            digests
                .into_iter()
                .filter(|(algorithm, _)| algorithms.contains(algorithm))
                .collect(),
        ))
    }

    /// Whether the stored bytes meet every expectation. A missing file or an
    /// empty expectation is reported as `false`.
    async fn verify(&self, id: &Identifier, expected: &FileExpectation) -> Result<bool> {
        match self.measure(id).await? {
            Some((size, digests)) => Ok(expected.matches(size, &digests)),
            None => {
                tracing::debug!("Verification requested for missing file {}", id);
                Ok(false)
            }
        }
    }
}

/// Drain `reader` into `sink` in fixed-size reads, hashing as it goes.
pub(crate) async fn stream_with_digest<S>(
    reader: &mut (dyn AsyncRead + Unpin + Send),
    sink: &mut S,
) -> Result<MultiDigest>
where
    S: AsyncSink,
{
    let mut digest = MultiDigest::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        digest.update(&buf[..n]);
        sink.write_chunk(&buf[..n]).await?;
    }
    Ok(digest)
}

/// Destination for streamed upload bytes.
#[async_trait]
pub(crate) trait AsyncSink: Send {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured() -> (u64, Digests) {
        let data = b"hello world";
        (data.len() as u64, compute_digests(data))
    }

    #[test]
    fn test_expectation_partial_sets() {
        let (size, digests) = measured();
        let md5 = "5eb63bbbe01eeed093cb22bb8f5acdc3";
        let sha256 = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

        assert!(FileExpectation::new().size(11).digest("md5", md5).matches(size, &digests));
        assert!(FileExpectation::new().digest("sha256", sha256).matches(size, &digests));
        assert!(
            FileExpectation::new()
                .size(11)
                .digest("md5", md5.to_uppercase())
                .digest("SHA-256", sha256)
                .matches(size, &digests)
        );
        assert!(FileExpectation::new().size(11).matches(size, &digests));
    }

    #[test]
    fn test_empty_expectation_never_matches() {
        let (size, digests) = measured();
        let empty = FileExpectation::new();
        assert!(empty.is_empty());
        assert!(!empty.matches(size, &digests));
        assert!(!empty.matches(0, &Digests::new()));

        let parsed: FileExpectation = serde_json::from_str(r#"{"size":null}"#).unwrap();
        assert!(!parsed.matches(size, &digests));
    }

    #[test]
    fn test_expectation_mismatches_are_false() {
        let (size, digests) = measured();
        let md5 = "5eb63bbbe01eeed093cb22bb8f5acdc3";

        assert!(!FileExpectation::new().size(12).digest("md5", md5).matches(size, &digests));
        assert!(
            !FileExpectation::new()
                .digest("md5", md5)
                .digest("sha256", "00")
                .matches(size, &digests)
        );
        assert!(!FileExpectation::new().digest("crc32", "abcd").matches(size, &digests));
    }
}
