use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 3] = [Self::Md5, Self::Sha256, Self::Sha512];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    /// Accepts `md5`, `sha256`, `sha-256` and the like, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(format!("unsupported digest algorithm: {}", s)),
        }
    }
}

/// Hex digests keyed by algorithm.
pub type Digests = BTreeMap<DigestAlgorithm, String>;

/// Feeds the same bytes to every supported hasher.
#[derive(Clone, Default)]
pub struct MultiDigest {
    md5: Md5,
    sha256: Sha256,
    sha512: Sha512,
    len: u64,
}

impl MultiDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.md5.update(data);
        self.sha256.update(data);
        self.sha512.update(data);
        self.len += data.len() as u64;
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finalize(self) -> Digests {
        let mut digests = Digests::new();
        digests.insert(DigestAlgorithm::Md5, hex::encode(self.md5.finalize()));
        digests.insert(DigestAlgorithm::Sha256, hex::encode(self.sha256.finalize()));
        digests.insert(DigestAlgorithm::Sha512, hex::encode(self.sha512.finalize()));
        digests
    }
}

/// One-shot digest of an in-memory buffer.
pub fn compute_digests(data: &[u8]) -> Digests {
    let mut digest = MultiDigest::new();
    digest.update(data);
    digest.finalize()
}
