//! Opaque identifiers shared by resources and stored files.

use crate::error::{FolioError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use ulid::{Generator, Ulid};

const MAX_IDENTIFIER_LEN: usize = 255;

/// A stable, URL-safe token naming exactly one resource or stored file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Parse an externally supplied identifier.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(FolioError::InvalidIdentifier(
                "identifier cannot be empty".to_string(),
            ));
        }

        if raw.len() > MAX_IDENTIFIER_LEN {
            return Err(FolioError::InvalidIdentifier(format!(
                "identifier longer than {} bytes",
                MAX_IDENTIFIER_LEN
            )));
        }

        if raw.chars().all(|c| c == '.') {
            return Err(FolioError::InvalidIdentifier(format!(
                "identifier '{}' is reserved",
                raw
            )));
        }

        if let Some(bad) = raw.chars().find(|c| !is_identifier_char(*c)) {
            return Err(FolioError::InvalidIdentifier(format!(
                "identifier '{}' contains invalid character {:?}",
                raw, bad
            )));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '~')
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Ulid> for Identifier {
    fn from(value: Ulid) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Identifier::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Mints ULID identifiers that are strictly increasing within one minter,
/// so concurrent callers never receive the same value.
pub struct IdentifierMinter {
    generator: Mutex<Generator>,
}

impl IdentifierMinter {
    pub fn new() -> Self {
        Self {
            generator: Mutex::new(Generator::new()),
        }
    }

    pub fn mint(&self) -> Result<Identifier> {
        let mut generator = self
            .generator
            .lock()
            .map_err(|_| FolioError::Internal("identifier generator poisoned".to_string()))?;
        let ulid = generator
            .generate()
            .map_err(|e| FolioError::Internal(format!("identifier space exhausted: {}", e)))?;
        Ok(Identifier::from(ulid))
    }
}

impl Default for IdentifierMinter {
    fn default() -> Self {
        Self::new()
    }
}
