use crate::identifier::Identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FolioError>;

#[derive(Debug, Error)]
pub enum FolioError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Identifier {0} belongs to a deleted resource")]
    Deleted(Identifier),

    #[error("Resource not found: {0}")]
    ResourceNotFound(Identifier),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FolioError {
    /// True when the medium itself failed, as opposed to the caller asking
    /// for something invalid or absent.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Sqlite(_) | Self::Serialization(_) | Self::Internal(_)
        )
    }
}

impl From<ValidationErrors> for FolioError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Per-attribute validation messages collected before a save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    messages: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.messages
            .entry(attribute.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &BTreeMap<String, Vec<String>> {
        &self.messages
    }

    pub fn for_attribute(&self, attribute: &str) -> &[String] {
        self.messages
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (attribute, messages) in other.messages {
            self.messages.entry(attribute).or_default().extend(messages);
        }
    }

    pub fn into_result(self) -> std::result::Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (attribute, messages) in &self.messages {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{} {}", attribute, message)?;
                first = false;
            }
        }
        Ok(())
    }
}
