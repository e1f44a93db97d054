//! Resources: kind-tagged records of named, multi-valued attributes.

pub mod schema;

use crate::error::{FolioError, Result};
use crate::identifier::Identifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use schema::{
    AttributeSpec, Cardinality, ResourceSchema, SchemaRegistry, UnknownAttributes, ValueType,
};

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Id(Identifier),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Integer(_) => ValueType::Integer,
            Self::Float(_) => ValueType::Float,
            Self::Boolean(_) => ValueType::Boolean,
            Self::DateTime(_) => ValueType::DateTime,
            Self::Id(_) => ValueType::Id,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<&Identifier> {
        match self {
            Self::Id(id) => Some(id),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<Identifier> for Value {
    fn from(value: Identifier) -> Self {
        Self::Id(value)
    }
}

/// A stored or not-yet-stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    kind: String,
    id: Option<Identifier>,
    attributes: BTreeMap<String, Vec<Value>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Resource {
    /// An empty, unsaved resource. Prefer [`ResourceSchema::build`], which
    /// validates attribute names and types up front.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            attributes: BTreeMap::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// An unsaved resource that will be stored under a caller-chosen id.
    pub fn with_id(kind: impl Into<String>, id: Identifier) -> Self {
        let mut resource = Self::new(kind);
        resource.id = Some(id);
        resource
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> Option<&Identifier> {
        self.id.as_ref()
    }

    /// The identifier, or an error for a resource that was never saved.
    pub fn persisted_id(&self) -> Result<&Identifier> {
        self.id.as_ref().ok_or_else(|| {
            FolioError::InvalidRequest(format!("{} resource has not been saved", self.kind))
        })
    }

    pub fn is_new(&self) -> bool {
        self.created_at.is_none()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn attributes(&self) -> &BTreeMap<String, Vec<Value>> {
        &self.attributes
    }

    /// Values of an attribute, empty when unset.
    pub fn get(&self, attribute: &str) -> &[Value] {
        self.attributes
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn first(&self, attribute: &str) -> Option<&Value> {
        self.get(attribute).first()
    }

    /// Identifier values held by an attribute, in stored order.
    pub fn ids(&self, attribute: &str) -> Vec<Identifier> {
        self.get(attribute)
            .iter()
            .filter_map(Value::as_id)
            .cloned()
            .collect()
    }

    /// Replace every value of an attribute.
    pub fn set<I, V>(&mut self, attribute: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.attributes.insert(
            attribute.into(),
            values.into_iter().map(Into::into).collect(),
        );
    }

    pub fn push(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        self.attributes
            .entry(attribute.into())
            .or_default()
            .push(value.into());
    }

    pub fn remove(&mut self, attribute: &str) -> Vec<Value> {
        self.attributes.remove(attribute).unwrap_or_default()
    }

    /// Every (attribute, target) pair this resource points at.
    pub fn references(&self) -> impl Iterator<Item = (&str, &Identifier)> {
        self.attributes.iter().flat_map(|(name, values)| {
            values
                .iter()
                .filter_map(Value::as_id)
                .map(move |id| (name.as_str(), id))
        })
    }

    pub fn refers_to(&self, attribute: &str, target: &Identifier) -> bool {
        self.get(attribute).iter().any(|v| v.as_id() == Some(target))
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut BTreeMap<String, Vec<Value>> {
        &mut self.attributes
    }

    /// Stamp identity and timestamps as a store does on save.
    pub(crate) fn mark_persisted(
        &mut self,
        id: Identifier,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) {
        self.id = Some(id);
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
    }
}
