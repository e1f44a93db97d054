use super::{Resource, Value};
use crate::error::{FolioError, Result, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
    Id,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "a string",
            Self::Integer => "an integer",
            Self::Float => "a float",
            Self::Boolean => "a boolean",
            Self::DateTime => "a datetime",
            Self::Id => "an identifier",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    Single,
    Multi,
}

/// What to do with attributes a kind does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownAttributes {
    #[default]
    Reject,
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub value_type: ValueType,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub required: bool,
}

impl AttributeSpec {
    pub fn single(value_type: ValueType) -> Self {
        Self {
            value_type,
            cardinality: Cardinality::Single,
            required: false,
        }
    }

    pub fn multi(value_type: ValueType) -> Self {
        Self {
            value_type,
            cardinality: Cardinality::Multi,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Declared attributes of one resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSchema {
    kind: String,
    attributes: BTreeMap<String, AttributeSpec>,
    #[serde(default)]
    unknown_attributes: UnknownAttributes,
}

impl ResourceSchema {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: BTreeMap::new(),
            unknown_attributes: UnknownAttributes::default(),
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, spec: AttributeSpec) -> Self {
        self.attributes.insert(name.into(), spec);
        self
    }

    pub fn unknown_attributes(mut self, policy: UnknownAttributes) -> Self {
        self.unknown_attributes = policy;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn spec(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.get(name)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Construct a new resource of this kind from attribute values,
    /// validated before it is returned.
    pub fn build<I, K>(&self, attributes: I) -> std::result::Result<Resource, ValidationErrors>
    where
        I: IntoIterator<Item = (K, Vec<Value>)>,
        K: Into<String>,
    {
        let mut resource = Resource::new(self.kind.clone());
        for (name, values) in attributes {
            resource.attributes_mut().insert(name.into(), values);
        }
        self.validate(&mut resource)?;
        Ok(resource)
    }

    /// Check a resource against this schema. Undeclared attributes are
    /// dropped in place under [`UnknownAttributes::Ignore`].
    pub fn validate(&self, resource: &mut Resource) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if resource.kind() != self.kind {
            errors.add(
                "kind",
                format!("is {} but schema is for {}", resource.kind(), self.kind),
            );
            return Err(errors);
        }

        let unknown: Vec<String> = resource
            .attributes()
            .keys()
            .filter(|name| !self.attributes.contains_key(name.as_str()))
            .cloned()
            .collect();

        for name in unknown {
            match self.unknown_attributes {
                UnknownAttributes::Reject => errors.add(name, "is not a known attribute"),
                UnknownAttributes::Ignore => {
                    tracing::debug!("Dropping unknown attribute {} on {}", name, self.kind);
                    resource.remove(&name);
                }
            }
        }

        for (name, spec) in &self.attributes {
            let values = resource.get(name);

            if spec.required && values.is_empty() {
                errors.add(name.clone(), "can't be blank");
            }

            if spec.cardinality == Cardinality::Single && values.len() > 1 {
                errors.add(
                    name.clone(),
                    format!("accepts a single value, got {}", values.len()),
                );
            }

            for value in values {
                if value.value_type() != spec.value_type {
                    errors.add(name.clone(), format!("must be {}", spec.value_type));
                    break;
                }
            }

            if values
                .iter()
                .any(|v| matches!(v, Value::Float(f) if !f.is_finite()))
            {
                errors.add(name.clone(), "must be a finite float");
            }

            if spec.required
                && spec.value_type == ValueType::String
                && !values.is_empty()
                && values
                    .iter()
                    .all(|v| v.as_str().is_some_and(|s| s.trim().is_empty()))
            {
                errors.add(name.clone(), "can't be blank");
            }
        }

        errors.into_result()
    }
}

/// All kinds an application knows about.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, ResourceSchema>,
    unknown_attributes: Option<UnknownAttributes>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, schema: ResourceSchema) -> Self {
        self.insert(schema);
        self
    }

    pub fn insert(&mut self, mut schema: ResourceSchema) {
        if let Some(policy) = self.unknown_attributes {
            schema.unknown_attributes = policy;
        }
        self.schemas.insert(schema.kind.clone(), schema);
    }

    /// Override the unknown-attribute policy of every registered kind,
    /// including kinds registered later.
    pub fn with_unknown_attributes(mut self, policy: UnknownAttributes) -> Self {
        self.unknown_attributes = Some(policy);
        for schema in self.schemas.values_mut() {
            schema.unknown_attributes = policy;
        }
        self
    }

    pub fn get(&self, kind: &str) -> Option<&ResourceSchema> {
        self.schemas.get(kind)
    }

    pub fn schema(&self, kind: &str) -> Result<&ResourceSchema> {
        self.get(kind)
            .ok_or_else(|| FolioError::InvalidRequest(format!("unknown resource kind: {}", kind)))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Validate a resource against its kind's schema.
    pub fn validate(&self, resource: &mut Resource) -> Result<()> {
        let schema = self.schema(resource.kind())?;
        schema.validate(resource)?;
        Ok(())
    }
}
