//! Metadata persistence: resources keyed by identifier, with forward and
//! inverse reference queries.

#[cfg(test)]
pub(crate) mod conformance;
pub mod memory;
pub mod sqlite;

use crate::error::Result;
use crate::identifier::Identifier;
use crate::resource::{Resource, SchemaRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use memory::MemoryMetadataStore;
pub use sqlite::SqliteMetadataStore;

/// Snapshot iterator returned by the find-all queries. The snapshot is
/// taken when the query runs; later writes are not observed.
pub type ResourceIter = Box<dyn Iterator<Item = Resource> + Send>;

/// How inverse-reference queries locate referrers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InverseIndexStrategy {
    /// Secondary index keyed by (attribute, target), maintained on every write.
    #[default]
    Indexed,
    /// Full scan of every stored resource per query.
    Scan,
}

pub trait MetadataStore: Send + Sync {
    /// Insert a new resource or fully replace an existing one. The returned
    /// resource carries its identifier and timestamps.
    fn save(&self, resource: Resource) -> Result<Resource>;

    /// Save several resources as one unit. Nothing is written when any of
    /// them fails validation.
    fn save_all(&self, resources: Vec<Resource>) -> Result<Vec<Resource>>;

    fn find_by(&self, id: &Identifier) -> Result<Option<Resource>>;

    /// Read-modify-write of the resource stored under `id`. `change` sees the
    /// current stored copy and may return companion resources to save with
    /// it; the changed resource and its companions are validated and written
    /// as one unit that no concurrent write can interleave with. Returns the
    /// saved resource followed by the saved companions, or `None` when `id`
    /// is not stored, in which case nothing is written.
    fn update_with(
        &self,
        id: &Identifier,
        change: &mut dyn FnMut(&mut Resource) -> Result<Vec<Resource>>,
    ) -> Result<Option<Vec<Resource>>>;

    fn find_all(&self) -> Result<ResourceIter>;

    fn find_all_of_kind(&self, kind: &str) -> Result<ResourceIter>;

    fn count_all_of_kind(&self, kind: &str) -> Result<usize>;

    /// Resources whose `attribute` contains `target`, ordered by identifier.
    /// Empty when `target` itself is not stored.
    fn find_inverse_references_by_id(
        &self,
        target: &Identifier,
        attribute: &str,
    ) -> Result<Vec<Resource>>;

    /// Returns whether anything was removed. References held by other
    /// resources are left in place.
    fn delete(&self, id: &Identifier) -> Result<bool>;

    /// Remove every resource. Removed identifiers stay retired.
    fn wipe(&self) -> Result<()>;

    /// Resolve identifiers in input order, skipping unknown ones and
    /// collapsing repeats.
    fn find_many_by_ids(&self, ids: &[Identifier]) -> Result<Vec<Resource>> {
        let mut seen = HashSet::new();
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id) {
                continue;
            }
            if let Some(resource) = self.find_by(id)? {
                found.push(resource);
            }
        }
        Ok(found)
    }

    /// Resolve the identifiers held in `attribute`, keeping stored order and
    /// repeats. Identifiers that no longer resolve are skipped.
    fn find_members(&self, resource: &Resource, attribute: &str) -> Result<Vec<Resource>> {
        let mut members = Vec::new();
        for id in resource.ids(attribute) {
            match self.find_by(&id)? {
                Some(member) => members.push(member),
                None => tracing::debug!(
                    "Skipping unresolved member {} in {}.{}",
                    id,
                    resource.kind(),
                    attribute
                ),
            }
        }
        Ok(members)
    }

    /// Like [`MetadataStore::find_members`] with repeats collapsed.
    fn find_references_by(&self, resource: &Resource, attribute: &str) -> Result<Vec<Resource>> {
        self.find_many_by_ids(&resource.ids(attribute))
    }

    fn find_inverse_references(
        &self,
        resource: &Resource,
        attribute: &str,
    ) -> Result<Vec<Resource>> {
        let id = resource.persisted_id()?;
        self.find_inverse_references_by_id(id, attribute)
    }

    /// [`MetadataStore::update_with`] without companions.
    fn update(
        &self,
        id: &Identifier,
        change: &mut dyn FnMut(&mut Resource) -> Result<()>,
    ) -> Result<Option<Resource>> {
        let saved = self.update_with(id, &mut |resource| {
            change(resource)?;
            Ok(Vec::new())
        })?;
        Ok(saved.and_then(|saved| saved.into_iter().next()))
    }
}

/// Apply `change` to a stored copy and put the result ahead of its
/// companions.
pub(crate) fn apply_change(
    mut current: Resource,
    change: &mut dyn FnMut(&mut Resource) -> Result<Vec<Resource>>,
) -> Result<Vec<Resource>> {
    let companions = change(&mut current)?;
    let mut batch = Vec::with_capacity(companions.len() + 1);
    batch.push(current);
    batch.extend(companions);
    Ok(batch)
}

/// Validate every resource up front, returning them normalized.
pub(crate) fn validate_all(
    schemas: &SchemaRegistry,
    resources: Vec<Resource>,
) -> Result<Vec<Resource>> {
    resources
        .into_iter()
        .map(|mut resource| {
            schemas.validate(&mut resource)?;
            Ok(resource)
        })
        .collect()
}
