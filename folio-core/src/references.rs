//! Forward and inverse reference lookups over a metadata store.

use crate::error::Result;
use crate::identifier::Identifier;
use crate::resource::Resource;
use crate::storage::MetadataStore;

pub struct ReferenceResolver<'a> {
    store: &'a dyn MetadataStore,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(store: &'a dyn MetadataStore) -> Self {
        Self { store }
    }

    /// Records named by `attribute` on `resource`, in stored order.
    pub fn forward(&self, resource: &Resource, attribute: &str) -> Result<Vec<Resource>> {
        self.store.find_members(resource, attribute)
    }

    /// Records whose `attribute` names `resource`.
    pub fn inverse(&self, resource: &Resource, attribute: &str) -> Result<Vec<Resource>> {
        self.store.find_inverse_references(resource, attribute)
    }

    /// Like [`ReferenceResolver::inverse`], restricted to one kind.
    pub fn inverse_of_kind(
        &self,
        resource: &Resource,
        attribute: &str,
        kind: &str,
    ) -> Result<Vec<Resource>> {
        let mut referrers = self.inverse(resource, attribute)?;
        referrers.retain(|r| r.kind() == kind);
        Ok(referrers)
    }

    /// Identifiers in `attribute` that no longer resolve to a stored record.
    pub fn dangling(&self, resource: &Resource, attribute: &str) -> Result<Vec<Identifier>> {
        let mut missing = Vec::new();
        for id in resource.ids(attribute) {
            if self.store.find_by(&id)?.is_none() && !missing.contains(&id) {
                missing.push(id);
            }
        }
        Ok(missing)
    }
}
