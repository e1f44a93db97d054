use super::{InverseIndexStrategy, MetadataStore, ResourceIter, apply_change, validate_all};
use crate::error::{FolioError, Result};
use crate::identifier::{Identifier, IdentifierMinter};
use crate::resource::{Resource, SchemaRegistry};
use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type IndexKey = (String, Identifier);

#[derive(Default)]
struct MemoryState {
    resources: HashMap<Identifier, Arc<Resource>>,
    inverse: HashMap<IndexKey, BTreeSet<Identifier>>,
    tombstones: HashSet<Identifier>,
}

impl MemoryState {
    fn index(&mut self, resource: &Resource, id: &Identifier) {
        for (attribute, target) in resource.references() {
            self.inverse
                .entry((attribute.to_string(), target.clone()))
                .or_default()
                .insert(id.clone());
        }
    }

    fn unindex(&mut self, resource: &Resource, id: &Identifier) {
        for (attribute, target) in resource.references() {
            let key = (attribute.to_string(), target.clone());
            if let Some(referrers) = self.inverse.get_mut(&key) {
                referrers.remove(id);
                if referrers.is_empty() {
                    self.inverse.remove(&key);
                }
            }
        }
    }
}

/// Process-local metadata store. All state sits behind one lock, so a save
/// and its index update become visible together.
pub struct MemoryMetadataStore {
    state: RwLock<MemoryState>,
    schemas: Arc<SchemaRegistry>,
    minter: IdentifierMinter,
    strategy: InverseIndexStrategy,
}

impl MemoryMetadataStore {
    pub fn new(schemas: Arc<SchemaRegistry>) -> Self {
        Self::with_strategy(schemas, InverseIndexStrategy::default())
    }

    pub fn with_strategy(schemas: Arc<SchemaRegistry>, strategy: InverseIndexStrategy) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            schemas,
            minter: IdentifierMinter::new(),
            strategy,
        }
    }

    pub fn strategy(&self) -> InverseIndexStrategy {
        self.strategy
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| FolioError::Internal("metadata store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| FolioError::Internal("metadata store lock poisoned".to_string()))
    }

    /// Caller holds the write lock and has validated `resource`.
    fn write_locked(&self, state: &mut MemoryState, mut resource: Resource) -> Result<Resource> {
        let id = match resource.id() {
            Some(id) if state.tombstones.contains(id) => {
                return Err(FolioError::Deleted(id.clone()));
            }
            Some(id) => id.clone(),
            None => self.minter.mint()?,
        };

        let now = Utc::now();
        let previous = state.resources.remove(&id);
        let created_at = previous
            .as_ref()
            .and_then(|p| p.created_at())
            .unwrap_or(now);

        if let Some(previous) = previous.as_deref() {
            if self.strategy == InverseIndexStrategy::Indexed {
                state.unindex(previous, &id);
            }
        }

        resource.mark_persisted(id.clone(), created_at, now);
        if self.strategy == InverseIndexStrategy::Indexed {
            state.index(&resource, &id);
        }
        state.resources.insert(id.clone(), Arc::new(resource.clone()));

        tracing::debug!("Saved {} {}", resource.kind(), id);
        Ok(resource)
    }

    /// Validated batch written under one lock hold. Retired ids are checked
    /// before anything is written.
    fn write_all_locked(
        &self,
        state: &mut MemoryState,
        resources: Vec<Resource>,
    ) -> Result<Vec<Resource>> {
        if let Some(id) = resources
            .iter()
            .filter_map(Resource::id)
            .find(|id| state.tombstones.contains(*id))
        {
            return Err(FolioError::Deleted(id.clone()));
        }

        resources
            .into_iter()
            .map(|resource| self.write_locked(state, resource))
            .collect()
    }

    fn snapshot<F>(&self, filter: F) -> Result<ResourceIter>
    where
        F: Fn(&Resource) -> bool,
    {
        let mut matching: Vec<Arc<Resource>> = {
            let state = self.read()?;
            state
                .resources
                .values()
                .filter(|r| filter(r))
                .cloned()
                .collect()
        };
        matching.sort_by(|a, b| a.id().cmp(&b.id()));
        Ok(Box::new(matching.into_iter().map(|r| Resource::clone(&r))))
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn save(&self, mut resource: Resource) -> Result<Resource> {
        self.schemas.validate(&mut resource)?;
        let mut state = self.write()?;
        self.write_locked(&mut state, resource)
    }

    fn save_all(&self, resources: Vec<Resource>) -> Result<Vec<Resource>> {
        let resources = validate_all(&self.schemas, resources)?;
        let mut state = self.write()?;
        self.write_all_locked(&mut state, resources)
    }

    fn find_by(&self, id: &Identifier) -> Result<Option<Resource>> {
        let state = self.read()?;
        Ok(state.resources.get(id).map(|r| Resource::clone(r)))
    }

    fn update_with(
        &self,
        id: &Identifier,
        change: &mut dyn FnMut(&mut Resource) -> Result<Vec<Resource>>,
    ) -> Result<Option<Vec<Resource>>> {
        let mut state = self.write()?;
        let Some(current) = state.resources.get(id).map(|r| Resource::clone(r)) else {
            return Ok(None);
        };

        let batch = validate_all(&self.schemas, apply_change(current, change)?)?;
        self.write_all_locked(&mut state, batch).map(Some)
    }

    fn find_all(&self) -> Result<ResourceIter> {
        self.snapshot(|_| true)
    }

    fn find_all_of_kind(&self, kind: &str) -> Result<ResourceIter> {
        let kind = kind.to_string();
        self.snapshot(move |r| r.kind() == kind)
    }

    fn count_all_of_kind(&self, kind: &str) -> Result<usize> {
        let state = self.read()?;
        Ok(state.resources.values().filter(|r| r.kind() == kind).count())
    }

    fn find_inverse_references_by_id(
        &self,
        target: &Identifier,
        attribute: &str,
    ) -> Result<Vec<Resource>> {
        let state = self.read()?;
        if !state.resources.contains_key(target) {
            return Ok(Vec::new());
        }

        match self.strategy {
            InverseIndexStrategy::Indexed => {
                let key = (attribute.to_string(), target.clone());
                let Some(referrers) = state.inverse.get(&key) else {
                    return Ok(Vec::new());
                };
                referrers
                    .iter()
                    .map(|id| {
                        state
                            .resources
                            .get(id)
                            .map(|r| Resource::clone(r))
                            .ok_or_else(|| {
                                FolioError::Internal(format!(
                                    "inverse index names missing resource {}",
                                    id
                                ))
                            })
                    })
                    .collect()
            }
            InverseIndexStrategy::Scan => {
                let mut referrers: Vec<Resource> = state
                    .resources
                    .values()
                    .filter(|r| r.refers_to(attribute, target))
                    .map(|r| Resource::clone(r))
                    .collect();
                referrers.sort_by(|a, b| a.id().cmp(&b.id()));
                Ok(referrers)
            }
        }
    }

    fn delete(&self, id: &Identifier) -> Result<bool> {
        let mut state = self.write()?;
        let Some(removed) = state.resources.remove(id) else {
            return Ok(false);
        };

        if self.strategy == InverseIndexStrategy::Indexed {
            state.unindex(&removed, id);
        }
        state.tombstones.insert(id.clone());

        tracing::debug!("Deleted {} {}", removed.kind(), id);
        Ok(true)
    }

    fn wipe(&self) -> Result<()> {
        let mut state = self.write()?;
        let ids: Vec<Identifier> = state.resources.keys().cloned().collect();
        state.tombstones.extend(ids);
        state.resources.clear();
        state.inverse.clear();
        Ok(())
    }
}
