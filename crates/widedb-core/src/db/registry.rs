use crate::{
    model::{EntityDescriptor, MetadataError},
    traits::EntitySchema,
};
use parking_lot::RwLock;
use std::{any::TypeId, collections::HashMap, sync::Arc};

///
/// DescriptorCache
///
/// Resolved entity descriptors keyed by entity type, owned by one engine.
///
/// Resolution happens outside the lock; the first descriptor inserted for a
/// type wins and every racing caller gets that same `Arc`. Failed
/// resolutions are never stored.
///

pub struct DescriptorCache {
    default_keyspace: String,
    entries: RwLock<HashMap<TypeId, Arc<EntityDescriptor>>>,
}

impl DescriptorCache {
    /// Create an empty cache resolving unqualified entities into
    /// `default_keyspace`.
    pub fn new(default_keyspace: impl Into<String>) -> Self {
        Self {
            default_keyspace: default_keyspace.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn default_keyspace(&self) -> &str {
        &self.default_keyspace
    }

    /// Resolve `E` once and return its cached descriptor.
    pub fn resolve<E: EntitySchema>(&self) -> Result<Arc<EntityDescriptor>, MetadataError> {
        let key = TypeId::of::<E>();

        if let Some(found) = self.entries.read().get(&key) {
            return Ok(Arc::clone(found));
        }

        let resolved = Arc::new(EntityDescriptor::resolve(
            &E::model(),
            &self.default_keyspace,
        )?);

        let mut entries = self.entries.write();
        let entry = entries.entry(key).or_insert(resolved);

        Ok(Arc::clone(entry))
    }

    /// Cached descriptor for `E`, without resolving.
    #[must_use]
    pub fn try_get<E: EntitySchema>(&self) -> Option<Arc<EntityDescriptor>> {
        self.entries.read().get(&TypeId::of::<E>()).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
