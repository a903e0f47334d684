//! Versioned, immutable key schemas
//!
//! [`Schema::define`] is the only way to obtain a schema; stores refuse keys
//! whose descriptors were not part of that call, so a schema can never be
//! extended or aliased after the fact.

use std::collections::HashMap;
use std::sync::Arc;

use semver::Version;

use crate::error::{ConfigError, Result};
use crate::key::KeyDef;

/// Versioned, ordered, immutable set of keys for one mod
pub struct Schema {
    version: Version,
    keys: Vec<Arc<KeyDef>>,
    by_name: HashMap<String, usize>,
}

impl Schema {
    /// Define a schema from a version and its keys
    ///
    /// Enumeration order follows `keys`. Fails if two keys share a name.
    pub fn define(version: Version, keys: Vec<Arc<KeyDef>>) -> Result<Arc<Self>> {
        let mut by_name = HashMap::with_capacity(keys.len());
        for (index, key) in keys.iter().enumerate() {
            if by_name.insert(key.name().to_string(), index).is_some() {
                return Err(ConfigError::DuplicateKey(key.name().to_string()));
            }
        }
        Ok(Arc::new(Self {
            version,
            keys,
            by_name,
        }))
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Iterate keys in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &Arc<KeyDef>> {
        self.keys.iter()
    }

    /// Look up a key descriptor by name
    pub fn get(&self, name: &str) -> Option<&Arc<KeyDef>> {
        self.by_name.get(name).map(|&index| &self.keys[index])
    }

    /// Whether `def` is the exact descriptor instance this schema holds
    ///
    /// Identity is pointer identity, not name equality: a same-named key
    /// declared elsewhere does not alias into this schema.
    pub fn contains(&self, def: &Arc<KeyDef>) -> bool {
        self.get(def.name())
            .is_some_and(|held| Arc::ptr_eq(held, def))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("version", &self.version)
            .field("keys", &self.keys.len())
            .finish()
    }
}
