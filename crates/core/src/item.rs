//! Item-type registry.
//!
//! Pickups transmit item types as bare `u32` ids; receivers resolve them
//! back to full definitions here. A miss is a data-integrity problem for the
//! caller to report, never a panic.

use crate::registry::RegistryKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Numeric item type id as transmitted on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemTypeId(pub u32);

/// Definition of an item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    /// Wire id.
    pub id: ItemTypeId,
    /// Authoring name.
    pub key: RegistryKey,
    /// Largest stack a single pickup entry may hold.
    #[serde(default = "default_max_stack")]
    pub max_stack: i32,
}

fn default_max_stack() -> i32 {
    64
}

/// Errors raised while building an [`ItemTypeRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two definitions share a wire id.
    #[error("item type id {0} registered twice")]
    DuplicateId(u32),
    /// Two definitions share a key.
    #[error("item type key {0} registered twice")]
    DuplicateKey(RegistryKey),
}

/// Keyed lookup from wire id to item definition.
#[derive(Debug, Clone, Default)]
pub struct ItemTypeRegistry {
    by_id: BTreeMap<ItemTypeId, ItemDefinition>,
}

impl ItemTypeRegistry {
    /// Build a registry from a list of definitions.
    pub fn new(definitions: Vec<ItemDefinition>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    /// Add a definition, rejecting duplicate ids and keys.
    pub fn register(&mut self, definition: ItemDefinition) -> Result<(), RegistryError> {
        if self.by_id.contains_key(&definition.id) {
            return Err(RegistryError::DuplicateId(definition.id.0));
        }
        if self.by_key(&definition.key).is_some() {
            return Err(RegistryError::DuplicateKey(definition.key));
        }
        self.by_id.insert(definition.id, definition);
        Ok(())
    }

    /// Look up a definition by wire id.
    pub fn get(&self, id: ItemTypeId) -> Option<&ItemDefinition> {
        self.by_id.get(&id)
    }

    /// Look up a definition by key.
    pub fn by_key(&self, key: &RegistryKey) -> Option<&ItemDefinition> {
        self.by_id.values().find(|definition| &definition.key == key)
    }

    /// Number of registered item types.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Iterate definitions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemDefinition> {
        self.by_id.values()
    }
}
