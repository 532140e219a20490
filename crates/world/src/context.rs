//! State shared by every object during produce and apply.

use spawnsync_core::{ItemTypeRegistry, NetworkObjectId, SimTime};
use tracing::debug;

use crate::character::CharacterDirectory;
use crate::item_pickup::ItemAmount;
use crate::pool::ObjectPool;
use crate::scheduler::Scheduler;

/// Simulation context passed to payload capabilities.
#[derive(Debug, Default)]
pub struct SimContext {
    /// Current simulation time.
    pub now: SimTime,
    /// Deferred actions.
    pub scheduler: Scheduler,
    /// Item types, keyed by wire id.
    pub items: ItemTypeRegistry,
    /// Recycled pickup entries.
    pub item_pool: ObjectPool<ItemAmount>,
    /// Characters that can own objects.
    pub characters: CharacterDirectory,
}

impl SimContext {
    /// Context at time zero with the given item registry.
    pub fn new(items: ItemTypeRegistry) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Resolve an owner reference, treating a despawned owner as no owner.
    pub fn resolve_owner(&self, owner: Option<NetworkObjectId>) -> Option<NetworkObjectId> {
        let id = owner?;
        if self.characters.contains(id) {
            Some(id)
        } else {
            debug!(owner = %id, "owner no longer resolvable; treating as unowned");
            None
        }
    }
}
