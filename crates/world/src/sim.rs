//! One endpoint's simulation: objects plus the context they run in.

use spawnsync_core::{ItemTypeRegistry, NetworkObjectId};
use tracing::debug;

use crate::context::SimContext;
use crate::object::{ObjectTable, SyncObject};
use crate::scheduler::ScheduledAction;

/// Objects and context for a single endpoint.
#[derive(Debug, Default)]
pub struct SimWorld {
    /// Shared simulation context.
    pub context: SimContext,
    /// Spawned objects.
    pub objects: ObjectTable,
}

impl SimWorld {
    /// Empty world with the given item registry.
    pub fn new(items: ItemTypeRegistry) -> Self {
        Self {
            context: SimContext::new(items),
            objects: ObjectTable::new(),
        }
    }

    /// Add an object to the world.
    pub fn spawn(&mut self, id: NetworkObjectId, object: SyncObject) {
        if self.objects.insert(id, object).is_some() {
            debug!(object = %id, "respawned over an existing object");
        }
    }

    /// Remove an object, releasing what it holds in the context.
    pub fn despawn(&mut self, id: NetworkObjectId) -> Option<SyncObject> {
        let mut object = self.objects.remove(id)?;
        match &mut object {
            SyncObject::Grenade(grenade) => grenade.cancel_deactivation(&mut self.context),
            SyncObject::ItemPickup(pickup) => pickup.clear(&mut self.context),
            SyncObject::MagicParticle(_) | SyncObject::Projectile(_) => {}
        }
        Some(object)
    }

    /// Advance time by `dt` seconds and run every action that came due.
    ///
    /// Returns the objects deactivated during this step.
    pub fn advance(&mut self, dt: f32) -> Vec<NetworkObjectId> {
        self.context.now = self.context.now.advance(dt);
        let mut deactivated = Vec::new();
        for action in self.context.scheduler.drain_due(self.context.now) {
            match action {
                ScheduledAction::Deactivate(id) => {
                    if let Some(SyncObject::Grenade(grenade)) = self.objects.get_mut(id) {
                        grenade.deactivate();
                        deactivated.push(id);
                    }
                }
            }
        }
        deactivated
    }
}
