//! Replicated objects and the table the coordinator looks them up in.

use spawnsync_core::NetworkObjectId;
use spawnsync_net::{CapabilitySource, PayloadCapability, PayloadKind};
use std::collections::BTreeMap;

use crate::context::SimContext;
use crate::grenade::Grenade;
use crate::item_pickup::ItemPickup;
use crate::magic_particle::MagicParticle;
use crate::projectile::Projectile;

/// One synchronizable object of any kind.
#[derive(Debug, Clone)]
pub enum SyncObject {
    /// Grenade.
    Grenade(Grenade),
    /// Item pickup.
    ItemPickup(ItemPickup),
    /// Magic particle.
    MagicParticle(MagicParticle),
    /// Projectile.
    Projectile(Projectile),
}

impl SyncObject {
    /// Fresh, uninitialized object of `kind`.
    pub fn blank(kind: PayloadKind, object: NetworkObjectId) -> Self {
        match kind {
            PayloadKind::Grenade => SyncObject::Grenade(Grenade::new(object)),
            PayloadKind::ItemPickup => SyncObject::ItemPickup(ItemPickup::new()),
            PayloadKind::MagicParticle => SyncObject::MagicParticle(MagicParticle::new()),
            PayloadKind::Projectile => SyncObject::Projectile(Projectile::new()),
        }
    }

    /// Object kind.
    pub fn kind(&self) -> PayloadKind {
        self.capability().kind()
    }

    /// The object's payload capability.
    pub fn capability(&self) -> &dyn PayloadCapability<SimContext> {
        match self {
            SyncObject::Grenade(grenade) => grenade,
            SyncObject::ItemPickup(pickup) => pickup,
            SyncObject::MagicParticle(particle) => particle,
            SyncObject::Projectile(projectile) => projectile,
        }
    }

    /// Mutable payload capability.
    pub fn capability_mut(&mut self) -> &mut dyn PayloadCapability<SimContext> {
        match self {
            SyncObject::Grenade(grenade) => grenade,
            SyncObject::ItemPickup(pickup) => pickup,
            SyncObject::MagicParticle(particle) => particle,
            SyncObject::Projectile(projectile) => projectile,
        }
    }
}

/// Spawned objects on one endpoint, keyed by replicated id.
#[derive(Debug, Default)]
pub struct ObjectTable {
    objects: BTreeMap<NetworkObjectId, SyncObject>,
}

impl ObjectTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object, returning any object it replaced.
    pub fn insert(&mut self, id: NetworkObjectId, object: SyncObject) -> Option<SyncObject> {
        self.objects.insert(id, object)
    }

    /// Remove an object.
    pub fn remove(&mut self, id: NetworkObjectId) -> Option<SyncObject> {
        self.objects.remove(&id)
    }

    /// Look up an object.
    pub fn get(&self, id: NetworkObjectId) -> Option<&SyncObject> {
        self.objects.get(&id)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, id: NetworkObjectId) -> Option<&mut SyncObject> {
        self.objects.get_mut(&id)
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects in id order.
    pub fn iter(&self) -> impl Iterator<Item = (NetworkObjectId, &SyncObject)> {
        self.objects.iter().map(|(id, object)| (*id, object))
    }
}

impl CapabilitySource for ObjectTable {
    type Context = SimContext;

    fn capability(&self, object: NetworkObjectId) -> Option<&dyn PayloadCapability<SimContext>> {
        self.objects.get(&object).map(SyncObject::capability)
    }

    fn capability_mut(&mut self, object: NetworkObjectId) -> Option<&mut dyn PayloadCapability<SimContext>> {
        self.objects.get_mut(&object).map(SyncObject::capability_mut)
    }
}
