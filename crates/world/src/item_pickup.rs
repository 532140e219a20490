//! Pickup carrying a list of item stacks, optionally in flight.

use spawnsync_core::{ItemDefinition, ItemTypeId, NetworkObjectId, Quat, Vec3};
use spawnsync_net::{
    expect_kind, ApplyError, ItemPickupRecord, PayloadCapability, PayloadKind, PickupEntry, SyncRecord,
    MAX_PICKUP_ITEMS,
};
use tracing::warn;

use crate::context::SimContext;
use crate::trajectory::TrajectoryState;

/// One resolved item stack. Instances are recycled through the context pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemAmount {
    /// Item type wire id.
    pub item: ItemTypeId,
    /// Registry key of the item type, as text.
    pub name: String,
    /// Quantity.
    pub amount: i32,
}

impl ItemAmount {
    /// Overwrite with `definition` and `amount`, reusing the name buffer.
    pub fn assign(&mut self, definition: &ItemDefinition, amount: i32) {
        self.item = definition.id;
        self.name.clear();
        self.name.push_str(definition.key.namespace());
        self.name.push(':');
        self.name.push_str(definition.key.path());
        self.amount = amount;
    }
}

/// Pickup state.
#[derive(Debug, Clone, Default)]
pub struct ItemPickup {
    /// World rotation.
    pub rotation: Quat,
    items: Vec<ItemAmount>,
    /// Present when the pickup was thrown or dropped with momentum.
    pub trajectory: Option<TrajectoryState>,
    initialized: bool,
}

impl ItemPickup {
    /// Resting pickup without a trajectory.
    pub fn new() -> Self {
        Self {
            rotation: Quat::IDENTITY,
            ..Self::default()
        }
    }

    /// Pickup that moves along a trajectory.
    pub fn with_trajectory() -> Self {
        Self {
            trajectory: Some(TrajectoryState::default()),
            ..Self::new()
        }
    }

    /// Current stacks.
    pub fn items(&self) -> &[ItemAmount] {
        &self.items
    }

    /// Whether the pickup has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Fill the pickup on the authority.
    ///
    /// Stacks past [`MAX_PICKUP_ITEMS`] are not kept.
    pub fn drop_items(&mut self, rotation: Quat, entries: &[PickupEntry], ctx: &mut SimContext) -> Result<(), ApplyError> {
        let entries = if entries.len() > MAX_PICKUP_ITEMS {
            warn!(count = entries.len(), max = MAX_PICKUP_ITEMS, "pickup overflow; extra stacks discarded");
            &entries[..MAX_PICKUP_ITEMS]
        } else {
            entries
        };
        self.rebuild(entries, ctx)?;
        self.rotation = rotation;
        self.initialized = true;
        Ok(())
    }

    /// Give an in-flight pickup its motion.
    pub fn throw(&mut self, velocity: Vec3, torque: Vec3, owner: Option<NetworkObjectId>) {
        if let Some(trajectory) = self.trajectory.as_mut() {
            trajectory.initialize(velocity, torque, owner);
        }
    }

    /// Return every stack to the pool.
    pub fn clear(&mut self, ctx: &mut SimContext) {
        for entry in self.items.drain(..) {
            ctx.item_pool.release(entry);
        }
    }

    /// Replace the stacks with `entries`, resolving every id before touching
    /// the current list.
    fn rebuild(&mut self, entries: &[PickupEntry], ctx: &mut SimContext) -> Result<(), ApplyError> {
        let definitions = entries
            .iter()
            .map(|entry| {
                ctx.items.get(entry.item_id).ok_or_else(|| {
                    warn!(item = entry.item_id.0, "pickup references unknown item type");
                    ApplyError::UnknownItemType(entry.item_id.0)
                })
            })
            .collect::<Result<Vec<&ItemDefinition>, ApplyError>>()?;

        for entry in self.items.drain(..) {
            ctx.item_pool.release(entry);
        }
        for (definition, entry) in definitions.into_iter().zip(entries) {
            let mut stack = ctx.item_pool.acquire();
            stack.assign(definition, entry.amount);
            self.items.push(stack);
        }
        Ok(())
    }
}

impl PayloadCapability<SimContext> for ItemPickup {
    fn kind(&self) -> PayloadKind {
        PayloadKind::ItemPickup
    }

    fn produce(&self, _ctx: &SimContext) -> SyncRecord {
        let trajectory = self.trajectory.unwrap_or_default();
        SyncRecord::ItemPickup(ItemPickupRecord {
            owner: self.trajectory.and_then(|t| t.owner),
            rotation: self.rotation,
            velocity: trajectory.velocity,
            torque: trajectory.torque,
            items: self
                .items
                .iter()
                .map(|stack| PickupEntry {
                    item_id: stack.item,
                    amount: stack.amount,
                })
                .collect(),
        })
    }

    fn apply(&mut self, record: &SyncRecord, ctx: &mut SimContext) -> Result<(), ApplyError> {
        expect_kind(self.kind(), record)?;
        let SyncRecord::ItemPickup(record) = record else {
            return Ok(());
        };

        self.rebuild(&record.items, ctx)?;
        self.rotation = record.rotation;
        self.initialized = true;
        if self.trajectory.is_some() {
            let owner = ctx.resolve_owner(record.owner);
            self.throw(record.velocity, record.torque, owner);
        }
        Ok(())
    }

    fn max_encoded_size(&self) -> usize {
        ItemPickupRecord::encoded_len_for(self.items.len())
    }
}
