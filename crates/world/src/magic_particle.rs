//! Particle effect spawned by a magic action.
//!
//! Unlike the other kinds, a particle cannot initialize without its owner:
//! the record only names a slot and an action, which must be looked up on
//! the owning character's active item.

use spawnsync_core::NetworkObjectId;
use spawnsync_net::{expect_kind, ApplyError, MagicParticleRecord, PayloadCapability, PayloadKind, SyncRecord};
use tracing::{debug, warn};

use crate::character::MagicAction;
use crate::context::SimContext;

/// Spawn data recorded by the caster before replication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastSource {
    /// Casting character.
    pub character: Option<NetworkObjectId>,
    /// Action that produced the particle.
    pub action: MagicAction,
    /// Index of the action within the cast.
    pub action_index: i32,
    /// Cast identifier.
    pub cast_id: u32,
}

/// Initialized particle: the action it renders for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticleBinding {
    /// Resolved action.
    pub action: MagicAction,
    /// Cast identifier.
    pub cast_id: u32,
}

/// Particle state.
#[derive(Debug, Clone, Default)]
pub struct MagicParticle {
    source: Option<CastSource>,
    binding: Option<ParticleBinding>,
}

impl MagicParticle {
    /// Uninitialized particle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the cast on the authority.
    pub fn instantiate(&mut self, character: Option<NetworkObjectId>, action: MagicAction, action_index: i32, cast_id: u32) {
        self.binding = Some(ParticleBinding {
            action: action.clone(),
            cast_id,
        });
        self.source = Some(CastSource {
            character,
            action,
            action_index,
            cast_id,
        });
    }

    /// Bound action, once initialized.
    pub fn binding(&self) -> Option<&ParticleBinding> {
        self.binding.as_ref()
    }

    fn resolve(record: &MagicParticleRecord, ctx: &SimContext) -> Result<MagicAction, ApplyError> {
        let owner = record.owner.ok_or(ApplyError::NoOwner)?;
        let character = ctx.characters.get(owner).ok_or_else(|| {
            debug!(%owner, "particle owner despawned");
            ApplyError::StaleOwner(owner)
        })?;
        let inventory = character
            .inventory
            .as_ref()
            .ok_or(ApplyError::MissingInventory(owner))?;
        let item = inventory.active_item(record.slot_id).ok_or_else(|| {
            warn!(%owner, slot = record.slot_id, "no active item for particle");
            ApplyError::NoActiveItem { slot: record.slot_id }
        })?;
        let action = item.action(record.action_id).ok_or_else(|| {
            warn!(%owner, slot = record.slot_id, action = record.action_id, "unknown particle action");
            ApplyError::UnknownAction {
                slot: record.slot_id,
                action: record.action_id,
            }
        })?;
        action.as_magic().cloned().ok_or(ApplyError::NotMagicAction {
            action: record.action_id,
        })
    }
}

impl PayloadCapability<SimContext> for MagicParticle {
    fn kind(&self) -> PayloadKind {
        PayloadKind::MagicParticle
    }

    fn produce(&self, _ctx: &SimContext) -> SyncRecord {
        let record = match &self.source {
            Some(source) => MagicParticleRecord {
                owner: source.character,
                slot_id: source.action.slot_id,
                action_id: source.action.id,
                action_index: source.action_index,
                cast_id: source.cast_id,
            },
            None => MagicParticleRecord {
                owner: None,
                slot_id: -1,
                action_id: -1,
                action_index: 0,
                cast_id: 0,
            },
        };
        SyncRecord::MagicParticle(record)
    }

    fn apply(&mut self, record: &SyncRecord, ctx: &mut SimContext) -> Result<(), ApplyError> {
        expect_kind(self.kind(), record)?;
        let SyncRecord::MagicParticle(record) = record else {
            return Ok(());
        };

        let action = Self::resolve(record, ctx)?;
        self.instantiate(record.owner, action, record.action_index, record.cast_id);
        Ok(())
    }

    fn max_encoded_size(&self) -> usize {
        MagicParticleRecord::ENCODED_LEN
    }
}
