//! Payload records: one immutable snapshot type per synchronizable kind.
//!
//! Field order here is the wire order. Encoded sizes are exact; only the
//! pickup record depends on its contents.

use crate::wire::{
    CodecError, PayloadReader, PayloadWriter, StateName, WireDecode, WireEncode, F32_WIDTH,
    I32_WIDTH, OWNER_WIDTH, QUAT_WIDTH, STATE_NAME_WIDTH, U32_WIDTH, VEC3_WIDTH,
};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use spawnsync_core::{ItemTypeId, NetworkObjectId};
use std::fmt;

/// Maximum number of entries a pickup record may carry.
pub const MAX_PICKUP_ITEMS: usize = 1024;

/// Countdown value meaning "no deactivation scheduled".
pub const NO_DEACTIVATION: f32 = -1.0;

/// Discriminant of the four synchronizable object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum PayloadKind {
    /// Thrown grenade.
    Grenade = 0,
    /// Item pickup.
    ItemPickup = 1,
    /// Magic particle effect.
    MagicParticle = 2,
    /// Projectile.
    Projectile = 3,
}

impl PayloadKind {
    /// All kinds, in discriminant order.
    pub const ALL: [PayloadKind; 4] = [
        PayloadKind::Grenade,
        PayloadKind::ItemPickup,
        PayloadKind::MagicParticle,
        PayloadKind::Projectile,
    ];

    /// Encoded record size for kinds whose size never varies.
    pub fn fixed_encoded_len(self) -> Option<usize> {
        match self {
            PayloadKind::Grenade => Some(GrenadeRecord::ENCODED_LEN),
            PayloadKind::ItemPickup => None,
            PayloadKind::MagicParticle => Some(MagicParticleRecord::ENCODED_LEN),
            PayloadKind::Projectile => Some(ProjectileRecord::ENCODED_LEN),
        }
    }

    /// Canonical string used in logs and reports.
    pub const fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Grenade => "grenade",
            PayloadKind::ItemPickup => "item_pickup",
            PayloadKind::MagicParticle => "magic_particle",
            PayloadKind::Projectile => "projectile",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative grenade state.
#[derive(Debug, Clone, PartialEq)]
pub struct GrenadeRecord {
    /// Owning entity, if any.
    pub owner: Option<NetworkObjectId>,
    /// Identifier assigned by the thrower.
    pub owner_id: u32,
    /// Linear velocity.
    pub velocity: Vec3,
    /// Angular torque.
    pub torque: Vec3,
    /// Impact force magnitude.
    pub impact_force: f32,
    /// Frames over which the impact force is applied.
    pub impact_frames: i32,
    /// Layer mask the impact affects.
    pub impact_layers: i32,
    /// Damage dealt on impact.
    pub damage_amount: f32,
    /// State activated on the struck object.
    pub state_name: StateName,
    /// Seconds until that state is disabled.
    pub state_disable_timer: f32,
    /// Seconds until deactivation, or [`NO_DEACTIVATION`].
    pub scheduled_deactivation: f32,
}

impl GrenadeRecord {
    /// Exact encoded size.
    pub const ENCODED_LEN: usize = OWNER_WIDTH
        + U32_WIDTH
        + VEC3_WIDTH
        + VEC3_WIDTH
        + F32_WIDTH
        + I32_WIDTH
        + I32_WIDTH
        + F32_WIDTH
        + STATE_NAME_WIDTH
        + F32_WIDTH
        + F32_WIDTH;

    /// Pending deactivation delay, if one is scheduled.
    pub fn deactivation_delay(&self) -> Option<f32> {
        (self.scheduled_deactivation > 0.0).then_some(self.scheduled_deactivation)
    }
}

impl WireEncode for GrenadeRecord {
    fn encode(&self, w: &mut PayloadWriter) -> Result<(), CodecError> {
        w.write(&self.owner)?;
        w.write(&self.owner_id)?;
        w.write(&self.velocity)?;
        w.write(&self.torque)?;
        w.write(&self.impact_force)?;
        w.write(&self.impact_frames)?;
        w.write(&self.impact_layers)?;
        w.write(&self.damage_amount)?;
        w.write(&self.state_name)?;
        w.write(&self.state_disable_timer)?;
        w.write(&self.scheduled_deactivation)
    }
}

impl WireDecode for GrenadeRecord {
    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            owner: r.read()?,
            owner_id: r.read()?,
            velocity: r.read()?,
            torque: r.read()?,
            impact_force: r.read()?,
            impact_frames: r.read()?,
            impact_layers: r.read()?,
            damage_amount: r.read()?,
            state_name: r.read()?,
            state_disable_timer: r.read()?,
            scheduled_deactivation: r.read()?,
        })
    }
}

/// Authoritative projectile state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileRecord {
    /// Owning entity, if any.
    pub owner: Option<NetworkObjectId>,
    /// Identifier assigned by the firing weapon.
    pub projectile_id: u32,
    /// Linear velocity.
    pub velocity: Vec3,
    /// Angular torque.
    pub torque: Vec3,
    /// Damage dealt on impact.
    pub damage_amount: f32,
    /// Impact force magnitude.
    pub impact_force: f32,
    /// Frames over which the impact force is applied.
    pub impact_frames: i32,
    /// Layer mask the impact affects.
    pub impact_layers: i32,
    /// Seconds until the impact state is disabled.
    pub state_disable_timer: f32,
    /// State activated on the struck object.
    pub state_name: StateName,
}

impl ProjectileRecord {
    /// Exact encoded size.
    pub const ENCODED_LEN: usize = OWNER_WIDTH
        + U32_WIDTH
        + VEC3_WIDTH
        + VEC3_WIDTH
        + F32_WIDTH
        + F32_WIDTH
        + I32_WIDTH
        + I32_WIDTH
        + F32_WIDTH
        + STATE_NAME_WIDTH;
}

impl WireEncode for ProjectileRecord {
    fn encode(&self, w: &mut PayloadWriter) -> Result<(), CodecError> {
        w.write(&self.owner)?;
        w.write(&self.projectile_id)?;
        w.write(&self.velocity)?;
        w.write(&self.torque)?;
        w.write(&self.damage_amount)?;
        w.write(&self.impact_force)?;
        w.write(&self.impact_frames)?;
        w.write(&self.impact_layers)?;
        w.write(&self.state_disable_timer)?;
        w.write(&self.state_name)
    }
}

impl WireDecode for ProjectileRecord {
    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            owner: r.read()?,
            projectile_id: r.read()?,
            velocity: r.read()?,
            torque: r.read()?,
            damage_amount: r.read()?,
            impact_force: r.read()?,
            impact_frames: r.read()?,
            impact_layers: r.read()?,
            state_disable_timer: r.read()?,
            state_name: r.read()?,
        })
    }
}

/// Authoritative magic particle spawn data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicParticleRecord {
    /// Casting character.
    pub owner: Option<NetworkObjectId>,
    /// Inventory slot holding the casting item.
    pub slot_id: i32,
    /// Action id on that item.
    pub action_id: i32,
    /// Index of the action within the cast.
    pub action_index: i32,
    /// Cast identifier.
    pub cast_id: u32,
}

impl MagicParticleRecord {
    /// Exact encoded size.
    pub const ENCODED_LEN: usize = OWNER_WIDTH + I32_WIDTH + I32_WIDTH + I32_WIDTH + U32_WIDTH;
}

impl WireEncode for MagicParticleRecord {
    fn encode(&self, w: &mut PayloadWriter) -> Result<(), CodecError> {
        w.write(&self.owner)?;
        w.write(&self.slot_id)?;
        w.write(&self.action_id)?;
        w.write(&self.action_index)?;
        w.write(&self.cast_id)
    }
}

impl WireDecode for MagicParticleRecord {
    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            owner: r.read()?,
            slot_id: r.read()?,
            action_id: r.read()?,
            action_index: r.read()?,
            cast_id: r.read()?,
        })
    }
}

/// One item type and quantity carried by a pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickupEntry {
    /// Item type wire id.
    pub item_id: ItemTypeId,
    /// Quantity.
    pub amount: i32,
}

/// Authoritative item pickup state.
///
/// On the wire the entries become two parallel sequences (ids, then
/// amounts) preceded by their shared length.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPickupRecord {
    /// Owner of the pickup's trajectory, if any.
    pub owner: Option<NetworkObjectId>,
    /// World rotation.
    pub rotation: Quat,
    /// Linear velocity (zero without a trajectory).
    pub velocity: Vec3,
    /// Angular torque (zero without a trajectory).
    pub torque: Vec3,
    /// Item entries.
    pub items: Vec<PickupEntry>,
}

impl ItemPickupRecord {
    /// Size of everything except the entry sequences.
    pub const FIXED_LEN: usize = OWNER_WIDTH + QUAT_WIDTH + VEC3_WIDTH + VEC3_WIDTH + U32_WIDTH;

    /// Wire bytes added per entry: one id plus one amount.
    pub const ENTRY_LEN: usize = U32_WIDTH + I32_WIDTH;

    /// Exact encoded size of a record carrying `count` entries.
    pub const fn encoded_len_for(count: usize) -> usize {
        Self::FIXED_LEN + count * Self::ENTRY_LEN
    }
}

impl WireEncode for ItemPickupRecord {
    fn encode(&self, w: &mut PayloadWriter) -> Result<(), CodecError> {
        let count = self.items.len();
        if count > MAX_PICKUP_ITEMS {
            return Err(CodecError::TooManyItems {
                count,
                max: MAX_PICKUP_ITEMS,
            });
        }
        w.write(&self.owner)?;
        w.write(&self.rotation)?;
        w.write(&self.velocity)?;
        w.write(&self.torque)?;
        w.write(&(count as u32))?;
        for entry in &self.items {
            w.write(&entry.item_id.0)?;
        }
        for entry in &self.items {
            w.write(&entry.amount)?;
        }
        Ok(())
    }
}

impl WireDecode for ItemPickupRecord {
    fn decode(r: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
        let owner = r.read()?;
        let rotation = r.read()?;
        let velocity = r.read()?;
        let torque = r.read()?;
        let count = r.read::<u32>()? as usize;
        if count > MAX_PICKUP_ITEMS {
            return Err(CodecError::TooManyItems {
                count,
                max: MAX_PICKUP_ITEMS,
            });
        }
        // Both sequences must be present before anything is allocated.
        let needed = count * ItemPickupRecord::ENTRY_LEN;
        if r.remaining() < needed {
            return Err(CodecError::UnexpectedEof {
                needed,
                remaining: r.remaining(),
            });
        }

        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(ItemTypeId(r.read()?));
        }
        let mut items = Vec::with_capacity(count);
        for item_id in ids {
            items.push(PickupEntry {
                item_id,
                amount: r.read()?,
            });
        }

        Ok(Self {
            owner,
            rotation,
            velocity,
            torque,
            items,
        })
    }
}

/// Tagged union over every record kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncRecord {
    /// Grenade record.
    Grenade(GrenadeRecord),
    /// Item pickup record.
    ItemPickup(ItemPickupRecord),
    /// Magic particle record.
    MagicParticle(MagicParticleRecord),
    /// Projectile record.
    Projectile(ProjectileRecord),
}

impl SyncRecord {
    /// Kind of the wrapped record.
    pub fn kind(&self) -> PayloadKind {
        match self {
            SyncRecord::Grenade(_) => PayloadKind::Grenade,
            SyncRecord::ItemPickup(_) => PayloadKind::ItemPickup,
            SyncRecord::MagicParticle(_) => PayloadKind::MagicParticle,
            SyncRecord::Projectile(_) => PayloadKind::Projectile,
        }
    }

    /// Exact encoded size of this record.
    pub fn encoded_len(&self) -> usize {
        match self {
            SyncRecord::ItemPickup(record) => ItemPickupRecord::encoded_len_for(record.items.len()),
            other => other.kind().fixed_encoded_len().unwrap_or_default(),
        }
    }

    /// Decode a record of `kind`, requiring the input to be fully consumed.
    pub fn decode(kind: PayloadKind, bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = PayloadReader::new(bytes);
        let record = Self::decode_from(kind, &mut reader)?;
        reader.finish()?;
        Ok(record)
    }

    /// Decode a record of `kind` from the reader's current position.
    pub fn decode_from(kind: PayloadKind, reader: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
        Ok(match kind {
            PayloadKind::Grenade => SyncRecord::Grenade(reader.read()?),
            PayloadKind::ItemPickup => SyncRecord::ItemPickup(reader.read()?),
            PayloadKind::MagicParticle => SyncRecord::MagicParticle(reader.read()?),
            PayloadKind::Projectile => SyncRecord::Projectile(reader.read()?),
        })
    }
}

impl WireEncode for SyncRecord {
    fn encode(&self, w: &mut PayloadWriter) -> Result<(), CodecError> {
        match self {
            SyncRecord::Grenade(record) => w.write(record),
            SyncRecord::ItemPickup(record) => w.write(record),
            SyncRecord::MagicParticle(record) => w.write(record),
            SyncRecord::Projectile(record) => w.write(record),
        }
    }
}
