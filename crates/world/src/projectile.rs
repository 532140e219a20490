//! Fired projectile.

use spawnsync_core::{LayerMask, NetworkObjectId, Vec3};
use spawnsync_net::{expect_kind, ApplyError, PayloadCapability, PayloadKind, ProjectileRecord, StateName, SyncRecord};

use crate::context::SimContext;
use crate::impact::{ImpactBody, ImpactDamageData};

/// Projectile state.
#[derive(Debug, Clone, Default)]
pub struct Projectile {
    /// Motion and damage state.
    pub body: ImpactBody,
}

impl Projectile {
    /// Uninitialized projectile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize on the authority.
    pub fn launch(
        &mut self,
        projectile_id: u32,
        owner: Option<NetworkObjectId>,
        velocity: Vec3,
        torque: Vec3,
        damage: &ImpactDamageData,
        impact_layers: LayerMask,
    ) {
        self.body.damage_mut().assign_from(damage);
        self.body.impact_layers = impact_layers;
        self.body.initialize(projectile_id, velocity, torque, owner);
    }
}

impl PayloadCapability<SimContext> for Projectile {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Projectile
    }

    fn produce(&self, _ctx: &SimContext) -> SyncRecord {
        let fallback = ImpactDamageData::default();
        let damage = self.body.damage.as_ref().unwrap_or(&fallback);
        SyncRecord::Projectile(ProjectileRecord {
            owner: self.body.trajectory.owner,
            projectile_id: self.body.id,
            velocity: self.body.trajectory.velocity,
            torque: self.body.trajectory.torque,
            damage_amount: damage.damage_amount,
            impact_force: damage.impact_force,
            impact_frames: damage.impact_force_frames,
            impact_layers: self.body.impact_layers.0,
            state_disable_timer: damage.impact_state_disable_timer,
            state_name: StateName::truncated(&damage.impact_state_name),
        })
    }

    fn apply(&mut self, record: &SyncRecord, ctx: &mut SimContext) -> Result<(), ApplyError> {
        expect_kind(self.kind(), record)?;
        let SyncRecord::Projectile(record) = record else {
            return Ok(());
        };

        self.body.damage_mut().assign(
            record.damage_amount,
            record.impact_force,
            record.impact_frames,
            record.state_name.as_str(),
            record.state_disable_timer,
        );
        self.body.impact_layers = LayerMask(record.impact_layers);
        let owner = ctx.resolve_owner(record.owner);
        self.body.initialize(record.projectile_id, record.velocity, record.torque, owner);
        Ok(())
    }

    fn max_encoded_size(&self) -> usize {
        ProjectileRecord::ENCODED_LEN
    }
}
