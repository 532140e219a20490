//! Thrown explosive with an optional deferred deactivation.

use spawnsync_core::{LayerMask, NetworkObjectId, Vec3};
use spawnsync_net::{
    expect_kind, ApplyError, GrenadeRecord, PayloadCapability, PayloadKind, StateName, SyncRecord, NO_DEACTIVATION,
};
use tracing::trace;

use crate::context::SimContext;
use crate::impact::{ImpactBody, ImpactDamageData};
use crate::scheduler::{ScheduleHandle, ScheduledAction};

/// Grenade state.
#[derive(Debug, Clone)]
pub struct Grenade {
    object: NetworkObjectId,
    /// Motion and damage state.
    pub body: ImpactBody,
    deactivation: Option<ScheduleHandle>,
    active: bool,
}

impl Grenade {
    /// Grenade attached to the replicated object `object`.
    pub fn new(object: NetworkObjectId) -> Self {
        Self {
            object,
            body: ImpactBody::default(),
            deactivation: None,
            active: true,
        }
    }

    /// Replicated object id.
    pub fn object(&self) -> NetworkObjectId {
        self.object
    }

    /// Initialize on the authority.
    pub fn launch(
        &mut self,
        owner_id: u32,
        owner: Option<NetworkObjectId>,
        velocity: Vec3,
        torque: Vec3,
        damage: &ImpactDamageData,
        impact_layers: LayerMask,
    ) {
        self.body.damage_mut().assign_from(damage);
        self.body.impact_layers = impact_layers;
        self.body.initialize(owner_id, velocity, torque, owner);
        self.active = true;
    }

    /// Deactivate `delay` seconds from now, replacing any pending deactivation.
    pub fn schedule_deactivation(&mut self, delay: f32, ctx: &mut SimContext) {
        self.cancel_deactivation(ctx);
        self.deactivation = Some(ctx.scheduler.schedule(ctx.now, delay, ScheduledAction::Deactivate(self.object)));
    }

    /// Drop any pending deactivation.
    pub fn cancel_deactivation(&mut self, ctx: &mut SimContext) {
        if let Some(handle) = self.deactivation.take() {
            ctx.scheduler.cancel(handle);
        }
    }

    /// Pending deactivation, if any.
    pub fn deactivation(&self) -> Option<ScheduleHandle> {
        self.deactivation
    }

    /// Called by the scheduler.
    pub fn deactivate(&mut self) {
        trace!(object = %self.object, "grenade deactivated");
        self.deactivation = None;
        self.active = false;
    }

    /// Whether the grenade is still live.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl PayloadCapability<SimContext> for Grenade {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Grenade
    }

    fn produce(&self, ctx: &SimContext) -> SyncRecord {
        let fallback = ImpactDamageData::default();
        let damage = self.body.damage.as_ref().unwrap_or(&fallback);
        let scheduled_deactivation = self
            .deactivation
            .map_or(NO_DEACTIVATION, |handle| ctx.now.until(handle.end_time));
        SyncRecord::Grenade(GrenadeRecord {
            owner: self.body.trajectory.owner,
            owner_id: self.body.id,
            velocity: self.body.trajectory.velocity,
            torque: self.body.trajectory.torque,
            impact_force: damage.impact_force,
            impact_frames: damage.impact_force_frames,
            impact_layers: self.body.impact_layers.0,
            damage_amount: damage.damage_amount,
            state_name: StateName::truncated(&damage.impact_state_name),
            state_disable_timer: damage.impact_state_disable_timer,
            scheduled_deactivation,
        })
    }

    fn apply(&mut self, record: &SyncRecord, ctx: &mut SimContext) -> Result<(), ApplyError> {
        expect_kind(self.kind(), record)?;
        let SyncRecord::Grenade(record) = record else {
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
        self.body.initialize(record.owner_id, record.velocity, record.torque, owner);
        self.active = true;

        match record.deactivation_delay() {
            Some(delay) => self.schedule_deactivation(delay, ctx),
            None => self.cancel_deactivation(ctx),
        }
        Ok(())
    }

    fn max_encoded_size(&self) -> usize {
        GrenadeRecord::ENCODED_LEN
    }
}
