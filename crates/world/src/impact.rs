//! Reusable impact damage holder shared by grenades and projectiles.

use spawnsync_core::{LayerMask, NetworkObjectId, Vec3};

use crate::trajectory::TrajectoryState;

/// Damage parameters applied when an object strikes something.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImpactDamageData {
    /// Damage dealt on impact.
    pub damage_amount: f32,
    /// Impact force magnitude.
    pub impact_force: f32,
    /// Frames over which the force is applied.
    pub impact_force_frames: i32,
    /// State activated on the struck object.
    pub impact_state_name: String,
    /// Seconds until that state is disabled.
    pub impact_state_disable_timer: f32,
}

impl ImpactDamageData {
    /// Overwrite every field in place, reusing the state-name allocation.
    pub fn assign(&mut self, damage_amount: f32, impact_force: f32, frames: i32, state_name: &str, disable_timer: f32) {
        self.damage_amount = damage_amount;
        self.impact_force = impact_force;
        self.impact_force_frames = frames;
        self.impact_state_name.clear();
        self.impact_state_name.push_str(state_name);
        self.impact_state_disable_timer = disable_timer;
    }

    /// Copy `other` into `self` without reallocating.
    pub fn assign_from(&mut self, other: &ImpactDamageData) {
        self.assign(
            other.damage_amount,
            other.impact_force,
            other.impact_force_frames,
            &other.impact_state_name,
            other.impact_state_disable_timer,
        );
    }
}

/// Kinetic and damage state common to thrown and fired objects.
///
/// The damage holder is created on first use and then rewritten in place on
/// every later initialization.
#[derive(Debug, Clone, Default)]
pub struct ImpactBody {
    /// Identifier assigned by the launcher.
    pub id: u32,
    /// Motion state.
    pub trajectory: TrajectoryState,
    /// Lazily created damage holder.
    pub damage: Option<ImpactDamageData>,
    /// Layers the impact affects.
    pub impact_layers: LayerMask,
}

impl ImpactBody {
    /// Damage holder, created empty if absent.
    pub fn damage_mut(&mut self) -> &mut ImpactDamageData {
        self.damage.get_or_insert_with(ImpactDamageData::default)
    }

    /// Re-run local initialization with fresh motion state.
    pub fn initialize(&mut self, id: u32, velocity: Vec3, torque: Vec3, owner: Option<NetworkObjectId>) {
        self.id = id;
        self.trajectory.initialize(velocity, torque, owner);
    }

    /// Whether [`initialize`](Self::initialize) has run.
    pub fn is_initialized(&self) -> bool {
        self.trajectory.initialized
    }
}
