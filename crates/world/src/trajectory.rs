//! Kinetic state of a moving object.

use spawnsync_core::{NetworkObjectId, Vec3};

/// Velocity, torque and owner of a thrown, fired or dropped object.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrajectoryState {
    /// Linear velocity.
    pub velocity: Vec3,
    /// Angular torque.
    pub torque: Vec3,
    /// Entity that launched the object, if any.
    pub owner: Option<NetworkObjectId>,
    /// Set once any initialization has run.
    pub initialized: bool,
}

impl TrajectoryState {
    /// Reset motion to the given values.
    pub fn initialize(&mut self, velocity: Vec3, torque: Vec3, owner: Option<NetworkObjectId>) {
        self.velocity = velocity;
        self.torque = torque;
        self.owner = owner;
        self.initialized = true;
    }
}
