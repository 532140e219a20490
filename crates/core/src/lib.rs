#![warn(missing_docs)]
//! Core primitives shared across the workspace.

pub mod item;
pub mod registry;

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use glam::{Quat, Vec3};
pub use item::{ItemDefinition, ItemTypeId, ItemTypeRegistry, RegistryError};
pub use registry::{RegistryKey, RegistryKeyError};

/// Identity of a network endpoint (the server or one connected client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointId(pub u64);

impl EndpointId {
    /// The dedicated server endpoint.
    pub const SERVER: Self = Self(0);

    /// Whether this endpoint is the server.
    pub fn is_server(self) -> bool {
        self == Self::SERVER
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_server() {
            write!(f, "server")
        } else {
            write!(f, "client#{}", self.0)
        }
    }
}

/// Identifier of a replicated object, stable across every endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkObjectId(pub u64);

impl fmt::Display for NetworkObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Simulation clock reading in seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct SimTime(pub f32);

impl SimTime {
    /// Start of every timeline.
    pub const ZERO: Self = Self(0.0);

    /// Advance by `seconds`.
    pub fn advance(self, seconds: f32) -> Self {
        Self(self.0 + seconds)
    }

    /// Seconds from `self` until `later` (negative when `later` is in the past).
    pub fn until(self, later: SimTime) -> f32 {
        later.0 - self.0
    }
}

/// Bit mask of physics layers an impact can affect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LayerMask(pub i32);

impl LayerMask {
    /// Mask matching every layer.
    pub const EVERYTHING: Self = Self(-1);

    /// Whether `layer` (0..32) is part of the mask.
    pub fn contains(self, layer: u32) -> bool {
        layer < 32 && (self.0 as u32) & (1 << layer) != 0
    }
}

/// Helper to derive a reproducible RNG for a scenario seed and object.
pub fn scoped_rng(seed: u64, object: NetworkObjectId) -> StdRng {
    StdRng::seed_from_u64(seed ^ object.0.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}
