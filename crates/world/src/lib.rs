//! Synchronizable simulation objects and the context they run in.
//!
//! Each object kind implements [`spawnsync_net::PayloadCapability`] over
//! [`SimContext`]; [`ObjectTable`] exposes them to the coordinator.

mod character;
mod context;
mod grenade;
mod impact;
mod item_pickup;
mod magic_particle;
mod object;
mod pool;
mod projectile;
mod scheduler;
mod sim;
mod trajectory;

pub use character::{Character, CharacterDirectory, CharacterItem, Inventory, ItemAction, MagicAction};
pub use context::SimContext;
pub use grenade::Grenade;
pub use impact::{ImpactBody, ImpactDamageData};
pub use item_pickup::{ItemAmount, ItemPickup};
pub use magic_particle::{CastSource, MagicParticle, ParticleBinding};
pub use object::{ObjectTable, SyncObject};
pub use pool::ObjectPool;
pub use projectile::Projectile;
pub use scheduler::{ScheduleHandle, ScheduledAction, Scheduler};
pub use sim::SimWorld;
pub use trajectory::TrajectoryState;
