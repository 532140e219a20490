#![warn(missing_docs)]
//! Late-join catch-up protocol: payload records, framing, transport
//! boundary and the per-endpoint coordinator.

pub mod capability;
pub mod codec;
pub mod coordinator;
pub mod protocol;
pub mod records;
pub mod transport;
pub mod wire;

pub use capability::{expect_kind, ApplyError, PayloadCapability, PayloadError, SpawnHeader, SPAWN_HEADER_LEN};
pub use codec::{compute_schema_hash, decode_frame, encode_frame, FrameError, FRAME_HEADER_LEN};
pub use coordinator::{
    AuthorityRole, CapabilitySource, DropReason, HandleOutcome, RetryPolicy, SpawnInfo, SyncCoordinator, SyncError,
    SyncState, SyncStats,
};
pub use protocol::{SyncMessage, MAX_PAYLOAD_LEN, PROTOCOL_MAGIC, PROTOCOL_VERSION};
pub use records::{
    GrenadeRecord, ItemPickupRecord, MagicParticleRecord, PayloadKind, PickupEntry, ProjectileRecord, SyncRecord,
    MAX_PICKUP_ITEMS, NO_DEACTIVATION,
};
pub use transport::{Delivery, Inbound, LoopbackNetwork, LoopbackTransport, Transport, TransportError};
pub use wire::{CodecError, PayloadReader, PayloadWriter, StateName, WireDecode, WireEncode};
