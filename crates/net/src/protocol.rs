//! Request/response messages exchanged by the sync coordinator.
//!
//! The requester's identity is never part of a message: receivers take it
//! from the transport's sender metadata.

use crate::records::{ItemPickupRecord, PayloadKind, MAX_PICKUP_ITEMS};
use serde::{Deserialize, Serialize};
use spawnsync_core::NetworkObjectId;

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u16 = 1;

/// Protocol magic bytes mixed into the schema hash.
pub const PROTOCOL_MAGIC: &[u8; 8] = b"SPSY\x00\x01\x00\x00";

/// Largest record payload any kind can produce.
pub const MAX_PAYLOAD_LEN: usize = ItemPickupRecord::encoded_len_for(MAX_PICKUP_ITEMS);

/// Messages of the catch-up exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Observer asks the authority for an object's state.
    Ping {
        /// Object whose state is requested.
        object: NetworkObjectId,
        /// Kind the requester expects.
        kind: PayloadKind,
    },
    /// Authority answers one requester with an encoded record.
    Pong {
        /// Object the record belongs to.
        object: NetworkObjectId,
        /// Kind of the encoded record.
        kind: PayloadKind,
        /// Fixed-width record bytes.
        payload: Vec<u8>,
    },
}

impl SyncMessage {
    /// Object the message refers to.
    pub fn object(&self) -> NetworkObjectId {
        match self {
            SyncMessage::Ping { object, .. } | SyncMessage::Pong { object, .. } => *object,
        }
    }

    /// Verify message limits.
    ///
    /// Called on every received message before it reaches an object.
    pub fn verify(&self) -> Result<(), &'static str> {
        if let SyncMessage::Pong { kind, payload, .. } = self {
            if payload.len() > MAX_PAYLOAD_LEN {
                return Err("Payload too large");
            }
            if let Some(len) = kind.fixed_encoded_len() {
                if payload.len() != len {
                    return Err("Payload size does not match record kind");
                }
            } else if payload.len() < ItemPickupRecord::FIXED_LEN {
                return Err("Pickup payload too short");
            }
        }
        Ok(())
    }
}
