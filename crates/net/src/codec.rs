//! Sync message framing.
//!
//! Frame format: `[length: u32][message_type: u8][postcard body]` where the
//! body is `(schema_hash, message)`.

use crate::protocol::{SyncMessage, PROTOCOL_MAGIC, PROTOCOL_VERSION};
use crate::records::{GrenadeRecord, ItemPickupRecord, MagicParticleRecord, ProjectileRecord};
use std::sync::OnceLock;
use thiserror::Error;

/// Bytes in the frame header (length + message type).
pub const FRAME_HEADER_LEN: usize = 5;

/// Framing failures. Receivers drop the frame and carry on.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Fewer bytes than a frame header.
    #[error("frame too short: {0} bytes (minimum 5)")]
    TooShort(usize),
    /// The length prefix promises more bytes than were received.
    #[error("incomplete frame: expected {expected} bytes, got {actual}")]
    Incomplete {
        /// Bytes announced by the prefix.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },
    /// The message type tag disagrees with the decoded body.
    #[error("message type tag {tag} does not match body (expected {expected})")]
    TagMismatch {
        /// Tag in the header.
        tag: u8,
        /// Tag implied by the body.
        expected: u8,
    },
    /// The sender was built against a different record layout.
    #[error("schema hash mismatch: local {local:#018x}, remote {remote:#018x}")]
    SchemaMismatch {
        /// Our hash.
        local: u64,
        /// Sender's hash.
        remote: u64,
    },
    /// The message failed its limit checks.
    #[error("invalid message: {0}")]
    Invalid(&'static str),
    /// Postcard serialization failure.
    #[error("postcard: {0}")]
    Postcard(#[from] postcard::Error),
}

/// Compute the schema hash from the protocol's record layout.
///
/// Endpoints that disagree on any record size cannot exchange payloads.
pub fn compute_schema_hash() -> u64 {
    static HASH: OnceLock<u64> = OnceLock::new();
    *HASH.get_or_init(|| {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&PROTOCOL_VERSION.to_le_bytes());
        hasher.update(PROTOCOL_MAGIC);
        for (name, len) in [
            ("GrenadeRecord", GrenadeRecord::ENCODED_LEN),
            ("ItemPickupRecord", ItemPickupRecord::FIXED_LEN),
            ("PickupEntry", ItemPickupRecord::ENTRY_LEN),
            ("MagicParticleRecord", MagicParticleRecord::ENCODED_LEN),
            ("ProjectileRecord", ProjectileRecord::ENCODED_LEN),
        ] {
            hasher.update(name.as_bytes());
            hasher.update(&(len as u32).to_le_bytes());
        }
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(head)
    })
}

/// Encode a sync message with its length prefix.
pub fn encode_frame(msg: &SyncMessage) -> Result<Vec<u8>, FrameError> {
    let body = postcard::to_allocvec(&(compute_schema_hash(), msg))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    let length = (1 + body.len()) as u32;
    frame.extend_from_slice(&length.to_le_bytes());
    frame.push(message_type_tag(msg));
    frame.extend_from_slice(&body);

    Ok(frame)
}

/// Decode and verify a sync message frame.
pub fn decode_frame(data: &[u8]) -> Result<SyncMessage, FrameError> {
    if data.len() < FRAME_HEADER_LEN {
        return Err(FrameError::TooShort(data.len()));
    }

    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if length == 0 || data.len() - 4 < length {
        return Err(FrameError::Incomplete {
            expected: 4 + length,
            actual: data.len(),
        });
    }

    let tag = data[4];
    let (remote, msg): (u64, SyncMessage) = postcard::from_bytes(&data[FRAME_HEADER_LEN..4 + length])?;

    let local = compute_schema_hash();
    if remote != local {
        return Err(FrameError::SchemaMismatch { local, remote });
    }
    let expected = message_type_tag(&msg);
    if tag != expected {
        return Err(FrameError::TagMismatch { tag, expected });
    }
    msg.verify().map_err(FrameError::Invalid)?;

    Ok(msg)
}

/// Get the message type tag.
fn message_type_tag(msg: &SyncMessage) -> u8 {
    match msg {
        SyncMessage::Ping { .. } => 0,
        SyncMessage::Pong { .. } => 1,
    }
}
