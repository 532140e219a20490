//! The payload capability every synchronizable object implements.
//!
//! `C` is the simulation context the object reads from and writes to; the
//! coordinator never looks inside it.

use crate::records::{PayloadKind, SyncRecord};
use crate::wire::{CodecError, PayloadReader, PayloadWriter};
use glam::Vec3;
use spawnsync_core::NetworkObjectId;
use thiserror::Error;

/// Bytes of the spawn payload header: object index + spawn position.
pub const SPAWN_HEADER_LEN: usize = 4 + 12;

/// Reasons a received record could not be applied.
///
/// None of these are fatal; the record is dropped and the object keeps its
/// previous state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The record was produced for a different object kind.
    #[error("expected a {expected} record, got {found}")]
    KindMismatch {
        /// Kind of the receiving object.
        expected: PayloadKind,
        /// Kind of the record.
        found: PayloadKind,
    },
    /// The record names no owner but the object requires one.
    #[error("record has no owner")]
    NoOwner,
    /// The owner despawned between request and reply.
    #[error("owner {0} is not resolvable")]
    StaleOwner(NetworkObjectId),
    /// The owner has no inventory.
    #[error("owner {0} has no inventory")]
    MissingInventory(NetworkObjectId),
    /// No item is active in the slot.
    #[error("no active item in slot {slot}")]
    NoActiveItem {
        /// Slot index.
        slot: i32,
    },
    /// The active item has no such action.
    #[error("item in slot {slot} has no action {action}")]
    UnknownAction {
        /// Slot index.
        slot: i32,
        /// Action id.
        action: i32,
    },
    /// The action exists but is not a magic action.
    #[error("action {action} is not a magic action")]
    NotMagicAction {
        /// Action id.
        action: i32,
    },
    /// The item type id is not registered.
    #[error("unknown item type {0}")]
    UnknownItemType(u32),
}

/// Failures while turning received bytes into applied state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// The bytes did not decode as a record of the expected kind.
    #[error("undecodable payload: {0}")]
    Decode(#[from] CodecError),
    /// The record decoded but could not be applied.
    #[error("payload rejected: {0}")]
    Apply(#[from] ApplyError),
}

/// Header written ahead of the record in a spawn payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnHeader {
    /// Index of the object in the spawner's stream.
    pub index: i32,
    /// Spawn position.
    pub position: Vec3,
}

/// Produce/apply/size contract shared by every synchronizable kind.
pub trait PayloadCapability<C> {
    /// Kind of records this object produces and accepts.
    fn kind(&self) -> PayloadKind;

    /// Snapshot the object's current authoritative state.
    fn produce(&self, ctx: &C) -> SyncRecord;

    /// Mutate local state to match `record`.
    ///
    /// Must leave the object untouched on error, and applying the same record
    /// twice must end in the same state as applying it once.
    fn apply(&mut self, record: &SyncRecord, ctx: &mut C) -> Result<(), ApplyError>;

    /// Worst-case encoded size of the record [`produce`](Self::produce) would
    /// return right now.
    fn max_encoded_size(&self) -> usize;

    /// Produce and encode a record into a buffer sized by
    /// [`max_encoded_size`](Self::max_encoded_size).
    fn encode_payload(&self, ctx: &C) -> Result<Vec<u8>, CodecError> {
        let mut writer = PayloadWriter::with_capacity(self.max_encoded_size());
        writer.write(&self.produce(ctx))?;
        Ok(writer.into_bytes())
    }

    /// Decode a record of this object's kind and apply it.
    fn apply_payload(&mut self, bytes: &[u8], ctx: &mut C) -> Result<(), PayloadError> {
        let record = SyncRecord::decode(self.kind(), bytes)?;
        self.apply(&record, ctx)?;
        Ok(())
    }

    /// Buffer size needed by [`write_spawn_payload`](Self::write_spawn_payload).
    fn spawn_payload_size(&self) -> usize {
        SPAWN_HEADER_LEN + self.max_encoded_size()
    }

    /// Write `[index][position][record]` for delivery alongside a spawn.
    fn write_spawn_payload(&self, header: SpawnHeader, ctx: &C) -> Result<Vec<u8>, CodecError> {
        let mut writer = PayloadWriter::with_capacity(self.spawn_payload_size());
        writer.write(&header.index)?;
        writer.write(&header.position)?;
        writer.write(&self.produce(ctx))?;
        Ok(writer.into_bytes())
    }

    /// Read a spawn payload, apply its record and return the header.
    fn read_spawn_payload(&mut self, bytes: &[u8], ctx: &mut C) -> Result<SpawnHeader, PayloadError> {
        let mut reader = PayloadReader::new(bytes);
        let header = SpawnHeader {
            index: reader.read()?,
            position: reader.read()?,
        };
        let record = SyncRecord::decode_from(self.kind(), &mut reader)?;
        reader.finish()?;
        self.apply(&record, ctx)?;
        Ok(header)
    }
}

/// Check that `record` has the `expected` kind.
pub fn expect_kind(expected: PayloadKind, record: &SyncRecord) -> Result<(), ApplyError> {
    match record.kind() {
        found if found == expected => Ok(()),
        found => Err(ApplyError::KindMismatch { expected, found }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::MagicParticleRecord;

    /// Minimal capability that stores the last applied particle record.
    struct Recorder {
        current: MagicParticleRecord,
        applied: u32,
    }

    impl PayloadCapability<()> for Recorder {
        fn kind(&self) -> PayloadKind {
            PayloadKind::MagicParticle
        }

        fn produce(&self, _ctx: &()) -> SyncRecord {
            SyncRecord::MagicParticle(self.current)
        }

        fn apply(&mut self, record: &SyncRecord, _ctx: &mut ()) -> Result<(), ApplyError> {
            expect_kind(self.kind(), record)?;
            if let SyncRecord::MagicParticle(record) = record {
                self.current = *record;
                self.applied += 1;
            }
            Ok(())
        }

        fn max_encoded_size(&self) -> usize {
            MagicParticleRecord::ENCODED_LEN
        }
    }

    fn recorder(cast_id: u32) -> Recorder {
        Recorder {
            current: MagicParticleRecord {
                owner: Some(NetworkObjectId(1)),
                slot_id: 0,
                action_id: 2,
                action_index: 1,
                cast_id,
            },
            applied: 0,
        }
    }

    #[test]
    fn payload_round_trip_through_capability() {
        let source = recorder(77);
        let bytes = source.encode_payload(&()).unwrap();
        assert_eq!(bytes.len(), source.max_encoded_size());

        let mut target = recorder(0);
        target.apply_payload(&bytes, &mut ()).unwrap();
        assert_eq!(target.current.cast_id, 77);
        assert_eq!(target.applied, 1);
    }

    #[test]
    fn spawn_payload_carries_header() {
        let source = recorder(5);
        let header = SpawnHeader {
            index: 12,
            position: Vec3::new(4.0, 0.0, -1.0),
        };
        let bytes = source.write_spawn_payload(header, &()).unwrap();
        assert_eq!(bytes.len(), source.spawn_payload_size());

        let mut target = recorder(0);
        let decoded = target.read_spawn_payload(&bytes, &mut ()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(target.current.cast_id, 5);
    }

    #[test]
    fn truncated_payload_is_not_applied() {
        let bytes = recorder(9).encode_payload(&()).unwrap();
        let mut target = recorder(0);
        let err = target.apply_payload(&bytes[..10], &mut ()).unwrap_err();
        assert!(matches!(err, PayloadError::Decode(_)));
        assert_eq!(target.applied, 0);
    }

    #[test]
    fn kind_mismatch_reported() {
        let record = SyncRecord::MagicParticle(recorder(1).current);
        assert_eq!(
            expect_kind(PayloadKind::Grenade, &record),
            Err(ApplyError::KindMismatch {
                expected: PayloadKind::Grenade,
                found: PayloadKind::MagicParticle
            })
        );
    }
}
