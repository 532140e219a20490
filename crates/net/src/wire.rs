//! Fixed-width little-endian payload primitives.
//!
//! Every record is written into a [`PayloadWriter`] whose capacity is fixed up
//! front from the producing object's size formula. Writing past that capacity
//! is an encoder bug and surfaces as [`CodecError::CapacityExceeded`].

use glam::{Quat, Vec3};
use spawnsync_core::NetworkObjectId;
use std::fmt;
use thiserror::Error;

/// Encoded width of `i32`.
pub const I32_WIDTH: usize = 4;
/// Encoded width of `u32`.
pub const U32_WIDTH: usize = 4;
/// Encoded width of `f32`.
pub const F32_WIDTH: usize = 4;
/// Encoded width of a [`Vec3`].
pub const VEC3_WIDTH: usize = 3 * F32_WIDTH;
/// Encoded width of a [`Quat`].
pub const QUAT_WIDTH: usize = 4 * F32_WIDTH;
/// Encoded width of an owner reference: presence byte + object id.
pub const OWNER_WIDTH: usize = 1 + 8;
/// Maximum UTF-8 bytes carried by a [`StateName`].
pub const STATE_NAME_MAX_LEN: usize = 62;
/// Encoded width of a [`StateName`]: `u16` length + padded bytes.
pub const STATE_NAME_WIDTH: usize = 2 + STATE_NAME_MAX_LEN;

/// Errors raised by the payload codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A write would overrun the buffer allocated for the record.
    #[error("payload buffer overrun: capacity {capacity} bytes, write needs {required}")]
    CapacityExceeded {
        /// Allocated capacity.
        capacity: usize,
        /// Total bytes the write required.
        required: usize,
    },
    /// The input ended before a field was complete.
    #[error("payload truncated: need {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes the field needs.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },
    /// A state name exceeds [`STATE_NAME_MAX_LEN`].
    #[error("state name is {len} bytes (max {max})")]
    StateNameTooLong {
        /// Offending length.
        len: usize,
        /// Allowed maximum.
        max: usize,
    },
    /// A state name is not valid UTF-8.
    #[error("state name is not valid UTF-8")]
    InvalidUtf8,
    /// A pickup carries more entries than the protocol allows.
    #[error("pickup carries {count} items (max {max})")]
    TooManyItems {
        /// Declared count.
        count: usize,
        /// Allowed maximum.
        max: usize,
    },
    /// The owner presence byte is neither 0 nor 1.
    #[error("invalid owner presence flag {0}")]
    InvalidOwnerFlag(u8),
    /// Bytes were left over after the record was decoded.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

/// Types with a fixed little-endian wire representation.
pub trait WireEncode {
    /// Append `self` to `writer`.
    fn encode(&self, writer: &mut PayloadWriter) -> Result<(), CodecError>;
}

/// Types that can be read back from their wire representation.
pub trait WireDecode: Sized {
    /// Read one value from `reader`.
    fn decode(reader: &mut PayloadReader<'_>) -> Result<Self, CodecError>;
}

/// Bounded output buffer for one payload.
///
/// The buffer is owned by the writer and released when the writer (or the
/// bytes taken from it) is dropped, on every exit path.
#[derive(Debug)]
pub struct PayloadWriter {
    buf: Vec<u8>,
    capacity: usize,
}

impl PayloadWriter {
    /// Allocate a writer that accepts at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Fixed capacity chosen at allocation.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append raw bytes, failing if they do not fit.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let required = self.buf.len() + bytes.len();
        if required > self.capacity {
            return Err(CodecError::CapacityExceeded {
                capacity: self.capacity,
                required,
            });
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Append an encodable value.
    pub fn write<T: WireEncode + ?Sized>(&mut self, value: &T) -> Result<(), CodecError> {
        value.encode(self)
    }

    /// Written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over an untrusted payload.
#[derive(Debug, Clone)]
pub struct PayloadReader<'a> {
    data: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    /// Start reading `data` from the beginning.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    /// Consume exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.data.len() < len {
            return Err(CodecError::UnexpectedEof {
                needed: len,
                remaining: self.data.len(),
            });
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read one decodable value.
    pub fn read<T: WireDecode>(&mut self) -> Result<T, CodecError> {
        T::decode(self)
    }

    /// Require that the whole input was consumed.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.data.len() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

macro_rules! le_scalar {
    ($($ty:ty),*) => {$(
        impl WireEncode for $ty {
            fn encode(&self, writer: &mut PayloadWriter) -> Result<(), CodecError> {
                writer.write_bytes(&self.to_le_bytes())
            }
        }

        impl WireDecode for $ty {
            fn decode(reader: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
                Ok(<$ty>::from_le_bytes(reader.take()?))
            }
        }
    )*};
}

le_scalar!(u8, u16, i32, u32, u64, f32);

impl WireEncode for Vec3 {
    fn encode(&self, writer: &mut PayloadWriter) -> Result<(), CodecError> {
        for c in self.to_array() {
            writer.write(&c)?;
        }
        Ok(())
    }
}

impl WireDecode for Vec3 {
    fn decode(reader: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
        Ok(Vec3::new(reader.read()?, reader.read()?, reader.read()?))
    }
}

impl WireEncode for Quat {
    fn encode(&self, writer: &mut PayloadWriter) -> Result<(), CodecError> {
        for c in self.to_array() {
            writer.write(&c)?;
        }
        Ok(())
    }
}

impl WireDecode for Quat {
    fn decode(reader: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
        Ok(Quat::from_xyzw(
            reader.read()?,
            reader.read()?,
            reader.read()?,
            reader.read()?,
        ))
    }
}

/// Owner references are `None` when the object has no (networked) owner.
impl WireEncode for Option<NetworkObjectId> {
    fn encode(&self, writer: &mut PayloadWriter) -> Result<(), CodecError> {
        match self {
            Some(id) => {
                writer.write(&1u8)?;
                writer.write(&id.0)
            }
            None => {
                writer.write(&0u8)?;
                writer.write(&0u64)
            }
        }
    }
}

impl WireDecode for Option<NetworkObjectId> {
    fn decode(reader: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
        let flag: u8 = reader.read()?;
        let id: u64 = reader.read()?;
        match flag {
            0 => Ok(None),
            1 => Ok(Some(NetworkObjectId(id))),
            other => Err(CodecError::InvalidOwnerFlag(other)),
        }
    }
}

/// Short textual state token with a bounded wire size.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct StateName(String);

impl StateName {
    /// Wrap `name`, rejecting names longer than [`STATE_NAME_MAX_LEN`] bytes.
    pub fn new(name: impl Into<String>) -> Result<Self, CodecError> {
        let name = name.into();
        if name.len() > STATE_NAME_MAX_LEN {
            return Err(CodecError::StateNameTooLong {
                len: name.len(),
                max: STATE_NAME_MAX_LEN,
            });
        }
        Ok(Self(name))
    }

    /// Copy `name`, cutting it at the last char boundary that fits.
    pub fn truncated(name: &str) -> Self {
        let mut end = name.len().min(STATE_NAME_MAX_LEN);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        Self(name[..end].to_string())
    }

    /// Borrow the token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl WireEncode for StateName {
    fn encode(&self, writer: &mut PayloadWriter) -> Result<(), CodecError> {
        let bytes = self.0.as_bytes();
        writer.write(&(bytes.len() as u16))?;
        writer.write_bytes(bytes)?;
        writer.write_bytes(&[0u8; STATE_NAME_MAX_LEN][bytes.len()..])
    }
}

impl WireDecode for StateName {
    fn decode(reader: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
        let len = reader.read::<u16>()? as usize;
        let padded = reader.read_bytes(STATE_NAME_MAX_LEN)?;
        if len > STATE_NAME_MAX_LEN {
            return Err(CodecError::StateNameTooLong {
                len,
                max: STATE_NAME_MAX_LEN,
            });
        }
        let text = std::str::from_utf8(&padded[..len]).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(Self(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_rejects_overrun() {
        let mut writer = PayloadWriter::with_capacity(6);
        writer.write(&7u32).unwrap();
        let err = writer.write(&1.5f32).unwrap_err();
        assert_eq!(
            err,
            CodecError::CapacityExceeded {
                capacity: 6,
                required: 8
            }
        );
        assert_eq!(writer.len(), 4);
    }

    #[test]
    fn scalars_are_little_endian() {
        let mut writer = PayloadWriter::with_capacity(8);
        writer.write(&0x0403_0201u32).unwrap();
        writer.write(&-1i32).unwrap();
        assert_eq!(writer.as_bytes(), &[1, 2, 3, 4, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn vectors_have_fixed_width() {
        let mut writer = PayloadWriter::with_capacity(VEC3_WIDTH + QUAT_WIDTH);
        writer.write(&Vec3::new(1.0, -2.0, 3.5)).unwrap();
        writer.write(&Quat::from_rotation_y(0.5)).unwrap();
        assert_eq!(writer.len(), VEC3_WIDTH + QUAT_WIDTH);

        let bytes = writer.into_bytes();
        let mut reader = PayloadReader::new(&bytes);
        assert_eq!(reader.read::<Vec3>().unwrap(), Vec3::new(1.0, -2.0, 3.5));
        assert_eq!(reader.read::<Quat>().unwrap(), Quat::from_rotation_y(0.5));
        reader.finish().unwrap();
    }

    #[test]
    fn owner_reference_is_always_nine_bytes() {
        for owner in [None, Some(NetworkObjectId(42))] {
            let mut writer = PayloadWriter::with_capacity(OWNER_WIDTH);
            writer.write(&owner).unwrap();
            assert_eq!(writer.len(), OWNER_WIDTH);
            let bytes = writer.into_bytes();
            let decoded: Option<NetworkObjectId> = PayloadReader::new(&bytes).read().unwrap();
            assert_eq!(decoded, owner);
        }
    }

    #[test]
    fn owner_flag_must_be_boolean() {
        let bytes = [2u8, 0, 0, 0, 0, 0, 0, 0, 0];
        let err = PayloadReader::new(&bytes)
            .read::<Option<NetworkObjectId>>()
            .unwrap_err();
        assert_eq!(err, CodecError::InvalidOwnerFlag(2));
    }

    #[test]
    fn state_name_is_padded() {
        let name = StateName::new("Stunned").unwrap();
        let mut writer = PayloadWriter::with_capacity(STATE_NAME_WIDTH);
        writer.write(&name).unwrap();
        assert_eq!(writer.len(), STATE_NAME_WIDTH);
        let bytes = writer.into_bytes();
        assert_eq!(PayloadReader::new(&bytes).read::<StateName>().unwrap(), name);
    }

    #[test]
    fn state_name_length_limits() {
        assert!(StateName::new("x".repeat(STATE_NAME_MAX_LEN)).is_ok());
        assert!(matches!(
            StateName::new("x".repeat(STATE_NAME_MAX_LEN + 1)),
            Err(CodecError::StateNameTooLong { len: 63, max: 62 })
        ));
        // 'é' is two bytes; 40 of them cannot be cut in half.
        let truncated = StateName::truncated(&"é".repeat(40));
        assert_eq!(truncated.as_str().len(), 62);
        assert!(truncated.as_str().chars().all(|c| c == 'é'));
    }

    #[test]
    fn state_name_rejects_oversized_length_prefix() {
        let mut bytes = vec![0u8; STATE_NAME_WIDTH];
        bytes[0] = 200;
        let err = PayloadReader::new(&bytes).read::<StateName>().unwrap_err();
        assert!(matches!(err, CodecError::StateNameTooLong { len: 200, .. }));
    }

    #[test]
    fn reader_reports_truncation() {
        let mut reader = PayloadReader::new(&[1, 2]);
        assert_eq!(
            reader.read::<u32>().unwrap_err(),
            CodecError::UnexpectedEof {
                needed: 4,
                remaining: 2
            }
        );
    }

    #[test]
    fn finish_rejects_trailing_bytes() {
        let mut reader = PayloadReader::new(&[0, 0, 0, 0, 9]);
        reader.read::<u32>().unwrap();
        assert_eq!(reader.finish().unwrap_err(), CodecError::TrailingBytes(1));
    }
}
