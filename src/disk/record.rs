//! Log record format
//!
//! Binary format (little endian):
//! `[op u8][flags u8][expires_at u64][id_len u32][id][payload_len u32][payload][checksum u64]`
//!
//! The checksum is the xxhash64 of every preceding byte of the record.

use thiserror::Error;

use crate::cache::StorageIdentifier;
use crate::error::CacheError;

/// Bytes before the identifier: op, flags, expires_at, id_len.
const HEADER_LEN: usize = 1 + 1 + 8 + 4;
const CHECKSUM_LEN: usize = 8;
/// Flag bit set when `expires_at` carries a timestamp.
const FLAG_EXPIRES: u8 = 0b0000_0001;

/// Log operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogOperation {
    /// Entry stored or overwritten
    Put = 1,
    /// Entry removed
    Remove = 2,
}

impl LogOperation {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(LogOperation::Put),
            2 => Some(LogOperation::Remove),
            _ => None,
        }
    }
}

/// Reasons a record could not be decoded.
///
/// During replay any of these marks the end of the usable log.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record truncated")]
    Truncated,
    #[error("unknown operation type {0}")]
    UnknownOperation(u8),
    #[error("identifier is not valid UTF-8")]
    InvalidIdentifier,
    #[error("checksum mismatch: stored {stored:#x}, computed {computed:#x}")]
    Checksum { stored: u64, computed: u64 },
}

/// One entry of the data log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub op: LogOperation,
    pub id: StorageIdentifier,
    /// Absolute expiration in Unix milliseconds
    pub expires_at: Option<u64>,
    /// bincode-encoded value; empty for removals
    pub payload: Vec<u8>,
}

impl LogRecord {
    pub fn put(id: StorageIdentifier, payload: Vec<u8>, expires_at: Option<u64>) -> Self {
        LogRecord {
            op: LogOperation::Put,
            id,
            expires_at,
            payload,
        }
    }

    pub fn remove(id: StorageIdentifier) -> Self {
        LogRecord {
            op: LogOperation::Remove,
            id,
            expires_at: None,
            payload: Vec::new(),
        }
    }

    /// Offset of the payload from the start of the encoded record.
    pub fn payload_offset(&self) -> usize {
        HEADER_LEN + self.id.as_bytes().len() + 4
    }

    /// Serialize to bytes with checksum.
    ///
    /// Fails when the identifier or payload does not fit a `u32` length field.
    pub fn to_bytes(&self) -> crate::error::Result<Vec<u8>> {
        let id = self.id.as_bytes();
        let mut buf =
            Vec::with_capacity(HEADER_LEN + id.len() + 4 + self.payload.len() + CHECKSUM_LEN);

        buf.push(self.op as u8);
        match self.expires_at {
            Some(expires) => {
                buf.push(FLAG_EXPIRES);
                buf.extend_from_slice(&expires.to_le_bytes());
            }
            None => {
                buf.push(0);
                buf.extend_from_slice(&0u64.to_le_bytes());
            }
        }

        buf.extend_from_slice(&length_field(id.len(), "identifier")?);
        buf.extend_from_slice(id);

        buf.extend_from_slice(&length_field(self.payload.len(), "payload")?);
        buf.extend_from_slice(&self.payload);

        let checksum = xxhash_rust::xxh64::xxh64(&buf, 0);
        buf.extend_from_slice(&checksum.to_le_bytes());

        Ok(buf)
    }

    /// Deserialize from bytes with checksum verification.
    ///
    /// Returns the record and the number of bytes it occupied.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), RecordError> {
        let mut pos = 0;

        let op_byte = take(data, &mut pos, 1)?[0];
        let flags = take(data, &mut pos, 1)?[0];
        let expires = read_u64(data, &mut pos)?;

        let id_len = read_u32(data, &mut pos)? as usize;
        let id_bytes = take(data, &mut pos, id_len)?.to_vec();

        let payload_len = read_u32(data, &mut pos)? as usize;
        let payload = take(data, &mut pos, payload_len)?.to_vec();

        let body_len = pos;
        let stored = read_u64(data, &mut pos)?;
        let computed = xxhash_rust::xxh64::xxh64(&data[..body_len], 0);
        if stored != computed {
            return Err(RecordError::Checksum { stored, computed });
        }

        // Only trust the body once the checksum has matched
        let op = LogOperation::from_u8(op_byte).ok_or(RecordError::UnknownOperation(op_byte))?;
        let id = String::from_utf8(id_bytes).map_err(|_| RecordError::InvalidIdentifier)?;
        let expires_at = (flags & FLAG_EXPIRES != 0).then_some(expires);

        Ok((
            LogRecord {
                op,
                id: StorageIdentifier::from_raw(id),
                expires_at,
                payload,
            },
            pos,
        ))
    }
}

/// Encodes a length prefix, refusing lengths a `u32` cannot hold.
fn length_field(len: usize, what: &str) -> crate::error::Result<[u8; 4]> {
    let len = u32::try_from(len).map_err(|_| {
        CacheError::Serialization(format!("{} of {} bytes exceeds the record limit", what, len))
    })?;
    Ok(len.to_le_bytes())
}

fn take<'a>(data: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8], RecordError> {
    let end = pos.checked_add(len).ok_or(RecordError::Truncated)?;
    let slice = data.get(*pos..end).ok_or(RecordError::Truncated)?;
    *pos = end;
    Ok(slice)
}

fn read_u32(data: &[u8], pos: &mut usize) -> Result<u32, RecordError> {
    let bytes = take(data, pos, 4)?;
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(raw))
}

fn read_u64(data: &[u8], pos: &mut usize) -> Result<u64, RecordError> {
    let bytes = take(data, pos, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(raw))
}
