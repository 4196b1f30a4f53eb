//! Snapshot codec.
//!
//! A snapshot carries the active filter plus a bounded list of events,
//! newest first. Indices and derived state are never serialized; the store
//! rebuilds them on import.
//!
//! Two encodings are supported:
//! - JSON, for inspection and interop
//! - A binary envelope: magic, version byte, CRC32, then length-prefixed
//!   MessagePack frames (filter, next id, event count, one frame per event)
//!
//! Decoding is lenient about content and strict about framing. Event entries
//! that fail to decode are skipped and a damaged filter falls back to the
//! default, but a bad magic, version, or checksum rejects the whole snapshot.

use crate::error::{Result, StoreError};
use crate::filter::EventFilter;
use crate::types::{Event, EventId};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Magic bytes for binary snapshots.
const SNAPSHOT_MAGIC: &[u8; 4] = b"EVS\0";

/// Current snapshot format version.
const SNAPSHOT_VERSION: u8 = 2;

/// Version 1 payloads carry no id high-water mark.
const SNAPSHOT_VERSION_NO_NEXT_ID: u8 = 1;

/// Magic + version + checksum.
const HEADER_SIZE: usize = 4 + 1 + 4;

/// Serializable capture of a store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub filter: EventFilter,
    pub events: Vec<Event>,
    /// First id the exporting store had not handed out yet. Covers ids that
    /// were removed or fell outside the retained events.
    #[serde(default)]
    pub next_id: EventId,
}

/// Wire form used for lenient decoding.
#[derive(Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    filter: serde_json::Value,
    #[serde(default)]
    events: Vec<serde_json::Value>,
    #[serde(default)]
    next_id: serde_json::Value,
}

impl Snapshot {
    /// Snapshot whose id high-water mark sits just above its own events.
    pub fn new(filter: EventFilter, events: Vec<Event>) -> Self {
        let next_id = events
            .iter()
            .map(|e| EventId(e.id.0.saturating_add(1)))
            .max()
            .unwrap_or_default();
        Self {
            filter,
            events,
            next_id,
        }
    }

    /// Raise the id high-water mark, e.g. to the exporting store's counter.
    pub fn with_next_id(mut self, next_id: EventId) -> Self {
        self.next_id = self.next_id.max(next_id);
        self
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    // --- JSON ---

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawSnapshot =
            serde_json::from_str(json).map_err(|e| StoreError::Deserialization(e.to_string()))?;
        Ok(Self::from_raw(raw))
    }

    // --- Binary ---

    /// Encode as the framed binary envelope.
    ///
    /// The payload is the filter followed by one frame per event, each a
    /// little-endian `u32` length and a named MessagePack body, so entries
    /// can be decoded one at a time.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        write_frame(&mut payload, &rmp_serde::to_vec_named(&self.filter)?);
        payload.extend_from_slice(&self.next_id.0.to_le_bytes());
        payload.extend_from_slice(&(self.events.len() as u32).to_le_bytes());
        for event in &self.events {
            write_frame(&mut payload, &rmp_serde::to_vec_named(event)?);
        }
        let checksum = crc32fast::hash(&payload);

        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        buf.extend_from_slice(SNAPSHOT_MAGIC);
        buf.push(SNAPSHOT_VERSION);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::InvalidFormat("Snapshot too short".into()));
        }
        if &bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid snapshot magic".into()));
        }
        let version = bytes[4];
        if version != SNAPSHOT_VERSION && version != SNAPSHOT_VERSION_NO_NEXT_ID {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported snapshot version: {}",
                bytes[4]
            )));
        }

        let expected = read_u32(bytes, 5)?;
        let payload = &bytes[HEADER_SIZE..];
        let got = crc32fast::hash(payload);
        if expected != got {
            return Err(StoreError::ChecksumMismatch { expected, got });
        }

        let mut cursor = 0;
        let filter_frame = read_frame(payload, &mut cursor)?;
        let filter = rmp_serde::from_slice(filter_frame).unwrap_or_else(|e| {
            warn!(error = %e, "unreadable snapshot filter, using default");
            EventFilter::default()
        });

        let next_id = if version == SNAPSHOT_VERSION_NO_NEXT_ID {
            EventId::default()
        } else {
            let next_id = read_u64(payload, cursor)?;
            cursor += 8;
            EventId(next_id)
        };

        let count = read_u32(payload, cursor)? as usize;
        cursor += 4;

        let mut events = Vec::with_capacity(count.min(payload.len() / 4));
        for position in 0..count {
            let frame = read_frame(payload, &mut cursor)?;
            match rmp_serde::from_slice::<Event>(frame) {
                Ok(event) => events.push(event),
                Err(e) => warn!(position, error = %e, "skipping unreadable snapshot event"),
            }
        }
        if cursor != payload.len() {
            return Err(StoreError::InvalidFormat("Trailing bytes after snapshot".into()));
        }
        if events.len() < count {
            debug!(kept = events.len(), total = count, "snapshot decoded with skipped entries");
        }

        Ok(Self {
            filter,
            events,
            next_id,
        })
    }

    // --- Files ---

    /// Write the binary envelope to `path`, replacing it atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        let tmp = path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;

        debug!(path = %path.display(), events = self.events.len(), "snapshot saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    fn from_raw(raw: RawSnapshot) -> Self {
        let filter = if raw.filter.is_null() {
            EventFilter::default()
        } else {
            serde_json::from_value(raw.filter).unwrap_or_else(|e| {
                warn!(error = %e, "unreadable snapshot filter, using default");
                EventFilter::default()
            })
        };

        let total = raw.events.len();
        let events: Vec<Event> = raw
            .events
            .into_iter()
            .enumerate()
            .filter_map(|(position, value)| match serde_json::from_value(value) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(position, error = %e, "skipping unreadable snapshot event");
                    None
                }
            })
            .collect();

        if events.len() < total {
            debug!(kept = events.len(), total, "snapshot decoded with skipped entries");
        }

        let next_id = match raw.next_id {
            serde_json::Value::Null => EventId::default(),
            value => value.as_u64().map(EventId).unwrap_or_else(|| {
                warn!(%value, "unreadable snapshot next_id, deriving from events");
                EventId::default()
            }),
        };

        Self {
            filter,
            events,
            next_id,
        }
    }
}

fn write_frame(buf: &mut Vec<u8>, body: &[u8]) {
    buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
    buf.extend_from_slice(body);
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    let slice = bytes
        .get(at..at + 4)
        .ok_or_else(|| StoreError::InvalidFormat("Unexpected end of snapshot".into()))?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(slice);
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(bytes: &[u8], at: usize) -> Result<u64> {
    let slice = bytes
        .get(at..at + 8)
        .ok_or_else(|| StoreError::InvalidFormat("Unexpected end of snapshot".into()))?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(slice);
    Ok(u64::from_le_bytes(buf))
}

/// Read one length-prefixed frame and advance `cursor` past it.
fn read_frame<'a>(bytes: &'a [u8], cursor: &mut usize) -> Result<&'a [u8]> {
    let len = read_u32(bytes, *cursor)? as usize;
    let start = *cursor + 4;
    let frame = bytes
        .get(start..start + len)
        .ok_or_else(|| StoreError::InvalidFormat("Snapshot frame overruns payload".into()))?;
    *cursor = start + len;
    Ok(frame)
}
