use crate::status::SystemStatus;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;

/// Maximum number of buffered messages.
pub const BUS_CAPACITY: usize = 100;
/// Maximum payload bytes per message frame.
pub const MAX_FRAME_PAYLOAD: usize = 8;

/// Occupancy above which `tick()` evicts the whole buffer.
const CLEAR_THRESHOLD: usize = BUS_CAPACITY * 4 / 5;
/// Load percentage above which `tick()` reports WARNING.
const WARNING_LOAD_PERCENT: f32 = 90.0;

const_assert!(CLEAR_THRESHOLD < BUS_CAPACITY);
const_assert!(CLEAR_THRESHOLD > 0);

/// Fixed channel identifiers per producing module. These are an externally
/// visible contract: consumers match on the raw id.
pub mod channel {
    pub const ENGINE_RPM: u32 = 0x100;
    pub const HYDRAULIC_PRESSURE: u32 = 0x200;
    pub const TRANSMISSION_SPEED: u32 = 0x300;
    pub const PTO_CONTROL: u32 = 0x220;
    pub const PTO_TELEMETRY: u32 = 0x221;
    pub const TELEMATICS_GPS: u32 = 0x230;
    pub const IMPLEMENT_ATTACH: u32 = 0x240;
    pub const IMPLEMENT_POSITION: u32 = 0x241;
    pub const IMPLEMENT_TELEMETRY: u32 = 0x242;
    pub const DIAGNOSTIC_SUMMARY: u32 = 0x400;
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("message buffer full")]
    BufferFull,
}

/// A single bus frame. Immutable once written; consumers only ever see
/// clones of buffered frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u32,
    pub payload: Vec<u8, MAX_FRAME_PAYLOAD>,
    /// Wall-clock seconds since the Unix epoch at send time.
    pub timestamp: u64,
}

/// Bus utilization counters. `sent`, `received` and `dropped` are
/// process-lifetime totals and survive buffer eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusStats {
    pub sent: u32,
    pub received: u32,
    pub dropped: u32,
    pub occupied: usize,
    pub load_percent: f32,
    pub status: SystemStatus,
}

/// Shared in-process message mailbox between ECU modules.
///
/// Best-effort semantics throughout: a send against a full buffer drops the
/// frame (counted, surfaced as [`BusError::BufferFull`], never blocking),
/// and the single consumer reads without dequeuing. One `tick()` per control
/// cycle recomputes load telemetry and evicts the buffer when it runs past
/// the clear threshold.
#[derive(Debug)]
pub struct MessageBus {
    buffer: Vec<Message, BUS_CAPACITY>,
    sent: u32,
    received: u32,
    dropped: u32,
    load_percent: f32,
    status: SystemStatus,
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            sent: 0,
            received: 0,
            dropped: 0,
            load_percent: 0.0,
            status: SystemStatus::Ok,
        }
    }

    /// Append a frame. Payloads longer than [`MAX_FRAME_PAYLOAD`] are
    /// truncated. A full buffer drops the frame without advancing `sent`.
    pub fn send(&mut self, id: u32, payload: &[u8]) -> Result<(), BusError> {
        if self.buffer.is_full() {
            self.dropped = self.dropped.saturating_add(1);
            return Err(BusError::BufferFull);
        }

        let clamped = &payload[..payload.len().min(MAX_FRAME_PAYLOAD)];
        let message = Message {
            id,
            payload: Vec::from_slice(clamped).unwrap_or_default(),
            timestamp: epoch_seconds(),
        };

        let _ = self.buffer.push(message);
        self.sent = self.sent.saturating_add(1);

        debug_assert!(
            self.buffer.len() <= BUS_CAPACITY,
            "Buffer occupancy {} exceeds capacity {}",
            self.buffer.len(),
            BUS_CAPACITY
        );

        Ok(())
    }

    /// Read the oldest buffered frame without dequeuing it.
    ///
    /// At-least-once semantics: repeated calls return the same head frame
    /// until a `tick()`-triggered eviction empties the buffer. `received`
    /// counts reads, not distinct frames.
    pub fn receive(&mut self) -> Option<Message> {
        let message = self.buffer.first().cloned()?;
        self.received = self.received.saturating_add(1);
        Some(message)
    }

    /// Per-cycle maintenance: refresh load telemetry and evict on overrun.
    ///
    /// Evaluation order is load-bearing: `load_percent` is computed from the
    /// pre-tick occupancy, the eviction decision follows, and `status` is
    /// derived from that same pre-eviction load. A tick that empties the
    /// buffer can therefore still report WARNING for the load that caused
    /// the eviction.
    pub fn tick(&mut self) {
        self.load_percent = (self.buffer.len() as f32 / BUS_CAPACITY as f32) * 100.0;

        if self.buffer.len() > CLEAR_THRESHOLD {
            self.buffer.clear();
        }

        self.status = if self.load_percent > WARNING_LOAD_PERCENT {
            SystemStatus::Warning
        } else {
            SystemStatus::Ok
        };
    }

    pub fn occupied(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Counter/telemetry snapshot. `load_percent` reflects the last `tick()`,
    /// not the instantaneous occupancy.
    pub fn stats(&self) -> BusStats {
        BusStats {
            sent: self.sent,
            received: self.received,
            dropped: self.dropped,
            occupied: self.buffer.len(),
            load_percent: self.load_percent,
            status: self.status,
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn epoch_seconds() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
