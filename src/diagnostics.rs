use crate::bus::{channel, epoch_seconds, MessageBus};
use crate::status::SystemStatus;
use arrayvec::ArrayString;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum fault records the ledger will ever hold. Storage is append-only:
/// clearing a fault flips its active bit but never frees the slot.
pub const MAX_FAULT_RECORDS: usize = 50;

const MODULE_NAME_LEN: usize = 32;
const DESCRIPTION_LEN: usize = 128;

/// Well-known suspect parameter numbers for the simulated subsystems.
/// Values in the 3000 range are proprietary implement codes.
pub mod spn {
    pub const ENGINE_OIL_PRESSURE: u32 = 100;
    pub const ENGINE_COOLANT_TEMP: u32 = 110;
    pub const TRANS_OIL_PRESSURE: u32 = 127;
    pub const TRANS_OIL_TEMP: u32 = 177;
    pub const PTO_SHAFT_SPEED: u32 = 186;
    pub const HYDRAULIC_OIL_TEMP: u32 = 1638;
    pub const HYDRAULIC_RESERVOIR_LEVEL: u32 = 2602;
    pub const CELLULAR_SIGNAL: u32 = 2837;
    pub const IMPLEMENT_LIFT_PRESSURE: u32 = 3001;
    pub const IMPLEMENT_WORK_PRESSURE: u32 = 3002;
    pub const IMPLEMENT_PTO_REQUIRED: u32 = 3003;
    pub const PTO_ENGAGEMENT: u32 = 3451;
}

/// Failure mode identifiers (J1939 table values).
pub mod fmi {
    pub const DATA_ABOVE_NORMAL: u8 = 0;
    pub const DATA_BELOW_NORMAL: u8 = 1;
    pub const DATA_ERRATIC: u8 = 2;
    pub const MECHANICAL_FAULT: u8 = 7;
    pub const CONDITION_EXISTS: u8 = 31;
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticsError {
    #[error("fault ledger full")]
    LedgerFull,
}

/// Two-part fault identity: suspect parameter number (what component) plus
/// failure mode identifier (what kind of failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultCode {
    pub spn: u32,
    pub fmi: u8,
}

impl FaultCode {
    pub const fn new(spn: u32, fmi: u8) -> Self {
        Self { spn, fmi }
    }
}

impl core::fmt::Display for FaultCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SPN {} FMI {}", self.spn, self.fmi)
    }
}

/// One ledger entry. `module` and `description` are written on first report
/// and never updated; a repeat report only refreshes `timestamp` and
/// reactivates the record.
#[derive(Debug, Clone)]
pub struct FaultRecord {
    pub code: FaultCode,
    pub module: ArrayString<MODULE_NAME_LEN>,
    pub description: ArrayString<DESCRIPTION_LEN>,
    pub timestamp: u64,
    pub active: bool,
}

/// Aggregate health rollup. `active_faults` is the count from the last
/// `recompute()`, not a live scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub total_faults: u16,
    pub active_faults: u16,
    pub dropped_reports: u32,
    pub overall_status: SystemStatus,
}

/// Deduplicated fault ledger fed by every subsystem simulator.
///
/// At most one record exists per [`FaultCode`] identity. Records toggle
/// between active and inactive but never leave the ledger, so storage grows
/// monotonically even when the active count returns to zero.
#[derive(Debug)]
pub struct FaultRegistry {
    records: Vec<FaultRecord, MAX_FAULT_RECORDS>,
    active_count: u16,
    dropped: u32,
    overall_status: SystemStatus,
}

impl FaultRegistry {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            active_count: 0,
            dropped: 0,
            overall_status: SystemStatus::Ok,
        }
    }

    /// Record a fault observation. A known identity is reactivated with a
    /// fresh timestamp (text fields keep their first-report values); an
    /// unknown identity is appended while capacity remains. Reports against
    /// a full ledger are counted and dropped.
    pub fn report(
        &mut self,
        code: FaultCode,
        module: &str,
        description: &str,
    ) -> Result<(), DiagnosticsError> {
        if let Some(record) = self.records.iter_mut().find(|r| r.code == code) {
            record.active = true;
            record.timestamp = epoch_seconds();
            return Ok(());
        }

        if self.records.is_full() {
            self.dropped = self.dropped.saturating_add(1);
            return Err(DiagnosticsError::LedgerFull);
        }

        let record = FaultRecord {
            code,
            module: bounded(module),
            description: bounded(description),
            timestamp: epoch_seconds(),
            active: true,
        };
        let _ = self.records.push(record);

        debug_assert!(
            self.records.len() <= MAX_FAULT_RECORDS,
            "Ledger size {} exceeds capacity {}",
            self.records.len(),
            MAX_FAULT_RECORDS
        );

        Ok(())
    }

    /// Deactivate a fault. Returns whether an active record was cleared;
    /// an unknown identity or an already-inactive record is a no-op.
    pub fn clear(&mut self, code: FaultCode) -> bool {
        match self.records.iter_mut().find(|r| r.code == code && r.active) {
            Some(record) => {
                record.active = false;
                true
            }
            None => false,
        }
    }

    /// Re-derive the active count and overall status by scanning the ledger.
    ///
    /// Invoked once per control cycle after all subsystems have reported or
    /// cleared. This step escalates at most to WARNING. When any fault is
    /// active, a two-byte little-endian active-count summary is enqueued on
    /// the diagnostic summary channel.
    pub fn recompute(&mut self, bus: &mut MessageBus) {
        self.active_count = self.records.iter().filter(|r| r.active).count() as u16;
        self.overall_status = if self.active_count > 0 {
            SystemStatus::Warning
        } else {
            SystemStatus::Ok
        };

        if self.active_count > 0 {
            let _ = bus.send(channel::DIAGNOSTIC_SUMMARY, &self.active_count.to_le_bytes());
        }
    }

    /// All records ever inserted, active and inactive.
    pub fn records(&self) -> &[FaultRecord] {
        &self.records
    }

    pub fn active_faults(&self) -> impl Iterator<Item = &FaultRecord> {
        self.records.iter().filter(|r| r.active)
    }

    pub fn total_count(&self) -> u16 {
        self.records.len() as u16
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            total_faults: self.records.len() as u16,
            active_faults: self.active_count,
            dropped_reports: self.dropped,
            overall_status: self.overall_status,
        }
    }
}

impl Default for FaultRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn bounded<const N: usize>(text: &str) -> ArrayString<N> {
    let mut out = ArrayString::new();
    for c in text.chars() {
        if out.try_push(c).is_err() {
            break;
        }
    }
    out
}
