//! # Tractor ECU Network Simulator
//!
//! An embedded-style agricultural vehicle ECU network simulation library:
//! independent subsystem controllers exchanging state over a shared
//! CAN-style message bus and reporting faults to a central diagnostics
//! registry.
//!
//! ## Features
//!
//! - **Shared message bus**: bounded best-effort mailbox with load-factor
//!   telemetry and capacity-triggered eviction
//! - **Fault registry**: deduplicated SPN/FMI fault ledger with
//!   active/inactive lifecycle and aggregate health rollup
//! - **Subsystem simulation**: engine, transmission, hydraulics, PTO,
//!   implement, and telematics controllers
//! - **Command surface**: JSON-serializable operator commands
//! - **Embedded-friendly core**: bounded storage, no heap growth in the
//!   bus or ledger
//!
//! ## Quick Start
//!
//! ```rust
//! use agbus::{EcuCommand, TractorEcu};
//!
//! let mut ecu = TractorEcu::new();
//! ecu.execute(EcuCommand::StartEngine).unwrap();
//!
//! // One control cycle: physics updates, diagnostics recompute, bus tick
//! ecu.run_cycle();
//!
//! let snapshot = ecu.snapshot();
//! println!("engine rpm: {}", snapshot.engine.current_rpm);
//! ```
//!
//! ## Architecture
//!
//! - [`bus`] - shared bounded message mailbox (the communication core)
//! - [`diagnostics`] - deduplicated fault ledger and health rollup
//! - [`ecu`] - owning context and control-cycle coordinator
//! - [`subsystems`] - individual subsystem controllers
//! - [`status`] - shared ordered severity type

#![deny(warnings)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

extern crate alloc;

pub mod bus;
pub mod diagnostics;
pub mod ecu;
pub mod status;
pub mod subsystems;

// Re-export main public types for convenience
pub use bus::{BusStats, Message, MessageBus};
pub use diagnostics::{DiagnosticsSnapshot, FaultCode, FaultRegistry};
pub use ecu::{EcuCommand, EcuSnapshot, TractorEcu};
pub use status::SystemStatus;
