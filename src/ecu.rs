use crate::bus::{BusStats, MessageBus};
use crate::diagnostics::{DiagnosticsSnapshot, FaultRegistry};
use crate::subsystems::{
    EngineController, EngineState, GearPosition, HydraulicsController, HydraulicsState,
    ImplementController, ImplementState, ImplementType, PtoController, PtoSpeed, PtoState,
    Subsystem, TelematicsController, TelematicsState, TransmissionController, TransmissionState,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EcuError {
    #[error("engine RPM too low for PTO engagement")]
    EngineRpmTooLow,
    #[error("no implement attached")]
    NoImplementAttached,
    #[error("insufficient hydraulic pressure")]
    HydraulicPressureLow,
}

/// Operator actions accepted by the ECU, dispatched to the owning subsystem.
/// Serialized as JSON on the driver's command socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EcuCommand {
    StartEngine,
    StopEngine,
    SetThrottle { percent: u8 },
    ShiftGear { gear: GearPosition },
    EngageClutch,
    DisengageClutch,
    EngagePto { speed: PtoSpeed },
    DisengagePto,
    AttachImplement { kind: ImplementType },
    DetachImplement,
    LowerImplement,
    RaiseImplement,
    SetWorkingDepth { depth_cm: f32 },
    SendStatusUpdate,
}

/// Active fault summary for snapshot consumers; text fields are copied out
/// of the fixed-width ledger records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultSummary {
    pub spn: u32,
    pub fmi: u8,
    pub module: alloc::string::String,
    pub description: alloc::string::String,
    pub timestamp: u64,
}

/// Per-cycle aggregate of every subsystem state plus bus and diagnostics
/// telemetry. One of these is serialized per control cycle by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcuSnapshot {
    pub cycle: u64,
    pub engine: EngineState,
    pub transmission: TransmissionState,
    pub hydraulics: HydraulicsState,
    pub pto: PtoState,
    pub implement: ImplementState,
    pub telematics: TelematicsState,
    pub bus: BusStats,
    pub diagnostics: DiagnosticsSnapshot,
    pub active_faults: alloc::vec::Vec<FaultSummary>,
}

/// The tractor's ECU network in one explicitly-owned context: the shared
/// message bus, the fault registry, and all six subsystem controllers.
///
/// All mutation is synchronous and single-threaded. `run_cycle` drives one
/// control cycle in a fixed order: subsystem physics updates, then the
/// diagnostics recompute, then the bus tick. Cross-subsystem reads use the
/// snapshots produced earlier in the same cycle, so the transmission always
/// sees the engine state already advanced this cycle.
pub struct TractorEcu {
    bus: MessageBus,
    diagnostics: FaultRegistry,
    engine: EngineController,
    transmission: TransmissionController,
    hydraulics: HydraulicsController,
    pto: PtoController,
    implement: ImplementController,
    telematics: TelematicsController,
    cycle_count: u64,
}

impl TractorEcu {
    pub fn new() -> Self {
        Self {
            bus: MessageBus::new(),
            diagnostics: FaultRegistry::new(),
            engine: EngineController::new(),
            transmission: TransmissionController::new(),
            hydraulics: HydraulicsController::new(),
            pto: PtoController::new(),
            implement: ImplementController::new(),
            telematics: TelematicsController::new(),
            cycle_count: 0,
        }
    }

    /// Run one control cycle.
    pub fn run_cycle(&mut self) {
        self.engine.update(&mut self.bus, &mut self.diagnostics);
        let engine_state = self.engine.get_state();

        self.transmission
            .update(&engine_state, &mut self.bus, &mut self.diagnostics);

        let under_load = self.pto.is_engaged() || self.implement.is_working();
        self.hydraulics
            .update(&engine_state, under_load, &mut self.bus, &mut self.diagnostics);

        self.pto
            .update(&engine_state, &mut self.bus, &mut self.diagnostics);

        let hydraulics_state = self.hydraulics.get_state();
        let pto_state = self.pto.get_state();
        self.implement.update(
            &hydraulics_state,
            &pto_state,
            &mut self.bus,
            &mut self.diagnostics,
        );

        self.telematics.update(&mut self.bus, &mut self.diagnostics);

        self.diagnostics.recompute(&mut self.bus);
        self.bus.tick();

        self.cycle_count = self.cycle_count.wrapping_add(1);
    }

    pub fn execute(&mut self, command: EcuCommand) -> Result<(), EcuError> {
        match command {
            EcuCommand::StartEngine => {
                self.engine.start();
                Ok(())
            }
            EcuCommand::StopEngine => {
                self.engine.stop();
                Ok(())
            }
            EcuCommand::SetThrottle { percent } => {
                self.engine.set_throttle(percent);
                Ok(())
            }
            EcuCommand::ShiftGear { gear } => {
                self.transmission.shift_gear(gear);
                Ok(())
            }
            EcuCommand::EngageClutch => {
                self.transmission.engage_clutch();
                Ok(())
            }
            EcuCommand::DisengageClutch => {
                self.transmission.disengage_clutch();
                Ok(())
            }
            EcuCommand::EngagePto { speed } => {
                let engine_state = self.engine.get_state();
                self.pto
                    .engage(speed, &engine_state, &mut self.bus, &mut self.diagnostics)
                    .map_err(|_| EcuError::EngineRpmTooLow)
            }
            EcuCommand::DisengagePto => {
                self.pto.disengage(&mut self.bus);
                Ok(())
            }
            EcuCommand::AttachImplement { kind } => {
                self.implement.attach(kind, &mut self.bus);
                Ok(())
            }
            EcuCommand::DetachImplement => {
                self.implement.detach();
                Ok(())
            }
            EcuCommand::LowerImplement => {
                if self.implement.get_state().attached.is_none() {
                    return Err(EcuError::NoImplementAttached);
                }
                let hydraulics_state = self.hydraulics.get_state();
                self.implement
                    .lower(&hydraulics_state, &mut self.bus, &mut self.diagnostics)
                    .map_err(|_| EcuError::HydraulicPressureLow)
            }
            EcuCommand::RaiseImplement => {
                self.implement.raise(&mut self.bus);
                Ok(())
            }
            EcuCommand::SetWorkingDepth { depth_cm } => {
                self.implement.set_depth(depth_cm);
                Ok(())
            }
            EcuCommand::SendStatusUpdate => {
                self.telematics.send_status_update();
                Ok(())
            }
        }
    }

    pub fn snapshot(&self) -> EcuSnapshot {
        let active_faults = self
            .diagnostics
            .active_faults()
            .map(|record| FaultSummary {
                spn: record.code.spn,
                fmi: record.code.fmi,
                module: record.module.as_str().into(),
                description: record.description.as_str().into(),
                timestamp: record.timestamp,
            })
            .collect();

        EcuSnapshot {
            cycle: self.cycle_count,
            engine: self.engine.get_state(),
            transmission: self.transmission.get_state(),
            hydraulics: self.hydraulics.get_state(),
            pto: self.pto.get_state(),
            implement: self.implement.get_state(),
            telematics: self.telematics.get_state(),
            bus: self.bus.stats(),
            diagnostics: self.diagnostics.snapshot(),
            active_faults,
        }
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut MessageBus {
        &mut self.bus
    }

    pub fn diagnostics(&self) -> &FaultRegistry {
        &self.diagnostics
    }

    pub fn engine(&self) -> &EngineController {
        &self.engine
    }

    pub fn transmission(&self) -> &TransmissionController {
        &self.transmission
    }

    pub fn hydraulics(&self) -> &HydraulicsController {
        &self.hydraulics
    }

    pub fn pto(&self) -> &PtoController {
        &self.pto
    }

    pub fn implement(&self) -> &ImplementController {
        &self.implement
    }

    pub fn telematics(&self) -> &TelematicsController {
        &self.telematics
    }
}

impl Default for TractorEcu {
    fn default() -> Self {
        Self::new()
    }
}
