use super::{EcuId, EngineState, Subsystem};
use crate::bus::{channel, MessageBus};
use crate::diagnostics::{fmi, spn, FaultCode, FaultRegistry};
use crate::status::SystemStatus;
use serde::{Deserialize, Serialize};

const PUMP_REFERENCE_RPM: f32 = 2600.0;
const MAX_SYSTEM_PRESSURE_PSI: f32 = 3000.0;
const MAX_FLOW_RATE_GPM: f32 = 25.0;
const OIL_HEAT_PER_CYCLE_C: f32 = 0.3;
const RESERVOIR_CRITICAL_PERCENT: f32 = 20.0;
const OIL_TEMP_WARNING_C: f32 = 90.0;

const RESERVOIR_FAULT: FaultCode =
    FaultCode::new(spn::HYDRAULIC_RESERVOIR_LEVEL, fmi::DATA_BELOW_NORMAL);
const OIL_TEMP_FAULT: FaultCode = FaultCode::new(spn::HYDRAULIC_OIL_TEMP, fmi::DATA_ABOVE_NORMAL);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydraulicsState {
    pub system_pressure_psi: f32,
    pub flow_rate_gpm: f32,
    pub reservoir_level_percent: f32,
    pub oil_temp_c: f32,
    pub status: SystemStatus,
}

/// Hydraulic power pack controller. The pump is engine-driven: pressure and
/// flow scale with engine RPM and collapse to zero when the engine stops.
/// Oil heats while downstream consumers (PTO, implement) are working.
#[derive(Debug)]
pub struct HydraulicsController {
    state: HydraulicsState,
}

impl HydraulicsController {
    pub fn new() -> Self {
        Self {
            state: HydraulicsState {
                system_pressure_psi: 0.0,
                flow_rate_gpm: 0.0,
                reservoir_level_percent: 85.0,
                oil_temp_c: 20.0,
                status: SystemStatus::Ok,
            },
        }
    }

    /// `under_load` is true when the PTO is engaged or an implement is in
    /// work position; the coordinator derives it from the sibling states.
    pub fn update(
        &mut self,
        engine: &EngineState,
        under_load: bool,
        bus: &mut MessageBus,
        diagnostics: &mut FaultRegistry,
    ) {
        if engine.running {
            let pump_speed_factor = engine.current_rpm as f32 / PUMP_REFERENCE_RPM;
            self.state.system_pressure_psi = pump_speed_factor * MAX_SYSTEM_PRESSURE_PSI;
            self.state.flow_rate_gpm = pump_speed_factor * MAX_FLOW_RATE_GPM;

            if under_load {
                self.state.oil_temp_c += OIL_HEAT_PER_CYCLE_C;
            }
        } else {
            self.state.system_pressure_psi = 0.0;
            self.state.flow_rate_gpm = 0.0;
        }

        let _ = bus.send(
            channel::HYDRAULIC_PRESSURE,
            &self.state.system_pressure_psi.to_le_bytes(),
        );

        self.check_health(diagnostics);
    }

    fn check_health(&mut self, diagnostics: &mut FaultRegistry) {
        if self.state.reservoir_level_percent < RESERVOIR_CRITICAL_PERCENT {
            self.state.status = SystemStatus::Critical;
            let _ = diagnostics.report(
                RESERVOIR_FAULT,
                EcuId::Hydraulics.name(),
                "Hydraulic reservoir level critically low",
            );
            return;
        }
        diagnostics.clear(RESERVOIR_FAULT);

        if self.state.oil_temp_c > OIL_TEMP_WARNING_C {
            self.state.status = SystemStatus::Warning;
            let _ = diagnostics.report(
                OIL_TEMP_FAULT,
                EcuId::Hydraulics.name(),
                "Hydraulic oil temperature above normal operating range",
            );
            return;
        }
        diagnostics.clear(OIL_TEMP_FAULT);

        self.state.status = SystemStatus::Ok;
    }
}

impl Subsystem for HydraulicsController {
    type State = HydraulicsState;

    fn get_state(&self) -> Self::State {
        self.state.clone()
    }

    fn is_healthy(&self) -> bool {
        self.state.status == SystemStatus::Ok
    }
}

impl Default for HydraulicsController {
    fn default() -> Self {
        Self::new()
    }
}
