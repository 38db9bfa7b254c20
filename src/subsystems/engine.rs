use super::{EcuId, Subsystem};
use crate::bus::{channel, MessageBus};
use crate::diagnostics::{fmi, spn, FaultCode, FaultRegistry};
use crate::status::SystemStatus;
use serde::{Deserialize, Serialize};

const IDLE_RPM: u16 = 800;
const RPM_PER_THROTTLE_PERCENT: u16 = 18;
const RPM_SLEW_PER_CYCLE: u16 = 50;
const RATED_RPM: f32 = 2200.0;
const MAX_FUEL_RATE_LPH: f32 = 15.0;
const COOLANT_WARM_THRESHOLD_RPM: u16 = 1000;
const COOLANT_HEAT_PER_CYCLE_C: f32 = 0.5;
const COOLANT_CRITICAL_C: f32 = 105.0;
const OIL_PRESSURE_WARNING_PSI: f32 = 20.0;

const COOLANT_FAULT: FaultCode = FaultCode::new(spn::ENGINE_COOLANT_TEMP, fmi::DATA_ABOVE_NORMAL);
const OIL_FAULT: FaultCode = FaultCode::new(spn::ENGINE_OIL_PRESSURE, fmi::DATA_BELOW_NORMAL);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub current_rpm: u16,
    pub target_rpm: u16,
    pub fuel_rate_lph: f32,
    pub oil_pressure_psi: f32,
    pub coolant_temp_c: f32,
    pub running: bool,
    pub status: SystemStatus,
}

/// Diesel engine controller. Slews RPM toward the throttle target, models
/// fuel burn and coolant warm-up, and publishes the current RPM on the
/// engine channel every cycle the engine is running.
#[derive(Debug)]
pub struct EngineController {
    state: EngineState,
}

impl EngineController {
    pub fn new() -> Self {
        Self {
            state: EngineState {
                current_rpm: 0,
                target_rpm: 0,
                fuel_rate_lph: 0.0,
                oil_pressure_psi: 45.0,
                coolant_temp_c: 20.0,
                running: false,
                status: SystemStatus::Ok,
            },
        }
    }

    pub fn start(&mut self) {
        self.state.running = true;
        self.state.target_rpm = IDLE_RPM;
    }

    pub fn stop(&mut self) {
        self.state.running = false;
        self.state.current_rpm = 0;
        self.state.target_rpm = 0;
    }

    /// Map a 0-100% throttle position to a target RPM (idle at 0%, rated
    /// speed region at full throttle). Out-of-range input is clamped.
    pub fn set_throttle(&mut self, throttle_percent: u8) {
        let throttle = throttle_percent.min(100) as u16;
        self.state.target_rpm = IDLE_RPM + throttle * RPM_PER_THROTTLE_PERCENT;
    }

    #[allow(clippy::comparison_chain)]
    pub fn update(&mut self, bus: &mut MessageBus, diagnostics: &mut FaultRegistry) {
        if !self.state.running {
            return;
        }

        if self.state.current_rpm < self.state.target_rpm {
            self.state.current_rpm = self.state.current_rpm.saturating_add(RPM_SLEW_PER_CYCLE);
        } else if self.state.current_rpm > self.state.target_rpm {
            self.state.current_rpm = self.state.current_rpm.saturating_sub(RPM_SLEW_PER_CYCLE);
        }

        self.state.fuel_rate_lph = (self.state.current_rpm as f32 / RATED_RPM) * MAX_FUEL_RATE_LPH;

        if self.state.current_rpm > COOLANT_WARM_THRESHOLD_RPM {
            self.state.coolant_temp_c += COOLANT_HEAT_PER_CYCLE_C;
        }

        let _ = bus.send(channel::ENGINE_RPM, &self.state.current_rpm.to_le_bytes());

        self.check_health(diagnostics);
    }

    fn check_health(&mut self, diagnostics: &mut FaultRegistry) {
        if self.state.coolant_temp_c > COOLANT_CRITICAL_C {
            self.state.status = SystemStatus::Critical;
            let _ = diagnostics.report(
                COOLANT_FAULT,
                EcuId::Engine.name(),
                "Engine coolant temperature extremely high",
            );
            return;
        }
        diagnostics.clear(COOLANT_FAULT);

        if self.state.oil_pressure_psi < OIL_PRESSURE_WARNING_PSI {
            self.state.status = SystemStatus::Warning;
            let _ = diagnostics.report(
                OIL_FAULT,
                EcuId::Engine.name(),
                "Engine oil pressure below normal operating range",
            );
            return;
        }
        diagnostics.clear(OIL_FAULT);

        self.state.status = SystemStatus::Ok;
    }
}

impl Subsystem for EngineController {
    type State = EngineState;

    fn get_state(&self) -> Self::State {
        self.state.clone()
    }

    fn is_healthy(&self) -> bool {
        self.state.status == SystemStatus::Ok
    }
}

impl Default for EngineController {
    fn default() -> Self {
        Self::new()
    }
}
