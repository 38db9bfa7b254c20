use super::{EcuId, EngineState, Subsystem};
use crate::bus::{channel, MessageBus};
use crate::diagnostics::{fmi, spn, FaultCode, FaultRegistry};
use crate::status::SystemStatus;
use serde::{Deserialize, Serialize};

const TEMP_RISE_PER_CYCLE_C: f32 = 0.2;
const TEMP_CRITICAL_C: f32 = 120.0;
const OIL_PRESSURE_WARNING_PSI: f32 = 25.0;

const TEMP_FAULT: FaultCode = FaultCode::new(spn::TRANS_OIL_TEMP, fmi::DATA_ABOVE_NORMAL);
const PRESSURE_FAULT: FaultCode = FaultCode::new(spn::TRANS_OIL_PRESSURE, fmi::DATA_BELOW_NORMAL);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GearPosition {
    Park,
    Neutral,
    Drive1,
    Drive2,
    Drive3,
    Drive4,
    Reverse,
}

impl GearPosition {
    /// Input-to-output ratio; zero means no drive coupling in this position.
    pub fn ratio(self) -> f32 {
        match self {
            GearPosition::Park | GearPosition::Neutral => 0.0,
            GearPosition::Drive1 => 3.5,
            GearPosition::Drive2 => 2.2,
            GearPosition::Drive3 => 1.5,
            GearPosition::Drive4 => 1.0,
            GearPosition::Reverse => -4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmissionState {
    pub current_gear: GearPosition,
    pub clutch_engaged: bool,
    pub clutch_position_percent: f32,
    pub output_speed_rpm: f32,
    pub transmission_temp_c: f32,
    pub oil_pressure_psi: f32,
    pub status: SystemStatus,
}

/// Powershift transmission controller. Derives output shaft speed from the
/// engine RPM and the selected gear ratio while the clutch is engaged, and
/// publishes the output speed on the transmission channel every cycle.
#[derive(Debug)]
pub struct TransmissionController {
    state: TransmissionState,
}

impl TransmissionController {
    pub fn new() -> Self {
        Self {
            state: TransmissionState {
                current_gear: GearPosition::Park,
                clutch_engaged: false,
                clutch_position_percent: 0.0,
                output_speed_rpm: 0.0,
                transmission_temp_c: 20.0,
                oil_pressure_psi: 50.0,
                status: SystemStatus::Ok,
            },
        }
    }

    pub fn shift_gear(&mut self, gear: GearPosition) {
        self.state.current_gear = gear;
    }

    pub fn engage_clutch(&mut self) {
        self.state.clutch_engaged = true;
        self.state.clutch_position_percent = 100.0;
    }

    pub fn disengage_clutch(&mut self) {
        self.state.clutch_engaged = false;
        self.state.clutch_position_percent = 0.0;
    }

    pub fn update(
        &mut self,
        engine: &EngineState,
        bus: &mut MessageBus,
        diagnostics: &mut FaultRegistry,
    ) {
        if engine.running && self.state.clutch_engaged {
            let ratio = self.state.current_gear.ratio();
            self.state.output_speed_rpm = if ratio != 0.0 {
                engine.current_rpm as f32 / ratio
            } else {
                0.0
            };

            self.state.transmission_temp_c += TEMP_RISE_PER_CYCLE_C;
        } else {
            self.state.output_speed_rpm = 0.0;
        }

        let _ = bus.send(
            channel::TRANSMISSION_SPEED,
            &self.state.output_speed_rpm.to_le_bytes(),
        );

        self.check_health(diagnostics);
    }

    fn check_health(&mut self, diagnostics: &mut FaultRegistry) {
        if self.state.transmission_temp_c > TEMP_CRITICAL_C {
            self.state.status = SystemStatus::Critical;
            let _ = diagnostics.report(
                TEMP_FAULT,
                EcuId::Transmission.name(),
                "Transmission oil temperature extremely high",
            );
            return;
        }
        diagnostics.clear(TEMP_FAULT);

        if self.state.oil_pressure_psi < OIL_PRESSURE_WARNING_PSI {
            self.state.status = SystemStatus::Warning;
            let _ = diagnostics.report(
                PRESSURE_FAULT,
                EcuId::Transmission.name(),
                "Transmission oil pressure below normal operating range",
            );
            return;
        }
        diagnostics.clear(PRESSURE_FAULT);

        self.state.status = SystemStatus::Ok;
    }
}

impl Subsystem for TransmissionController {
    type State = TransmissionState;

    fn get_state(&self) -> Self::State {
        self.state.clone()
    }

    fn is_healthy(&self) -> bool {
        self.state.status == SystemStatus::Ok
    }
}

impl Default for TransmissionController {
    fn default() -> Self {
        Self::new()
    }
}
