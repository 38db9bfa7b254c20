use super::{EcuId, EngineState, SimRng, Subsystem};
use crate::bus::{channel, MessageBus};
use crate::diagnostics::{fmi, spn, FaultCode, FaultRegistry};
use crate::status::SystemStatus;
use serde::{Deserialize, Serialize};

const MIN_ENGAGE_RPM: u16 = 800;
const SPINUP_RPM_PER_CYCLE: u16 = 50;
const NOMINAL_ENGINE_RPM: f32 = 2100.0;
const BASE_LOAD_PERCENT: f32 = 45.0;
const LOAD_JITTER_PERCENT: u32 = 30;
const MAX_TORQUE_NM: f32 = 850.0;
const OVERLOAD_PERCENT: f32 = 90.0;

const ENGAGEMENT_FAULT: FaultCode = FaultCode::new(spn::PTO_ENGAGEMENT, fmi::MECHANICAL_FAULT);
const OVERLOAD_FAULT: FaultCode = FaultCode::new(spn::PTO_SHAFT_SPEED, fmi::DATA_ABOVE_NORMAL);

/// Standard agricultural PTO shaft speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PtoSpeed {
    Rpm540,
    Rpm1000,
}

impl PtoSpeed {
    pub fn target_rpm(self) -> u16 {
        match self {
            PtoSpeed::Rpm540 => 540,
            PtoSpeed::Rpm1000 => 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PtoEngagement {
    Disengaged,
    Engaging,
    Engaged,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtoState {
    pub engagement: PtoEngagement,
    pub target_speed: PtoSpeed,
    pub current_rpm: u16,
    pub load_percent: f32,
    pub torque_nm: f32,
    pub slip_percent: f32,
    pub overload_detected: bool,
    pub status: SystemStatus,
}

/// Power take-off controller. Engagement is a small state machine: the shaft
/// spins up gradually toward the selected standard speed, then tracks the
/// engine RPM ratio under simulated implement load.
#[derive(Debug)]
pub struct PtoController {
    state: PtoState,
    rng: SimRng,
}

impl PtoController {
    pub fn new() -> Self {
        Self {
            state: PtoState {
                engagement: PtoEngagement::Disengaged,
                target_speed: PtoSpeed::Rpm540,
                current_rpm: 0,
                load_percent: 0.0,
                torque_nm: 0.0,
                slip_percent: 0.0,
                overload_detected: false,
                status: SystemStatus::Ok,
            },
            rng: SimRng::new(0x9E37_79B9_7F4A_7C15),
        }
    }

    /// Begin engagement at the given shaft speed. Refused below the minimum
    /// engine RPM; the refusal is recorded as an engagement fault.
    pub fn engage(
        &mut self,
        speed: PtoSpeed,
        engine: &EngineState,
        bus: &mut MessageBus,
        diagnostics: &mut FaultRegistry,
    ) -> Result<(), &'static str> {
        if engine.current_rpm < MIN_ENGAGE_RPM {
            let _ = diagnostics.report(
                ENGAGEMENT_FAULT,
                EcuId::Pto.name(),
                "PTO engagement failed - engine RPM below minimum threshold",
            );
            return Err("engine RPM below minimum for PTO engagement");
        }

        self.state.engagement = PtoEngagement::Engaging;
        self.state.target_speed = speed;

        let target = speed.target_rpm();
        let frame = [0x01, (target >> 8) as u8, (target & 0xFF) as u8, 0, 0, 0, 0, 0];
        let _ = bus.send(channel::PTO_CONTROL, &frame);

        Ok(())
    }

    pub fn disengage(&mut self, bus: &mut MessageBus) {
        self.state.engagement = PtoEngagement::Disengaged;
        self.state.current_rpm = 0;

        let _ = bus.send(channel::PTO_CONTROL, &[0x00, 0, 0, 0, 0, 0, 0, 0]);
    }

    pub fn is_engaged(&self) -> bool {
        self.state.engagement == PtoEngagement::Engaged
    }

    pub fn update(
        &mut self,
        engine: &EngineState,
        bus: &mut MessageBus,
        diagnostics: &mut FaultRegistry,
    ) {
        let target = self.state.target_speed.target_rpm();

        if self.state.engagement == PtoEngagement::Engaging {
            if self.state.current_rpm < target {
                self.state.current_rpm =
                    self.state.current_rpm.saturating_add(SPINUP_RPM_PER_CYCLE);
                self.state.slip_percent =
                    (target.saturating_sub(self.state.current_rpm) as f32 / target as f32) * 100.0;
            } else {
                self.state.engagement = PtoEngagement::Engaged;
                self.state.slip_percent = 0.0;
            }
        }

        if self.state.engagement == PtoEngagement::Engaged {
            let engine_ratio = engine.current_rpm as f32 / NOMINAL_ENGINE_RPM;
            self.state.current_rpm = (target as f32 * engine_ratio) as u16;

            self.state.load_percent =
                BASE_LOAD_PERCENT + self.rng.random_below(LOAD_JITTER_PERCENT) as f32;
            self.state.torque_nm = (self.state.load_percent / 100.0) * MAX_TORQUE_NM;

            if self.state.load_percent > OVERLOAD_PERCENT {
                self.state.overload_detected = true;
                self.state.engagement = PtoEngagement::Error;
                self.state.status = SystemStatus::Error;
                let _ = diagnostics.report(
                    OVERLOAD_FAULT,
                    EcuId::Pto.name(),
                    "PTO overload detected - shaft load exceeds maximum rating",
                );
            }

            let frame = [
                (self.state.current_rpm >> 8) as u8,
                (self.state.current_rpm & 0xFF) as u8,
                self.state.load_percent as u8,
                (self.state.torque_nm / 10.0) as u8,
                0,
                0,
                0,
                0,
            ];
            let _ = bus.send(channel::PTO_TELEMETRY, &frame);
        }
    }
}

impl Subsystem for PtoController {
    type State = PtoState;

    fn get_state(&self) -> Self::State {
        self.state.clone()
    }

    fn is_healthy(&self) -> bool {
        self.state.engagement != PtoEngagement::Error && !self.state.overload_detected
    }
}

impl Default for PtoController {
    fn default() -> Self {
        Self::new()
    }
}
