use super::{EcuId, HydraulicsState, PtoState, SimRng, Subsystem};
use crate::bus::{channel, MessageBus};
use crate::diagnostics::{fmi, spn, FaultCode, FaultRegistry};
use serde::{Deserialize, Serialize};

const LIFT_PRESSURE_MIN_PSI: f32 = 100.0;
const WORK_PRESSURE_MIN_PSI: f32 = 80.0;
const BASE_FLOW_LPM: f32 = 80.0;
const FLOW_JITTER_LPM: u32 = 40;
const DEPTH_DEADBAND_CM: f32 = 0.5;
const DEPTH_GAIN: f32 = 0.1;
const ASSUMED_GROUND_SPEED_KMH: f32 = 10.0;

const LIFT_FAULT: FaultCode = FaultCode::new(spn::IMPLEMENT_LIFT_PRESSURE, fmi::DATA_BELOW_NORMAL);
const WORK_PRESSURE_FAULT: FaultCode =
    FaultCode::new(spn::IMPLEMENT_WORK_PRESSURE, fmi::DATA_BELOW_NORMAL);
const PTO_REQUIRED_FAULT: FaultCode =
    FaultCode::new(spn::IMPLEMENT_PTO_REQUIRED, fmi::CONDITION_EXISTS);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImplementType {
    Planter,
    Sprayer,
    Baler,
    Cultivator,
    Mower,
}

impl ImplementType {
    pub fn name(self) -> &'static str {
        match self {
            ImplementType::Planter => "Planter",
            ImplementType::Sprayer => "Sprayer",
            ImplementType::Baler => "Baler",
            ImplementType::Cultivator => "Cultivator",
            ImplementType::Mower => "Mower",
        }
    }

    pub fn working_width_m(self) -> f32 {
        match self {
            ImplementType::Planter => 12.0,
            ImplementType::Sprayer => 18.0,
            ImplementType::Baler => 2.3,
            ImplementType::Cultivator => 9.0,
            ImplementType::Mower => 7.5,
        }
    }

    pub fn rows_or_sections(self) -> u8 {
        match self {
            ImplementType::Planter => 24,
            ImplementType::Sprayer => 36,
            ImplementType::Baler => 1,
            ImplementType::Cultivator => 45,
            ImplementType::Mower => 3,
        }
    }

    pub fn default_depth_cm(self) -> f32 {
        match self {
            ImplementType::Planter => 5.0,
            ImplementType::Sprayer => 0.0,
            ImplementType::Baler => 0.0,
            ImplementType::Cultivator => 15.0,
            ImplementType::Mower => 8.0,
        }
    }

    /// Implements driven off the PTO shaft rather than purely hydraulic.
    pub fn requires_pto(self) -> bool {
        matches!(self, ImplementType::Baler | ImplementType::Mower)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImplementStatus {
    Idle,
    Raised,
    Working,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementState {
    pub attached: Option<ImplementType>,
    pub status: ImplementStatus,
    pub working_depth_cm: f32,
    pub target_depth_cm: f32,
    pub working_width_m: f32,
    pub supply_pressure_psi: f32,
    pub flow_lpm: f32,
    pub auto_depth_control: bool,
    pub rows_or_sections: u8,
    pub coverage_rate_ha_hr: f32,
}

/// Rear-hitch implement controller. Attach/raise/lower drive a small status
/// machine; while working, depth tracks the target under auto depth control
/// and hydraulic supply plus PTO engagement are monitored for faults.
#[derive(Debug)]
pub struct ImplementController {
    state: ImplementState,
    rng: SimRng,
}

impl ImplementController {
    pub fn new() -> Self {
        Self {
            state: ImplementState {
                attached: None,
                status: ImplementStatus::Idle,
                working_depth_cm: 0.0,
                target_depth_cm: 10.0,
                working_width_m: 0.0,
                supply_pressure_psi: 0.0,
                flow_lpm: 0.0,
                auto_depth_control: true,
                rows_or_sections: 0,
                coverage_rate_ha_hr: 0.0,
            },
            rng: SimRng::new(0x517C_C1B7_2722_0A95),
        }
    }

    pub fn attach(&mut self, kind: ImplementType, bus: &mut MessageBus) {
        self.state.attached = Some(kind);
        self.state.status = ImplementStatus::Raised;
        self.state.working_width_m = kind.working_width_m();
        self.state.rows_or_sections = kind.rows_or_sections();
        self.state.target_depth_cm = kind.default_depth_cm();

        let frame = [0x01, kind.rows_or_sections(), 0, 0, 0, 0, 0, 0];
        let _ = bus.send(channel::IMPLEMENT_ATTACH, &frame);
    }

    pub fn detach(&mut self) {
        self.state.attached = None;
        self.state.status = ImplementStatus::Idle;
        self.state.working_depth_cm = 0.0;
        self.state.working_width_m = 0.0;
    }

    /// Drop the implement into work position. Refused without an attached
    /// implement or without lift pressure; the pressure refusal is recorded
    /// as a lift fault.
    pub fn lower(
        &mut self,
        hydraulics: &HydraulicsState,
        bus: &mut MessageBus,
        diagnostics: &mut FaultRegistry,
    ) -> Result<(), &'static str> {
        if self.state.attached.is_none() {
            return Err("no implement attached");
        }

        if hydraulics.system_pressure_psi < LIFT_PRESSURE_MIN_PSI {
            let _ = diagnostics.report(
                LIFT_FAULT,
                EcuId::Implement.name(),
                "Implement lowering failed - insufficient hydraulic pressure",
            );
            return Err("insufficient hydraulic pressure to lower implement");
        }

        self.state.status = ImplementStatus::Working;
        self.state.working_depth_cm = self.state.target_depth_cm;

        let frame = [0x01, self.state.working_depth_cm as u8, 0, 0, 0, 0, 0, 0];
        let _ = bus.send(channel::IMPLEMENT_POSITION, &frame);

        Ok(())
    }

    pub fn raise(&mut self, bus: &mut MessageBus) {
        if self.state.attached.is_none() {
            return;
        }

        self.state.status = ImplementStatus::Raised;
        self.state.working_depth_cm = 0.0;

        let _ = bus.send(channel::IMPLEMENT_POSITION, &[0x00, 0, 0, 0, 0, 0, 0, 0]);
    }

    pub fn set_depth(&mut self, depth_cm: f32) {
        self.state.target_depth_cm = depth_cm;
    }

    pub fn is_working(&self) -> bool {
        self.state.status == ImplementStatus::Working
    }

    pub fn update(
        &mut self,
        hydraulics: &HydraulicsState,
        pto: &PtoState,
        bus: &mut MessageBus,
        diagnostics: &mut FaultRegistry,
    ) {
        let Some(kind) = self.state.attached else {
            return;
        };

        if self.state.status != ImplementStatus::Working {
            return;
        }

        self.state.supply_pressure_psi = hydraulics.system_pressure_psi;
        self.state.flow_lpm = BASE_FLOW_LPM + self.rng.random_below(FLOW_JITTER_LPM) as f32;

        if self.state.auto_depth_control && self.state.target_depth_cm > 0.0 {
            let depth_error = self.state.target_depth_cm - self.state.working_depth_cm;
            if depth_error.abs() > DEPTH_DEADBAND_CM {
                self.state.working_depth_cm += depth_error * DEPTH_GAIN;
            }
        }

        // Coverage = width (m) x speed (km/h) x 0.1 to get ha/hr
        self.state.coverage_rate_ha_hr =
            self.state.working_width_m * ASSUMED_GROUND_SPEED_KMH * 0.1;

        if self.state.supply_pressure_psi < WORK_PRESSURE_MIN_PSI {
            self.state.status = ImplementStatus::Error;
            let _ = diagnostics.report(
                WORK_PRESSURE_FAULT,
                EcuId::Implement.name(),
                "Implement hydraulic supply pressure too low",
            );
        } else {
            diagnostics.clear(WORK_PRESSURE_FAULT);
        }

        if kind.requires_pto() {
            if pto.engagement != super::pto::PtoEngagement::Engaged {
                let _ = diagnostics.report(
                    PTO_REQUIRED_FAULT,
                    EcuId::Implement.name(),
                    "PTO not engaged for implement operation",
                );
            } else {
                diagnostics.clear(PTO_REQUIRED_FAULT);
            }
        }

        let frame = [
            self.state.status as u8,
            self.state.working_depth_cm as u8,
            self.state.supply_pressure_psi as u8,
            self.state.flow_lpm as u8,
            (self.state.coverage_rate_ha_hr * 10.0) as u8,
            0,
            0,
            0,
        ];
        let _ = bus.send(channel::IMPLEMENT_TELEMETRY, &frame);
    }
}

impl Subsystem for ImplementController {
    type State = ImplementState;

    fn get_state(&self) -> Self::State {
        self.state.clone()
    }

    fn is_healthy(&self) -> bool {
        self.state.status != ImplementStatus::Error
    }
}

impl Default for ImplementController {
    fn default() -> Self {
        Self::new()
    }
}
