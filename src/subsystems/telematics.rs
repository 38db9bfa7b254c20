use super::{EcuId, SimRng, Subsystem};
use crate::bus::{channel, MessageBus};
use crate::diagnostics::{fmi, spn, FaultCode, FaultRegistry};
use serde::{Deserialize, Serialize};

const SIGNAL_MIN_PERCENT: f32 = 30.0;
const GPS_REPORT_INTERVAL_CYCLES: u32 = 10;
const COVERAGE_PER_CYCLE_PERCENT: f32 = 0.5;
const STATUS_UPDATE_KB: u32 = 5;

const SIGNAL_FAULT: FaultCode = FaultCode::new(spn::CELLULAR_SIGNAL, fmi::DATA_BELOW_NORMAL);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpsState {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f32,
    pub speed_kmh: f32,
    pub heading_deg: f32,
    pub satellites: u8,
    pub fix: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub cloud_connected: bool,
    pub signal_strength_percent: f32,
    pub data_sent_kb: u32,
    pub data_received_kb: u32,
    pub connection_type: alloc::string::String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelematicsState {
    pub gps: GpsState,
    pub connectivity: ConnectivityState,
    pub field_coverage_percent: f32,
    pub work_hours: f64,
}

/// GPS / cloud-connectivity controller. Simulates field-pattern movement and
/// cellular signal fluctuation, accrues field coverage, and publishes a GPS
/// frame on its channel every tenth cycle.
#[derive(Debug)]
pub struct TelematicsController {
    state: TelematicsState,
    update_counter: u32,
    rng: SimRng,
}

impl TelematicsController {
    pub fn new() -> Self {
        Self {
            state: TelematicsState {
                gps: GpsState {
                    latitude: 41.6032,
                    longitude: -90.5776,
                    altitude_m: 180.0,
                    speed_kmh: 0.0,
                    heading_deg: 0.0,
                    // Fix acquired immediately in simulation
                    satellites: 8,
                    fix: true,
                },
                connectivity: ConnectivityState {
                    cloud_connected: true,
                    signal_strength_percent: 85.0,
                    data_sent_kb: 0,
                    data_received_kb: 0,
                    connection_type: alloc::string::String::from("4G LTE"),
                },
                field_coverage_percent: 0.0,
                work_hours: 0.0,
            },
            update_counter: 0,
            rng: SimRng::new(0xC2B2_AE3D_27D4_EB4F),
        }
    }

    pub fn update(&mut self, bus: &mut MessageBus, diagnostics: &mut FaultRegistry) {
        self.update_counter = self.update_counter.wrapping_add(1);

        if self.state.gps.fix {
            // Field-pattern drift, generally eastward
            let jitter = |rng: &mut SimRng| (rng.random_below(3) as f64 - 1.0) * 0.00001;
            self.state.gps.latitude += jitter(&mut self.rng);
            self.state.gps.longitude += jitter(&mut self.rng);
            self.state.gps.speed_kmh = 8.0 + self.rng.random_below(30) as f32 / 10.0;
            self.state.gps.heading_deg = 90.0 + (self.rng.random_below(20) as f32 - 10.0);

            if self.state.field_coverage_percent < 100.0 {
                self.state.field_coverage_percent += COVERAGE_PER_CYCLE_PERCENT;
            }
        }

        self.state.work_hours += 0.1 / 3600.0;

        self.state.connectivity.signal_strength_percent =
            75.0 + self.rng.random_below(20) as f32;

        if self.state.connectivity.signal_strength_percent < SIGNAL_MIN_PERCENT {
            let _ = diagnostics.report(
                SIGNAL_FAULT,
                EcuId::Telematics.name(),
                "Cellular signal strength below minimum threshold",
            );
            self.state.connectivity.cloud_connected = false;
        } else {
            diagnostics.clear(SIGNAL_FAULT);
            self.state.connectivity.cloud_connected = true;
        }

        if self.update_counter % GPS_REPORT_INTERVAL_CYCLES == 0 {
            let frame = [
                (self.state.gps.latitude * 10000.0) as u8,
                (self.state.gps.longitude * 10000.0) as u8,
                self.state.gps.speed_kmh as u8,
                self.state.gps.heading_deg as u8,
                self.state.gps.satellites,
                self.state.connectivity.signal_strength_percent as u8,
                0,
                0,
            ];
            let _ = bus.send(channel::TELEMATICS_GPS, &frame);
        }
    }

    /// Push an accumulated status report to the cloud backend.
    pub fn send_status_update(&mut self) {
        self.state.connectivity.data_sent_kb += STATUS_UPDATE_KB;
        self.state.connectivity.data_received_kb += 1;
    }
}

impl Subsystem for TelematicsController {
    type State = TelematicsState;

    fn get_state(&self) -> Self::State {
        self.state.clone()
    }

    fn is_healthy(&self) -> bool {
        self.state.connectivity.cloud_connected
    }
}

impl Default for TelematicsController {
    fn default() -> Self {
        Self::new()
    }
}
