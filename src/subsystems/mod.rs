pub mod engine;
pub mod hydraulics;
pub mod implement;
pub mod pto;
pub mod telematics;
pub mod transmission;

pub use engine::{EngineController, EngineState};
pub use hydraulics::{HydraulicsController, HydraulicsState};
pub use implement::{ImplementController, ImplementState, ImplementStatus, ImplementType};
pub use pto::{PtoController, PtoEngagement, PtoSpeed, PtoState};
pub use telematics::{TelematicsController, TelematicsState};
pub use transmission::{GearPosition, TransmissionController, TransmissionState};

use serde::{Deserialize, Serialize};

/// Identifies one subsystem controller on the ECU network. The name doubles
/// as the owning-module field on fault reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EcuId {
    Engine,
    Transmission,
    Hydraulics,
    Pto,
    Implement,
    Telematics,
}

impl EcuId {
    pub fn name(self) -> &'static str {
        match self {
            EcuId::Engine => "Engine",
            EcuId::Transmission => "Transmission",
            EcuId::Hydraulics => "Hydraulics",
            EcuId::Pto => "PTO",
            EcuId::Implement => "Implement",
            EcuId::Telematics => "Telematics",
        }
    }
}

/// Common surface of every subsystem controller: a cloneable serializable
/// state snapshot and a health predicate. Per-cycle update methods are
/// inherent because their inputs differ per controller (most read the engine
/// snapshot, the implement reads hydraulics and PTO).
pub trait Subsystem {
    type State: Clone + Serialize;

    fn get_state(&self) -> Self::State;
    fn is_healthy(&self) -> bool;
}

/// Simple Linear Congruential Generator for simulation jitter.
/// Fixed seed so runs and tests are deterministic.
#[derive(Debug)]
pub(crate) struct SimRng {
    state: u64,
}

impl SimRng {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_random(&mut self) -> u64 {
        // X(n+1) = (aX(n) + c) mod m, parameters from Numerical Recipes
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.state
    }

    pub(crate) fn random_u32(&mut self) -> u32 {
        self.next_random() as u32
    }

    /// Uniform value in `[0, bound)`. `bound` must be non-zero.
    pub(crate) fn random_below(&mut self, bound: u32) -> u32 {
        self.random_u32() % bound
    }
}
