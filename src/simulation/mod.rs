pub mod backend;
pub mod coordinator;
pub mod payload;

pub use backend::{Endpoint, HttpBackend, SimulationBackend};
pub use coordinator::SimulationCoordinator;
pub use payload::{
    CityImpact, EdgeImpact, NormalizedCircle, SimulationEnvelope, SimulationRequest,
    SimulationResponse, SimulationResponseEnvelope,
};
