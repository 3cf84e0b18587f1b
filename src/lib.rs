pub mod color;
pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod model;
pub mod overlay;
pub mod params;
pub mod render;
pub mod session;
pub mod simulation;
pub mod svg;
pub mod wizard;

pub use error::{Error, NetworkError, Result, ValidationError};
pub use model::{CircleParams, DisasterTaxonomy, GeoPoint};
pub use session::{MapView, SimulationOutcome, WizardSession};
pub use wizard::{WizardState, WizardStep};

/// Install the `tracing` subscriber used by both binaries. `RUST_LOG` wins
/// over the default filter.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hazardmap=info,server=info,tower_http=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
