#![allow(clippy::type_complexity)]

pub mod error;
pub mod network;
pub mod trace;
mod util;

pub use error::{ErrorKind, NetworkError};
pub use network::{Network, NetworkConfig};
pub use trace::tracer::SimulationStepTracer;
