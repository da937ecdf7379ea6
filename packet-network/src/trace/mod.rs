pub mod simulation_step;
pub mod simulation_stepper;
pub mod simulation_verifier;
pub mod stats;
pub mod tracer;
