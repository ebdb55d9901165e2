//! CLI command implementations.

mod config;
mod doctor;

pub use config::run_config;
pub use doctor::run_doctor;
