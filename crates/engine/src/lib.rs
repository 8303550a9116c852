// Symphonia-backed media engine

pub mod config;
pub mod decoder;
pub mod engine;
pub mod output;
mod source;
mod worker;

pub use config::EngineConfig;
pub use engine::{OutputFactory, SymphoniaEngine, DEVICE_OUTPUT};
pub use output::{AudioOutput, ClockOutput, OutputSpec};
#[cfg(feature = "cpal")]
pub use output::cpal::CpalOutput;
