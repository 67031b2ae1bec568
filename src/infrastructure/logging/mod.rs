//! Structured logging: JSON file output with rotation, an optional pretty
//! stdout layer, and scrubbing of upstream tokens out of log lines.

mod config;
mod logger;
mod secret_scrubbing;

pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
pub use secret_scrubbing::SecretScrubbingLayer;
