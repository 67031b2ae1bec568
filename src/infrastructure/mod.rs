//! Ambient infrastructure: configuration loading and structured logging.
//!
//! Neither module depends on the domain/application/adapters layers; they
//! exist so `main.rs` and the HTTP satellite crate can bootstrap a process
//! before any orchestrator service is constructed.

pub mod config;
pub mod logging;
