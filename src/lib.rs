//! Batched image-generation task orchestrator: expansion, admission,
//! dispatch, and progress tracking over a Redis work queue.

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
