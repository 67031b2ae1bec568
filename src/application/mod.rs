//! Application layer: the C3–C8 components and the service facade that
//! composes them, independent of any concrete adapter.

pub mod admission;
pub mod dispatch;
pub mod expansion;
pub mod image_dimensions;
pub mod matrix;
pub mod monitor;
pub mod service;
pub mod worker;

pub use admission::{AdmissionController, AdmissionOutcome};
pub use dispatch::DispatchScheduler;
pub use expansion::Expander;
pub use matrix::MatrixView;
pub use monitor::TaskMonitor;
pub use service::OrchestratorService;
pub use worker::SubtaskWorker;
