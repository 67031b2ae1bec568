//! Configuration model and loader.

mod loader;
mod model;

pub use loader::{ConfigError, ConfigLoader};
pub use model::{
    AdmissionConfig, Config, DatabaseConfig, DispatchConfig, ImageApiSection, LoggingSection, NotifierSection,
    QueueConfig, ServerConfig,
};
