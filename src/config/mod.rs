//! Configuration management

pub mod settings;

pub use settings::{AuthConfig, LoggingConfig, ServerConfig, Settings, UpstreamConfig};
