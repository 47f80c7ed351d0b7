//! Domain layer: immutable startup configuration.

pub mod config;

pub use config::{load_config, BridgeConfig, ConfigError};
