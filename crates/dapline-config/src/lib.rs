//! dapline-config: layered TOML configuration for the dapline probe.

pub mod config;
pub mod error;
pub mod load;
pub mod merge;
pub mod validate;

pub use config::{
    Config, ConnectionConfig, LogConfig, LogLevel, ScenarioConfig, Step, TransportKind,
};
pub use error::ConfigError;
pub use load::{load_config, load_from_str};
