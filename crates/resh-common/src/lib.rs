//! resh-common: error types, configuration and tracing setup shared by the
//! resh crates.

pub mod config;
pub mod error;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use crate::config::{AutoSaveConfig, EditorConfig, RenderConfig};
pub use crate::error::{
    ConfigError, GenerationError, ReshError, StoreError, ValidationError,
};
