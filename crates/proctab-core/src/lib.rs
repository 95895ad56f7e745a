//! proctab Core Library
//!
//! Shared functionality for proctab components:
//! - Process records and the deployment-model types they snapshot
//! - Configuration resolution and hierarchy
//! - Common error types
//! - Tracing initialisation

pub mod config;
pub mod error;
pub mod model;
pub mod tracing_init;

pub use config::{Config, LauncherConfig, RegistryConfig};
pub use error::{Error, Result};
pub use model::{
    ContainerDefinition, ContainerInstance, Mode, PreviewDescription, ProcessRecord, System,
};
