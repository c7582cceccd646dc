//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON) or env var (JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ButlerConfig (validated, immutable)
//!     → consumed once at startup by the engine and listeners
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a listener starts; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_from_env, ConfigError};
pub use schema::{
    ButlerConfig, ListenerConfig, LogFormat, Mode, NotFoundConfig, ObservabilityConfig,
    ServiceConfig, TlsConfig, TunnelConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
