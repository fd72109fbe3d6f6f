//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → config file (TOML, optional)
//!     → environment (EnvSnapshot, captured once)
//!     → CLI overrides
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs reloads with the same snapshot and overrides
//!     → validation.rs validates
//!     → atomic swap of the access policy (PolicyStore)
//! ```
//!
//! # Design Decisions
//! - Only the access policy is hot-reloadable; listener settings need a restart
//! - All fields have defaults so an empty file is a valid config
//! - A failed reload keeps the current policy

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load, ConfigError, ConfigOverrides, EnvSnapshot};
pub use schema::{
    AppConfig, CorsConfig, CredentialsConfig, LogFormat, NetworkConfig, NetworkPreferences,
    ObservabilityConfig, TransportMode,
};
pub use validation::ValidationError;
pub use watcher::PolicyWatcher;
