//! Health aggregation subsystem.
//!
//! # Data Flow
//! ```text
//! ProtocolBridge.start()
//!     → record_stack(StackAvailability)
//!     → record_bind(BindSummary)
//!
//! GET|POST /health
//!     → aggregator.rs reads live snapshots
//!     → checks.rs (listener, dispatcher, credentials, network, accessPolicy)
//!     → state.rs (worst status wins)
//!     → 200 healthy/degraded, 503 unhealthy
//! ```
//!
//! # Design Decisions
//! - Checks are pure functions over snapshots; no check performs I/O except
//!   the credential existence test
//! - Snapshots are published through ArcSwap so reports never block startup

pub mod aggregator;
pub mod checks;
pub mod state;

pub use aggregator::{HealthAggregator, HealthChecks, HealthReport};
pub use state::{CheckResult, HealthStatus};
