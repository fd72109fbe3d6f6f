//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (supervisor.rs):
//!     initialize(mode) → stdio transport and/or ProtocolBridge.start()
//!     any failure → stop what started → error to caller
//!
//! Shutdown (shutdown.rs):
//!     trigger → stop accepting → drain in-flight → release sockets
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → supervisor.shutdown() → exit latch
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then transports
//! - Shutdown has a grace deadline per transport

pub mod shutdown;
pub mod signals;
pub mod supervisor;

pub use shutdown::Shutdown;
pub use supervisor::{TransportState, TransportStatus, TransportSupervisor};
