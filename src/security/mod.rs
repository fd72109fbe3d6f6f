//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → http/middleware/access_control.rs (per-route gate)
//!     → access_control.rs (evaluate origin against current AccessPolicy)
//!     → origin.rs (exact / wildcard / private-network matching)
//!     → headers.rs (reflect validated origin, preflight headers)
//!     → Pass to handler, or 403 with diagnostics
//! ```
//!
//! # Design Decisions
//! - Fail closed: malformed origins never match
//! - Sensitivity is a per-route flag, not inferred from the path
//! - Policy swaps are atomic (arc-swap)

pub mod access_control;
pub mod headers;
pub mod origin;

pub use access_control::{AccessGate, AccessPolicy, OriginVerdict, PolicyStore, PolicySummary, PreflightResponse};
pub use origin::{is_private_network, matches, OriginPattern};
