//! Per-route middleware.

pub mod access_control;

pub use access_control::{access_gate_middleware, GateState, Sensitivity};
