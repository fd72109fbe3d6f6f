//! Point-to-point transport.
//!
//! Shares the `RpcRouter` (and so the dispatch core) with the HTTP bridge
//! but no transport-level state.

pub mod stdio;

pub use stdio::{StdioHandle, StdioTransport};
