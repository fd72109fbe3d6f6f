//! RPC framing subsystem.
//!
//! # Data Flow
//! ```text
//! bytes (HTTP body or one stdio line)
//!     → envelope.rs (parse + validate once: method required, id defaults to null)
//!     → router.rs (local handshake, forward to dispatch core, or -32601)
//!     → envelope.rs (RpcResponse: result | error)
//! ```

pub mod envelope;
pub mod router;

pub use envelope::{EnvelopeError, RpcError, RpcPayload, RpcRequest, RpcResponse};
pub use router::{RpcRouter, ServerInfo, PROTOCOL_VERSION};
