//! HTTP protocol bridge subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (listener from net::SocketBinder)
//!     → server.rs (Axum setup, tower-http layers)
//!     → request.rs (request ID)
//!     → middleware/access_control.rs (preflight, origin verdict per route)
//!     → handlers.rs (/health aggregation, /mcp envelope → rpc::RpcRouter)
//!     → response.rs (JSON error bodies)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use handlers::AppState;
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{build_router, BridgeError, BridgeState, ProtocolBridge, HEALTH_PATH, RPC_PATH};
