//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → probe.rs (can this host bind IPv4? IPv6?)
//!     → planner.rs (NetworkPreferences + StackAvailability → ordered candidates)
//!     → binder.rs (try candidates strictly in order, first success wins)
//!     → BindOutcome handed to the HTTP layer, which owns the listener
//!
//! Per request:
//!     → connection.rs (in-flight tracking for health and draining)
//! ```
//!
//! # Design Decisions
//! - A missing address family is a finding, not an error
//! - Bind attempts are sequential so logs and outcome are deterministic
//! - Dual-stack relaxation is best effort and reported, never assumed

pub mod binder;
pub mod connection;
pub mod planner;
pub mod probe;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::Serialize;

pub use binder::{BindAttempt, BindError, BindOutcome, BindSummary, SocketBinder};
pub use connection::{RequestGuard, RequestTracker};
pub use planner::{BindCandidate, BindingPlanner};
pub use probe::{PreferredStack, StackAvailability, StackProber};

/// IP protocol family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AddressFamily {
    IPv4,
    IPv6,
}

impl AddressFamily {
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::IPv4,
            IpAddr::V6(_) => AddressFamily::IPv6,
        }
    }

    /// The wildcard address of this family.
    pub fn unspecified(&self) -> IpAddr {
        match self {
            AddressFamily::IPv4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::IPv6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::IPv4 => "IPv4",
            AddressFamily::IPv6 => "IPv6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
