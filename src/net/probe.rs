//! IP stack probing.
//!
//! # Responsibilities
//! - Decide whether the host can bind IPv4 and IPv6 sockets
//! - Bound each probe with a timeout
//!
//! # Design Decisions
//! - Probe = bind the family's wildcard on port 0, then close
//! - The two probes run concurrently; neither failure is fatal
//! - Results are computed once per process

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use socket2::{Domain, Protocol, Socket, Type};

use crate::net::AddressFamily;

/// Default per-family probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Which stack the host is best suited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredStack {
    Ipv4,
    Ipv6,
    Dual,
}

/// Usable address families on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StackAvailability {
    pub ipv4: bool,
    pub ipv6: bool,
    pub preferred: PreferredStack,
}

impl StackAvailability {
    /// Build from probe results. With neither family usable, `preferred` is
    /// an inert `Ipv4`; callers still have to handle that case.
    pub fn from_flags(ipv4: bool, ipv6: bool) -> Self {
        let preferred = match (ipv4, ipv6) {
            (true, true) => PreferredStack::Dual,
            (false, true) => PreferredStack::Ipv6,
            _ => PreferredStack::Ipv4,
        };
        Self { ipv4, ipv6, preferred }
    }

    /// Same availability with IPv6 removed.
    pub fn without_ipv6(&self) -> Self {
        Self::from_flags(self.ipv4, false)
    }

    pub fn any(&self) -> bool {
        self.ipv4 || self.ipv6
    }
}

/// Probes which address families can be bound.
#[derive(Debug, Clone)]
pub struct StackProber {
    timeout: Duration,
}

impl StackProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Probe both families concurrently.
    pub async fn probe(&self) -> StackAvailability {
        let (ipv4, ipv6) = tokio::join!(
            self.probe_family(AddressFamily::IPv4),
            self.probe_family(AddressFamily::IPv6),
        );
        let availability = StackAvailability::from_flags(ipv4, ipv6);

        tracing::info!(
            ipv4 = availability.ipv4,
            ipv6 = availability.ipv6,
            preferred = ?availability.preferred,
            "Network stack probed"
        );
        availability
    }

    /// Returns true if an ephemeral bind on the family's wildcard succeeds.
    pub async fn probe_family(&self, family: AddressFamily) -> bool {
        let addr = SocketAddr::new(family.unspecified(), 0);
        let attempt = tokio::task::spawn_blocking(move || test_bind(addr));

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(Ok(()))) => true,
            Ok(Ok(Err(e))) => {
                tracing::debug!(family = %family, error = %e, "Address family unavailable");
                false
            }
            Ok(Err(e)) => {
                tracing::warn!(family = %family, error = %e, "Stack probe task failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    family = %family,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Stack probe timed out"
                );
                false
            }
        }
    }
}

impl Default for StackProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

/// Bind then drop. The IPv6 probe is IPv6-only so it does not succeed on an
/// IPv4-mapped fallback.
fn test_bind(addr: SocketAddr) -> io::Result<()> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.bind(&addr.into())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_from_flags() {
        assert_eq!(StackAvailability::from_flags(true, true).preferred, PreferredStack::Dual);
        assert_eq!(StackAvailability::from_flags(true, false).preferred, PreferredStack::Ipv4);
        assert_eq!(StackAvailability::from_flags(false, true).preferred, PreferredStack::Ipv6);

        let none = StackAvailability::from_flags(false, false);
        assert_eq!(none.preferred, PreferredStack::Ipv4);
        assert!(!none.any());
    }

    #[test]
    fn masking_ipv6() {
        let masked = StackAvailability::from_flags(true, true).without_ipv6();
        assert!(!masked.ipv6);
        assert_eq!(masked.preferred, PreferredStack::Ipv4);
    }

    #[tokio::test]
    async fn ipv4_probe_succeeds_on_loopback_capable_host() {
        let prober = StackProber::default();
        assert!(prober.probe_family(AddressFamily::IPv4).await);
        assert!(prober.probe().await.ipv4);
    }
}
