//! Bind candidate planning.
//!
//! # Decision Table
//! ```text
//! 0. bind_address is a literal, non-wildcard IP  → [that address]
//! 1. dual_stack && IPv6 available                → [[::] dual-stack, 0.0.0.0, 127.0.0.1]
//! 2. prefer_ipv6 && IPv6 available               → [[::]]
//! 3. IPv6 available && IPv4 not                  → [[::]]
//! 4. IPv4 available                              → [0.0.0.0]
//! 5. otherwise                                   → [[::]]  (fails loudly)
//! ```
//! `enable_ipv6 = false` masks IPv6 availability before the table.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use serde::Serialize;

use crate::config::NetworkPreferences;
use crate::net::{AddressFamily, StackAvailability};

/// One address to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindCandidate {
    pub address: IpAddr,
    pub family: AddressFamily,
    /// Attempt to clear `IPV6_V6ONLY` so one socket serves both families.
    pub dual_stack: bool,
}

impl BindCandidate {
    pub fn ipv6_wildcard(dual_stack: bool) -> Self {
        Self {
            address: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            family: AddressFamily::IPv6,
            dual_stack,
        }
    }

    pub fn ipv4_wildcard() -> Self {
        Self::exact(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    pub fn ipv4_loopback() -> Self {
        Self::exact(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    pub fn exact(address: IpAddr) -> Self {
        Self {
            address,
            family: AddressFamily::of(&address),
            dual_stack: false,
        }
    }

    pub fn socket_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.address, port)
    }
}

/// Turns preferences and probe results into an ordered candidate list.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindingPlanner;

impl BindingPlanner {
    pub fn plan(prefs: &NetworkPreferences, avail: &StackAvailability) -> Vec<BindCandidate> {
        if let Some(address) = prefs.pinned_address() {
            return vec![BindCandidate::exact(address)];
        }

        let avail = if prefs.enable_ipv6 {
            *avail
        } else {
            avail.without_ipv6()
        };

        let candidates = if prefs.dual_stack && avail.ipv6 {
            vec![
                BindCandidate::ipv6_wildcard(true),
                BindCandidate::ipv4_wildcard(),
                BindCandidate::ipv4_loopback(),
            ]
        } else if prefs.prefer_ipv6 && avail.ipv6 {
            vec![BindCandidate::ipv6_wildcard(false)]
        } else if avail.ipv6 && !avail.ipv4 {
            vec![BindCandidate::ipv6_wildcard(false)]
        } else if avail.ipv4 {
            vec![BindCandidate::ipv4_wildcard()]
        } else {
            tracing::warn!("No address family probed usable; falling back to [::]");
            vec![BindCandidate::ipv6_wildcard(false)]
        };

        tracing::debug!(
            candidates = ?candidates.iter().map(|c| c.address).collect::<Vec<_>>(),
            "Bind plan computed"
        );
        candidates
    }
}
