//! Independent health sub-checks. Each is a pure function of a snapshot.

use serde_json::json;

use crate::config::NetworkPreferences;
use crate::dispatch::{CredentialStatus, DispatchCore};
use crate::health::state::CheckResult;
use crate::net::{BindSummary, StackAvailability};
use crate::security::PolicySummary;

/// Listener/bind status.
pub fn listener(bind: Option<&BindSummary>, inflight: u64) -> CheckResult {
    let Some(bind) = bind else {
        return CheckResult::unhealthy("No listener bound");
    };

    if !bind.success {
        let reason = bind
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown bind failure".to_string());
        return CheckResult::unhealthy(format!("Bind failed: {}", reason))
            .with_details(json!({ "attempts": bind.attempts }));
    }

    CheckResult::healthy("Listening").with_details(json!({
        "address": bind.address,
        "port": bind.port,
        "family": bind.family,
        "dualStack": bind.dual_stack,
        "inflightRequests": inflight,
    }))
}

/// External dispatch core availability.
pub fn dispatcher(core: &dyn DispatchCore) -> CheckResult {
    let details = core.describe();
    if core.is_available() {
        CheckResult::healthy("Dispatch core available").with_details(details)
    } else {
        CheckResult::unhealthy("Dispatch core unavailable").with_details(details)
    }
}

/// Credential file presence. Existence only; contents are never read.
pub fn credentials(status: &dyn CredentialStatus) -> CheckResult {
    let credentials = status.credentials_file_present();
    let oauth_keys = status.oauth_keys_present();
    let details = json!({
        "credentialsFilePresent": credentials,
        "oauthKeysPresent": oauth_keys,
    });

    match (credentials, oauth_keys) {
        (true, true) => CheckResult::healthy("Credentials present"),
        (false, true) => CheckResult::degraded("Credentials file missing"),
        (true, false) => CheckResult::degraded("OAuth keys missing"),
        (false, false) => CheckResult::degraded("Credentials file and OAuth keys missing"),
    }
    .with_details(details)
}

/// Stack probe results against what the operator asked for.
pub fn network(
    prefs: &NetworkPreferences,
    stack: Option<&StackAvailability>,
    bind: Option<&BindSummary>,
) -> CheckResult {
    let Some(stack) = stack else {
        return CheckResult::degraded("Network stack not probed");
    };
    let details = json!({
        "ipv4": stack.ipv4,
        "ipv6": stack.ipv6,
        "preferred": stack.preferred,
        "preferIpv6": prefs.prefer_ipv6,
        "dualStackRequested": prefs.dual_stack,
        "ipv6Enabled": prefs.enable_ipv6,
    });

    if !stack.any() {
        return CheckResult::unhealthy("Neither IPv4 nor IPv6 is usable").with_details(details);
    }

    if let Some(pinned) = prefs.pinned_address() {
        return CheckResult::healthy(format!("Pinned to {}", pinned)).with_details(details);
    }

    if prefs.wants_ipv6() && !stack.ipv6 {
        return CheckResult::degraded("IPv6 requested but unavailable").with_details(details);
    }

    let dual_requested = prefs.enable_ipv6 && prefs.dual_stack;
    if dual_requested && bind.is_some_and(|b| b.success && !b.dual_stack) {
        return CheckResult::degraded("Dual-stack requested but not achieved").with_details(details);
    }

    CheckResult::healthy("Network stack as requested").with_details(details)
}

/// Current access policy summary.
pub fn access_policy(summary: &PolicySummary) -> CheckResult {
    let details = json!(summary);
    if summary.pattern_count == 0 {
        CheckResult::degraded("No origin patterns configured; all cross-origin requests are rejected")
            .with_details(details)
    } else {
        CheckResult::healthy(format!("{} origin pattern(s) active", summary.pattern_count))
            .with_details(details)
    }
}
