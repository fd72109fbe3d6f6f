//! Combines the sub-checks into one report.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use axum::http::StatusCode;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::config::NetworkPreferences;
use crate::dispatch::{CredentialStatus, DispatchCore};
use crate::health::checks;
use crate::health::state::{CheckResult, HealthStatus};
use crate::net::{BindSummary, RequestTracker, StackAvailability};
use crate::security::PolicyStore;

/// Aggregated `/health` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: String,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    pub listener: CheckResult,
    pub dispatcher: CheckResult,
    pub credentials: CheckResult,
    pub network: CheckResult,
    pub access_policy: CheckResult,
}

impl HealthChecks {
    fn statuses(&self) -> [HealthStatus; 5] {
        [
            self.listener.status,
            self.dispatcher.status,
            self.credentials.status,
            self.network.status,
            self.access_policy.status,
        ]
    }
}

impl HealthReport {
    /// 200 for healthy and degraded, 503 for unhealthy.
    pub fn http_status(&self) -> StatusCode {
        match self.status {
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        }
    }
}

/// Holds the collaborators and live snapshots the checks read.
#[derive(Debug)]
pub struct HealthAggregator {
    started: Instant,
    prefs: NetworkPreferences,
    core: Arc<dyn DispatchCore>,
    credentials: Arc<dyn CredentialStatus>,
    policy: Arc<PolicyStore>,
    tracker: RequestTracker,
    bind: ArcSwapOption<BindSummary>,
    stack: ArcSwapOption<StackAvailability>,
}

impl HealthAggregator {
    pub fn new(
        prefs: NetworkPreferences,
        core: Arc<dyn DispatchCore>,
        credentials: Arc<dyn CredentialStatus>,
        policy: Arc<PolicyStore>,
        tracker: RequestTracker,
    ) -> Self {
        Self {
            started: Instant::now(),
            prefs,
            core,
            credentials,
            policy,
            tracker,
            bind: ArcSwapOption::empty(),
            stack: ArcSwapOption::empty(),
        }
    }

    pub fn record_stack(&self, stack: StackAvailability) {
        self.stack.store(Some(Arc::new(stack)));
    }

    /// Publish the bind result. Only a successful bind counts as a listener.
    pub fn record_bind(&self, summary: BindSummary) {
        self.bind.store(Some(Arc::new(summary)));
    }

    /// Forget the listener (after stop).
    pub fn clear_bind(&self) {
        self.bind.store(None);
    }

    pub fn bind_summary(&self) -> Option<Arc<BindSummary>> {
        self.bind.load_full()
    }

    pub fn stack(&self) -> Option<StackAvailability> {
        self.stack.load().as_deref().copied()
    }

    pub fn report(&self) -> HealthReport {
        let bind = self.bind.load_full();
        let stack = self.stack();
        let policy = self.policy.load();

        let checks = HealthChecks {
            listener: checks::listener(bind.as_deref(), self.tracker.active_count()),
            dispatcher: checks::dispatcher(self.core.as_ref()),
            credentials: checks::credentials(self.credentials.as_ref()),
            network: checks::network(&self.prefs, stack.as_ref(), bind.as_deref()),
            access_policy: checks::access_policy(&policy.summary()),
        };

        HealthReport {
            status: HealthStatus::worst(checks.statuses()),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: self.started.elapsed().as_secs(),
            checks,
        }
    }
}
