//! Health status and per-check results.
//!
//! # Aggregation
//! ```text
//! any check Unhealthy       → Unhealthy
//! else any check Degraded   → Degraded
//! else                      → Healthy
//! ```
//!
//! Variants are declared in severity order so `Ord` picks the worst.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Worst status in `statuses`; `Healthy` when empty.
    pub fn worst<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        statuses.into_iter().max().unwrap_or(HealthStatus::Healthy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Outcome of one independent sub-check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub status: HealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl CheckResult {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Healthy, message)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Degraded, message)
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Unhealthy, message)
    }

    fn with_status(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}
