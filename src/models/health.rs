//! Adapter health reporting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Health of one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum HealthStatus {
    /// The source answered normally.
    Ok,
    /// The source answered, but not fully.
    Degraded(String),
    /// The source could not be reached or failed.
    Unavailable(String),
}

impl HealthStatus {
    /// Returns true for [`HealthStatus::Ok`].
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns the status label used in logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded(_) => "degraded",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unavailable(reason) => write!(f, "unavailable: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_display_and_label() {
        assert_eq!(HealthStatus::Ok.to_string(), "ok");
        let degraded = HealthStatus::Degraded("HTTP 503".to_string());
        assert_eq!(degraded.label(), "degraded");
        assert_eq!(degraded.to_string(), "degraded: HTTP 503");
        assert!(!degraded.is_ok());
    }

    #[test]
    fn test_health_serde_shape() {
        let json = serde_json::to_value(HealthStatus::Unavailable("refused".to_string())).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["reason"], "refused");
    }
}
