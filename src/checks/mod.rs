//! Check Executors
//!
//! One polymorphic capability shared by all three dimensions so the sweep
//! coordinator and transition engine are written once. Dimension-specific
//! classification thresholds live inside each checker.

pub mod certificate;
pub mod reachability;
pub mod registration;

use async_trait::async_trait;

use crate::{
    error::CheckError,
    types::{CheckDimension, CheckResult, HealthStatus},
};

pub use certificate::CertificateChecker;
pub use reachability::ReachabilityChecker;
pub use registration::RegistrationChecker;

#[async_trait]
pub trait Checker: Send + Sync {
    fn dimension(&self) -> CheckDimension;

    /// Wait for client-side data-source pacing. The sweep awaits this
    /// before starting the per-check timeout, so a limiter wait is never
    /// misreported as a check timeout.
    async fn pace(&self) {}

    /// Probe one hostname. Errors are folded into Unknown outcomes by the
    /// sweep; the overall call is additionally bounded by the sweep's
    /// per-check timeout.
    async fn check(&self, hostname: &str) -> Result<CheckResult, CheckError>;
}

/// Shared expiry classification for the certificate and registration
/// dimensions. `days_remaining == 0` is already expired; the threshold is
/// inclusive on the expiring side.
pub fn classify_days_remaining(days_remaining: i64, threshold_days: i64) -> HealthStatus {
    if days_remaining <= 0 {
        HealthStatus::Expired
    } else if days_remaining <= threshold_days {
        HealthStatus::ExpiringSoon
    } else {
        HealthStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(classify_days_remaining(0, 14), HealthStatus::Expired);
        assert_eq!(classify_days_remaining(-30, 14), HealthStatus::Expired);
        assert_eq!(classify_days_remaining(1, 14), HealthStatus::ExpiringSoon);
        assert_eq!(classify_days_remaining(14, 14), HealthStatus::ExpiringSoon);
        assert_eq!(classify_days_remaining(15, 14), HealthStatus::Valid);
        assert_eq!(classify_days_remaining(365, 14), HealthStatus::Valid);
    }

    #[test]
    fn test_zero_threshold_only_reports_expiry() {
        assert_eq!(classify_days_remaining(1, 0), HealthStatus::Valid);
        assert_eq!(classify_days_remaining(0, 0), HealthStatus::Expired);
    }
}
