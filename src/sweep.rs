//! Sweep Coordinator
//!
//! Fans one registry snapshot out to (target, dimension) work units over a
//! bounded concurrent pool. Every unit is independently timed out and
//! failure-isolated: one hung or failing check never delays or aborts the
//! rest of the sweep. Outcomes stream back to the consumer as they complete,
//! unordered across targets.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::{
    checks::Checker,
    types::{CheckOutcome, HealthStatus, Target},
};

const OUTCOME_CHANNEL_CAPACITY: usize = 64;

pub struct SweepCoordinator {
    checkers: Vec<Arc<dyn Checker>>,
    check_timeout: Duration,
    max_concurrent: usize,
}

impl SweepCoordinator {
    pub fn new(
        checkers: Vec<Arc<dyn Checker>>,
        check_timeout: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            checkers,
            check_timeout,
            max_concurrent,
        }
    }

    /// Run one sweep over a snapshot. The returned receiver yields outcomes
    /// as they complete and closes once the sweep has fully drained.
    pub fn run_sweep(&self, targets: Vec<Target>) -> mpsc::Receiver<CheckOutcome> {
        let (tx, rx) = mpsc::channel(OUTCOME_CHANNEL_CAPACITY);

        let units: Vec<(Target, Arc<dyn Checker>)> = targets
            .into_iter()
            .flat_map(|target| {
                self.checkers
                    .iter()
                    .map(move |checker| (target.clone(), checker.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();

        let check_timeout = self.check_timeout;
        let max_concurrent = self.max_concurrent;

        tokio::spawn(async move {
            futures::stream::iter(units)
                .for_each_concurrent(max_concurrent, |(target, checker)| {
                    let tx = tx.clone();
                    async move {
                        let outcome = run_unit(&target, checker.as_ref(), check_timeout).await;
                        // The receiver dropping mid-sweep (shutdown) just
                        // discards the remaining outcomes
                        let _ = tx.send(outcome).await;
                    }
                })
                .await;
        });

        rx
    }
}

async fn run_unit(target: &Target, checker: &dyn Checker, check_timeout: Duration) -> CheckOutcome {
    let dimension = checker.dimension();

    // Pacing waits are self-imposed, not evidence about the target, so they
    // must not eat into the check timeout.
    checker.pace().await;

    let (status, detail) =
        match tokio::time::timeout(check_timeout, checker.check(&target.hostname)).await {
            Ok(Ok(result)) => (result.status, result.detail),
            Ok(Err(err)) => {
                tracing::debug!(
                    hostname = %target.hostname,
                    %dimension,
                    "Check failed: {err}"
                );
                (HealthStatus::Unknown, err.to_string())
            }
            Err(_elapsed) => {
                tracing::debug!(
                    hostname = %target.hostname,
                    %dimension,
                    "Check timed out after {check_timeout:?}"
                );
                (HealthStatus::Unknown, "timeout".to_string())
            }
        };

    CheckOutcome {
        target_id: target.id,
        dimension,
        status,
        observed_at: Utc::now(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use crate::{
        error::CheckError,
        types::{CheckDimension, CheckResult},
    };

    use super::*;

    struct InstantChecker {
        dimension: CheckDimension,
        status: HealthStatus,
    }

    #[async_trait]
    impl Checker for InstantChecker {
        fn dimension(&self) -> CheckDimension {
            self.dimension
        }

        async fn check(&self, _hostname: &str) -> Result<CheckResult, CheckError> {
            Ok(CheckResult::new(self.status, "scripted"))
        }
    }

    struct HangingChecker;

    #[async_trait]
    impl Checker for HangingChecker {
        fn dimension(&self) -> CheckDimension {
            CheckDimension::Registration
        }

        async fn check(&self, _hostname: &str) -> Result<CheckResult, CheckError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(CheckResult::new(HealthStatus::Valid, "unreachable"))
        }
    }

    /// Checker whose pacing wait is far longer than the check timeout, like
    /// a drained WHOIS limiter under a large target set.
    struct SlowPacedChecker;

    #[async_trait]
    impl Checker for SlowPacedChecker {
        fn dimension(&self) -> CheckDimension {
            CheckDimension::Registration
        }

        async fn pace(&self) {
            tokio::time::sleep(Duration::from_secs(120)).await;
        }

        async fn check(&self, _hostname: &str) -> Result<CheckResult, CheckError> {
            Ok(CheckResult::new(HealthStatus::Valid, "scripted"))
        }
    }

    struct FailingChecker;

    #[async_trait]
    impl Checker for FailingChecker {
        fn dimension(&self) -> CheckDimension {
            CheckDimension::Certificate
        }

        async fn check(&self, _hostname: &str) -> Result<CheckResult, CheckError> {
            Err(CheckError::Network("connection refused".into()))
        }
    }

    fn targets(n: usize) -> Vec<Target> {
        (0..n)
            .map(|i| Target::new(1, format!("host{i}.example.com")))
            .collect()
    }

    async fn collect(mut rx: mpsc::Receiver<CheckOutcome>) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    #[tokio::test]
    async fn test_sweep_covers_every_target_and_dimension() {
        let coordinator = SweepCoordinator::new(
            vec![
                Arc::new(InstantChecker {
                    dimension: CheckDimension::Reachability,
                    status: HealthStatus::Up,
                }),
                Arc::new(InstantChecker {
                    dimension: CheckDimension::Certificate,
                    status: HealthStatus::Valid,
                }),
            ],
            Duration::from_secs(5),
            4,
        );

        let outcomes = collect(coordinator.run_sweep(targets(3))).await;
        assert_eq!(outcomes.len(), 6);

        let mut by_dimension: HashMap<CheckDimension, usize> = HashMap::new();
        for outcome in &outcomes {
            *by_dimension.entry(outcome.dimension).or_default() += 1;
        }
        assert_eq!(by_dimension[&CheckDimension::Reachability], 3);
        assert_eq!(by_dimension[&CheckDimension::Certificate], 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_check_times_out_without_blocking_others() {
        let coordinator = SweepCoordinator::new(
            vec![
                Arc::new(HangingChecker),
                Arc::new(InstantChecker {
                    dimension: CheckDimension::Reachability,
                    status: HealthStatus::Up,
                }),
            ],
            Duration::from_millis(100),
            10,
        );

        let outcomes = collect(coordinator.run_sweep(targets(3))).await;
        assert_eq!(outcomes.len(), 6);

        for outcome in &outcomes {
            match outcome.dimension {
                CheckDimension::Registration => {
                    assert_eq!(outcome.status, HealthStatus::Unknown);
                    assert_eq!(outcome.detail, "timeout");
                }
                CheckDimension::Reachability => {
                    assert_eq!(outcome.status, HealthStatus::Up);
                }
                other => panic!("unexpected dimension {other}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_wait_does_not_burn_check_timeout() {
        // The pacing wait (120s) dwarfs the check timeout (100ms); the check
        // must still run and report its real status instead of a bogus
        // timeout.
        let coordinator = SweepCoordinator::new(
            vec![Arc::new(SlowPacedChecker), Arc::new(SlowPacedChecker)],
            Duration::from_millis(100),
            4,
        );

        let outcomes = collect(coordinator.run_sweep(targets(2))).await;
        assert_eq!(outcomes.len(), 4);
        for outcome in &outcomes {
            assert_eq!(outcome.status, HealthStatus::Valid, "{}", outcome.detail);
        }
    }

    #[tokio::test]
    async fn test_check_error_becomes_unknown_outcome() {
        let coordinator =
            SweepCoordinator::new(vec![Arc::new(FailingChecker)], Duration::from_secs(5), 4);

        let outcomes = collect(coordinator.run_sweep(targets(1))).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, HealthStatus::Unknown);
        assert_eq!(outcomes[0].detail, "network error: connection refused");
    }

    #[tokio::test]
    async fn test_empty_snapshot_drains_immediately() {
        let coordinator =
            SweepCoordinator::new(vec![Arc::new(FailingChecker)], Duration::from_secs(5), 4);
        let outcomes = collect(coordinator.run_sweep(Vec::new())).await;
        assert!(outcomes.is_empty());
    }
}
