//! Monitor Driver
//!
//! Ticks at the configured cadence and runs one sweep per tick. A sweep that
//! outruns the interval defers the next tick until the current sweep has
//! fully drained, so two sweeps are never active at once and outcomes for a
//! target are always processed in sweep order.

use std::{sync::Arc, time::Duration};

use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    engine::TransitionEngine, registry::TargetRegistry, sweep::SweepCoordinator,
    types::HealthStatus,
};

/// What one sweep cycle did, for the logs.
#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    pub targets: usize,
    pub outcomes: usize,
    pub unknown: usize,
    pub transitions: usize,
}

pub struct MonitorDriver {
    registry: Arc<TargetRegistry>,
    sweeper: SweepCoordinator,
    engine: Arc<TransitionEngine>,
    sweep_interval: Duration,
}

impl MonitorDriver {
    pub fn new(
        registry: Arc<TargetRegistry>,
        sweeper: SweepCoordinator,
        engine: Arc<TransitionEngine>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            registry,
            sweeper,
            engine,
            sweep_interval,
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = interval(self.sweep_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Monitor driver started"
        );

        loop {
            // Biased so that a pending shutdown always wins over an overdue
            // tick; an abandoned sweep must never be chased by a fresh one.
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Monitor driver shutting down");
                    break;
                }
                _ = interval.tick() => {
                    // run_cycle is awaited to completion here, which is what
                    // guarantees sweeps never overlap
                    self.run_cycle(&shutdown).await;
                }
            }
        }
    }

    /// One full sweep: snapshot, fan out, feed every outcome through the
    /// transition engine, prune state for removed targets.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> SweepSummary {
        let snapshot = self.registry.snapshot();
        let mut summary = SweepSummary {
            targets: snapshot.len(),
            ..Default::default()
        };

        if snapshot.is_empty() {
            tracing::debug!("No targets registered, skipping sweep");
            return summary;
        }

        let started = Instant::now();
        tracing::debug!(targets = snapshot.len(), "Sweep started");

        let mut outcomes = self.sweeper.run_sweep(snapshot);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, abandoning remainder of sweep");
                    break;
                }
                maybe_outcome = outcomes.recv() => {
                    let Some(outcome) = maybe_outcome else { break };
                    summary.outcomes += 1;
                    if outcome.status == HealthStatus::Unknown {
                        summary.unknown += 1;
                    }
                    // Each outcome applies atomically, so abandoning the
                    // rest of a sweep on shutdown cannot corrupt state
                    if self.engine.apply(outcome).await.is_some() {
                        summary.transitions += 1;
                    }
                }
            }
        }

        self.engine.prune();

        tracing::info!(
            targets = summary.targets,
            outcomes = summary.outcomes,
            unknown = summary.unknown,
            transitions = summary.transitions,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sweep complete"
        );

        summary
    }
}
