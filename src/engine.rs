//! Transition Engine
//!
//! The correctness-critical piece: compares each fresh outcome against the
//! last *notified* status for its (target, dimension) and decides whether a
//! notification-worthy transition occurred. The engine is the sole writer of
//! check state.
//!
//! Notification policy:
//! - Unknown never notifies and never moves the notified baseline; it only
//!   updates `last_status`/`last_observed_at` for display.
//! - A non-Unknown status notifies iff it differs from the baseline, so a
//!   transient Unknown in the middle of an outage cannot produce a false
//!   recovery, and an unchanged bad status never re-notifies.
//! - The baseline advances only after the notifier accepts the event;
//!   dispatch failure is retried by re-evaluation on the next sweep.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    notify::Notifier,
    registry::TargetRegistry,
    types::{CheckDimension, CheckOutcome, HealthStatus, TargetId, TargetState, TransitionEvent},
};

type StateKey = (TargetId, CheckDimension);

/// Last-known state per (target, dimension). Entries are created lazily on
/// first outcome and pruned when their target disappears from the registry.
pub struct StateStore {
    states: RwLock<HashMap<StateKey, TargetState>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &StateKey) -> Option<TargetState> {
        self.states.read().unwrap().get(key).cloned()
    }

    fn record_observation(&self, key: StateKey, outcome: &CheckOutcome) {
        let mut states = self.states.write().unwrap();
        let state = states.entry(key).or_insert_with(|| TargetState {
            last_status: outcome.status,
            last_observed_at: outcome.observed_at,
            last_notified_status: None,
        });
        state.last_status = outcome.status;
        state.last_observed_at = outcome.observed_at;
    }

    fn advance_notified(&self, key: StateKey, outcome: &CheckOutcome) {
        let mut states = self.states.write().unwrap();
        let state = states.entry(key).or_insert_with(|| TargetState {
            last_status: outcome.status,
            last_observed_at: outcome.observed_at,
            last_notified_status: None,
        });
        state.last_notified_status = Some(outcome.status);
    }

    fn retain_targets(&self, keep: impl Fn(&TargetId) -> bool) -> usize {
        let mut states = self.states.write().unwrap();
        let before = states.len();
        states.retain(|(target_id, _), _| keep(target_id));
        before - states.len()
    }

    pub fn len(&self) -> usize {
        self.states.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().unwrap().is_empty()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TransitionEngine {
    registry: Arc<TargetRegistry>,
    states: StateStore,
    notifier: Arc<dyn Notifier>,
}

impl TransitionEngine {
    pub fn new(registry: Arc<TargetRegistry>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            registry,
            states: StateStore::new(),
            notifier,
        }
    }

    /// Process one outcome. Returns the dispatched event when a transition
    /// was notified and accepted.
    pub async fn apply(&self, outcome: CheckOutcome) -> Option<TransitionEvent> {
        // Membership is checked against the registry's current state, not
        // the sweep-start snapshot: a target deleted mid-sweep produces
        // neither events nor state.
        let Some(target) = self.registry.get(outcome.target_id) else {
            tracing::debug!(
                target_id = %outcome.target_id,
                dimension = %outcome.dimension,
                "Discarding outcome for removed target"
            );
            return None;
        };

        let key = (outcome.target_id, outcome.dimension);
        let baseline = self.states.get(&key).and_then(|s| s.last_notified_status);

        let mut dispatched = None;
        if outcome.status != HealthStatus::Unknown && baseline != Some(outcome.status) {
            let event = TransitionEvent {
                target_id: target.id,
                owner_id: target.owner_id,
                hostname: target.hostname.clone(),
                dimension: outcome.dimension,
                previous_status: baseline,
                new_status: outcome.status,
                detail: outcome.detail.clone(),
                occurred_at: outcome.observed_at,
            };

            match self.notifier.notify(&event).await {
                Ok(()) => {
                    self.states.advance_notified(key, &outcome);
                    dispatched = Some(event);
                }
                Err(e) => {
                    // Baseline stays put, so the same status is re-evaluated
                    // (and re-dispatched) on the next sweep's outcome.
                    tracing::warn!(
                        hostname = %target.hostname,
                        dimension = %outcome.dimension,
                        "Failed to dispatch transition event, will retry next sweep: {e}"
                    );
                }
            }
        }

        self.states.record_observation(key, &outcome);
        dispatched
    }

    /// Drop state for targets that no longer exist. Called after each sweep.
    pub fn prune(&self) {
        let removed = self.states.retain_targets(|id| self.registry.exists(*id));
        if removed > 0 {
            tracing::debug!(removed, "Pruned state for removed targets");
        }
    }

    /// Last-known state for one (target, dimension), for the reporting
    /// surface ("last successful check N days ago").
    pub fn state_of(&self, target_id: TargetId, dimension: CheckDimension) -> Option<TargetState> {
        self.states.get(&(target_id, dimension))
    }
}
