//! Notifier Dispatcher Seam
//!
//! The engine hands transition events to an abstract sink and waits for the
//! accept/reject answer before advancing its notification baseline. Delivery
//! transport (chat bot, webhook, pager) lives outside the core.

use async_trait::async_trait;

use crate::{
    error::DispatchError,
    types::{HealthStatus, TransitionEvent},
};

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event. An Err answer means "try again next cycle"; the
    /// engine will not advance its baseline.
    async fn notify(&self, event: &TransitionEvent) -> Result<(), DispatchError>;
}

/// Sink that writes events to the log. The default for a process with no
/// delivery transport wired up; also what operators tail in production.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &TransitionEvent) -> Result<(), DispatchError> {
        let message = render(event);
        let level = level_for(event.new_status);
        if level == tracing::Level::INFO {
            tracing::info!(
                owner_id = event.owner_id,
                hostname = %event.hostname,
                dimension = %event.dimension,
                "{message}"
            );
        } else if level == tracing::Level::WARN {
            tracing::warn!(
                owner_id = event.owner_id,
                hostname = %event.hostname,
                dimension = %event.dimension,
                "{message}"
            );
        } else {
            tracing::error!(
                owner_id = event.owner_id,
                hostname = %event.hostname,
                dimension = %event.dimension,
                "{message}"
            );
        }
        Ok(())
    }
}

/// Recoveries and first-healthy events are routine; only degradations get
/// the operator-paging levels.
fn level_for(status: HealthStatus) -> tracing::Level {
    match status {
        HealthStatus::Up | HealthStatus::Valid => tracing::Level::INFO,
        HealthStatus::ExpiringSoon | HealthStatus::Unknown => tracing::Level::WARN,
        HealthStatus::Down | HealthStatus::Expired => tracing::Level::ERROR,
    }
}

/// Human-readable one-liner for a transition, in the shape the delivery
/// layer would forward to a user.
pub fn render(event: &TransitionEvent) -> String {
    let change = match event.previous_status {
        Some(previous) => format!("{} -> {}", previous, event.new_status),
        None => format!("now {}", event.new_status),
    };

    let marker = match event.new_status {
        HealthStatus::Up | HealthStatus::Valid => "OK",
        HealthStatus::ExpiringSoon => "WARNING",
        HealthStatus::Down | HealthStatus::Expired => "ALERT",
        HealthStatus::Unknown => "?",
    };

    format!(
        "[{marker}] {}: {} {} ({})",
        event.hostname, event.dimension, change, event.detail
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::types::CheckDimension;

    use super::*;

    fn event(previous: Option<HealthStatus>, new: HealthStatus) -> TransitionEvent {
        TransitionEvent {
            target_id: Uuid::new_v4(),
            owner_id: 42,
            hostname: "example.com".into(),
            dimension: CheckDimension::Reachability,
            previous_status: previous,
            new_status: new,
            detail: "connection refused".into(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_transition() {
        let rendered = render(&event(Some(HealthStatus::Up), HealthStatus::Down));
        assert!(rendered.contains("example.com"));
        assert!(rendered.contains("up -> down"));
        assert!(rendered.contains("connection refused"));
        assert!(rendered.starts_with("[ALERT]"));
    }

    #[test]
    fn test_render_first_observation() {
        let rendered = render(&event(None, HealthStatus::Up));
        assert!(rendered.contains("now up"));
        assert!(rendered.starts_with("[OK]"));
    }

    #[test]
    fn test_log_level_tracks_severity() {
        assert_eq!(level_for(HealthStatus::Up), tracing::Level::INFO);
        assert_eq!(level_for(HealthStatus::Valid), tracing::Level::INFO);
        assert_eq!(level_for(HealthStatus::ExpiringSoon), tracing::Level::WARN);
        assert_eq!(level_for(HealthStatus::Down), tracing::Level::ERROR);
        assert_eq!(level_for(HealthStatus::Expired), tracing::Level::ERROR);
    }
}
