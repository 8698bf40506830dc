use std::sync::Arc;
use tokio::time::Duration;

use leaky_bucket::RateLimiter;

/// Outbound rate limiting for check data sources.
///
/// WHOIS registries throttle aggressively, so registration checks acquire a
/// permit before every query. HTTP and TLS probes go to the targets
/// themselves and are bounded by the sweep's concurrency limit instead.
#[derive(Clone)]
pub struct RateLimiters {
    whois: Arc<RateLimiter>,
}

impl RateLimiters {
    pub fn new(whois_queries_per_minute: usize) -> Self {
        let interval_ms = 60_000 / whois_queries_per_minute.max(1) as u64;
        let whois = RateLimiter::builder()
            .initial(whois_queries_per_minute)
            .interval(Duration::from_millis(interval_ms))
            .max(whois_queries_per_minute)
            .refill(1)
            .build();

        Self {
            whois: Arc::new(whois),
        }
    }

    pub async fn acquire_whois(&self) {
        self.whois.acquire_one().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_capacity_is_available() {
        let limiters = RateLimiters::new(5);
        // The full initial burst should be acquirable without waiting for a refill
        for _ in 0..5 {
            limiters.acquire_whois().await;
        }
    }
}
