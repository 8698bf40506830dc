use std::{env, path::Path, time::Duration};

use config::Config;
use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 20;
const DEFAULT_EXPIRY_THRESHOLD_DAYS: i64 = 14;
const DEFAULT_WHOIS_QUERIES_PER_MINUTE: usize = 30;
const DEFAULT_STORE_PATH: &str = "domainwatch.json";

/// Process-wide monitoring settings. Supplied at startup, immutable for the
/// process lifetime.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub sweep_interval_secs: u64,
    pub check_timeout_secs: u64,
    pub max_concurrent_checks: usize,
    pub cert_expiry_threshold_days: i64,
    pub registration_expiry_threshold_days: i64,
    pub whois_queries_per_minute: usize,
    pub store_path: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            check_timeout_secs: DEFAULT_CHECK_TIMEOUT_SECS,
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
            cert_expiry_threshold_days: DEFAULT_EXPIRY_THRESHOLD_DAYS,
            registration_expiry_threshold_days: DEFAULT_EXPIRY_THRESHOLD_DAYS,
            whois_queries_per_minute: DEFAULT_WHOIS_QUERIES_PER_MINUTE,
            store_path: DEFAULT_STORE_PATH.to_string(),
        }
    }
}

impl MonitorConfig {
    /// Load from `domainwatch.toml` (or `DOMAINWATCH_CONFIG`) when present,
    /// falling back to defaults. Invalid values are fatal.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            env::var("DOMAINWATCH_CONFIG").unwrap_or_else(|_| "domainwatch.toml".to_string());

        if Path::new(&path).exists() {
            Self::from_file(&path)
        } else {
            let cfg = Self::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let cfg: Self = Config::builder()
            .add_source(config::File::with_name(path))
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "sweep_interval_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.check_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "check_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.check_timeout_secs >= self.sweep_interval_secs {
            return Err(ConfigError::Invalid {
                field: "check_timeout_secs",
                reason: format!(
                    "must be shorter than the sweep interval ({}s)",
                    self.sweep_interval_secs
                ),
            });
        }
        if self.max_concurrent_checks == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_checks",
                reason: "must be greater than zero".into(),
            });
        }
        if self.cert_expiry_threshold_days < 0 {
            return Err(ConfigError::Invalid {
                field: "cert_expiry_threshold_days",
                reason: "must not be negative".into(),
            });
        }
        if self.registration_expiry_threshold_days < 0 {
            return Err(ConfigError::Invalid {
                field: "registration_expiry_threshold_days",
                reason: "must not be negative".into(),
            });
        }
        if self.whois_queries_per_minute == 0 {
            return Err(ConfigError::Invalid {
                field: "whois_queries_per_minute",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }
}
