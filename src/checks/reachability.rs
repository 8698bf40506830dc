//! HTTP/HTTPS Reachability Checker
//!
//! Probes HTTPS first and falls back to plain HTTP only when the HTTPS
//! attempt fails at the connection level. A server that answers with an HTTP
//! error status is still reachable.

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::{
    error::CheckError,
    types::{CheckDimension, CheckResult, HealthStatus},
};

use super::Checker;

/// Per-request cap, kept below the sweep's check timeout so a blackholed
/// port surfaces as a connection failure (and the HTTP fallback still gets
/// its turn) instead of the whole check going Unknown.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(4);

pub struct ReachabilityChecker {
    client: reqwest::Client,
}

impl ReachabilityChecker {
    pub fn new() -> Result<Self, CheckError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(request_timeout: std::time::Duration) -> Result<Self, CheckError> {
        let client = reqwest::ClientBuilder::new()
            .use_rustls_tls()
            .connect_timeout(request_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| CheckError::Protocol(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn probe(&self, scheme: &str, hostname: &str) -> Result<StatusCode, reqwest::Error> {
        // The hostname is pre-validated by the registry, so this parse only
        // fails on pathological input; reqwest rejects it again anyway.
        let url = Url::parse(&format!("{scheme}://{hostname}/")).expect("validated hostname");
        let response = self.client.get(url).send().await?;
        Ok(response.status())
    }
}

#[async_trait]
impl Checker for ReachabilityChecker {
    fn dimension(&self) -> CheckDimension {
        CheckDimension::Reachability
    }

    async fn check(&self, hostname: &str) -> Result<CheckResult, CheckError> {
        let https_err = match self.probe("https", hostname).await {
            Ok(status) => return Ok(classify_response("https", status)),
            // An HTTP-level failure still proves the host is up; only a
            // connection-level failure justifies the plaintext fallback.
            Err(e) if is_connection_failure(&e) => e,
            Err(e) => return Err(CheckError::Protocol(error_chain(&e))),
        };

        match self.probe("http", hostname).await {
            Ok(status) => Ok(classify_response("http", status)),
            Err(http_err) if is_connection_failure(&http_err) => Ok(CheckResult::new(
                HealthStatus::Down,
                format!(
                    "https: {}; http: {}",
                    error_chain(&https_err),
                    error_chain(&http_err)
                ),
            )),
            Err(e) => Err(CheckError::Protocol(error_chain(&e))),
        }
    }
}

fn classify_response(scheme: &str, status: StatusCode) -> CheckResult {
    CheckResult::new(
        HealthStatus::Up,
        format!("{scheme} responded with {}", status.as_u16()),
    )
}

/// Connect, DNS and timeout errors mean the host did not answer at all;
/// anything else is either proof of life or unclassifiable.
fn is_connection_failure(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut msg = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
