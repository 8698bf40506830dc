//! Domain Registration Checker
//!
//! Queries WHOIS over TCP/43 for the registration expiry date and classifies
//! the remaining window. WHOIS servers throttle and sometimes answer with
//! nothing useful; both cases become Unknown upstream — expiry is never
//! assumed from missing data.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::{
    error::CheckError,
    rate_limiters::RateLimiters,
    types::{CheckDimension, CheckResult, HealthStatus},
};

use super::{classify_days_remaining, Checker};

const WHOIS_PORT: u16 = 43;
const MAX_RESPONSE_SIZE: usize = 256 * 1024;
const FALLBACK_WHOIS_SERVER: &str = "whois.iana.org";

static EXPIRY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)registry expiry date:\s*(\S+)",
        r"(?i)registrar registration expiration date:\s*(\S+)",
        r"(?i)expiry date:\s*(\S+)",
        r"(?i)expiration date:\s*(\S+)",
        r"(?i)expiration time:\s*(\S+)",
        r"(?i)expire(?:s|d)?(?: on)?:\s*(\S+)",
        r"(?i)paid-till:\s*(\S+)",
        r"(?i)renewal date:\s*(\S+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

static REFERRAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)registrar whois server:\s*(\S+)").expect("static pattern"));

const THROTTLE_MARKERS: &[&str] = &[
    "rate limit",
    "ratelimit",
    "quota exceeded",
    "too many requests",
    "try again later",
    "request limit",
    "maximum query rate",
    "excessive querying",
];

pub struct RegistrationChecker {
    threshold_days: i64,
    limiters: RateLimiters,
}

impl RegistrationChecker {
    pub fn new(threshold_days: i64, limiters: RateLimiters) -> Self {
        Self {
            threshold_days,
            limiters,
        }
    }

    async fn query_server(&self, server: &str, query: &str) -> Result<String, CheckError> {
        let mut stream = TcpStream::connect((server, WHOIS_PORT))
            .await
            .map_err(|e| CheckError::Network(format!("connect to {server}:43 failed: {e}")))?;

        stream
            .write_all(format!("{query}\r\n").as_bytes())
            .await
            .map_err(|e| CheckError::Network(format!("failed to send WHOIS query: {e}")))?;

        let mut response = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream
                .read(&mut buf)
                .await
                .map_err(|e| CheckError::Network(format!("WHOIS read error: {e}")))?;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&buf[..n]);
            if response.len() > MAX_RESPONSE_SIZE {
                return Err(CheckError::Protocol("WHOIS response too large".to_string()));
            }
        }

        // WHOIS is nominally ASCII; fall back to a lossy decode rather than
        // failing the whole check on one odd byte.
        Ok(String::from_utf8_lossy(&response).into_owned())
    }

    /// Query the TLD registry and follow one registrar referral when the
    /// registry response carries no expiry of its own.
    async fn fetch_whois(&self, hostname: &str) -> Result<String, CheckError> {
        let tld = hostname
            .rsplit('.')
            .next()
            .ok_or_else(|| CheckError::Protocol(format!("no TLD in hostname {hostname}")))?;
        let server = server_for_tld(tld);

        let response = self.query_server(server, hostname).await?;
        if is_throttled(&response) {
            return Err(CheckError::RateLimited);
        }
        if parse_expiry(&response).is_some() {
            return Ok(response);
        }

        if let Some(referral) = extract_referral(&response) {
            if referral != server {
                tracing::debug!(%referral, "Following WHOIS referral");
                // Second wire query within one check; the permit acquired in
                // pace() only covered the registry query.
                self.limiters.acquire_whois().await;
                let referred = self.query_server(&referral, hostname).await?;
                if is_throttled(&referred) {
                    return Err(CheckError::RateLimited);
                }
                return Ok(referred);
            }
        }

        Ok(response)
    }
}

#[async_trait]
impl Checker for RegistrationChecker {
    fn dimension(&self) -> CheckDimension {
        CheckDimension::Registration
    }

    async fn pace(&self) {
        self.limiters.acquire_whois().await;
    }

    async fn check(&self, hostname: &str) -> Result<CheckResult, CheckError> {
        let response = self.fetch_whois(hostname).await?;

        let expires_at = parse_expiry(&response).ok_or_else(|| {
            CheckError::Protocol("no expiration date in WHOIS response".to_string())
        })?;

        let days_remaining = (expires_at - Utc::now()).num_days();
        let status = classify_days_remaining(days_remaining, self.threshold_days);
        let detail = match status {
            HealthStatus::Expired => format!(
                "registration expired {} days ago ({})",
                -days_remaining,
                expires_at.format("%Y-%m-%d")
            ),
            _ => format!(
                "registration expires in {} days ({})",
                days_remaining,
                expires_at.format("%Y-%m-%d")
            ),
        };

        Ok(CheckResult::new(status, detail))
    }
}

/// Registry WHOIS server per TLD, with the IANA server as a catch-all.
fn server_for_tld(tld: &str) -> &'static str {
    match tld {
        "com" | "net" => "whois.verisign-grs.com",
        "org" => "whois.pir.org",
        "info" => "whois.nic.info",
        "biz" => "whois.nic.biz",
        "io" => "whois.nic.io",
        "co" => "whois.nic.co",
        "me" => "whois.nic.me",
        "ai" => "whois.nic.ai",
        "dev" | "app" | "page" => "whois.nic.google",
        "xyz" => "whois.nic.xyz",
        "us" => "whois.nic.us",
        "uk" => "whois.nic.uk",
        "de" => "whois.denic.de",
        "fr" => "whois.nic.fr",
        "nl" => "whois.domain-registry.nl",
        "eu" => "whois.eu",
        "it" => "whois.nic.it",
        "ch" => "whois.nic.ch",
        "se" => "whois.iis.se",
        "ca" => "whois.cira.ca",
        "au" => "whois.auda.org.au",
        "jp" => "whois.jprs.jp",
        "ru" | "su" => "whois.tcinet.ru",
        _ => FALLBACK_WHOIS_SERVER,
    }
}

fn is_throttled(response: &str) -> bool {
    let lowered = response.to_lowercase();
    THROTTLE_MARKERS.iter().any(|m| lowered.contains(m))
}

fn extract_referral(response: &str) -> Option<String> {
    let server = REFERRAL_PATTERN
        .captures(response)?
        .get(1)?
        .as_str()
        .trim()
        .trim_start_matches("whois://")
        .to_lowercase();

    if server.contains('.') {
        Some(server)
    } else {
        None
    }
}

/// Extract the first recognizable expiry field. Registries spell both the
/// field name and the date format a dozen ways.
fn parse_expiry(response: &str) -> Option<DateTime<Utc>> {
    for pattern in EXPIRY_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(response) {
            if let Some(value) = caps.get(1) {
                if let Some(parsed) = parse_date(value.as_str()) {
                    return Some(parsed);
                }
            }
        }
    }
    None
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim().trim_end_matches('.');

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%d-%b-%Y", "%d.%m.%Y", "%Y/%m/%d"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            let dt = date.and_hms_opt(0, 0, 0)?;
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verisign_style_expiry() {
        let response = "Domain Name: EXAMPLE.COM\r\n\
                        Registry Domain ID: 2336799_DOMAIN_COM-VRSN\r\n\
                        Registry Expiry Date: 2026-08-13T04:00:00Z\r\n\
                        Registrar: RESERVED-Internet Assigned Numbers Authority\r\n";
        let parsed = parse_expiry(response).unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2026-08-13");
    }

    #[test]
    fn test_parse_nominet_style_expiry() {
        let response = "    Domain name:\n        example.co.uk\n\n    Expiry date:  01-Aug-2026\n";
        let parsed = parse_expiry(response).unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2026-08-01");
    }

    #[test]
    fn test_parse_tcinet_style_expiry() {
        let response = "domain:   EXAMPLE.RU\nstate:    REGISTERED, DELEGATED\npaid-till: 2026.11.30\n";
        let parsed = parse_expiry(response).unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2026-11-30");
    }

    #[test]
    fn test_missing_expiry_is_none() {
        assert!(parse_expiry("No match for domain \"EXAMPLE.COM\".\n").is_none());
        assert!(parse_expiry("").is_none());
    }

    #[test]
    fn test_unparseable_date_is_none() {
        assert!(parse_expiry("Expiration Date: soon\n").is_none());
    }

    #[test]
    fn test_throttle_detection() {
        assert!(is_throttled("WHOIS LIMIT EXCEEDED - Rate limit reached. Try again later."));
        assert!(is_throttled("Your connection limit exceeded: quota exceeded"));
        assert!(!is_throttled("Registry Expiry Date: 2026-08-13T04:00:00Z"));
    }

    #[test]
    fn test_referral_extraction() {
        let response = "Registrar WHOIS Server: whois.example-registrar.com\r\n";
        assert_eq!(
            extract_referral(response).unwrap(),
            "whois.example-registrar.com"
        );
        assert!(extract_referral("Registrar: Example Inc\r\n").is_none());
    }

    #[test]
    fn test_server_for_tld() {
        assert_eq!(server_for_tld("com"), "whois.verisign-grs.com");
        assert_eq!(server_for_tld("uk"), "whois.nic.uk");
        assert_eq!(server_for_tld("zz"), FALLBACK_WHOIS_SERVER);
    }
}
