//! TLS Certificate Checker
//!
//! Performs a real handshake against port 443 and classifies the leaf
//! certificate's notAfter window. A handshake that fails verification maps to
//! Unknown rather than Expired: without the certificate date there is no
//! evidence of expiry. The one exception is rustls reporting a verified
//! expired certificate, which is the expiry signal itself.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::net::TcpStream;
use tokio_rustls::{
    rustls::{pki_types::ServerName, CertificateError, ClientConfig, Error as TlsError, RootCertStore},
    TlsConnector,
};
use x509_parser::prelude::*;

use crate::{
    error::CheckError,
    types::{CheckDimension, CheckResult, HealthStatus},
};

use super::{classify_days_remaining, Checker};

const HTTPS_PORT: u16 = 443;

pub struct CertificateChecker {
    threshold_days: i64,
    connector: TlsConnector,
}

impl CertificateChecker {
    pub fn new(threshold_days: i64) -> Self {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Self {
            threshold_days,
            connector: TlsConnector::from(Arc::new(config)),
        }
    }

    fn classify(&self, not_after: DateTime<Utc>, issuer: Option<&str>) -> CheckResult {
        let days_remaining = (not_after - Utc::now()).num_days();
        let status = classify_days_remaining(days_remaining, self.threshold_days);
        let validity = match issuer {
            Some(issuer) => format!(
                "notAfter {}, issued by {issuer}",
                not_after.format("%Y-%m-%d")
            ),
            None => format!("notAfter {}", not_after.format("%Y-%m-%d")),
        };
        let detail = match status {
            HealthStatus::Expired => {
                format!("certificate expired {} days ago ({validity})", -days_remaining)
            }
            _ => format!("certificate expires in {days_remaining} days ({validity})"),
        };
        CheckResult::new(status, detail)
    }
}

#[async_trait]
impl Checker for CertificateChecker {
    fn dimension(&self) -> CheckDimension {
        CheckDimension::Certificate
    }

    async fn check(&self, hostname: &str) -> Result<CheckResult, CheckError> {
        let stream = TcpStream::connect((hostname, HTTPS_PORT))
            .await
            .map_err(|e| CheckError::Network(format!("connect to {hostname}:443 failed: {e}")))?;

        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|_| CheckError::Protocol(format!("invalid server name: {hostname}")))?;

        let tls_stream = match self.connector.connect(server_name, stream).await {
            Ok(stream) => stream,
            Err(e) => {
                // A verified-expired certificate is the only handshake
                // failure we are allowed to call Expired with confidence.
                if is_verified_expiry(&e) {
                    return Ok(CheckResult::new(
                        HealthStatus::Expired,
                        "certificate verification failed: certificate has expired".to_string(),
                    ));
                }
                return Err(CheckError::Protocol(format!("TLS handshake failed: {e}")));
            }
        };

        let (_io, connection) = tls_stream.get_ref();
        let leaf = connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| {
                CheckError::Protocol("no certificate presented by server".to_string())
            })?;

        let (_, cert) = X509Certificate::from_der(leaf.as_ref())
            .map_err(|e| CheckError::Protocol(format!("failed to parse certificate: {e}")))?;

        let not_after = DateTime::<Utc>::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| CheckError::Protocol("certificate notAfter out of range".to_string()))?;
        let issuer = issuer_name(&cert);

        Ok(self.classify(not_after, issuer.as_deref()))
    }
}

/// Issuing organization, falling back to the issuer CN.
fn issuer_name(cert: &X509Certificate) -> Option<String> {
    let issuer = cert.issuer();
    issuer
        .iter_organization()
        .next()
        .or_else(|| issuer.iter_common_name().next())
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_string)
}

fn is_verified_expiry(err: &std::io::Error) -> bool {
    matches!(
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<TlsError>()),
        Some(TlsError::InvalidCertificate(CertificateError::Expired))
    )
}
