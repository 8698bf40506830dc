use crate::error::RegistryError;

/// Normalize user input to a bare lowercase hostname.
///
/// Strips the scheme and any path component, lowercases, and validates the
/// label structure. Runs before anything reaches the registry, so two
/// spellings of the same host collapse to one registration.
pub fn normalize_hostname(raw: &str) -> Result<String, RegistryError> {
    let trimmed = raw.trim().to_ascii_lowercase();

    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(&trimmed);

    let host = without_scheme.split('/').next().unwrap_or("");
    let host = host.strip_suffix('.').unwrap_or(host);

    if !is_valid_hostname(host) {
        return Err(RegistryError::InvalidHostname(raw.trim().to_string()));
    }

    Ok(host.to_string())
}

fn is_valid_hostname(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 || !host.contains('.') {
        return false;
    }

    let labels: Vec<&str> = host.split('.').collect();
    for label in &labels {
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        if label.starts_with('-') || label.ends_with('-') {
            return false;
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return false;
        }
    }

    // The final label must look like a TLD, not a number or a port.
    let tld = labels.last().unwrap();
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}
