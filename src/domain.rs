//! Hostname validation.
//!
//! Malformed input must be rejected before any network I/O happens, so the
//! resolver calls this first and synthesizes an error record on failure.

/// Validates a hostname against RFC-1123-like label rules.
///
/// Accepts bare hostnames only: no scheme, port, path or whitespace. Each
/// dot-separated label is 1-63 characters of `[A-Za-z0-9-]` with no leading
/// or trailing hyphen, the whole name is at most 253 characters, and the
/// final label is alphabetic (at least two characters).
pub fn validate_hostname(host: &str) -> Result<(), String> {
    if host.is_empty() {
        return Err("hostname is empty".to_string());
    }
    if host.len() > 253 {
        return Err(format!("hostname exceeds 253 characters ({})", host.len()));
    }
    if host.contains("://") {
        return Err("hostname must not include a scheme".to_string());
    }
    if host.contains(':') {
        return Err("hostname must not include a port".to_string());
    }
    if host.contains('/') || host.chars().any(|c| c.is_whitespace()) {
        return Err("hostname must not include a path or whitespace".to_string());
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return Err("hostname must contain at least one dot".to_string());
    }
    for label in &labels {
        if label.is_empty() || label.len() > 63 {
            return Err(format!("label {label:?} must be 1-63 characters"));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(format!("label {label:?} contains invalid characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("label {label:?} must not start or end with a hyphen"));
        }
    }

    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("top-level label {tld:?} must be alphabetic"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_hostnames() {
        assert!(validate_hostname("example.com").is_ok());
        assert!(validate_hostname("a.b-c.example.co.uk").is_ok());
        assert!(validate_hostname("xn--bcher-kva.example").is_ok());
    }

    #[test]
    fn rejects_scheme_port_and_path() {
        assert!(validate_hostname("http://example.com").is_err());
        assert!(validate_hostname("example.com:443").is_err());
        assert!(validate_hostname("example.com/path").is_err());
        assert!(validate_hostname("exa mple.com").is_err());
    }

    #[test]
    fn rejects_malformed_labels() {
        assert!(validate_hostname("").is_err());
        assert!(validate_hostname("localhost").is_err());
        assert!(validate_hostname("exa_mple.com").is_err());
        assert!(validate_hostname("-leading.example.com").is_err());
        assert!(validate_hostname("trailing-.example.com").is_err());
        assert!(validate_hostname("example.123").is_err());
        assert!(validate_hostname("example.c").is_err());
        assert!(validate_hostname(&format!("{}.com", "a".repeat(64))).is_err());
    }

    #[test]
    fn rejects_names_over_253_characters() {
        let long = format!("{}.example.com", "a.".repeat(130));
        assert!(long.len() > 253);
        assert!(validate_hostname(&long).is_err());
    }
}
