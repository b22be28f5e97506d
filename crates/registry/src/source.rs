//! Where normative data comes from.

use async_trait::async_trait;
use normcalc_core::types::NormVersion;

use crate::error::SourceError;

/// Raw access to a normative catalog.
///
/// Sources hand back undecoded JSON documents; decoding, integrity checks
/// and caching are the registry's job. A missing document is `Ok(None)`,
/// not an error.
#[async_trait]
pub trait NormSource: Send + Sync + std::fmt::Debug {
    /// Short human-readable description used in logs.
    fn describe(&self) -> String;

    /// The versions manifest (`[VersionInfo]`).
    async fn versions(&self) -> Result<String, SourceError>;

    async fn rule_set(&self, version: &NormVersion) -> Result<Option<String>, SourceError>;

    async fn coefficients(
        &self,
        version: &NormVersion,
        section: &str,
    ) -> Result<Option<String>, SourceError>;

    async fn table(
        &self,
        version: &NormVersion,
        section: &str,
        code: &str,
    ) -> Result<Option<String>, SourceError>;

    /// Sections with data under `version`, sorted.
    async fn sections(&self, version: &NormVersion) -> Result<Vec<String>, SourceError>;

    /// Table codes of `section` under `version`, sorted.
    async fn table_codes(
        &self,
        version: &NormVersion,
        section: &str,
    ) -> Result<Vec<String>, SourceError>;
}

/// Reject keys that could escape a catalog directory or are empty.
pub fn check_key(key: &str) -> Result<&str, SourceError> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\'])
        || key.chars().any(char::is_control);
    if bad {
        return Err(SourceError::InvalidKey(key.to_string()));
    }
    Ok(key)
}

/// Numeric codes first in numeric order (`"2"` before `"10"`), then the rest
/// lexically.
pub fn sort_codes(codes: &mut [String]) {
    use std::cmp::Ordering;
    codes.sort_by(|a, b| match (a.parse::<u32>(), b.parse::<u32>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_keys_rejected() {
        assert!(check_key("..").is_err());
        assert!(check_key("a/b").is_err());
        assert!(check_key("a\\b").is_err());
        assert!(check_key("").is_err());
        assert!(check_key("geodesy").is_ok());
        assert!(check_key("1").is_ok());
    }

    #[test]
    fn codes_sort_numerically() {
        let mut codes = vec!["10".to_string(), "9".to_string(), "2a".to_string(), "1".to_string()];
        sort_codes(&mut codes);
        assert_eq!(codes, vec!["1", "9", "10", "2a"]);
    }
}
