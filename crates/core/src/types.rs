use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque tag selecting a consistent snapshot of normative data (e.g. `"2025"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormVersion(String);

impl NormVersion {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NormVersion {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for NormVersion {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// A known normative version and the date from which it is in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: NormVersion,
    pub effective_from: NaiveDate,
    #[serde(default)]
    pub title: String,
}

/// Pick the version in force on `date`: the latest one whose effective date
/// is not after `date`, or the earliest known version when `date` precedes
/// them all.
pub fn version_in_force(versions: &[VersionInfo], date: NaiveDate) -> Option<&VersionInfo> {
    versions
        .iter()
        .filter(|v| v.effective_from <= date)
        .max_by_key(|v| v.effective_from)
        .or_else(|| versions.iter().min_by_key(|v| v.effective_from))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(tag: &str, y: i32) -> VersionInfo {
        VersionInfo {
            version: NormVersion::new(tag),
            effective_from: NaiveDate::from_ymd_opt(y, 1, 1).unwrap(),
            title: String::new(),
        }
    }

    #[test]
    fn picks_latest_effective_version() {
        let versions = vec![info("2024", 2024), info("2025", 2025)];
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(version_in_force(&versions, date).unwrap().version.as_str(), "2025");
    }

    #[test]
    fn ignores_versions_from_the_future() {
        let versions = vec![info("2025", 2025), info("2024", 2024)];
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(version_in_force(&versions, date).unwrap().version.as_str(), "2024");
    }

    #[test]
    fn falls_back_to_earliest_before_all_versions() {
        let versions = vec![info("2024", 2024), info("2025", 2025)];
        let date = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();
        assert_eq!(version_in_force(&versions, date).unwrap().version.as_str(), "2024");
    }

    #[test]
    fn empty_manifest_has_no_version() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(version_in_force(&[], date).is_none());
    }

    #[test]
    fn version_serializes_as_plain_string() {
        let json = serde_json::to_string(&NormVersion::new("2025")).unwrap();
        assert_eq!(json, "\"2025\"");
    }
}
