use chrono::NaiveDate;
use normcalc_core::types::NormVersion;

/// Version used when the source has no usable versions manifest.
pub const DEFAULT_VERSION: &str = "2025";

/// How a registry handle picks its active version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Explicit version; wins over date-based resolution.
    pub version_override: Option<NormVersion>,
    /// Date used for date-based resolution; today when unset.
    pub reference_date: Option<NaiveDate>,
    /// Last-resort tag.
    pub default_version: NormVersion,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            version_override: None,
            reference_date: None,
            default_version: NormVersion::new(DEFAULT_VERSION),
        }
    }
}

impl RegistryConfig {
    pub fn with_override(mut self, version: impl Into<NormVersion>) -> Self {
        self.version_override = Some(version.into());
        self
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }
}
