use std::path::PathBuf;

use normcalc_registry::DEFAULT_VERSION;

/// Default tracing filter when neither `NORMCALC_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "normcalc=info";

/// CLI configuration loaded from environment variables.
///
/// Command-line flags override these per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Catalog directory; the builtin catalog when unset.
    pub data_dir: Option<PathBuf>,
    /// Explicit normative version; date-based resolution when unset.
    pub version: Option<String>,
    /// Fallback version when the catalog has no usable manifest.
    pub default_version: String,
    pub log_filter: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            version: None,
            default_version: DEFAULT_VERSION.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default          |
    /// |----------------------------|------------------|
    /// | `NORMCALC_DATA_DIR`        | builtin catalog  |
    /// | `NORMCALC_VERSION`         | by date          |
    /// | `NORMCALC_DEFAULT_VERSION` | `2025`           |
    /// | `NORMCALC_LOG`             | `RUST_LOG`, then `normcalc=info` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();
        Self {
            data_dir: non_empty("NORMCALC_DATA_DIR").map(PathBuf::from),
            version: non_empty("NORMCALC_VERSION"),
            default_version: non_empty("NORMCALC_DEFAULT_VERSION").unwrap_or(defaults.default_version),
            log_filter: non_empty("NORMCALC_LOG")
                .or_else(|| non_empty("RUST_LOG"))
                .unwrap_or(defaults.log_filter),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> CliConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CliConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), CliConfig::default());
    }

    #[test]
    fn reads_all_variables() {
        let c = config(&[
            ("NORMCALC_DATA_DIR", "/srv/norms"),
            ("NORMCALC_VERSION", "2024"),
            ("NORMCALC_DEFAULT_VERSION", "2024"),
            ("NORMCALC_LOG", "normcalc=debug"),
        ]);
        assert_eq!(c.data_dir, Some(PathBuf::from("/srv/norms")));
        assert_eq!(c.version.as_deref(), Some("2024"));
        assert_eq!(c.default_version, "2024");
        assert_eq!(c.log_filter, "normcalc=debug");
    }

    #[test]
    fn blank_values_are_ignored() {
        let c = config(&[("NORMCALC_VERSION", "  "), ("RUST_LOG", "warn")]);
        assert_eq!(c.version, None);
        assert_eq!(c.log_filter, "warn");
    }
}
