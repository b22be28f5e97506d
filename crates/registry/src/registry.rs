//! Versioned, lazily loaded, append-only cache of normative data.
//!
//! [`NormRegistry`] is a cheap-to-clone handle. Handles derived with
//! [`NormRegistry::with_version`] share the cache and differ only in the
//! version they resolve to.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use normcalc_core::coefficients::CoefficientSet;
use normcalc_core::error::CoreError;
use normcalc_core::rules::RuleSet;
use normcalc_core::tables::PriceTable;
use normcalc_core::types::{version_in_force, NormVersion, VersionInfo};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::builtin::BuiltinSource;
use crate::config::RegistryConfig;
use crate::error::SourceError;
use crate::source::NormSource;

type TableKey = (NormVersion, String, String);
type SectionKey = (NormVersion, String);

#[derive(Default)]
struct Cache {
    versions: RwLock<Option<Arc<Vec<VersionInfo>>>>,
    tables: RwLock<HashMap<TableKey, Arc<PriceTable>>>,
    coefficients: RwLock<HashMap<SectionKey, Arc<CoefficientSet>>>,
    rule_sets: RwLock<HashMap<NormVersion, Arc<RuleSet>>>,
}

#[derive(Clone)]
pub struct NormRegistry {
    source: Arc<dyn NormSource>,
    cache: Arc<Cache>,
    config: RegistryConfig,
}

impl std::fmt::Debug for NormRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormRegistry")
            .field("source", &self.source.describe())
            .field("config", &self.config)
            .finish()
    }
}

/// Outcome of [`NormRegistry::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogReport {
    pub versions: Vec<NormVersion>,
    /// Number of documents loaded and checked.
    pub checked: usize,
    pub failures: Vec<CatalogFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFailure {
    /// `version/section/code`-style key of the failing document.
    pub key: String,
    pub error: String,
}

impl CatalogReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    fn record<T>(&mut self, key: String, outcome: Result<T, CoreError>) -> Option<T> {
        self.checked += 1;
        match outcome {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(%key, error = %err, "Catalog entry failed verification");
                self.failures.push(CatalogFailure {
                    key,
                    error: err.to_string(),
                });
                None
            }
        }
    }
}

/// Return the cached value for `key`, loading it on a miss.
///
/// Concurrent misses may both load; the first value stored wins and is what
/// every caller gets back.
async fn cached<K, V, F, Fut>(
    map: &RwLock<HashMap<K, Arc<V>>>,
    key: K,
    load: F,
) -> Result<Arc<V>, CoreError>
where
    K: Eq + Hash,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, CoreError>>,
{
    if let Some(hit) = map.read().await.get(&key) {
        return Ok(Arc::clone(hit));
    }
    let loaded = Arc::new(load().await?);
    let mut guard = map.write().await;
    Ok(Arc::clone(guard.entry(key).or_insert(loaded)))
}

fn decode<T: DeserializeOwned>(what: String, text: &str) -> Result<T, CoreError> {
    serde_json::from_str(text).map_err(|source| SourceError::Parse { what, source }.into())
}

impl NormRegistry {
    pub fn new(source: Arc<dyn NormSource>, config: RegistryConfig) -> Self {
        Self {
            source,
            cache: Arc::new(Cache::default()),
            config,
        }
    }

    /// Registry over the compiled-in catalog.
    pub fn builtin() -> Self {
        Self::new(Arc::new(BuiltinSource::new()), RegistryConfig::default())
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn source(&self) -> &dyn NormSource {
        self.source.as_ref()
    }

    /// A handle pinned to `version` that shares this registry's cache.
    pub fn with_version(&self, version: impl Into<NormVersion>) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: Arc::clone(&self.cache),
            config: self.config.clone().with_override(version),
        }
    }

    // -----------------------------------------------------------------------
    // Versions
    // -----------------------------------------------------------------------

    /// Known versions, as declared by the source's manifest.
    pub async fn versions(&self) -> Result<Arc<Vec<VersionInfo>>, CoreError> {
        if let Some(hit) = self.cache.versions.read().await.as_ref() {
            return Ok(Arc::clone(hit));
        }
        let text = self.source.versions().await?;
        let loaded: Vec<VersionInfo> = decode("versions manifest".to_string(), &text)?;
        let mut guard = self.cache.versions.write().await;
        Ok(Arc::clone(guard.get_or_insert_with(|| Arc::new(loaded))))
    }

    /// The version this handle reads from. Never fails.
    ///
    /// The explicit override wins; otherwise the version in force on the
    /// reference date, then the configured default tag.
    pub async fn resolve_active_version(&self) -> NormVersion {
        if let Some(version) = &self.config.version_override {
            return version.clone();
        }
        let date = self
            .config
            .reference_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive());
        match self.versions().await {
            Ok(versions) => match version_in_force(&versions, date) {
                Some(info) => info.version.clone(),
                None => self.config.default_version.clone(),
            },
            Err(err) => {
                tracing::warn!(
                    source = %self.source.describe(),
                    error = %err,
                    fallback = %self.config.default_version,
                    "Versions manifest unavailable, using default version",
                );
                self.config.default_version.clone()
            }
        }
    }

    async fn version_or_active(&self, version: Option<&NormVersion>) -> NormVersion {
        match version {
            Some(v) => v.clone(),
            None => self.resolve_active_version().await,
        }
    }

    // -----------------------------------------------------------------------
    // Data access
    // -----------------------------------------------------------------------

    pub async fn get_table(
        &self,
        section: &str,
        code: &str,
        version: Option<&NormVersion>,
    ) -> Result<Arc<PriceTable>, CoreError> {
        let version = self.version_or_active(version).await;
        let key = (version.clone(), section.to_string(), code.to_string());
        cached(&self.cache.tables, key, || async {
            let text = self
                .source
                .table(&version, section, code)
                .await?
                .ok_or_else(|| CoreError::TableNotFound {
                    version: version.clone(),
                    section: section.to_string(),
                    code: code.to_string(),
                })?;
            let table: PriceTable = decode(format!("table {version}/{section}/{code}"), &text)?;
            if table.section != section || table.code != code {
                return Err(CoreError::DataIntegrity(format!(
                    "document for {version}/{section}/{code} describes table {}",
                    table.label()
                )));
            }
            table.validate()?;
            tracing::debug!(%version, section, code, rows = table.rows.len(), "Price table loaded");
            Ok::<_, CoreError>(table)
        })
        .await
    }

    pub async fn get_coefficients(
        &self,
        section: &str,
        version: Option<&NormVersion>,
    ) -> Result<Arc<CoefficientSet>, CoreError> {
        let version = self.version_or_active(version).await;
        let key = (version.clone(), section.to_string());
        cached(&self.cache.coefficients, key, || async {
            let text = self
                .source
                .coefficients(&version, section)
                .await?
                .ok_or_else(|| CoreError::CoefficientSetNotFound {
                    version: version.clone(),
                    section: section.to_string(),
                })?;
            let set: CoefficientSet =
                decode(format!("coefficient set {version}/{section}"), &text)?;
            if set.section != section {
                return Err(CoreError::DataIntegrity(format!(
                    "document for {version}/{section} describes coefficients of section '{}'",
                    set.section
                )));
            }
            set.validate()?;
            tracing::debug!(%version, section, factors = set.factors.len(), "Coefficient set loaded");
            Ok::<_, CoreError>(set)
        })
        .await
    }

    pub async fn get_rule_set(
        &self,
        version: Option<&NormVersion>,
    ) -> Result<Arc<RuleSet>, CoreError> {
        let version = self.version_or_active(version).await;
        cached(&self.cache.rule_sets, version.clone(), || async {
            let text = self
                .source
                .rule_set(&version)
                .await?
                .ok_or_else(|| CoreError::RuleSetNotFound {
                    version: version.clone(),
                })?;
            let rules: RuleSet = decode(format!("rule set {version}"), &text)?;
            if rules.version != version {
                return Err(CoreError::DataIntegrity(format!(
                    "document for rule set {version} declares version {}",
                    rules.version
                )));
            }
            rules.validate()?;
            tracing::debug!(%version, blocks = rules.blocks.len(), "Rule set loaded");
            Ok::<_, CoreError>(rules)
        })
        .await
    }

    /// Whether the table can be loaded. Never errors.
    pub async fn is_table_available(
        &self,
        section: &str,
        code: &str,
        version: Option<&NormVersion>,
    ) -> bool {
        self.get_table(section, code, version).await.is_ok()
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    pub async fn sections(&self, version: Option<&NormVersion>) -> Result<Vec<String>, CoreError> {
        let version = self.version_or_active(version).await;
        Ok(self.source.sections(&version).await?)
    }

    pub async fn list_tables(
        &self,
        section: &str,
        version: Option<&NormVersion>,
    ) -> Result<Vec<String>, CoreError> {
        let version = self.version_or_active(version).await;
        Ok(self.source.table_codes(&version, section).await?)
    }

    /// Load every document of every known version and run its integrity
    /// checks. Failures are collected, not raised.
    pub async fn verify(&self) -> CatalogReport {
        let mut report = CatalogReport::default();

        let Some(versions) = report.record("versions".to_string(), self.versions().await) else {
            return report;
        };

        for info in versions.iter() {
            let version = &info.version;
            report.versions.push(version.clone());

            report.record(
                format!("{version}/rules"),
                self.get_rule_set(Some(version)).await,
            );

            let sections = report.record(
                format!("{version}/sections"),
                self.sections(Some(version)).await,
            );
            for section in sections.unwrap_or_default() {
                report.record(
                    format!("{version}/{section}/coefficients"),
                    self.get_coefficients(&section, Some(version)).await,
                );
                let codes = report.record(
                    format!("{version}/{section}/tables"),
                    self.list_tables(&section, Some(version)).await,
                );
                for code in codes.unwrap_or_default() {
                    report.record(
                        format!("{version}/{section}/{code}"),
                        self.get_table(&section, &code, Some(version)).await,
                    );
                }
            }
        }

        tracing::info!(
            source = %self.source.describe(),
            checked = report.checked,
            failures = report.failures.len(),
            "Catalog verified",
        );
        report
    }
}
