//! Normative catalog read from a data directory.
//!
//! ```text
//! <root>/versions.json
//! <root>/<version>/rules.json
//! <root>/<version>/<section>/coefficients.json
//! <root>/<version>/<section>/tables/<code>.json
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use normcalc_core::types::NormVersion;

use crate::error::SourceError;
use crate::source::{check_key, sort_codes, NormSource};

const VERSIONS_FILE: &str = "versions.json";
const RULES_FILE: &str = "rules.json";
const COEFFICIENTS_FILE: &str = "coefficients.json";
const TABLES_DIR: &str = "tables";

#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn version_dir(&self, version: &NormVersion) -> Result<PathBuf, SourceError> {
        Ok(self.root.join(check_key(version.as_str())?))
    }

    fn section_dir(&self, version: &NormVersion, section: &str) -> Result<PathBuf, SourceError> {
        Ok(self.version_dir(version)?.join(check_key(section)?))
    }
}

/// Read a file, mapping "not found" to `None`.
async fn read_optional(path: PathBuf) -> Result<Option<String>, SourceError> {
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SourceError::Io { path, source }),
    }
}

/// Names of the entries of `dir` accepted by `pick`; an absent directory is
/// empty.
async fn list_dir(
    dir: PathBuf,
    pick: impl Fn(&str, bool) -> Option<String>,
) -> Result<Vec<String>, SourceError> {
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(SourceError::Io { path: dir, source }),
    };

    let mut names = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => return Err(SourceError::Io { path: dir, source }),
        };
        let is_dir = entry
            .file_type()
            .await
            .map_err(|source| SourceError::Io {
                path: entry.path(),
                source,
            })?
            .is_dir();
        if let Some(name) = entry.file_name().to_str().and_then(|n| pick(n, is_dir)) {
            names.push(name);
        }
    }
    Ok(names)
}

#[async_trait]
impl NormSource for DirectorySource {
    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }

    async fn versions(&self) -> Result<String, SourceError> {
        let path = self.root.join(VERSIONS_FILE);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| SourceError::Io { path, source })
    }

    async fn rule_set(&self, version: &NormVersion) -> Result<Option<String>, SourceError> {
        read_optional(self.version_dir(version)?.join(RULES_FILE)).await
    }

    async fn coefficients(
        &self,
        version: &NormVersion,
        section: &str,
    ) -> Result<Option<String>, SourceError> {
        read_optional(self.section_dir(version, section)?.join(COEFFICIENTS_FILE)).await
    }

    async fn table(
        &self,
        version: &NormVersion,
        section: &str,
        code: &str,
    ) -> Result<Option<String>, SourceError> {
        let file = format!("{}.json", check_key(code)?);
        read_optional(self.section_dir(version, section)?.join(TABLES_DIR).join(file)).await
    }

    async fn sections(&self, version: &NormVersion) -> Result<Vec<String>, SourceError> {
        let mut sections =
            list_dir(self.version_dir(version)?, |name, is_dir| is_dir.then(|| name.to_string()))
                .await?;
        sections.sort();
        Ok(sections)
    }

    async fn table_codes(
        &self,
        version: &NormVersion,
        section: &str,
    ) -> Result<Vec<String>, SourceError> {
        let dir = self.section_dir(version, section)?.join(TABLES_DIR);
        let mut codes = list_dir(dir, |name, is_dir| {
            (!is_dir)
                .then(|| name.strip_suffix(".json"))
                .flatten()
                .map(str::to_string)
        })
        .await?;
        sort_codes(&mut codes);
        Ok(codes)
    }
}
