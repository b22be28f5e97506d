//! Normative catalog compiled into the binary.
//!
//! The embedded files live under `data/` with the same layout a
//! [`DirectorySource`](crate::directory::DirectorySource) reads, so the
//! directory source can serve an edited copy of them.

use async_trait::async_trait;
use normcalc_core::types::NormVersion;

use crate::error::SourceError;
use crate::source::{check_key, sort_codes, NormSource};

macro_rules! data {
    ($path:literal) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/", $path))
    };
}

const VERSIONS: &str = data!("versions.json");

/// `(version, document)`
const RULE_SETS: &[(&str, &str)] = &[
    ("2024", data!("2024/rules.json")),
    ("2025", data!("2025/rules.json")),
];

/// `(version, section, document)`
const COEFFICIENTS: &[(&str, &str, &str)] = &[
    ("2024", "geodesy", data!("2024/geodesy/coefficients.json")),
    ("2024", "geology", data!("2024/geology/coefficients.json")),
    ("2024", "inspection", data!("2024/inspection/coefficients.json")),
    ("2025", "geodesy", data!("2025/geodesy/coefficients.json")),
    ("2025", "geology", data!("2025/geology/coefficients.json")),
    ("2025", "inspection", data!("2025/inspection/coefficients.json")),
];

/// `(version, section, code, document)`
const TABLES: &[(&str, &str, &str, &str)] = &[
    ("2024", "geodesy", "9", data!("2024/geodesy/tables/9.json")),
    ("2024", "geodesy", "10", data!("2024/geodesy/tables/10.json")),
    ("2024", "inspection", "1", data!("2024/inspection/tables/1.json")),
    ("2024", "inspection", "2", data!("2024/inspection/tables/2.json")),
    ("2025", "geodesy", "9", data!("2025/geodesy/tables/9.json")),
    ("2025", "geodesy", "10", data!("2025/geodesy/tables/10.json")),
    ("2025", "geology", "1", data!("2025/geology/tables/1.json")),
    ("2025", "inspection", "1", data!("2025/inspection/tables/1.json")),
    ("2025", "inspection", "2", data!("2025/inspection/tables/2.json")),
];

/// Static `(version, section, code) -> document` mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSource;

impl BuiltinSource {
    pub fn new() -> Self {
        Self
    }
}

/// Key rules of the directory layout.
fn check_keys(version: &NormVersion, section: &str) -> Result<(), SourceError> {
    check_key(version.as_str())?;
    check_key(section)?;
    Ok(())
}

#[async_trait]
impl NormSource for BuiltinSource {
    fn describe(&self) -> String {
        "builtin catalog".to_string()
    }

    async fn versions(&self) -> Result<String, SourceError> {
        Ok(VERSIONS.to_string())
    }

    async fn rule_set(&self, version: &NormVersion) -> Result<Option<String>, SourceError> {
        check_key(version.as_str())?;
        Ok(RULE_SETS
            .iter()
            .find(|(v, _)| *v == version.as_str())
            .map(|(_, doc)| doc.to_string()))
    }

    async fn coefficients(
        &self,
        version: &NormVersion,
        section: &str,
    ) -> Result<Option<String>, SourceError> {
        check_keys(version, section)?;
        Ok(COEFFICIENTS
            .iter()
            .find(|(v, s, _)| *v == version.as_str() && *s == section)
            .map(|(_, _, doc)| doc.to_string()))
    }

    async fn table(
        &self,
        version: &NormVersion,
        section: &str,
        code: &str,
    ) -> Result<Option<String>, SourceError> {
        check_key(code)?;
        check_keys(version, section)?;
        Ok(TABLES
            .iter()
            .find(|(v, s, c, _)| *v == version.as_str() && *s == section && *c == code)
            .map(|(_, _, _, doc)| doc.to_string()))
    }

    async fn sections(&self, version: &NormVersion) -> Result<Vec<String>, SourceError> {
        check_key(version.as_str())?;
        let mut sections: Vec<String> = COEFFICIENTS
            .iter()
            .map(|(v, s, _)| (*v, *s))
            .chain(TABLES.iter().map(|(v, s, _, _)| (*v, *s)))
            .filter(|(v, _)| *v == version.as_str())
            .map(|(_, s)| s.to_string())
            .collect();
        sections.sort();
        sections.dedup();
        Ok(sections)
    }

    async fn table_codes(
        &self,
        version: &NormVersion,
        section: &str,
    ) -> Result<Vec<String>, SourceError> {
        check_keys(version, section)?;
        let mut codes: Vec<String> = TABLES
            .iter()
            .filter(|(v, s, _, _)| *v == version.as_str() && *s == section)
            .map(|(_, _, c, _)| c.to_string())
            .collect();
        sort_codes(&mut codes);
        Ok(codes)
    }
}
