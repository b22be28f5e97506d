//! Versioned price tables and their typed selection criteria.
//!
//! A table belongs to one normative code within a section. Its `schema`
//! names the classification fields every row carries; rows are matched by
//! exact equality on all of them, never ranked.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// Classification fields a price table may be keyed by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum CriterionKey {
    /// Object or work category (I, II, III ...).
    Category,
    /// Natural or engineering complexity class.
    Complexity,
    /// Building height band.
    HeightBand,
    /// Survey plan scale, e.g. `1:500`.
    Scale,
    /// Borehole depth band.
    DepthBand,
    /// Terrain category.
    Terrain,
}

impl CriterionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Complexity => "complexity",
            Self::HeightBand => "heightBand",
            Self::Scale => "scale",
            Self::DepthBand => "depthBand",
            Self::Terrain => "terrain",
        }
    }
}

impl fmt::Display for CriterionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of criterion values used to select a single table row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Criteria(BTreeMap<CriterionKey, String>);

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: CriterionKey, value: impl Into<String>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    pub fn insert(&mut self, key: CriterionKey, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    pub fn get(&self, key: CriterionKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = CriterionKey> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CriterionKey, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(CriterionKey, String)> for Criteria {
    fn from_iter<I: IntoIterator<Item = (CriterionKey, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// One priced row of a normative table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTableRow {
    pub code: String,
    pub work_type: String,
    pub unit: String,
    #[serde(flatten)]
    pub criteria: Criteria,
    pub price_per_unit: Decimal,
}

/// Ordered rows of a single normative code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTable {
    pub section: String,
    pub code: String,
    #[serde(default)]
    pub title: String,
    /// Criterion keys every row of this table is classified by.
    pub schema: Vec<CriterionKey>,
    pub rows: Vec<PriceTableRow>,
}

impl PriceTable {
    /// `section/code`, used in diagnostics.
    pub fn label(&self) -> String {
        format!("{}/{}", self.section, self.code)
    }

    /// Load-time integrity checks.
    ///
    /// Every row must carry exactly the schema keys, row codes must be unique,
    /// no two rows may share a criteria tuple, and prices must be positive.
    pub fn validate(&self) -> Result<(), CoreError> {
        let label = self.label();
        if self.schema.is_empty() {
            return Err(CoreError::DataIntegrity(format!(
                "table {label} declares an empty criteria schema"
            )));
        }
        let schema: HashSet<CriterionKey> = self.schema.iter().copied().collect();
        if schema.len() != self.schema.len() {
            return Err(CoreError::DataIntegrity(format!(
                "table {label} repeats a key in its criteria schema"
            )));
        }

        let mut codes = HashSet::new();
        let mut tuples = HashSet::new();
        for row in &self.rows {
            let keys: HashSet<CriterionKey> = row.criteria.keys().collect();
            if keys != schema {
                return Err(CoreError::DataIntegrity(format!(
                    "row {} of table {label} does not match the table schema",
                    row.code
                )));
            }
            if row.price_per_unit <= Decimal::ZERO {
                return Err(CoreError::DataIntegrity(format!(
                    "row {} of table {label} has non-positive price {}",
                    row.code, row.price_per_unit
                )));
            }
            if !codes.insert(row.code.as_str()) {
                return Err(CoreError::DataIntegrity(format!(
                    "table {label} contains duplicate row code {}",
                    row.code
                )));
            }
            if !tuples.insert(&row.criteria) {
                return Err(CoreError::DataIntegrity(format!(
                    "table {label} contains more than one row for criteria {{{}}}",
                    row.criteria
                )));
            }
        }
        Ok(())
    }

    /// Check that `criteria` names exactly the keys of this table's schema.
    pub fn check_criteria(&self, criteria: &Criteria) -> Result<(), CoreError> {
        let unknown: Vec<&str> = criteria
            .keys()
            .filter(|k| !self.schema.contains(k))
            .map(|k| k.as_str())
            .collect();
        if !unknown.is_empty() {
            return Err(CoreError::Validation(format!(
                "table {} is not classified by: {}",
                self.label(),
                unknown.join(", ")
            )));
        }
        let missing: Vec<&str> = self
            .schema
            .iter()
            .filter(|k| criteria.get(**k).is_none())
            .map(|k| k.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::Validation(format!(
                "criteria for table {} is missing: {}",
                self.label(),
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// The row whose classification equals `criteria`, if any.
    pub fn find_row(&self, criteria: &Criteria) -> Option<&PriceTableRow> {
        self.rows.iter().find(|row| &row.criteria == criteria)
    }
}
