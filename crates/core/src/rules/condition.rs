//! Declarative condition predicates over a project's JSON view.
//!
//! Conditions are pure: they read the facts map and never mutate it.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A predicate tree evaluated against project facts.
///
/// Field names may be dotted paths into nested objects (`site.soil`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Condition {
    #[default]
    Always,
    Eq { field: String, value: Value },
    Ne { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    Gt {
        field: String,
        #[serde(deserialize_with = "crate::number::required")]
        value: f64,
    },
    Gte {
        field: String,
        #[serde(deserialize_with = "crate::number::required")]
        value: f64,
    },
    Lt {
        field: String,
        #[serde(deserialize_with = "crate::number::required")]
        value: f64,
    },
    Lte {
        field: String,
        #[serde(deserialize_with = "crate::number::required")]
        value: f64,
    },
    /// Field is present and not null.
    Exists { field: String },
    /// Field is `true`, a non-zero number, or a non-empty string/array/object.
    Truthy { field: String },
    /// String field matches a regular expression.
    Matches { field: String, pattern: Pattern },
    All { conditions: Vec<Condition> },
    Any { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
}

/// Regular expression source, compiled on first use and kept for the life of
/// the rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern {
    source: String,
    #[serde(skip)]
    compiled: OnceLock<Result<Regex, regex::Error>>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            compiled: OnceLock::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn regex(&self) -> Result<&Regex, String> {
        self.compiled
            .get_or_init(|| Regex::new(&self.source))
            .as_ref()
            .map_err(|e| format!("invalid pattern '{}': {e}", self.source))
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Resolve a dotted path in the facts map.
pub fn lookup<'a>(facts: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = facts.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn present<'a>(facts: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    lookup(facts, field).filter(|v| !v.is_null())
}

/// Equality that treats `1` and `1.0` as the same number.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

impl Condition {
    /// Evaluate against `facts`.
    ///
    /// Returns `Err` with a reason when the condition cannot be applied to the
    /// data it finds, e.g. a numeric comparison against a string.
    pub fn evaluate(&self, facts: &Map<String, Value>) -> Result<bool, String> {
        match self {
            Self::Always => Ok(true),
            Self::Eq { field, value } => Ok(lookup(facts, field).is_some_and(|v| values_equal(v, value))),
            Self::Ne { field, value } => Ok(!lookup(facts, field).is_some_and(|v| values_equal(v, value))),
            Self::In { field, values } => Ok(lookup(facts, field)
                .is_some_and(|v| values.iter().any(|candidate| values_equal(v, candidate)))),
            Self::Gt { field, value } => compare(facts, field, |x| x > *value),
            Self::Gte { field, value } => compare(facts, field, |x| x >= *value),
            Self::Lt { field, value } => compare(facts, field, |x| x < *value),
            Self::Lte { field, value } => compare(facts, field, |x| x <= *value),
            Self::Exists { field } => Ok(present(facts, field).is_some()),
            Self::Truthy { field } => Ok(present(facts, field).is_some_and(is_truthy)),
            Self::Matches { field, pattern } => {
                let Some(value) = present(facts, field) else {
                    return Ok(false);
                };
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("field '{field}' is not a string"))?;
                Ok(pattern.regex()?.is_match(text))
            }
            Self::All { conditions } => {
                for c in conditions {
                    if !c.evaluate(facts)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Any { conditions } => {
                for c in conditions {
                    if c.evaluate(facts)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not { condition } => condition.evaluate(facts).map(|b| !b),
        }
    }

    /// Static checks performed when a rule set is loaded.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Always => Ok(()),
            Self::Eq { field, .. }
            | Self::Ne { field, .. }
            | Self::In { field, .. }
            | Self::Gt { field, .. }
            | Self::Gte { field, .. }
            | Self::Lt { field, .. }
            | Self::Lte { field, .. }
            | Self::Exists { field }
            | Self::Truthy { field } => check_field(field),
            Self::Matches { field, pattern } => {
                check_field(field)?;
                pattern.regex().map(|_| ())
            }
            Self::All { conditions } | Self::Any { conditions } => {
                if conditions.is_empty() {
                    return Err("combinator has no conditions".to_string());
                }
                conditions.iter().try_for_each(Condition::validate)
            }
            Self::Not { condition } => condition.validate(),
        }
    }
}

fn check_field(field: &str) -> Result<(), String> {
    if field.trim().is_empty() || field.split('.').any(str::is_empty) {
        return Err(format!("invalid field path '{field}'"));
    }
    Ok(())
}

fn compare(
    facts: &Map<String, Value>,
    field: &str,
    predicate: impl Fn(f64) -> bool,
) -> Result<bool, String> {
    match present(facts, field) {
        None => Ok(false),
        Some(value) => value
            .as_f64()
            .map(predicate)
            .ok_or_else(|| format!("field '{field}' is not numeric")),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
