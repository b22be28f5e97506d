//! Project description: the structured input of rule evaluation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

use crate::error::CoreError;

/// Object types the builtin rule sets know about. Other values are accepted;
/// they simply match fewer variants.
pub const OBJECT_TYPE_BUILDING: &str = "building";
pub const OBJECT_TYPE_LINEAR: &str = "linear";
pub const OBJECT_TYPE_AREA: &str = "area";

/// Description of a construction project as collected by the input forms.
///
/// Rule conditions address fields by their serialized (camelCase) names;
/// anything not modelled here travels in `attributes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescription {
    #[validate(custom(function = "not_blank"))]
    pub project_name: String,

    #[validate(custom(function = "not_blank"))]
    pub object_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_stage: Option<String>,

    /// Seismic intensity on the MSK-64 scale.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::number::optional"
    )]
    #[validate(range(min = 1, max = 12))]
    pub seismicity: Option<u8>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::number::optional"
    )]
    #[validate(range(min = 0.0))]
    pub area_ha: Option<f64>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::number::optional"
    )]
    #[validate(range(min = 0.0))]
    pub length_km: Option<f64>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::number::optional"
    )]
    #[validate(range(min = 1, max = 300))]
    pub floors: Option<u32>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::number::optional"
    )]
    #[validate(range(min = 0.0))]
    pub building_volume_m3: Option<f64>,

    #[serde(default)]
    pub reconstruction: bool,

    #[serde(default)]
    pub urban: bool,

    #[serde(default)]
    pub near_water: bool,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("must not be empty".into());
        return Err(err);
    }
    Ok(())
}

impl ProjectDescription {
    pub fn new(project_name: impl Into<String>, object_type: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            object_type: object_type.into(),
            ..Self::default()
        }
    }

    /// Attach a free-form attribute visible to rule conditions.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Precondition gate for rule evaluation.
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate().map_err(CoreError::from)
    }

    /// JSON view of the description that conditions are evaluated against.
    pub fn facts(&self) -> Result<Map<String, Value>, CoreError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(CoreError::Internal(format!(
                "project description serialized to a non-object: {other}"
            ))),
            Err(e) => Err(CoreError::Internal(e.to_string())),
        }
    }
}
