// ABOUTME: JSON wire types of the sidecar protocol.
// ABOUTME: Field names are PascalCase; values use the tagged value encoding.

use serde::{Deserialize, Serialize};

use crate::expr::{ConfigPoint, Expression, PointKind};
use crate::state::{State, null_as_default};

pub const CONFIG_POINTS_PATH: &str = "/api/v1/config-point";
pub const FUNCTION_PATH: &str = "/api/v1/function";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigPointsRequest {
    pub module_name: String,
    pub state: State,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigPointsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub config_points: Vec<WirePoint>,
}

/// A configuration point as a sidecar reports it; module and kind may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WirePoint {
    #[serde(default)]
    pub module_name: String,
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "empty_kind")]
    pub kind: Option<PointKind>,
    #[serde(default)]
    pub description: Option<String>,
}

impl WirePoint {
    /// Fill omitted fields: the module defaults to the sidecar's own, the kind to string.
    pub fn fill(self, module: &str) -> ConfigPoint {
        let module_name = if self.module_name.is_empty() {
            module.to_string()
        } else {
            self.module_name
        };
        let name = if self.name.is_empty() {
            self.identifier.clone()
        } else {
            self.name
        };
        ConfigPoint {
            module_name,
            identifier: self.identifier,
            name,
            kind: self.kind.unwrap_or_default(),
            description: self.description,
        }
    }
}

impl From<ConfigPoint> for WirePoint {
    fn from(point: ConfigPoint) -> Self {
        Self {
            module_name: point.module_name,
            identifier: point.identifier,
            name: point.name,
            kind: Some(point.kind),
            description: point.description,
        }
    }
}

/// Some producers write an empty string for an unset kind.
fn empty_kind<'de, D>(deserializer: D) -> Result<Option<PointKind>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)?.as_deref() {
        None | Some("") => Ok(None),
        Some(other) => PointKind::parse(other)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown point kind {other:?}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionRequest {
    pub module_name: String,
    pub state: State,
    pub username: String,
    pub environment: String,
    pub function_name: String,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionResponse {
    pub found: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub config_points: Vec<WirePoint>,
    /// Tagged value; decoded only when no points are pending.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    /// Echoed by sidecars and not used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
}
