// ABOUTME: Configuration points: deployment-time inputs surfaced by evaluation.
// ABOUTME: Identified by (module, identifier), unique within a deployment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of value a configuration point accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    #[default]
    String,
    Secret,
}

impl PointKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(PointKind::String),
            "secret" => Some(PointKind::Secret),
            _ => None,
        }
    }
}

impl fmt::Display for PointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointKind::String => f.write_str("string"),
            PointKind::Secret => f.write_str("secret"),
        }
    }
}

/// One deployment-time input that evaluation could not proceed without.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigPoint {
    pub module_name: String,
    /// Module-unique slug.
    pub identifier: String,
    /// Human readable name.
    pub name: String,
    pub kind: PointKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigPoint {
    pub fn new(
        module_name: impl Into<String>,
        identifier: impl Into<String>,
        kind: PointKind,
    ) -> Self {
        let identifier = identifier.into();
        Self {
            module_name: module_name.into(),
            name: identifier.clone(),
            identifier,
            kind,
            description: None,
        }
    }

    pub fn matches(&self, module_name: &str, identifier: &str) -> bool {
        self.module_name == module_name && self.identifier == identifier
    }
}

impl fmt::Display for ConfigPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module_name, self.identifier)
    }
}
