// ABOUTME: Persisted deployment state: resolved config values and the service cursor.
// ABOUTME: Values are raw bytes, base64 encoded on the wire.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::expr::{EvalError, PointKind, Value};

/// Resumable state of one deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct State {
    #[serde(default, deserialize_with = "null_as_default")]
    pub configs: Vec<StateConfig>,
    /// Services before this index are fully deployed.
    #[serde(default)]
    pub service_index: usize,
}

/// One supplied configuration value.
///
/// For [`PointKind::Secret`] the value is the name of the cluster secret
/// holding the data, never the data itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateConfig {
    pub module_name: String,
    pub name: String,
    pub kind: PointKind,
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
}

impl State {
    pub fn find_config(&self, module_name: &str, name: &str) -> Option<&StateConfig> {
        self.configs
            .iter()
            .find(|c| c.module_name == module_name && c.name == name)
    }

    pub fn has_config(&self, module_name: &str, name: &str) -> bool {
        self.find_config(module_name, name).is_some()
    }
}

impl StateConfig {
    pub fn new(
        module_name: impl Into<String>,
        name: impl Into<String>,
        kind: PointKind,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            module_name: module_name.into(),
            name: name.into(),
            kind,
            value: value.into(),
        }
    }

    /// The evaluated form: a String, or a Secret carrying the secret's name.
    pub fn to_value(&self) -> Result<Value, EvalError> {
        let text = std::str::from_utf8(&self.value).map_err(|_| EvalError::InvalidStoredValue {
            module: self.module_name.clone(),
            identifier: self.name.clone(),
        })?;
        Ok(match self.kind {
            PointKind::String => Value::String(text.to_string()),
            PointKind::Secret => Value::Secret(text.to_string()),
        })
    }
}

/// Accept `null` where a default is expected; some producers write null slices.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
