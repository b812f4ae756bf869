// ABOUTME: Values produced by expression evaluation.
// ABOUTME: Serialized as {"_type": <kind>, "value": ...} for the sidecar protocol.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::EvalError;
use crate::types::ServiceRef;

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    String(String),
    Identifier(String),
    /// Name of a cluster secret object. Never the secret's contents.
    Secret(String),
    Boolean(bool),
    Integer(i64),
    ServiceReference(ServiceRef),
}

/// Discriminant of a [`Value`]. The numeric order is the wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null = 0,
    String = 1,
    Identifier = 2,
    Secret = 3,
    Boolean = 4,
    Integer = 5,
    ServiceReference = 6,
}

impl ValueKind {
    fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => ValueKind::Null,
            1 => ValueKind::String,
            2 => ValueKind::Identifier,
            3 => ValueKind::Secret,
            4 => ValueKind::Boolean,
            5 => ValueKind::Integer,
            6 => ValueKind::ServiceReference,
            _ => return None,
        })
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::String => "string",
            ValueKind::Identifier => "identifier",
            ValueKind::Secret => "secret",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::ServiceReference => "service reference",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::String(_) => ValueKind::String,
            Value::Identifier(_) => ValueKind::Identifier,
            Value::Secret(_) => ValueKind::Secret,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::ServiceReference(_) => ValueKind::ServiceReference,
        }
    }

    pub fn into_identifier(self) -> Result<String, EvalError> {
        match self {
            Value::Identifier(name) => Ok(name),
            other => Err(EvalError::unexpected_kind(ValueKind::Identifier, &other)),
        }
    }

    pub fn into_string(self) -> Result<String, EvalError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(EvalError::unexpected_kind(ValueKind::String, &other)),
        }
    }

    pub fn into_service_ref(self) -> Result<ServiceRef, EvalError> {
        match self {
            Value::ServiceReference(service) => Ok(service),
            other => Err(EvalError::unexpected_kind(
                ValueKind::ServiceReference,
                &other,
            )),
        }
    }
}

#[derive(Serialize)]
struct TaggedOut<'a> {
    #[serde(rename = "_type")]
    kind: u8,
    value: Payload<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Payload<'a> {
    Null(()),
    Text(&'a str),
    Boolean(bool),
    Integer(i64),
    Service(&'a ServiceRef),
}

#[derive(Deserialize)]
struct TaggedIn {
    #[serde(rename = "_type")]
    kind: u8,
    #[serde(default)]
    value: serde_json::Value,
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = match self {
            Value::Null => Payload::Null(()),
            Value::String(s) | Value::Identifier(s) | Value::Secret(s) => Payload::Text(s),
            Value::Boolean(b) => Payload::Boolean(*b),
            Value::Integer(i) => Payload::Integer(*i),
            Value::ServiceReference(service) => Payload::Service(service),
        };
        TaggedOut {
            kind: self.kind() as u8,
            value,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tagged = TaggedIn::deserialize(deserializer)?;
        let kind = ValueKind::from_tag(tagged.kind)
            .ok_or_else(|| D::Error::custom(format!("invalid value type: {}", tagged.kind)))?;

        let text = |v: serde_json::Value| match v {
            serde_json::Value::String(s) => Ok(s),
            _ => Err(D::Error::custom(format!("{kind} value must be a string"))),
        };

        Ok(match kind {
            ValueKind::Null => Value::Null,
            ValueKind::String => Value::String(text(tagged.value)?),
            ValueKind::Identifier => Value::Identifier(text(tagged.value)?),
            ValueKind::Secret => Value::Secret(text(tagged.value)?),
            ValueKind::Boolean => Value::Boolean(
                tagged
                    .value
                    .as_bool()
                    .ok_or_else(|| D::Error::custom("boolean value must be a bool"))?,
            ),
            ValueKind::Integer => Value::Integer(
                tagged
                    .value
                    .as_i64()
                    .ok_or_else(|| D::Error::custom("integer value must be an integer"))?,
            ),
            ValueKind::ServiceReference => Value::ServiceReference(
                serde_json::from_value(tagged.value).map_err(D::Error::custom)?,
            ),
        })
    }
}
