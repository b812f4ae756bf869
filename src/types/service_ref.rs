// ABOUTME: Reference to one service of one module.
// ABOUTME: Used as a dependency edge target and for error context.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(module, service)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRef {
    pub module: String,
    pub service: String,
}

impl ServiceRef {
    pub fn new(module: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            service: service.into(),
        }
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module, self.service)
    }
}
