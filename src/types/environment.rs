// ABOUTME: A user's deployment target; maps to one cluster namespace.
// ABOUTME: Every deployment belongs to exactly one environment.

use serde::{Deserialize, Serialize};

use super::{EnvironmentId, sanitize_label};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: EnvironmentId,
    pub user: String,
    pub slug: String,
}

impl Environment {
    /// An environment whose id is derived from user and slug.
    pub fn new(user: impl Into<String>, slug: impl Into<String>) -> Self {
        let user = user.into();
        let slug = slug.into();
        Self {
            id: EnvironmentId::new(format!("{user}-{slug}")),
            user,
            slug,
        }
    }

    /// Namespace holding every object of this environment.
    pub fn namespace(&self) -> String {
        sanitize_label(&format!("{}-{}", self.user, self.slug))
    }
}
