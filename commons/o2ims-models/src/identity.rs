use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityParseError {
    #[error("empty resource name in '{0}'")]
    EmptyName(String),
    #[error("too many path segments in '{0}'")]
    TooManySegments(String),
}

/// Namespaced key of a desired-state object.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ResourceIdentity {
    pub namespace: String,
    pub name: String,
}

impl ResourceIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Accepts `namespace/name` or a bare `name` in the default namespace.
impl FromStr for ResourceIdentity {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let (ns, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => (DEFAULT_NAMESPACE, name),
            (Some(ns), Some(name), None) => (ns, name),
            _ => return Err(IdentityParseError::TooManySegments(s.into())),
        };
        if name.is_empty() {
            return Err(IdentityParseError::EmptyName(s.into()));
        }
        let ns = if ns.is_empty() { DEFAULT_NAMESPACE } else { ns };
        Ok(ResourceIdentity::new(ns, name))
    }
}
