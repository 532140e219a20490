//! Namespaced registry keys.
//!
//! Item types travel on the wire as numeric ids; registry keys are the
//! human-authored names used in configuration (e.g. `base:frag_grenade`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default namespace used when a key omits an explicit namespace.
pub const DEFAULT_NAMESPACE: &str = "base";

/// Error returned when parsing an invalid [`RegistryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid registry key {input:?}: {reason}")]
pub struct RegistryKeyError {
    input: String,
    reason: &'static str,
}

/// A namespaced key of the form `namespace:path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegistryKey {
    namespace: String,
    path: String,
}

impl RegistryKey {
    /// Parse `namespace:path`, or a bare `path` in [`DEFAULT_NAMESPACE`].
    pub fn parse(input: &str) -> Result<Self, RegistryKeyError> {
        let fail = |reason| RegistryKeyError {
            input: input.to_string(),
            reason,
        };
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(fail("empty"));
        }
        let (namespace, path) = trimmed
            .split_once(':')
            .unwrap_or((DEFAULT_NAMESPACE, trimmed));

        if namespace.is_empty() || namespace.len() > 64 {
            return Err(fail("namespace must be 1..=64 bytes"));
        }
        if !namespace
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.'))
        {
            return Err(fail("namespace allows a-z0-9_.-"));
        }
        if path.is_empty() || path.len() > 128 {
            return Err(fail("path must be 1..=128 bytes"));
        }
        if !path
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.' | '/'))
        {
            return Err(fail("path allows a-z0-9_./-"));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            path: path.to_string(),
        })
    }

    /// Registry key namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Registry key path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for RegistryKey {
    type Err = RegistryKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RegistryKey {
    type Error = RegistryKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RegistryKey> for String {
    fn from(key: RegistryKey) -> Self {
        key.to_string()
    }
}
