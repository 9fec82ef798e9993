// ABOUTME: Validated network alias for container networking.
// ABOUTME: Used for the optional per-project hostname on the shared network.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkAliasError {
    #[error("network alias cannot be empty")]
    Empty,

    #[error("invalid character in network alias: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkAlias(String);

impl NetworkAlias {
    pub fn new(value: &str) -> Result<Self, NetworkAliasError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(NetworkAliasError::Empty);
        }

        // alphanumeric, hyphen, underscore, dot
        if let Some(c) = trimmed
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.'))
        {
            return Err(NetworkAliasError::InvalidChar(c));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
