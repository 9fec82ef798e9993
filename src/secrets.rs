// ABOUTME: Per-user secrets referenced from env and build args as `@name`.
// ABOUTME: Read-only store trait, an in-memory/JSON-file store, and substitution.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub const SECRETS_FILENAME: &str = "secrets.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Secret {
    pub name: String,
    pub value: String,
}

/// Read access to stored secrets.
pub trait SecretStore: Send + Sync {
    fn secrets_for(&self, username: &str) -> Vec<Secret>;
}

/// Secrets held in memory, keyed by user.
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    by_user: HashMap<String, Vec<Secret>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, username: &str, name: impl Into<String>, value: impl Into<String>) {
        self.by_user
            .entry(username.to_string())
            .or_default()
            .push(Secret {
                name: name.into(),
                value: value.into(),
            });
    }

    /// Load `{ "<user>": [{"name": .., "value": ..}] }`. A missing file is an
    /// empty store.
    pub fn load(path: &Path) -> Result<Self, crate::config::ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let by_user: HashMap<String, Vec<Secret>> = serde_json::from_str(&content)?;
        Ok(Self { by_user })
    }
}

impl SecretStore for MemorySecretStore {
    fn secrets_for(&self, username: &str) -> Vec<Secret> {
        self.by_user.get(username).cloned().unwrap_or_default()
    }
}

/// Replace values of exactly `@name` with the matching secret. Unmatched
/// references and every other value pass through untouched.
pub fn substitute(entries: &[(String, String)], secrets: &[Secret]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(key, value)| {
            let resolved = value
                .strip_prefix('@')
                .and_then(|name| secrets.iter().find(|s| s.name == name))
                .map(|s| s.value.clone())
                .unwrap_or_else(|| value.clone());
            (key.clone(), resolved)
        })
        .collect()
}
