// ABOUTME: Container restart policy parsed from the project manifest.
// ABOUTME: Prefix-matches no, always and on-failure[:max-retries].

use crate::runtime::RestartPolicyConfig;
use serde::de::{Deserialize, Deserializer};
use std::fmt;

const DEFAULT_MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    No,
    Always,
    OnFailure { max_retries: u32 },
}

impl Default for RestartPolicy {
    fn default() -> Self {
        RestartPolicy::OnFailure {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RestartPolicy {
    /// Parse a policy string. Never fails: anything unrecognised is the
    /// default `on-failure:2`.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.starts_with("no") {
            RestartPolicy::No
        } else if s.starts_with("always") {
            RestartPolicy::Always
        } else if let Some(rest) = s.strip_prefix("on-failure") {
            let max_retries = rest
                .strip_prefix(':')
                .and_then(|n| n.parse::<u32>().ok())
                .unwrap_or(DEFAULT_MAX_RETRIES);
            RestartPolicy::OnFailure { max_retries }
        } else {
            RestartPolicy::default()
        }
    }

    /// Engine-facing representation.
    pub fn to_runtime(self) -> RestartPolicyConfig {
        match self {
            RestartPolicy::No => RestartPolicyConfig::No,
            RestartPolicy::Always => RestartPolicyConfig::Always,
            RestartPolicy::OnFailure { max_retries } => {
                RestartPolicyConfig::OnFailure { max_retries }
            }
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPolicy::No => write!(f, "no"),
            RestartPolicy::Always => write!(f, "always"),
            RestartPolicy::OnFailure { max_retries } => write!(f, "on-failure:{}", max_retries),
        }
    }
}

impl<'de> Deserialize<'de> for RestartPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(RestartPolicy::parse(&s))
    }
}
