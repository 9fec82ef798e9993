// ABOUTME: Classification of streamed build output fragments.
// ABOUTME: Splits engine JSON into log lines, error lines and pass-through text.

use serde_json::Value;

/// One classified build output fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildLine {
    /// Ordinary build log text from the `stream` field.
    Log(String),
    /// Build error; marks the build failed.
    Error(String),
    /// Anything else, passed through verbatim.
    Other(String),
}

impl BuildLine {
    pub fn text(&self) -> &str {
        match self {
            BuildLine::Log(s) | BuildLine::Error(s) | BuildLine::Other(s) => s,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, BuildLine::Error(_))
    }
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

pub fn classify(fragment: &str) -> BuildLine {
    let Ok(value) = serde_json::from_str::<Value>(fragment) else {
        return BuildLine::Other(fragment.to_string());
    };

    if let Some(stream) = non_empty_str(&value, "stream") {
        return BuildLine::Log(stream.to_string());
    }
    if let Some(error) = non_empty_str(&value, "error") {
        return BuildLine::Error(error.to_string());
    }
    if let Some(message) = value
        .get("errorDetail")
        .and_then(|d| non_empty_str(d, "message"))
    {
        return BuildLine::Error(message.to_string());
    }

    BuildLine::Other(fragment.to_string())
}
