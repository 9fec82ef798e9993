// ABOUTME: Custom serde deserializers for manifest and server config fields.
// ABOUTME: Handles string-or-false values, ordered string maps and lenient ports.

use serde::Deserialize;
use serde::de::{self, MapAccess, Visitor};
use std::fmt;

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrBool {
    String(String),
    Bool(bool),
}

/// Accepts a string, `false`, `null` or an absent field. Only a non-empty
/// string yields `Some`.
pub fn string_or_false<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<StringOrBool>::deserialize(deserializer)? {
        Some(StringOrBool::String(s)) if !s.trim().is_empty() => Ok(Some(s)),
        Some(StringOrBool::Bool(true)) => Err(de::Error::custom(
            "expected a string or false, found true",
        )),
        _ => Ok(None),
    }
}

/// Deserialize a JSON/YAML object into key/value pairs, keeping document
/// order. Scalar values are stringified.
pub fn ordered_string_map<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct OrderedVisitor;

    impl<'de> Visitor<'de> for OrderedVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of string keys to scalar values")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, Scalar>()? {
                entries.push((key, value.0));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_any(OrderedVisitor)
}

struct Scalar(String);

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            String(String),
            Int(i64),
            Float(f64),
            Bool(bool),
        }

        Ok(Scalar(match Raw::deserialize(deserializer)? {
            Raw::String(s) => s,
            Raw::Int(n) => n.to_string(),
            Raw::Float(n) => n.to_string(),
            Raw::Bool(b) => b.to_string(),
        }))
    }
}

/// Ports may be written as numbers or numeric strings.
pub fn lenient_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Option::<Port>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Port::Number(n)) => Ok(Some(n)),
        Some(Port::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Port::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid port: {}", s))),
    }
}
