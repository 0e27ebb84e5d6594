//! Thin serde-friendly wrappers around `http`'s header types, so config structs can derive
//! `Deserialize` directly instead of hand-rolling visitors for every header field.

use std::{fmt, ops::Deref, str::FromStr};

use serde::{Deserialize, Deserializer, de};

/// A validated HTTP header name, deserializable from a plain TOML string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderName(http::HeaderName);

impl Deref for HeaderName {
    type Target = http::HeaderName;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for HeaderName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;

        http::HeaderName::from_str(&value)
            .map(HeaderName)
            .map_err(|e| de::Error::custom(format!("invalid header name '{value}': {e}")))
    }
}

/// A validated HTTP header value, deserializable from a plain TOML string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderValue(http::HeaderValue);

impl Deref for HeaderValue {
    type Target = http::HeaderValue;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for HeaderValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;

        http::HeaderValue::from_str(&value)
            .map(HeaderValue)
            .map_err(|e| de::Error::custom(format!("invalid header value '{value}': {e}")))
    }
}
