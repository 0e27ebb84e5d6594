//! Header transformation rules applied to outbound provider and downstream MCP requests.

use serde::Deserialize;

use crate::http_types::{HeaderName, HeaderValue};

/// A single name or a regex pattern matching several header names.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NameOrPattern {
    /// Match a single, exact header name.
    Name(HeaderName),
    /// Match any header name satisfying the given pattern.
    Pattern(NamePattern),
}

/// A compiled regex used to match header names, carrying its source for `Debug`/config dumps.
#[derive(Debug, Clone)]
pub struct NamePattern {
    /// The original, uncompiled pattern as written in the config file.
    pub source: String,
    /// The compiled matcher.
    pub regex: regex::Regex,
}

impl<'de> Deserialize<'de> for NamePattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        let regex = regex::Regex::new(&source).map_err(serde::de::Error::custom)?;

        Ok(Self { source, regex })
    }
}

impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for NamePattern {}

/// Forward an incoming header to the outbound request, optionally renaming it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderForward {
    /// Name or pattern of the incoming header to forward.
    pub name: NameOrPattern,
    /// New name to use on the outbound request; defaults to the original name.
    pub rename: Option<HeaderName>,
    /// Value to send if the incoming header was absent.
    pub default: Option<HeaderValue>,
}

/// Insert a fixed header on the outbound request, overwriting any existing value.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderInsert {
    /// Header name to insert.
    pub name: HeaderName,
    /// Header value to insert.
    pub value: HeaderValue,
}

/// Strip a header (or every header matching a pattern) before sending the outbound request.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderRemove {
    /// Name or pattern of headers to remove.
    pub name: NameOrPattern,
}

/// Rename every header matching a pattern, keeping duplicates rather than overwriting.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderRenameDuplicate {
    /// Pattern matching the source header names.
    pub name: NamePattern,
    /// New name to duplicate matched headers under.
    pub rename: HeaderName,
}

/// A single header transformation rule, tagged by kind in config.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case", deny_unknown_fields)]
pub enum HeaderRule {
    /// See [`HeaderForward`].
    Forward(HeaderForward),
    /// See [`HeaderInsert`].
    Insert(HeaderInsert),
    /// See [`HeaderRemove`].
    Remove(HeaderRemove),
    /// See [`HeaderRenameDuplicate`].
    RenameDuplicate(HeaderRenameDuplicate),
}

/// A header rule scoped to a single configured MCP downstream server.
pub type McpHeaderRule = HeaderRule;
