//! Applies configured header transformation rules to outbound HTTP requests.
//!
//! Providers and downstream MCP clients both forward a subset of the inbound request's headers
//! and add fixed headers of their own; this crate implements that transformation once so the
//! matching behavior (forwarding, renaming, stripping) is identical everywhere it's used.

use config::{HeaderRule, NameOrPattern};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Apply `rules` in order against `incoming`, building the set of headers an outbound request
/// should carry. Rules are applied in the order they're configured: later rules can overwrite
/// headers set by earlier ones.
pub fn apply(incoming: &HeaderMap, rules: &[HeaderRule]) -> HeaderMap {
    let mut outbound = HeaderMap::new();

    for rule in rules {
        match rule {
            HeaderRule::Forward(forward) => {
                let mut forwarded_any = false;

                for (name, value) in matching_headers(incoming, &forward.name) {
                    let target_name = forward
                        .rename
                        .as_ref()
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| name.to_string());

                    if let Ok(header_name) = HeaderName::from_bytes(target_name.as_bytes()) {
                        outbound.insert(header_name, value.clone());
                        forwarded_any = true;
                    }
                }

                if !forwarded_any
                    && let (NameOrPattern::Name(name), Some(default)) = (&forward.name, &forward.default)
                {
                    let target_name = forward.rename.as_ref().unwrap_or(name).to_string();

                    if let (Ok(header_name), Ok(header_value)) = (
                        HeaderName::from_bytes(target_name.as_bytes()),
                        HeaderValue::from_bytes(default.as_bytes()),
                    ) {
                        outbound.insert(header_name, header_value);
                    }
                }
            }
            HeaderRule::Insert(insert) => {
                if let (Ok(header_name), Ok(header_value)) = (
                    HeaderName::from_bytes(insert.name.to_string().as_bytes()),
                    HeaderValue::from_bytes(insert.value.as_bytes()),
                ) {
                    outbound.insert(header_name, header_value);
                }
            }
            HeaderRule::Remove(remove) => {
                let to_remove: Vec<HeaderName> = outbound
                    .keys()
                    .filter(|name| name_matches(name.as_str(), &remove.name))
                    .cloned()
                    .collect();

                for name in to_remove {
                    outbound.remove(name);
                }
            }
            HeaderRule::RenameDuplicate(rename) => {
                let matched: Vec<HeaderValue> = incoming
                    .iter()
                    .filter(|(name, _)| rename.name.regex.is_match(name.as_str()))
                    .map(|(_, value)| value.clone())
                    .collect();

                if let Ok(header_name) = HeaderName::from_bytes(rename.rename.to_string().as_bytes()) {
                    for value in matched {
                        outbound.append(header_name.clone(), value);
                    }
                }
            }
        }
    }

    outbound
}

fn matching_headers<'a>(
    headers: &'a HeaderMap,
    matcher: &'a NameOrPattern,
) -> impl Iterator<Item = (&'a HeaderName, &'a HeaderValue)> {
    headers.iter().filter(move |(name, _)| name_matches(name.as_str(), matcher))
}

fn name_matches(name: &str, matcher: &NameOrPattern) -> bool {
    match matcher {
        NameOrPattern::Name(expected) => name.eq_ignore_ascii_case(expected.as_str()),
        NameOrPattern::Pattern(pattern) => pattern.regex.is_match(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{HeaderForward, HeaderInsert};

    fn header_name(value: &str) -> config::HeaderName {
        toml::from_str::<Wrapper>(&format!("name = \"{value}\"")).unwrap().name
    }

    #[derive(serde::Deserialize)]
    struct Wrapper {
        name: config::HeaderName,
    }

    #[test]
    fn forwards_matching_header() {
        let mut incoming = HeaderMap::new();
        incoming.insert("x-client-id", HeaderValue::from_static("abc123"));

        let rules = vec![HeaderRule::Forward(HeaderForward {
            name: NameOrPattern::Name(header_name("x-client-id")),
            rename: None,
            default: None,
        })];

        let outbound = apply(&incoming, &rules);

        assert_eq!(outbound.get("x-client-id").unwrap(), "abc123");
    }

    #[test]
    fn inserts_fixed_header() {
        let incoming = HeaderMap::new();

        let rules = vec![HeaderRule::Insert(HeaderInsert {
            name: header_name("x-gateway"),
            value: toml::from_str::<ValueWrapper>("value = \"nexus\"").unwrap().value,
        })];

        #[derive(serde::Deserialize)]
        struct ValueWrapper {
            value: config::HeaderValue,
        }

        let outbound = apply(&incoming, &rules);

        assert_eq!(outbound.get("x-gateway").unwrap(), "nexus");
    }
}
