use std::{str::FromStr, sync::Arc, time::Duration};

use jwt_compact::jwk::JsonWebKey;
use reqwest::Client;
use serde::Deserialize;
use tokio::{sync::RwLock, time::Instant};
use url::Url;

use super::error::AuthError;

/// Signature algorithms we know how to validate against a JWK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Alg {
    HS256,
    HS384,
    HS512,
    ES256,
    RS256,
    RS384,
    RS512,
    PS256,
    PS384,
    PS512,
    EdDSA,
}

impl FromStr for Alg {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "HS256" => Self::HS256,
            "HS384" => Self::HS384,
            "HS512" => Self::HS512,
            "ES256" => Self::ES256,
            "RS256" => Self::RS256,
            "RS384" => Self::RS384,
            "RS512" => Self::RS512,
            "PS256" => Self::PS256,
            "PS384" => Self::PS384,
            "PS512" => Self::PS512,
            "EdDSA" => Self::EdDSA,
            _ => return Err(()),
        })
    }
}

/// A single entry from a JWKS document.
pub(crate) struct Jwk {
    pub key_id: Option<String>,
    pub key: JsonWebKey<'static>,
}

#[derive(Deserialize)]
struct JwkRaw {
    #[serde(rename = "kid", default)]
    key_id: Option<String>,
    #[serde(flatten)]
    key: JsonWebKey<'static>,
}

#[derive(Deserialize)]
struct JwksDocument {
    keys: Vec<JwkRaw>,
}

/// Polling cache for a remote JWKS endpoint.
///
/// Keys are re-fetched lazily, at most once per `poll_interval`, rather than on a background
/// task, so an idle gateway never spends a connection on a JWKS endpoint it isn't using.
pub(crate) struct JwksCache {
    url: Url,
    poll_interval: Duration,
    client: Client,
    cached: RwLock<Option<(Instant, Arc<Vec<Jwk>>)>>,
}

impl JwksCache {
    pub fn new(url: Url, poll_interval: Duration) -> Self {
        Self {
            url,
            poll_interval,
            client: Client::new(),
            cached: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> Result<Arc<Vec<Jwk>>, AuthError> {
        if let Some((fetched_at, keys)) = self.cached.read().await.as_ref()
            && fetched_at.elapsed() < self.poll_interval
        {
            return Ok(keys.clone());
        }

        let mut cached = self.cached.write().await;

        if let Some((fetched_at, keys)) = cached.as_ref()
            && fetched_at.elapsed() < self.poll_interval
        {
            return Ok(keys.clone());
        }

        let keys = Arc::new(self.fetch().await?);
        *cached = Some((Instant::now(), keys.clone()));

        Ok(keys)
    }

    async fn fetch(&self) -> Result<Vec<Jwk>, AuthError> {
        let response = self.client.get(self.url.clone()).send().await.map_err(|err| {
            log::error!("failed to fetch JWKS from {}: {err}", self.url);
            AuthError::Internal
        })?;

        let bytes = response.bytes().await.map_err(|err| {
            log::error!("failed to read JWKS response body: {err}");
            AuthError::Internal
        })?;

        // `from_reader` never borrows from the input, so the resulting keys are `'static`
        // and can be cached past this function's stack frame.
        let document: JwksDocument = serde_json::from_reader(bytes.as_ref()).map_err(|err| {
            log::error!("failed to parse JWKS document: {err}");
            AuthError::Internal
        })?;

        Ok(document
            .keys
            .into_iter()
            .map(|raw| Jwk {
                key_id: raw.key_id,
                key: raw.key,
            })
            .collect())
    }
}
