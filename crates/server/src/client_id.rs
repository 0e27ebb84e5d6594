//! Client identification middleware.
//!
//! Derives a stable per-caller identity from claims on the validated gateway JWT (inserted into
//! request extensions by [`crate::auth::AuthLayer`]), so downstream middleware (rate limiting,
//! tracing) and handlers can key behavior off of who's calling rather than just their IP.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::body::Body;
use config::ClientIdentificationConfig;
use context::{Authentication, ClientIdentity};
use http::{Request, Response, StatusCode};
use tower::Layer;

#[derive(Clone)]
pub struct ClientIdentificationLayer {
    config: Arc<ClientIdentificationConfig>,
}

impl ClientIdentificationLayer {
    pub fn new(config: ClientIdentificationConfig) -> Self {
        Self { config: Arc::new(config) }
    }
}

impl<Service> Layer<Service> for ClientIdentificationLayer
where
    Service: Send + Clone,
{
    type Service = ClientIdentificationService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        ClientIdentificationService {
            next,
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ClientIdentificationService<Service> {
    next: Service,
    config: Arc<ClientIdentificationConfig>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for ClientIdentificationService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let config = self.config.clone();

        if !config.enabled {
            return Box::pin(async move { next.call(req).await });
        }

        let identity = extract_identity(&config, req.extensions().get::<Authentication>());

        Box::pin(async move {
            let identity = match identity {
                Ok(identity) => identity,
                Err(message) => {
                    log::debug!("Rejecting request: {message}");

                    return Ok(Response::builder()
                        .status(StatusCode::FORBIDDEN)
                        .header("Content-Type", "text/plain")
                        .body(Body::from(message))
                        .unwrap());
                }
            };

            req.extensions_mut().insert(identity);

            next.call(req).await
        })
    }
}

fn extract_identity(
    config: &ClientIdentificationConfig,
    auth: Option<&Authentication>,
) -> Result<ClientIdentity, &'static str> {
    let claims = auth
        .and_then(|auth| auth.gateway.as_ref())
        .map(|token| &token.claims().custom);

    let Some(claims) = claims else {
        return Err("missing client identity: no authenticated gateway token");
    };

    let Some(client_id) = claims.get_claim(&config.client_id.jwt_claim) else {
        return Err("missing client identity: configured client id claim not present on token");
    };

    let group = config
        .group_id
        .as_ref()
        .and_then(|claim| claims.get_claim(&claim.jwt_claim));

    if let Some(ref group) = group
        && let Some(allowed) = config.validation.group_values.get(group)
        && !allowed.contains(&client_id)
    {
        return Err("client identity rejected: not in the allow-list for its group");
    }

    Ok(ClientIdentity { client_id, group })
}
