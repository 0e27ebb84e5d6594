//! CSRF protection middleware.
//!
//! Rejects requests that don't carry the configured header. This doesn't validate the header's
//! value, only its presence: browsers refuse to let simple cross-site requests (HTML forms,
//! `<img>` tags) set arbitrary headers without a CORS preflight, so requiring one blocks the
//! classic CSRF vector without needing server-side session state.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::body::Body;
use config::CsrfConfig;
use http::{Request, Response, StatusCode};
use tower::Layer;

#[derive(Clone)]
pub struct CsrfLayer {
    config: Arc<CsrfConfig>,
}

impl CsrfLayer {
    pub fn new(config: &CsrfConfig) -> Self {
        Self {
            config: Arc::new(config.clone()),
        }
    }
}

impl<Service> Layer<Service> for CsrfLayer
where
    Service: Send + Clone,
{
    type Service = CsrfService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        CsrfService {
            next,
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CsrfService<Service> {
    next: Service,
    config: Arc<CsrfConfig>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for CsrfService<Service>
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

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();

        if !self.config.enabled || req.headers().contains_key(self.config.header_name.as_str()) {
            return Box::pin(async move { next.call(req).await });
        }

        let header_name = self.config.header_name.clone();

        Box::pin(async move {
            Ok(Response::builder()
                .status(StatusCode::FORBIDDEN)
                .header("Content-Type", "text/plain")
                .body(Body::from(format!("Missing required header: {header_name}")))
                .unwrap())
        })
    }
}
