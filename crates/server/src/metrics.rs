//! HTTP request metrics middleware.
//!
//! Records `http.server.request.duration` following OpenTelemetry HTTP semantic conventions.
//! Runs outermost (before auth/CORS/CSRF) so it covers every request regardless of how it's
//! ultimately handled.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};

use axum::{body::Body, extract::MatchedPath};
use http::{Request, Response};
use opentelemetry::KeyValue;
use tower::Layer;

#[derive(Clone, Default)]
pub struct MetricsLayer;

impl MetricsLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<Service> Layer<Service> for MetricsLayer
where
    Service: Send + Clone,
{
    type Service = MetricsService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        MetricsService { next }
    }
}

#[derive(Clone)]
pub struct MetricsService<Service> {
    next: Service,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for MetricsService<Service>
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

        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched| matched.as_str().to_owned())
                .unwrap_or_else(|| req.uri().path().to_owned());

            let response = next.call(req).await?;

            let histogram = telemetry::metrics::meter()
                .f64_histogram(telemetry::metrics::HTTP_SERVER_REQUEST_DURATION)
                .with_unit("ms")
                .build();

            histogram.record(
                start.elapsed().as_secs_f64() * 1000.0,
                &[
                    KeyValue::new("http.request.method", method),
                    KeyValue::new("http.route", path),
                    KeyValue::new("http.response.status_code", response.status().as_u16() as i64),
                ],
            );

            Ok(response)
        })
    }
}
