use std::time::Instant;

use telemetry::{
    KeyValue,
    attributes::{GEN_AI_OPERATION_NAME, GEN_AI_REQUEST_MODEL, GEN_AI_RESPONSE_MODEL, GEN_AI_TOKEN_TYPE},
    metrics::{GEN_AI_CLIENT_OPERATION_DURATION, GEN_AI_CLIENT_TOKEN_USAGE},
};

use crate::{
    messages::{
        openai::ModelsResponse,
        unified::{UnifiedRequest, UnifiedResponse},
    },
    provider::ChatCompletionStream,
    request::RequestContext,
    server::LlmService,
};

const OPERATION_NAME: &str = "chat";

/// Wrapper that records gen_ai.* duration and token usage metrics around LLM service operations.
#[derive(Clone)]
pub struct LlmServerWithMetrics<S> {
    inner: S,
}

impl<S> LlmServerWithMetrics<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S> LlmService for LlmServerWithMetrics<S>
where
    S: LlmService,
{
    async fn models(&self) -> ModelsResponse {
        self.inner.models().await
    }

    async fn completions(&self, request: UnifiedRequest, context: &RequestContext) -> crate::Result<UnifiedResponse> {
        let start = Instant::now();
        let mut attributes = vec![
            KeyValue::new(GEN_AI_OPERATION_NAME, OPERATION_NAME),
            KeyValue::new(GEN_AI_REQUEST_MODEL, request.model.clone()),
        ];

        let result = self.inner.completions(request, context).await;

        match &result {
            Ok(response) => {
                attributes.push(KeyValue::new(GEN_AI_RESPONSE_MODEL, response.model.clone()));
                record_duration(&attributes, start.elapsed().as_secs_f64());
                record_tokens(&attributes, response.usage.prompt_tokens, response.usage.completion_tokens);
            }
            Err(e) => {
                attributes.push(KeyValue::new("error.type", e.error_type().to_string()));
                record_duration(&attributes, start.elapsed().as_secs_f64());
            }
        }

        result
    }

    async fn completions_stream(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<ChatCompletionStream> {
        // Streamed token accounting is recorded by the tracing wrapper, which observes every
        // chunk; this layer only tracks whether the stream could be established at all.
        let start = Instant::now();
        let mut attributes = vec![
            KeyValue::new(GEN_AI_OPERATION_NAME, OPERATION_NAME),
            KeyValue::new(GEN_AI_REQUEST_MODEL, request.model.clone()),
        ];

        let result = self.inner.completions_stream(request, context).await;

        if let Err(e) = &result {
            attributes.push(KeyValue::new("error.type", e.error_type().to_string()));
        }
        record_duration(&attributes, start.elapsed().as_secs_f64());

        result
    }
}

fn record_duration(attributes: &[KeyValue], seconds: f64) {
    telemetry::metrics::meter()
        .f64_histogram(GEN_AI_CLIENT_OPERATION_DURATION)
        .with_unit("s")
        .build()
        .record(seconds, attributes);
}

fn record_tokens(attributes: &[KeyValue], input_tokens: u32, output_tokens: u32) {
    let histogram = telemetry::metrics::meter().u64_histogram(GEN_AI_CLIENT_TOKEN_USAGE).build();

    if input_tokens > 0 {
        let mut attrs = attributes.to_vec();
        attrs.push(KeyValue::new(GEN_AI_TOKEN_TYPE, "input"));
        histogram.record(input_tokens as u64, &attrs);
    }

    if output_tokens > 0 {
        let mut attrs = attributes.to_vec();
        attrs.push(KeyValue::new(GEN_AI_TOKEN_TYPE, "output"));
        histogram.record(output_tokens as u64, &attrs);
    }
}
