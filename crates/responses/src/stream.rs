//! Streaming Assembler: reconstructs a provider's per-turn token/tool-call deltas into this
//! crate's output items, and turns the orchestrator's turn-by-turn execution into the ordered
//! sequence of Responses-API SSE events.
//!
//! Kept free of any HTTP types — the gateway's route handler is the one place that knows how to
//! turn a [`ResponseStreamEvent`] into an `axum::response::sse::Event`, the same separation
//! [`crate::orchestrator`] keeps from the tool registry's collaborators.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use llm::client::{RequestContext, UnifiedChunk, UnifiedFinishReason, UnifiedFunctionCall, UnifiedStreamingToolCall, UnifiedToolCall};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tools::{ToolContext, ToolEvent, ToolEventSender, ToolRegistry};
use uuid::Uuid;

use crate::error::{Result, ResponseError};
use crate::orchestrator::ResponseOrchestrator;
use crate::store::ResponseStore;
use crate::types::{OutputItem, Response, ResponseRequest};

/// One event of the `GET .../responses` SSE sequence.
///
/// Variant order in this enum mirrors the order the assembler emits them in within a turn; it
/// isn't itself meaningful to serde.
#[derive(Debug, Clone)]
pub enum ResponseStreamEvent {
    Created(Response),
    OutputTextDelta { item_id: String, delta: String },
    FunctionCallArgumentsDelta { item_id: String, delta: String },
    OutputItemDone(OutputItem),
    ToolCallStarted { call_id: String, name: String },
    ToolCallCompleted { call_id: String },
    Completed(Response),
    Failed(Response),
    Incomplete(Response),
}

impl ResponseStreamEvent {
    /// The SSE `event:` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => "response.created",
            Self::OutputTextDelta { .. } => "response.output_text.delta",
            Self::FunctionCallArgumentsDelta { .. } => "response.function_call_arguments.delta",
            Self::OutputItemDone(_) => "response.output_item.done",
            Self::ToolCallStarted { .. } => "response.tool_call.started",
            Self::ToolCallCompleted { .. } => "response.tool_call.completed",
            Self::Completed(_) => "response.completed",
            Self::Failed(_) => "response.failed",
            Self::Incomplete(_) => "response.incomplete",
        }
    }

    /// The SSE `data:` payload.
    pub fn data(&self) -> Value {
        match self {
            Self::Created(r) | Self::Completed(r) | Self::Failed(r) | Self::Incomplete(r) => {
                json!({ "response": r })
            }
            Self::OutputTextDelta { item_id, delta } => json!({ "item_id": item_id, "delta": delta }),
            Self::FunctionCallArgumentsDelta { item_id, delta } => json!({ "item_id": item_id, "delta": delta }),
            Self::OutputItemDone(item) => json!({ "item": item }),
            Self::ToolCallStarted { call_id, name } => json!({ "call_id": call_id, "name": name }),
            Self::ToolCallCompleted { call_id } => json!({ "call_id": call_id }),
        }
    }

    /// Terminal events that end the SSE response.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_) | Self::Incomplete(_))
    }
}

/// One piece of newly-available content the assembler surfaced while applying a chunk, ready to
/// forward as an SSE delta event.
#[derive(Debug, Clone)]
pub enum ChunkDelta {
    Text(String),
    ToolCallArguments { index: usize, delta: String },
}

/// Accumulates one turn's stream of [`UnifiedChunk`]s into its final text and tool calls.
///
/// Tool calls are bucketed by the `index` the provider assigns them, the same convention
/// `UnifiedStreamingToolCall` itself uses; a `Start` at an index that already has an id is
/// ignored rather than overwritten, so a provider that repeats the start frame doesn't clobber
/// the name it already committed to.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    text: String,
    tool_calls: BTreeMap<usize, (String, String, String)>, // index -> (id, name, arguments)
    finish_reason: Option<UnifiedFinishReason>,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one chunk, returning the deltas it introduced in arrival order.
    pub fn apply(&mut self, chunk: UnifiedChunk) -> Vec<ChunkDelta> {
        let mut deltas = Vec::new();

        let Some(choice) = chunk.choices.into_iter().next() else {
            return deltas;
        };

        if let Some(reason) = choice.finish_reason {
            self.finish_reason = Some(reason);
        }

        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                self.text.push_str(&content);
                deltas.push(ChunkDelta::Text(content));
            }
        }

        for call in choice.delta.tool_calls.into_iter().flatten() {
            match call {
                UnifiedStreamingToolCall::Start { index, id, function } => {
                    let entry = self.tool_calls.entry(index).or_insert_with(|| (String::new(), String::new(), String::new()));
                    if entry.0.is_empty() {
                        entry.0 = id;
                    }
                    if entry.1.is_empty() {
                        entry.1 = function.name;
                    }
                    if !function.arguments.is_empty() {
                        entry.2.push_str(&function.arguments);
                        deltas.push(ChunkDelta::ToolCallArguments { index, delta: function.arguments });
                    }
                }
                UnifiedStreamingToolCall::Delta { index, function } => {
                    let entry = self.tool_calls.entry(index).or_insert_with(|| (String::new(), String::new(), String::new()));
                    entry.2.push_str(&function.arguments);
                    deltas.push(ChunkDelta::ToolCallArguments { index, delta: function.arguments });
                }
            }
        }

        deltas
    }

    pub fn finish_reason(&self) -> UnifiedFinishReason {
        self.finish_reason.clone().unwrap_or(UnifiedFinishReason::Stop)
    }

    /// Consumes the assembler, returning the reconstructed text and tool calls in index order.
    pub fn into_parts(self) -> (String, Vec<UnifiedToolCall>) {
        let tool_calls = self
            .tool_calls
            .into_values()
            .map(|(id, name, arguments)| UnifiedToolCall {
                id,
                function: UnifiedFunctionCall { name, arguments: llm::client::UnifiedArguments::String(arguments) },
            })
            .collect();

        (self.text, tool_calls)
    }
}

impl ResponseOrchestrator {
    /// Streaming counterpart to [`ResponseOrchestrator::run`]: drives the same multi-turn loop,
    /// but reports progress as it goes instead of only returning the finished [`Response`].
    ///
    /// Runs on a background task so the returned stream can be handed straight to the SSE route
    /// handler; a send error on the internal channel (the client disconnected) stops the task at
    /// its next safe point — between a chunk and the next, or between a tool call result and the
    /// next upstream call — without rolling back any tool side effect already committed.
    pub fn run_streaming(
        self: Arc<Self>,
        request: ResponseRequest,
        tool_registry: Arc<ToolRegistry>,
        tool_context_for: impl Fn(&str, Option<ToolEventSender>) -> ToolContext + Send + Sync + 'static,
        store: Arc<ResponseStore>,
        request_context: RequestContext,
    ) -> impl Stream<Item = ResponseStreamEvent> {
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let outcome = self.drive_streaming_turns(&request, &tool_registry, &tool_context_for, &store, &request_context, &tx).await;

            if let Err(error) = outcome {
                let failed = self.error_response(&request, &error);
                let _ = tx.send(ResponseStreamEvent::Failed(failed)).await;
            }
        });

        futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|event| (event, rx)) })
    }

    fn error_response(&self, request: &ResponseRequest, error: &ResponseError) -> Response {
        Response {
            id: format!("resp_{}", Uuid::new_v4().simple()),
            object: "response".to_string(),
            created_at: jiff::Timestamp::now().as_second(),
            status: crate::types::ResponseStatus::Failed,
            model: request.model.clone(),
            output: Vec::new(),
            usage: None,
            previous_response_id: request.previous_response_id.clone(),
            incomplete_details: None,
            error: Some(crate::types::ResponseErrorDetail { code: "server_error".to_string(), message: error.to_string() }),
            metadata: request.metadata.clone(),
            store: false,
        }
    }

    async fn drive_streaming_turns(
        &self,
        request: &ResponseRequest,
        tool_registry: &ToolRegistry,
        tool_context_for: &(impl Fn(&str, Option<ToolEventSender>) -> ToolContext + Send + Sync),
        store: &ResponseStore,
        request_context: &RequestContext,
        tx: &mpsc::Sender<ResponseStreamEvent>,
    ) -> Result<()> {
        use crate::orchestrator::internal::*;

        let response_id = format!("resp_{}", Uuid::new_v4().simple());
        let created_at = jiff::Timestamp::now().as_second();

        let (mut messages, mut input_items) = self.build_initial_messages(request, store)?;
        let unified_tools = build_unified_tools(request, tool_registry);
        let tool_choice = request.tool_choice.as_ref().map(convert_tool_choice);

        let deadline = tokio::time::Instant::now() + self.config().request_timeout;
        let mut output: Vec<OutputItem> = Vec::new();
        let mut pending_annotations = Vec::new();
        let mut turn_count = 0usize;

        if tx
            .send(ResponseStreamEvent::Created(partial_response(request, &response_id, created_at, &output)))
            .await
            .is_err()
        {
            return Ok(());
        }

        loop {
            if turn_count >= self.config().max_turns {
                let usage = estimate_usage(&input_items);
                let response = finalize_response(
                    request,
                    response_id,
                    created_at,
                    output,
                    crate::types::ResponseStatus::Incomplete,
                    Some(crate::types::IncompleteDetails { reason: "max_turns".to_string() }),
                    None,
                    usage,
                );
                persist_if_requested(request, store, &response, input_items);
                let _ = tx.send(ResponseStreamEvent::Incomplete(response)).await;
                return Ok(());
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(ResponseError::Timeout);
            }

            let unified_request = build_unified_request(request, &messages, &unified_tools, &tool_choice, true);

            let mut chunk_stream = tokio::time::timeout(remaining, self.completion_client().complete_stream(unified_request, request_context))
                .await
                .map_err(|_| ResponseError::Timeout)?
                .map_err(ResponseError::Upstream)?;

            let mut assembler = ChunkAssembler::new();
            let message_item_id = format!("msg_{}", Uuid::new_v4().simple());
            let mut tool_item_ids: BTreeMap<usize, String> = BTreeMap::new();
            let mut sent_anything = false;

            while let Some(chunk) = chunk_stream.next().await {
                let chunk = chunk.map_err(ResponseError::Upstream)?;

                for delta in assembler.apply(chunk) {
                    let event = match delta {
                        ChunkDelta::Text(text) => {
                            sent_anything = true;
                            ResponseStreamEvent::OutputTextDelta { item_id: message_item_id.clone(), delta: text }
                        }
                        ChunkDelta::ToolCallArguments { index, delta } => {
                            let item_id = tool_item_ids.entry(index).or_insert_with(|| format!("fc_{}", Uuid::new_v4().simple())).clone();
                            ResponseStreamEvent::FunctionCallArgumentsDelta { item_id, delta }
                        }
                    };

                    if tx.send(event).await.is_err() {
                        return Ok(());
                    }
                }
            }

            turn_count += 1;
            let finish_reason = assembler.finish_reason();

            if matches!(finish_reason, UnifiedFinishReason::ContentFilter) {
                let usage = estimate_usage(&input_items);
                let response = finalize_response(
                    request,
                    response_id,
                    created_at,
                    output,
                    crate::types::ResponseStatus::Failed,
                    None,
                    Some(crate::types::ResponseErrorDetail {
                        code: "content_filter".to_string(),
                        message: "the model's output was withheld by a content filter".to_string(),
                    }),
                    usage,
                );
                persist_if_requested(request, store, &response, input_items);
                let _ = tx.send(ResponseStreamEvent::Failed(response)).await;
                return Ok(());
            }

            let (text, tool_calls) = assembler.into_parts();
            let _ = sent_anything;

            if !text.is_empty() {
                let item = OutputItem::Message {
                    id: message_item_id.clone(),
                    role: "assistant".to_string(),
                    content: vec![crate::types::OutputContentPart::OutputText { text: text.clone(), annotations: std::mem::take(&mut pending_annotations) }],
                    status: crate::types::ItemStatus::Completed,
                };
                if tx.send(ResponseStreamEvent::OutputItemDone(item.clone())).await.is_err() {
                    return Ok(());
                }
                output.push(item);
            }

            messages.push(assistant_message(&text, &tool_calls));

            if tool_calls.is_empty() {
                let status = if matches!(finish_reason, UnifiedFinishReason::Length) {
                    crate::types::ResponseStatus::Incomplete
                } else {
                    crate::types::ResponseStatus::Completed
                };
                let incomplete_details = matches!(finish_reason, UnifiedFinishReason::Length)
                    .then(|| crate::types::IncompleteDetails { reason: "max_output_tokens".to_string() });

                let usage = estimate_usage(&input_items);
                let response = finalize_response(request, response_id, created_at, output, status, incomplete_details, None, usage);
                persist_if_requested(request, store, &response, input_items);

                let event = if status == crate::types::ResponseStatus::Completed {
                    ResponseStreamEvent::Completed(response)
                } else {
                    ResponseStreamEvent::Incomplete(response)
                };
                let _ = tx.send(event).await;
                return Ok(());
            }

            for call in &tool_calls {
                let item = OutputItem::FunctionCall {
                    id: format!("fc_{}", Uuid::new_v4().simple()),
                    call_id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments: arguments_to_string(&call.function.arguments),
                    status: crate::types::ItemStatus::Completed,
                };
                if tx.send(ResponseStreamEvent::OutputItemDone(item.clone())).await.is_err() {
                    return Ok(());
                }
                input_items.push(crate::store::StoredInputItem {
                    id: format!("input_{}", Uuid::new_v4().simple()),
                    item: crate::types::InputItem::FunctionCall { call_id: call.id.clone(), name: call.function.name.clone(), arguments: arguments_to_string(&call.function.arguments) },
                });
                output.push(item);
            }

            let (event_tx, mut event_rx) = mpsc::unbounded_channel();
            let forward_tx = tx.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(event) = event_rx.recv().await {
                    let mapped = match event {
                        ToolEvent::Started { call_id, name } => Some(ResponseStreamEvent::ToolCallStarted { call_id, name }),
                        ToolEvent::Completed { call_id, .. } => Some(ResponseStreamEvent::ToolCallCompleted { call_id }),
                        ToolEvent::Progress { .. } => None,
                    };
                    if let Some(event) = mapped {
                        if forward_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                }
            });

            let tool_timeout = self.config().tool_timeout;
            let executions = tool_calls.iter().map(|call| {
                let name = call.function.name.clone();
                let args = arguments_to_string(&call.function.arguments);
                let call_id = call.id.clone();
                let ctx = tool_context_for(&call_id, Some(event_tx.clone()));

                async move {
                    let outcome = tokio::time::timeout(tool_timeout, tool_registry.execute(&name, &args, &ctx)).await;
                    (call_id, name, outcome)
                }
            });

            let mut results = futures::future::join_all(executions).await;
            drop(event_tx);
            let _ = forwarder.await;
            results.sort_by(|a, b| a.0.cmp(&b.0));

            for (call_id, name, outcome) in results {
                let (output_text, new_annotations, fatal_error) = collect_outcome(name, outcome);

                if let Some(message) = fatal_error {
                    let usage = estimate_usage(&input_items);
                    let response = finalize_response(
                        request,
                        response_id,
                        created_at,
                        output,
                        crate::types::ResponseStatus::Failed,
                        None,
                        Some(crate::types::ResponseErrorDetail { code: "tool_error".to_string(), message }),
                        usage,
                    );
                    persist_if_requested(request, store, &response, input_items);
                    let _ = tx.send(ResponseStreamEvent::Failed(response)).await;
                    return Ok(());
                }

                pending_annotations.extend(new_annotations);

                let item = OutputItem::FunctionCallOutput {
                    id: format!("fco_{}", Uuid::new_v4().simple()),
                    call_id: call_id.clone(),
                    output: output_text.clone(),
                    status: crate::types::ItemStatus::Completed,
                };
                if tx.send(ResponseStreamEvent::OutputItemDone(item.clone())).await.is_err() {
                    return Ok(());
                }
                input_items.push(crate::store::StoredInputItem {
                    id: format!("input_{}", Uuid::new_v4().simple()),
                    item: crate::types::InputItem::FunctionCallOutput { call_id: call_id.clone(), output: output_text.clone() },
                });
                output.push(item);

                messages.push(tool_result_message(&call_id, &output_text));
            }
        }
    }
}
