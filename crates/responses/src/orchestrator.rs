//! Response Orchestrator: the multi-turn loop that drives a [`ResponseRequest`] to a finished
//! [`Response`], dispatching tool calls through a [`ToolRegistry`] between turns with the
//! upstream model until it stops asking for tools or a termination condition fires.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use llm::client::{
    CompletionClient, RequestContext, UnifiedArguments, UnifiedChoice, UnifiedContent, UnifiedContentContainer, UnifiedFinishReason, UnifiedFunction,
    UnifiedFunctionCall, UnifiedMessage, UnifiedMetadata, UnifiedRequest, UnifiedRole, UnifiedTool, UnifiedToolCall, UnifiedToolChoice, UnifiedToolChoiceMode,
};
use tools::{ToolContext, ToolDefinition, ToolRegistry};
use uuid::Uuid;

use crate::error::{Result, ResponseError};
use crate::store::{ResponseRecord, ResponseStore, StoredInputItem};
use crate::types::{
    Annotation, IncompleteDetails, InputContent, InputItem, ItemStatus, OutputContentPart, OutputItem, RequestTool, Response, ResponseErrorDetail,
    ResponseInput, ResponseRequest, ResponseStatus, ResponseUsage, ToolChoice, ToolChoiceMode,
};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Hard cap on model round-trips within one response. The spec names this "~10"; this build
    /// fixes it at 10.
    pub max_turns: usize,
    /// Per-request deadline, counted from the first turn. Each upstream call and tool execution
    /// suspends against whatever's left of it.
    pub request_timeout: Duration,
    /// Independent timeout for a single tool execution, so one slow tool can't silently consume
    /// the whole request deadline before the orchestrator notices.
    pub tool_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            request_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(60),
        }
    }
}

pub struct ResponseOrchestrator {
    completion_client: Arc<CompletionClient>,
    config: OrchestratorConfig,
}

impl ResponseOrchestrator {
    pub fn new(completion_client: Arc<CompletionClient>) -> Self {
        Self {
            completion_client,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub(crate) fn completion_client(&self) -> &CompletionClient {
        &self.completion_client
    }

    pub async fn run(
        &self,
        request: ResponseRequest,
        tool_registry: &ToolRegistry,
        tool_context_for: impl Fn(&str) -> ToolContext,
        store: &ResponseStore,
        request_context: &RequestContext,
    ) -> Result<Response> {
        let response_id = format!("resp_{}", Uuid::new_v4().simple());
        let created_at = jiff::Timestamp::now().as_second();

        let (mut messages, mut input_items) = self.build_initial_messages(&request, store)?;
        let unified_tools = build_unified_tools(&request, tool_registry);
        let tool_choice = request.tool_choice.as_ref().map(convert_tool_choice);

        let deadline = tokio::time::Instant::now() + self.config.request_timeout;
        let mut output: Vec<OutputItem> = Vec::new();
        let mut pending_annotations: Vec<Annotation> = Vec::new();
        let mut turn_count = 0usize;

        loop {
            if turn_count >= self.config.max_turns {
                return self.finalize(
                    &request,
                    response_id,
                    created_at,
                    output,
                    ResponseStatus::Incomplete,
                    Some(IncompleteDetails { reason: "max_turns".to_string() }),
                    None,
                    store,
                    input_items,
                );
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(ResponseError::Timeout);
            }

            let unified_request = build_unified_request(&request, &messages, &unified_tools, &tool_choice, false);

            let completion = tokio::time::timeout(remaining, self.completion_client.complete(unified_request, request_context))
                .await
                .map_err(|_| ResponseError::Timeout)?
                .map_err(ResponseError::Upstream)?;

            let Some(choice) = completion.choices.into_iter().next() else {
                return self.finalize(
                    &request,
                    response_id,
                    created_at,
                    output,
                    ResponseStatus::Failed,
                    None,
                    Some(ResponseErrorDetail { code: "server_error".to_string(), message: "upstream returned no choices".to_string() }),
                    store,
                    input_items,
                );
            };

            turn_count += 1;

            if matches!(choice.finish_reason, UnifiedFinishReason::ContentFilter) {
                return self.finalize(
                    &request,
                    response_id,
                    created_at,
                    output,
                    ResponseStatus::Failed,
                    None,
                    Some(ResponseErrorDetail { code: "content_filter".to_string(), message: "the model's output was withheld by a content filter".to_string() }),
                    store,
                    input_items,
                );
            }

            let tool_calls = choice.message.tool_calls.clone().unwrap_or_default();
            let text = text_of(&choice);

            if !text.is_empty() {
                output.push(OutputItem::Message {
                    id: format!("msg_{}", Uuid::new_v4().simple()),
                    role: "assistant".to_string(),
                    content: vec![OutputContentPart::OutputText { text, annotations: std::mem::take(&mut pending_annotations) }],
                    status: ItemStatus::Completed,
                });
            }

            messages.push(UnifiedMessage {
                role: UnifiedRole::Assistant,
                content: choice.message.content.clone(),
                tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls.clone()) },
                tool_call_id: None,
            });

            if tool_calls.is_empty() {
                if matches!(choice.finish_reason, UnifiedFinishReason::Length) {
                    return self.finalize(
                        &request,
                        response_id,
                        created_at,
                        output,
                        ResponseStatus::Incomplete,
                        Some(IncompleteDetails { reason: "max_output_tokens".to_string() }),
                        None,
                        store,
                        input_items,
                    );
                }

                return self.finalize(&request, response_id, created_at, output, ResponseStatus::Completed, None, None, store, input_items);
            }

            // (Reasoning?), (Message?) were appended above; FunctionCall items follow, in the
            // order the upstream choice listed its tool calls.
            for call in &tool_calls {
                output.push(OutputItem::FunctionCall {
                    id: format!("fc_{}", Uuid::new_v4().simple()),
                    call_id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments: arguments_to_string(&call.function.arguments),
                    status: ItemStatus::Completed,
                });

                input_items.push(StoredInputItem {
                    id: format!("input_{}", Uuid::new_v4().simple()),
                    item: InputItem::FunctionCall {
                        call_id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments: arguments_to_string(&call.function.arguments),
                    },
                });
            }

            let tool_timeout = self.config.tool_timeout;
            let executions = tool_calls.iter().map(|call| {
                let name = call.function.name.clone();
                let args = arguments_to_string(&call.function.arguments);
                let call_id = call.id.clone();
                let ctx = tool_context_for(&call_id);

                async move {
                    let outcome = tokio::time::timeout(tool_timeout, tool_registry.execute(&name, &args, &ctx)).await;
                    (call_id, name, outcome)
                }
            });

            let mut results = join_all(executions).await;
            results.sort_by(|a, b| a.0.cmp(&b.0));

            for (call_id, name, outcome) in results {
                let (output_text, new_annotations, fatal_error) = collect_outcome(name, outcome);

                if let Some(message) = fatal_error {
                    return self.finalize(
                        &request,
                        response_id,
                        created_at,
                        output,
                        ResponseStatus::Failed,
                        None,
                        Some(ResponseErrorDetail { code: "tool_error".to_string(), message }),
                        store,
                        input_items,
                    );
                }

                pending_annotations.extend(new_annotations);

                output.push(OutputItem::FunctionCallOutput {
                    id: format!("fco_{}", Uuid::new_v4().simple()),
                    call_id: call_id.clone(),
                    output: output_text.clone(),
                    status: ItemStatus::Completed,
                });

                input_items.push(StoredInputItem {
                    id: format!("input_{}", Uuid::new_v4().simple()),
                    item: InputItem::FunctionCallOutput { call_id: call_id.clone(), output: output_text.clone() },
                });

                messages.push(tool_result_message(&call_id, &output_text));
            }
        }
    }

    pub(crate) fn build_initial_messages(&self, request: &ResponseRequest, store: &ResponseStore) -> Result<(Vec<UnifiedMessage>, Vec<StoredInputItem>)> {
        let mut messages = Vec::new();
        let mut input_items = Vec::new();

        if let Some(previous_id) = &request.previous_response_id {
            let previous = store.get(previous_id)?;
            input_items.extend(previous.input_items.clone());
            messages.extend(response_record_to_messages(&previous));
        }

        match &request.input {
            ResponseInput::Text(text) => {
                input_items.push(StoredInputItem {
                    id: format!("input_{}", Uuid::new_v4().simple()),
                    item: InputItem::Message { role: "user".to_string(), content: InputContent::Text(text.clone()) },
                });
                messages.push(UnifiedMessage {
                    role: UnifiedRole::User,
                    content: UnifiedContentContainer::Text(text.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
            ResponseInput::Items(items) => {
                for item in items {
                    input_items.push(StoredInputItem { id: format!("input_{}", Uuid::new_v4().simple()), item: item.clone() });
                    messages.push(input_item_to_message(item));
                }
            }
        }

        Ok((messages, input_items))
    }

    #[allow(clippy::too_many_arguments)]
    fn finalize(
        &self,
        request: &ResponseRequest,
        response_id: String,
        created_at: i64,
        output: Vec<OutputItem>,
        status: ResponseStatus,
        incomplete_details: Option<IncompleteDetails>,
        error: Option<ResponseErrorDetail>,
        store: &ResponseStore,
        input_items: Vec<StoredInputItem>,
    ) -> Result<Response> {
        let usage = estimate_usage(&input_items);
        let response = finalize_response(request, response_id, created_at, output, status, incomplete_details, error, usage);
        persist_if_requested(request, store, &response, input_items);
        Ok(response)
    }
}

#[allow(clippy::too_many_arguments)]
fn finalize_response(
    request: &ResponseRequest,
    response_id: String,
    created_at: i64,
    output: Vec<OutputItem>,
    status: ResponseStatus,
    incomplete_details: Option<IncompleteDetails>,
    error: Option<ResponseErrorDetail>,
    usage: ResponseUsage,
) -> Response {
    Response {
        id: response_id,
        object: "response".to_string(),
        created_at,
        status,
        model: request.model.clone(),
        output,
        usage: Some(usage),
        previous_response_id: request.previous_response_id.clone(),
        incomplete_details,
        error,
        metadata: request.metadata.clone(),
        store: request.store,
    }
}

/// The `response.created` event's payload: same shape as the final response, but `in_progress`
/// and with whatever output has been produced so far (usually none, at the very start of a run).
fn partial_response(request: &ResponseRequest, response_id: &str, created_at: i64, output: &[OutputItem]) -> Response {
    Response {
        id: response_id.to_string(),
        object: "response".to_string(),
        created_at,
        status: ResponseStatus::InProgress,
        model: request.model.clone(),
        output: output.to_vec(),
        usage: None,
        previous_response_id: request.previous_response_id.clone(),
        incomplete_details: None,
        error: None,
        metadata: request.metadata.clone(),
        store: request.store,
    }
}

fn persist_if_requested(request: &ResponseRequest, store: &ResponseStore, response: &Response, input_items: Vec<StoredInputItem>) {
    if request.store {
        store.put(ResponseRecord { response: response.clone(), input_items });
    }
}

fn build_unified_request(
    request: &ResponseRequest,
    messages: &[UnifiedMessage],
    tools: &[UnifiedTool],
    tool_choice: &Option<UnifiedToolChoice>,
    stream: bool,
) -> UnifiedRequest {
    UnifiedRequest {
        model: request.model.clone(),
        messages: messages.to_vec(),
        system: request.instructions.clone(),
        max_tokens: request.max_output_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        top_k: None,
        frequency_penalty: None,
        presence_penalty: None,
        stop_sequences: None,
        stream: Some(stream),
        tools: if tools.is_empty() { None } else { Some(tools.to_vec()) },
        tool_choice: tool_choice.clone(),
        parallel_tool_calls: Some(request.parallel_tool_calls),
        metadata: request.metadata.get("user_id").map(|user_id| UnifiedMetadata { user_id: Some(user_id.clone()) }),
    }
}

fn assistant_message(text: &str, tool_calls: &[UnifiedToolCall]) -> UnifiedMessage {
    UnifiedMessage {
        role: UnifiedRole::Assistant,
        content: UnifiedContentContainer::Text(text.to_string()),
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls.to_vec()) },
        tool_call_id: None,
    }
}

fn tool_result_message(call_id: &str, output: &str) -> UnifiedMessage {
    UnifiedMessage {
        role: UnifiedRole::Tool,
        content: UnifiedContentContainer::Text(output.to_string()),
        tool_calls: None,
        tool_call_id: Some(call_id.to_string()),
    }
}

/// Resolves one tool execution's timeout/error/success outcome into the `FunctionCallOutput`
/// text, any annotations it carried, and — if the failure was fatal — the message that should
/// fail the whole response instead of continuing the loop.
fn collect_outcome(
    name: String,
    outcome: std::result::Result<tools::Result<serde_json::Value>, tokio::time::error::Elapsed>,
) -> (String, Vec<Annotation>, Option<String>) {
    match outcome {
        Err(_) => (serde_json::json!({"error": format!("tool '{name}' timed out")}).to_string(), Vec::new(), None),
        Ok(Err(e)) => {
            if e.is_fatal() {
                (String::new(), Vec::new(), Some(e.to_string()))
            } else {
                (serde_json::json!({"error": e.to_string()}).to_string(), Vec::new(), None)
            }
        }
        Ok(Ok(value)) => {
            let annotations = extract_annotations(&value);
            (value.to_string(), annotations, None)
        }
    }
}

/// Re-exports the helpers [`stream`](crate::stream) needs to stay in lockstep with [`run`](ResponseOrchestrator::run)
/// without duplicating its turn-assembly logic.
pub(crate) mod internal {
    pub(crate) use super::{
        arguments_to_string, assistant_message, build_unified_request, build_unified_tools, collect_outcome, convert_tool_choice, estimate_usage,
        finalize_response, partial_response, persist_if_requested, tool_result_message,
    };
}

fn text_of(choice: &UnifiedChoice) -> String {
    match &choice.message.content {
        UnifiedContentContainer::Text(text) => text.clone(),
        UnifiedContentContainer::Blocks(blocks) => blocks.iter().filter_map(|b| b.as_text()).collect::<Vec<_>>().join(""),
    }
}

fn arguments_to_string(arguments: &UnifiedArguments) -> String {
    match arguments {
        UnifiedArguments::String(s) => s.clone(),
        UnifiedArguments::Value(v) => v.to_string(),
    }
}

fn extract_annotations(tool_output: &serde_json::Value) -> Vec<Annotation> {
    tool_output
        .get("data")
        .and_then(serde_json::Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("annotations").and_then(serde_json::Value::as_array))
        .flatten()
        .filter_map(|a| {
            Some(Annotation {
                kind: a.get("type")?.as_str()?.to_string(),
                index: a.get("index")?.as_u64()? as usize,
                file_id: a.get("file_id")?.as_str()?.to_string(),
                filename: a.get("filename")?.as_str().unwrap_or_default().to_string(),
            })
        })
        .collect()
}

fn estimate_usage(input_items: &[StoredInputItem]) -> ResponseUsage {
    // A precise token count needs the provider's own tokenizer per model; this build reports a
    // coarse word-count estimate so `usage` is populated without depending on one.
    let input_tokens: u32 = input_items.iter().map(|item| word_count(&item.item)).sum();
    ResponseUsage { input_tokens, output_tokens: 0, total_tokens: input_tokens }
}

fn word_count(item: &InputItem) -> u32 {
    match item {
        InputItem::Message { content: InputContent::Text(text), .. } => text.split_whitespace().count() as u32,
        InputItem::Message { content: InputContent::Parts(parts), .. } => parts
            .iter()
            .map(|p| match p {
                crate::types::InputContentPart::InputText { text } => text.split_whitespace().count() as u32,
                crate::types::InputContentPart::InputImage { .. } => 0,
            })
            .sum(),
        InputItem::FunctionCall { arguments, .. } | InputItem::FunctionCallOutput { output: arguments, .. } => arguments.split_whitespace().count() as u32,
    }
}

fn input_item_to_message(item: &InputItem) -> UnifiedMessage {
    match item {
        InputItem::Message { role, content } => UnifiedMessage {
            role: match role.as_str() {
                "system" => UnifiedRole::System,
                "assistant" => UnifiedRole::Assistant,
                _ => UnifiedRole::User,
            },
            content: match content {
                InputContent::Text(text) => UnifiedContentContainer::Text(text.clone()),
                InputContent::Parts(parts) => UnifiedContentContainer::Blocks(
                    parts
                        .iter()
                        .map(|p| match p {
                            crate::types::InputContentPart::InputText { text } => UnifiedContent::Text { text: text.clone() },
                            crate::types::InputContentPart::InputImage { image_url } => UnifiedContent::Image {
                                source: llm::client::UnifiedImageSource::Url { url: image_url.clone() },
                            },
                        })
                        .collect(),
                ),
            },
            tool_calls: None,
            tool_call_id: None,
        },
        InputItem::FunctionCall { call_id, name, arguments } => UnifiedMessage {
            role: UnifiedRole::Assistant,
            content: UnifiedContentContainer::Text(String::new()),
            tool_calls: Some(vec![UnifiedToolCall {
                id: call_id.clone(),
                function: UnifiedFunctionCall { name: name.clone(), arguments: UnifiedArguments::String(arguments.clone()) },
            }]),
            tool_call_id: None,
        },
        InputItem::FunctionCallOutput { call_id, output } => UnifiedMessage {
            role: UnifiedRole::Tool,
            content: UnifiedContentContainer::Text(output.clone()),
            tool_calls: None,
            tool_call_id: Some(call_id.clone()),
        },
    }
}

fn response_record_to_messages(record: &ResponseRecord) -> Vec<UnifiedMessage> {
    let mut messages: Vec<UnifiedMessage> = record.input_items.iter().map(|stored| input_item_to_message(&stored.item)).collect();

    for item in &record.response.output {
        match item {
            OutputItem::Message { content, .. } => {
                let text = content
                    .iter()
                    .map(|p| match p {
                        OutputContentPart::OutputText { text, .. } => text.as_str(),
                    })
                    .collect::<Vec<_>>()
                    .join("");

                messages.push(UnifiedMessage {
                    role: UnifiedRole::Assistant,
                    content: UnifiedContentContainer::Text(text),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
            OutputItem::FunctionCall { call_id, name, arguments, .. } => {
                messages.push(UnifiedMessage {
                    role: UnifiedRole::Assistant,
                    content: UnifiedContentContainer::Text(String::new()),
                    tool_calls: Some(vec![UnifiedToolCall {
                        id: call_id.clone(),
                        function: UnifiedFunctionCall { name: name.clone(), arguments: UnifiedArguments::String(arguments.clone()) },
                    }]),
                    tool_call_id: None,
                });
            }
            OutputItem::FunctionCallOutput { call_id, output, .. } => {
                messages.push(UnifiedMessage {
                    role: UnifiedRole::Tool,
                    content: UnifiedContentContainer::Text(output.clone()),
                    tool_calls: None,
                    tool_call_id: Some(call_id.clone()),
                });
            }
            OutputItem::Reasoning { .. } => {}
        }
    }

    messages
}

/// Builds the tool list advertised to the model for this request only, from `request.tools` —
/// the registry may know about more tools than that (every native tool is always registered so
/// it can be *executed* if called), but only the ones the request actually opted into should be
/// offered to the model.
fn build_unified_tools(request: &ResponseRequest, registry: &ToolRegistry) -> Vec<UnifiedTool> {
    let mut tools = Vec::new();

    for tool in &request.tools {
        match tool {
            RequestTool::FileSearch { .. } => push_native(&mut tools, registry, "file_search"),
            RequestTool::AgenticSearch { .. } => push_native(&mut tools, registry, "agentic_search"),
            RequestTool::ImageGeneration => push_native(&mut tools, registry, "image_generation"),
            RequestTool::Python | RequestTool::CodeInterpreter => push_native(&mut tools, registry, "python"),
            RequestTool::Think => push_native(&mut tools, registry, "think"),
            RequestTool::Mcp { server_label, allowed_tools } => {
                for def in registry.definitions() {
                    if let ToolDefinition::Mcp(mcp_def) = def {
                        let allowed = allowed_tools.as_ref().is_none_or(|names| names.contains(&mcp_def.remote_name));
                        if &mcp_def.server_label == server_label && allowed {
                            tools.push(unified_tool_from_definition(def));
                        }
                    }
                }
            }
            RequestTool::Function { name, description, parameters, strict } => {
                tools.push(UnifiedTool {
                    function: UnifiedFunction {
                        name: name.clone(),
                        description: Some(description.clone()),
                        parameters: Box::new(llm::client::JsonSchema(parameters.clone())),
                        strict: Some(*strict),
                    },
                });
            }
        }
    }

    tools
}

fn push_native(tools: &mut Vec<UnifiedTool>, registry: &ToolRegistry, name: &str) {
    if let Some(def) = registry.get_definition(name) {
        tools.push(unified_tool_from_definition(def));
    }
}

fn unified_tool_from_definition(def: &ToolDefinition) -> UnifiedTool {
    UnifiedTool {
        function: UnifiedFunction {
            name: def.resolved_name().to_string(),
            description: Some(def.description().to_string()),
            parameters: Box::new(llm::client::JsonSchema(def.parameters().clone())),
            strict: None,
        },
    }
}

fn convert_tool_choice(choice: &ToolChoice) -> UnifiedToolChoice {
    match choice {
        ToolChoice::Mode(ToolChoiceMode::None) => UnifiedToolChoice::Mode(UnifiedToolChoiceMode::None),
        ToolChoice::Mode(ToolChoiceMode::Auto) => UnifiedToolChoice::Mode(UnifiedToolChoiceMode::Auto),
        ToolChoice::Mode(ToolChoiceMode::Required) => UnifiedToolChoice::Mode(UnifiedToolChoiceMode::Required),
        ToolChoice::Specific { name, .. } => UnifiedToolChoice::Specific {
            function: llm::client::UnifiedFunctionChoice { name: name.clone() },
        },
    }
}
