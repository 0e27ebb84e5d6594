//! Built-in native tools: `file_search`, `agentic_search`, `image_generation`, `python`, `think`.

use std::collections::HashSet;

use llm::client::{RequestContext, UnifiedContentContainer, UnifiedMessage, UnifiedRequest, UnifiedRole};
use serde_json::{Value, json};

use crate::context::{FileSearchRequest, ToolContext};
use crate::error::{Result, ToolError};

fn store_ids(args: &Value, ctx: &ToolContext) -> Vec<String> {
    args.get("vector_store_ids")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|ids| !ids.is_empty())
        .unwrap_or_else(|| ctx.vector_store_ids.clone())
}

pub async fn file_search(args: &Value, ctx: &ToolContext) -> Result<Value> {
    let backend = ctx
        .search_backend
        .clone()
        .ok_or_else(|| ToolError::Unavailable("file_search".to_string(), "no vector search backend configured".to_string()))?;

    let query = args
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments("file_search".to_string(), "missing 'query'".to_string()))?
        .to_string();

    let vector_store_ids = store_ids(args, ctx);

    if vector_store_ids.is_empty() {
        return Err(ToolError::InvalidArguments(
            "file_search".to_string(),
            "no vector_store_ids given and none configured on the request".to_string(),
        ));
    }

    let request = FileSearchRequest {
        query: query.clone(),
        vector_store_ids,
        max_num_results: args.get("max_num_results").and_then(Value::as_u64).unwrap_or(10) as usize,
        filters: args.get("filters").cloned(),
        ranking: args.get("ranking_options").cloned(),
    };

    let mut document = backend
        .search(request)
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            name: "file_search".to_string(),
            message: e.to_string(),
            fatal: false,
        })?;

    if let Some(obj) = document.as_object_mut() {
        obj.entry("search_query").or_insert_with(|| Value::String(query));
    }

    Ok(document)
}

/// Iterative loop over `file_search`, refining the query with a short model dialogue between
/// rounds until `max_iterations` is hit, the result budget is filled, or a round returns nothing
/// new.
pub async fn agentic_search(args: &Value, ctx: &ToolContext) -> Result<Value> {
    let backend = ctx.search_backend.clone().ok_or_else(|| {
        ToolError::Unavailable("agentic_search".to_string(), "no vector search backend configured".to_string())
    })?;

    let original_query = args
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments("agentic_search".to_string(), "missing 'query'".to_string()))?
        .to_string();

    let vector_store_ids = store_ids(args, ctx);
    if vector_store_ids.is_empty() {
        return Err(ToolError::InvalidArguments(
            "agentic_search".to_string(),
            "no vector_store_ids given and none configured on the request".to_string(),
        ));
    }

    let max_iterations = args.get("max_iterations").and_then(Value::as_u64).unwrap_or(3).max(1) as usize;
    let max_num_results = args.get("max_num_results").and_then(Value::as_u64).unwrap_or(10) as usize;

    let mut seen_chunk_ids: HashSet<String> = HashSet::new();
    let mut accumulated: Vec<Value> = Vec::new();
    let mut reasoning_log: Vec<String> = Vec::new();
    let mut current_query = original_query.clone();

    for iteration in 0..max_iterations {
        ctx.emit_progress(format!("agentic_search round {iteration}: \"{current_query}\""));

        let document = backend
            .search(FileSearchRequest {
                query: current_query.clone(),
                vector_store_ids: vector_store_ids.clone(),
                max_num_results,
                filters: args.get("filters").cloned(),
                ranking: args.get("ranking_options").cloned(),
            })
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: "agentic_search".to_string(),
                message: e.to_string(),
                fatal: false,
            })?;

        let mut new_count = 0usize;

        for item in document.get("data").and_then(Value::as_array).into_iter().flatten() {
            let chunk_key = chunk_identity(item);

            if seen_chunk_ids.insert(chunk_key) {
                accumulated.push(item.clone());
                new_count += 1;
            }
        }

        reasoning_log.push(format!(
            "round {iteration}: query=\"{current_query}\" found {new_count} new result(s), {} total",
            accumulated.len()
        ));

        if accumulated.len() >= max_num_results || new_count == 0 {
            break;
        }

        let Some(refined) = next_query(ctx, &original_query, &current_query, accumulated.len()).await else {
            break;
        };

        if refined.eq_ignore_ascii_case(&current_query) {
            break;
        }

        current_query = refined;
    }

    accumulated.truncate(max_num_results);

    Ok(json!({
        "data": accumulated,
        "search_query": original_query,
        "iterations": reasoning_log,
    }))
}

fn chunk_identity(item: &Value) -> String {
    let file_id = item.get("file_id").and_then(Value::as_str).unwrap_or("");
    let index = item
        .get("annotations")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(|a| a.get("index"))
        .map(ToString::to_string)
        .unwrap_or_default();

    format!("{file_id}#{index}")
}

/// Asks the configured model for the next search query, or `None` to stop refining (either the
/// model said `DONE`, refused to answer, or no completion client is wired up for this request).
async fn next_query(ctx: &ToolContext, original_query: &str, last_query: &str, found_so_far: usize) -> Option<String> {
    let client = ctx.completion_client.as_ref()?;

    let prompt = format!(
        "You are refining a search query to find additional relevant results.\n\
         Original question: {original_query}\n\
         Last query tried: {last_query}\n\
         Relevant results found so far: {found_so_far}\n\
         Respond with ONLY the next search query to try, or the single word DONE if further \
         searching is unlikely to help."
    );

    let request = UnifiedRequest {
        model: ctx.model.clone(),
        messages: vec![UnifiedMessage {
            role: UnifiedRole::User,
            content: UnifiedContentContainer::Text(prompt),
            tool_calls: None,
            tool_call_id: None,
        }],
        system: None,
        max_tokens: Some(64),
        temperature: Some(0.0),
        top_p: None,
        top_k: None,
        frequency_penalty: None,
        presence_penalty: None,
        stop_sequences: None,
        stream: Some(false),
        tools: None,
        tool_choice: None,
        parallel_tool_calls: None,
        metadata: None,
    };

    let response = client.complete(request, &RequestContext::default()).await.ok()?;
    let choice = response.choices.into_iter().next()?;

    let text = match choice.message.content {
        UnifiedContentContainer::Text(text) => text,
        UnifiedContentContainer::Blocks(blocks) => blocks.iter().filter_map(|b| b.as_text()).collect::<Vec<_>>().join(""),
    };

    let trimmed = text.trim();

    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("done") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub async fn image_generation(args: &Value, ctx: &ToolContext) -> Result<Value> {
    let prompt = args
        .get("prompt")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments("image_generation".to_string(), "missing 'prompt'".to_string()))?;

    let base_url = ctx.image_generation.base_url.as_ref().ok_or_else(|| {
        ToolError::Unavailable(
            "image_generation".to_string(),
            "OPEN_RESPONSES_IMAGE_GENERATION_BASE_URL is not configured".to_string(),
        )
    })?;

    let client = reqwest::Client::new();
    let mut request = client.post(format!("{base_url}/images/generations")).json(&json!({
        "prompt": prompt,
        "size": args.get("size").and_then(Value::as_str).unwrap_or("1024x1024"),
    }));

    if let Some(key) = &ctx.image_generation.api_key {
        use secrecy::ExposeSecret;
        request = request.bearer_auth(key.expose_secret());
    }

    let response = request.send().await.map_err(|e| ToolError::ExecutionFailed {
        name: "image_generation".to_string(),
        message: e.to_string(),
        fatal: false,
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        return Err(ToolError::ExecutionFailed {
            name: "image_generation".to_string(),
            message: format!("image generation endpoint returned {status}: {body}"),
            fatal: false,
        });
    }

    response.json::<Value>().await.map_err(|e| ToolError::ExecutionFailed {
        name: "image_generation".to_string(),
        message: e.to_string(),
        fatal: false,
    })
}

/// Sandboxed code execution is treated as an opaque external RPC this build doesn't host; no
/// endpoint is wired up, so every call reports the tool as unavailable rather than pretending to
/// execute anything.
pub async fn python(_args: &Value, _ctx: &ToolContext) -> Result<Value> {
    Err(ToolError::Unavailable(
        "python".to_string(),
        "sandboxed code execution is not configured in this build".to_string(),
    ))
}

pub async fn think(args: &Value, _ctx: &ToolContext) -> Result<Value> {
    let thought = args
        .get("thought")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments("think".to_string(), "missing 'thought'".to_string()))?;

    Ok(Value::String(thought.to_string()))
}
