//! The OpenAI provider speaks the native OpenAI wire format, so converting a [`UnifiedRequest`]
//! into an outbound request body is just the same `to_openai` conversion used for the inbound
//! protocol's own responses.

pub(crate) type OpenAIRequest = crate::messages::openai::ChatCompletionRequest;
