//! Input conversion modules for OpenAI provider.
//!
//! OpenAI provider uses the native OpenAI format, so no conversion is needed.
//! This module provides passthrough implementations.

pub(crate) mod openai;

pub(super) use openai::OpenAIRequest;
