//! The Responses API: a single `/v1/responses` surface that wraps a (possibly multi-turn, tool-
//! calling) model interaction behind one record, instead of the caller re-sending the whole
//! transcript on every turn the way `/v1/chat/completions` does.
//!
//! [`orchestrator::ResponseOrchestrator`] drives the turn loop against the `llm` crate's
//! [`llm::client::CompletionClient`]; [`store::ResponseStore`] keeps completed responses around
//! for `previous_response_id` threading and the `GET`/`DELETE` endpoints; [`stream`] reassembles a
//! streaming turn's deltas into the same output items the non-streaming path produces.

pub mod error;
pub mod orchestrator;
pub mod store;
pub mod stream;
pub mod types;

pub use error::{ResponseError, Result};
pub use orchestrator::{OrchestratorConfig, ResponseOrchestrator};
pub use store::{ListPage, Order, ResponseRecord, ResponseStore, StoredInputItem};
pub use stream::{ChunkAssembler, ResponseStreamEvent};
pub use types::{
    Annotation, IncompleteDetails, InputContent, InputContentPart, InputItem, ItemStatus, OutputContentPart, OutputItem, RequestTool, Response,
    ResponseErrorDetail, ResponseInput, ResponseRequest, ResponseStatus, ResponseUsage, ToolChoice, ToolChoiceMode,
};

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{InputContentPart as Part, ResponseInput};

    #[test]
    fn response_input_text_round_trips_as_plain_string() {
        let input: ResponseInput = serde_json::from_value(json!("hello")).unwrap();
        assert!(matches!(input, ResponseInput::Text(ref s) if s == "hello"));
    }

    #[test]
    fn response_input_items_round_trip() {
        let input: ResponseInput = serde_json::from_value(json!([
            {"type": "message", "role": "user", "content": "hi"}
        ]))
        .unwrap();

        let ResponseInput::Items(items) = input else { panic!("expected Items") };
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], InputItem::Message { role, .. } if role == "user"));
    }

    #[test]
    fn output_text_concatenates_across_message_items_only() {
        let response = Response {
            id: "resp_1".to_string(),
            object: "response".to_string(),
            created_at: 0,
            status: ResponseStatus::Completed,
            model: "openai@gpt-4o-mini".to_string(),
            output: vec![
                OutputItem::Message {
                    id: "msg_1".to_string(),
                    role: "assistant".to_string(),
                    content: vec![OutputContentPart::OutputText { text: "It's ".to_string(), annotations: vec![] }],
                    status: ItemStatus::Completed,
                },
                OutputItem::FunctionCall {
                    id: "fc_1".to_string(),
                    call_id: "call_1".to_string(),
                    name: "get_time".to_string(),
                    arguments: "{}".to_string(),
                    status: ItemStatus::Completed,
                },
                OutputItem::Message {
                    id: "msg_2".to_string(),
                    role: "assistant".to_string(),
                    content: vec![OutputContentPart::OutputText { text: "10:00Z.".to_string(), annotations: vec![] }],
                    status: ItemStatus::Completed,
                },
            ],
            usage: None,
            previous_response_id: None,
            incomplete_details: None,
            error: None,
            metadata: Default::default(),
            store: true,
        };

        assert_eq!(response.output_text(), "It's 10:00Z.");
    }

    #[test]
    fn input_image_part_deserializes() {
        let part: Part = serde_json::from_value(json!({"type": "input_image", "image_url": "https://example.com/a.png"})).unwrap();
        assert!(matches!(part, Part::InputImage { image_url } if image_url == "https://example.com/a.png"));
    }
}
