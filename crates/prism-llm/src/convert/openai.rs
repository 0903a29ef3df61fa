//! Conversion between canonical types and the `OpenAI` wire format
//!
//! Also used for `OpenAI`-compatible providers such as xAI, which differ only
//! in base URL.

use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiEmbeddingResponse, OpenAiFunction, OpenAiFunctionCall, OpenAiMessage,
    OpenAiRequest, OpenAiResponse, OpenAiStop, OpenAiStreamChoice, OpenAiStreamChunk, OpenAiStreamDelta,
    OpenAiStreamFunctionCall, OpenAiStreamToolCall, OpenAiTool, OpenAiToolCall, OpenAiUsage,
};
use crate::types::{
    ChatRequest, ChatResponse, Choice, ChoiceMessage, EmbeddingData, EmbeddingResponse, EmbeddingUsage, FinishReason,
    FunctionCall, FunctionDefinition, Message, Role, SamplingParams, StreamDelta, StreamEvent, StreamFunctionCall,
    StreamToolCall, ToolCall, ToolChoice, ToolChoiceFunction, ToolChoiceMode, ToolDefinition, Usage,
};

// -- Inbound: OpenAI wire format -> canonical types --

impl From<OpenAiRequest> for ChatRequest {
    fn from(req: OpenAiRequest) -> Self {
        Self {
            model: req.model,
            messages: req.messages.into_iter().map(Into::into).collect(),
            params: SamplingParams {
                temperature: req.temperature,
                top_p: req.top_p,
                max_tokens: req.max_tokens,
                stop: req.stop.map(OpenAiStop::into_vec),
                presence_penalty: req.presence_penalty,
                frequency_penalty: req.frequency_penalty,
            },
            tools: req.tools.map(|tools| tools.into_iter().map(Into::into).collect()),
            tool_choice: req.tool_choice.and_then(|v| parse_openai_tool_choice(&v)),
            user: req.user,
            stream: req.stream.unwrap_or(false),
        }
    }
}

impl From<OpenAiMessage> for Message {
    fn from(msg: OpenAiMessage) -> Self {
        let role = match msg.role.as_str() {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            _ => Role::User,
        };

        let tool_calls = msg.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|tc| ToolCall {
                    id: tc.id,
                    function: FunctionCall {
                        name: tc.function.name,
                        arguments: tc.function.arguments,
                    },
                })
                .collect()
        });

        Self {
            role,
            content: msg.content.unwrap_or_default(),
            name: msg.name,
            tool_calls,
            tool_call_id: msg.tool_call_id,
        }
    }
}

impl From<OpenAiTool> for ToolDefinition {
    fn from(tool: OpenAiTool) -> Self {
        Self {
            tool_type: tool.tool_type,
            function: FunctionDefinition {
                name: tool.function.name,
                description: tool.function.description,
                parameters: tool.function.parameters,
            },
        }
    }
}

/// Parse `OpenAI`'s flexible `tool_choice` field into the canonical type
fn parse_openai_tool_choice(value: &serde_json::Value) -> Option<ToolChoice> {
    match value {
        serde_json::Value::String(s) => match s.as_str() {
            "none" => Some(ToolChoice::Mode(ToolChoiceMode::None)),
            "auto" => Some(ToolChoice::Mode(ToolChoiceMode::Auto)),
            "required" => Some(ToolChoice::Mode(ToolChoiceMode::Required)),
            _ => None,
        },
        serde_json::Value::Object(_) => serde_json::from_value::<ToolChoiceFunction>(value.clone())
            .ok()
            .map(ToolChoice::Function),
        _ => None,
    }
}

// -- Outbound: canonical types -> OpenAI wire format --

impl From<ChatResponse> for OpenAiResponse {
    fn from(resp: ChatResponse) -> Self {
        Self {
            id: resp.id,
            object: resp.object,
            created: resp.created,
            model: resp.model,
            choices: resp.choices.into_iter().map(Into::into).collect(),
            usage: Some(OpenAiUsage {
                prompt_tokens: resp.usage.prompt_tokens,
                completion_tokens: resp.usage.completion_tokens,
                total_tokens: resp.usage.total_tokens,
            }),
        }
    }
}

impl From<Choice> for OpenAiChoice {
    fn from(choice: Choice) -> Self {
        Self {
            index: choice.index,
            message: OpenAiChoiceMessage {
                role: choice.message.role,
                content: choice.message.content,
                tool_calls: choice.message.tool_calls.map(|calls| {
                    calls
                        .into_iter()
                        .map(|tc| OpenAiToolCall {
                            id: tc.id,
                            tool_type: "function".to_owned(),
                            function: OpenAiFunctionCall {
                                name: tc.function.name,
                                arguments: tc.function.arguments,
                            },
                        })
                        .collect()
                }),
            },
            finish_reason: choice.finish_reason.map(|fr| finish_reason_str(fr).to_owned()),
        }
    }
}

/// Wire string for a canonical finish reason
pub fn finish_reason_str(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Stop => "stop",
        FinishReason::Length => "length",
        FinishReason::ToolCalls => "tool_calls",
        FinishReason::ContentFilter => "content_filter",
    }
}

// -- Outbound: canonical request -> OpenAI wire request (sent upstream) --

impl From<&ChatRequest> for OpenAiRequest {
    fn from(req: &ChatRequest) -> Self {
        Self {
            model: req.model.clone(),
            messages: req.messages.iter().map(Into::into).collect(),
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            max_tokens: req.params.max_tokens,
            stop: req.params.stop.clone().map(OpenAiStop::Many),
            frequency_penalty: req.params.frequency_penalty,
            presence_penalty: req.params.presence_penalty,
            stream: if req.stream { Some(true) } else { None },
            stream_options: None,
            tools: req.tools.as_ref().map(|tools| {
                tools
                    .iter()
                    .map(|t| OpenAiTool {
                        tool_type: t.tool_type.clone(),
                        function: OpenAiFunction {
                            name: t.function.name.clone(),
                            description: t.function.description.clone(),
                            parameters: t.function.parameters.clone(),
                        },
                    })
                    .collect()
            }),
            tool_choice: req.tool_choice.as_ref().map(tool_choice_to_openai_value),
            user: req.user.clone(),
        }
    }
}

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        let tool_calls = msg.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|tc| OpenAiToolCall {
                    id: tc.id.clone(),
                    tool_type: "function".to_owned(),
                    function: OpenAiFunctionCall {
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    },
                })
                .collect()
        });

        Self {
            role: role.to_owned(),
            content: Some(msg.content.clone()),
            name: msg.name.clone(),
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

/// Convert canonical tool choice to an `OpenAI` JSON value
fn tool_choice_to_openai_value(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Mode(mode) => {
            let s = match mode {
                ToolChoiceMode::None => "none",
                ToolChoiceMode::Auto => "auto",
                ToolChoiceMode::Required => "required",
            };
            serde_json::Value::String(s.to_owned())
        }
        ToolChoice::Function(func) => {
            serde_json::json!({
                "type": func.choice_type,
                "function": {
                    "name": func.function.name
                }
            })
        }
    }
}

// -- Stream conversion --

/// Convert an `OpenAI` stream chunk into canonical stream events
pub fn openai_chunk_to_events(chunk: &OpenAiStreamChunk) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    for choice in &chunk.choices {
        events.push(StreamEvent::Delta(openai_stream_choice_to_delta(choice)));
    }

    if let Some(usage) = &chunk.usage {
        events.push(StreamEvent::Usage(Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }));
    }

    events
}

fn openai_stream_choice_to_delta(choice: &OpenAiStreamChoice) -> StreamDelta {
    let finish_reason = choice.finish_reason.as_deref().and_then(parse_finish_reason);

    let tool_call = choice
        .delta
        .tool_calls
        .as_ref()
        .and_then(|calls| calls.first())
        .map(|tc| StreamToolCall {
            index: tc.index,
            id: tc.id.clone(),
            function: tc
                .function
                .as_ref()
                .map(|f| StreamFunctionCall {
                    name: f.name.clone(),
                    arguments: f.arguments.clone(),
                })
                .unwrap_or_default(),
        });

    StreamDelta {
        index: choice.index,
        content: choice.delta.content.clone(),
        tool_call,
        finish_reason,
    }
}

/// Convert a canonical stream delta to an `OpenAI` stream chunk
pub fn delta_to_openai_chunk(delta: &StreamDelta, id: &str, model: &str, created: u64) -> OpenAiStreamChunk {
    let tool_calls = delta.tool_call.as_ref().map(|tc| {
        vec![OpenAiStreamToolCall {
            index: tc.index,
            id: tc.id.clone(),
            tool_type: tc.id.as_ref().map(|_| "function".to_owned()),
            function: Some(OpenAiStreamFunctionCall {
                name: tc.function.name.clone(),
                arguments: tc.function.arguments.clone(),
            }),
        }]
    });

    OpenAiStreamChunk {
        id: id.to_owned(),
        object: "chat.completion.chunk".to_owned(),
        created,
        model: model.to_owned(),
        choices: vec![OpenAiStreamChoice {
            index: delta.index,
            delta: OpenAiStreamDelta {
                role: None,
                content: delta.content.clone(),
                tool_calls,
            },
            finish_reason: delta.finish_reason.map(|fr| finish_reason_str(fr).to_owned()),
        }],
        usage: None,
    }
}

/// Convert a canonical `Usage` to an `OpenAI` stream chunk with usage data
pub fn usage_to_openai_chunk(usage: &Usage, id: &str, model: &str, created: u64) -> OpenAiStreamChunk {
    OpenAiStreamChunk {
        id: id.to_owned(),
        object: "chat.completion.chunk".to_owned(),
        created,
        model: model.to_owned(),
        choices: vec![],
        usage: Some(OpenAiUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }),
    }
}

impl From<OpenAiEmbeddingResponse> for EmbeddingResponse {
    fn from(resp: OpenAiEmbeddingResponse) -> Self {
        Self {
            object: "list".to_owned(),
            data: resp
                .data
                .into_iter()
                .map(|d| EmbeddingData {
                    object: d.object,
                    embedding: d.embedding,
                    index: d.index,
                })
                .collect(),
            model: resp.model,
            usage: EmbeddingUsage {
                prompt_tokens: resp.usage.prompt_tokens,
                total_tokens: resp.usage.total_tokens,
            },
        }
    }
}

impl From<OpenAiResponse> for ChatResponse {
    fn from(resp: OpenAiResponse) -> Self {
        Self {
            id: resp.id,
            object: resp.object,
            created: resp.created,
            model: resp.model,
            choices: resp
                .choices
                .into_iter()
                .map(|c| {
                    let finish_reason = c.finish_reason.as_deref().and_then(parse_finish_reason);

                    let tool_calls = c.message.tool_calls.map(|calls| {
                        calls
                            .into_iter()
                            .map(|tc| ToolCall {
                                id: tc.id,
                                function: FunctionCall {
                                    name: tc.function.name,
                                    arguments: tc.function.arguments,
                                },
                            })
                            .collect()
                    });

                    Choice {
                        index: c.index,
                        message: ChoiceMessage {
                            role: c.message.role,
                            content: c.message.content,
                            tool_calls,
                        },
                        finish_reason,
                    }
                })
                .collect(),
            usage: resp.usage.map_or_else(Usage::default, |u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        }
    }
}

/// Parse a finish reason string from any supported provider
pub fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "stop" | "end_turn" => Some(FinishReason::Stop),
        "length" | "max_tokens" => Some(FinishReason::Length),
        "tool_calls" | "tool_use" => Some(FinishReason::ToolCalls),
        "content_filter" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reasons_normalize_across_dialects() {
        assert_eq!(parse_finish_reason("stop"), Some(FinishReason::Stop));
        assert_eq!(parse_finish_reason("end_turn"), Some(FinishReason::Stop));
        assert_eq!(parse_finish_reason("max_tokens"), Some(FinishReason::Length));
        assert_eq!(parse_finish_reason("tool_use"), Some(FinishReason::ToolCalls));
        assert_eq!(parse_finish_reason("unknown_reason"), None);
    }

    #[test]
    fn inbound_request_preserves_message_order() {
        let req: OpenAiRequest = serde_json::from_value(serde_json::json!({
            "model": "gpt-4",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"},
                {"role": "user", "content": "bye"}
            ]
        }))
        .unwrap();

        let canonical: ChatRequest = req.into();
        let roles: Vec<Role> = canonical.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert!(!canonical.stream);
    }

    #[test]
    fn string_tool_choice_parses() {
        let req: OpenAiRequest = serde_json::from_value(serde_json::json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}],
            "tool_choice": "auto"
        }))
        .unwrap();

        let canonical: ChatRequest = req.into();
        assert!(matches!(
            canonical.tool_choice,
            Some(ToolChoice::Mode(ToolChoiceMode::Auto))
        ));
    }

    #[test]
    fn stop_accepts_bare_string_and_list() {
        let req: OpenAiRequest = serde_json::from_value(serde_json::json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}],
            "stop": "END"
        }))
        .unwrap();
        let canonical: ChatRequest = req.into();
        assert_eq!(canonical.params.stop, Some(vec!["END".to_owned()]));

        let req: OpenAiRequest = serde_json::from_value(serde_json::json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}],
            "stop": ["END", "STOP"]
        }))
        .unwrap();
        let canonical: ChatRequest = req.into();
        assert_eq!(canonical.params.stop, Some(vec!["END".to_owned(), "STOP".to_owned()]));
    }

    #[test]
    fn outbound_stream_flag_only_set_when_streaming() {
        let mut req = ChatRequest {
            model: "gpt-4".to_owned(),
            messages: vec![Message::new(Role::User, "hi")],
            params: SamplingParams::default(),
            tools: None,
            tool_choice: None,
            user: None,
            stream: false,
        };

        let wire: OpenAiRequest = (&req).into();
        assert_eq!(wire.stream, None);

        req.stream = true;
        let wire: OpenAiRequest = (&req).into();
        assert_eq!(wire.stream, Some(true));
    }

    #[test]
    fn embedding_response_keeps_one_entry_per_input_in_order() {
        let wire: OpenAiEmbeddingResponse = serde_json::from_value(serde_json::json!({
            "object": "list",
            "data": [
                {"object": "embedding", "embedding": [0.1, 0.2], "index": 0},
                {"object": "embedding", "embedding": [0.3, 0.4], "index": 1},
                {"object": "embedding", "embedding": [0.5, 0.6], "index": 2}
            ],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 6, "total_tokens": 6}
        }))
        .unwrap();

        let canonical: EmbeddingResponse = wire.into();
        assert_eq!(canonical.data.len(), 3);
        for (i, entry) in canonical.data.iter().enumerate() {
            assert_eq!(entry.index, i);
        }
    }

    #[test]
    fn chunk_with_usage_yields_delta_and_usage_events() {
        let chunk: OpenAiStreamChunk = serde_json::from_value(serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 1,
            "model": "gpt-4",
            "choices": [{"index": 0, "delta": {"content": "hi"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
        }))
        .unwrap();

        let events = openai_chunk_to_events(&chunk);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            StreamEvent::Delta(d) if d.content.as_deref() == Some("hi") && d.finish_reason == Some(FinishReason::Stop)
        ));
        assert!(matches!(&events[1], StreamEvent::Usage(u) if u.total_tokens == 4));
    }
}
