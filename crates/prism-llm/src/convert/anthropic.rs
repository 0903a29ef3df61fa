//! Conversion between canonical types and the Anthropic wire format

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicResponse,
    AnthropicResponseBlock, AnthropicStreamContentBlock, AnthropicStreamDelta, AnthropicStreamEvent, AnthropicTool,
    AnthropicToolChoice,
};
use crate::types::{
    ChatRequest, ChatResponse, Choice, ChoiceMessage, FinishReason, FunctionCall, Message, Role, StreamDelta,
    StreamEvent, StreamFunctionCall, StreamToolCall, ToolCall, ToolChoice, ToolChoiceMode, Usage,
};

/// Default max tokens when not specified (Anthropic requires the field)
const DEFAULT_MAX_TOKENS: u32 = 4096;

// -- Outbound: canonical request -> Anthropic wire format --

impl From<&ChatRequest> for AnthropicRequest {
    fn from(req: &ChatRequest) -> Self {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut messages = Vec::new();

        // System messages move to the top-level field. Multiple system
        // messages concatenate in order rather than last-wins.
        for msg in &req.messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                _ => messages.push(canonical_message_to_anthropic(msg)),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        let tools = req.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| AnthropicTool {
                    name: t.function.name.clone(),
                    description: t.function.description.clone(),
                    input_schema: t
                        .function
                        .parameters
                        .clone()
                        .unwrap_or_else(|| serde_json::json!({"type": "object"})),
                })
                .collect()
        });

        let tool_choice = req.tool_choice.as_ref().map(canonical_tool_choice_to_anthropic);

        Self {
            model: req.model.clone(),
            max_tokens: req.params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages,
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            stop_sequences: req.params.stop.clone(),
            stream: if req.stream { Some(true) } else { None },
            tools,
            tool_choice,
        }
    }
}

fn canonical_message_to_anthropic(msg: &Message) -> AnthropicMessage {
    let role = match msg.role {
        Role::Assistant => "assistant",
        Role::Tool | Role::User | Role::System => "user",
    };

    // Tool results become user messages carrying a tool_result block
    if msg.role == Role::Tool
        && let Some(tool_call_id) = &msg.tool_call_id
    {
        return AnthropicMessage {
            role: "user".to_owned(),
            content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                tool_use_id: tool_call_id.clone(),
                content: Some(msg.content.clone()),
            }]),
        };
    }

    // Assistant messages with tool calls become tool_use blocks
    if let Some(tool_calls) = &msg.tool_calls {
        let mut blocks: Vec<AnthropicContentBlock> = Vec::new();

        if !msg.content.is_empty() {
            blocks.push(AnthropicContentBlock::Text {
                text: msg.content.clone(),
            });
        }

        for tc in tool_calls {
            let input = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|_| serde_json::json!({}));
            blocks.push(AnthropicContentBlock::ToolUse {
                id: tc.id.clone(),
                name: tc.function.name.clone(),
                input,
            });
        }

        return AnthropicMessage {
            role: role.to_owned(),
            content: AnthropicContent::Blocks(blocks),
        };
    }

    AnthropicMessage {
        role: role.to_owned(),
        content: AnthropicContent::Text(msg.content.clone()),
    }
}

fn canonical_tool_choice_to_anthropic(choice: &ToolChoice) -> AnthropicToolChoice {
    match choice {
        ToolChoice::Mode(mode) => match mode {
            // Anthropic has no "none" mode; map both None and Auto to "auto"
            ToolChoiceMode::None | ToolChoiceMode::Auto => AnthropicToolChoice {
                choice_type: "auto".to_owned(),
                name: None,
            },
            ToolChoiceMode::Required => AnthropicToolChoice {
                choice_type: "any".to_owned(),
                name: None,
            },
        },
        ToolChoice::Function(func) => AnthropicToolChoice {
            choice_type: "tool".to_owned(),
            name: Some(func.function.name.clone()),
        },
    }
}

// -- Inbound: Anthropic response -> canonical --

impl From<AnthropicResponse> for ChatResponse {
    fn from(resp: AnthropicResponse) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut text_content = String::new();
        let mut tool_calls = Vec::new();

        for block in &resp.content {
            match block {
                AnthropicResponseBlock::Text { text } => {
                    text_content.push_str(text);
                }
                AnthropicResponseBlock::ToolUse { id, name, input } => {
                    let arguments = serde_json::to_string(input).unwrap_or_else(|_| "{}".to_owned());
                    tool_calls.push(ToolCall {
                        id: id.clone(),
                        function: FunctionCall {
                            name: name.clone(),
                            arguments,
                        },
                    });
                }
            }
        }

        let finish_reason = resp.stop_reason.as_deref().and_then(parse_stop_reason);

        let message = if tool_calls.is_empty() {
            ChoiceMessage::text(text_content)
        } else {
            ChoiceMessage {
                role: "assistant".to_owned(),
                content: if text_content.is_empty() {
                    None
                } else {
                    Some(text_content)
                },
                tool_calls: Some(tool_calls),
            }
        };

        Self {
            id: resp.id,
            object: "chat.completion".to_owned(),
            created: now,
            model: resp.model,
            choices: vec![Choice {
                index: 0,
                message,
                finish_reason,
            }],
            usage: Usage::from_parts(resp.usage.input_tokens, resp.usage.output_tokens),
        }
    }
}

fn parse_stop_reason(s: &str) -> Option<FinishReason> {
    match s {
        "end_turn" | "stop_sequence" => Some(FinishReason::Stop),
        "max_tokens" => Some(FinishReason::Length),
        "tool_use" => Some(FinishReason::ToolCalls),
        _ => None,
    }
}

// -- Stream conversion --

/// State tracker for converting Anthropic stream events
///
/// Anthropic streams are stateful: tool identity arrives in
/// `content_block_start` while arguments arrive in later deltas, and prompt
/// token counts arrive in `message_start` while output counts arrive in
/// `message_delta`.
#[derive(Debug, Default)]
pub struct AnthropicStreamState {
    /// Input tokens reported by `message_start`
    input_tokens: u32,
    /// Sequential 0-based index of the tool call currently being streamed
    ///
    /// Anthropic's content block index is shared across all block types, so a
    /// tool use following a text block starts at 1 or higher. Consumers index
    /// tool calls by their own sequence, so we renumber.
    current_tool_call_index: u32,
    /// Counter used to assign the next tool call its sequential index
    next_tool_call_index: u32,
}

impl AnthropicStreamState {
    /// Create a new stream state tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert an Anthropic stream event to canonical stream events
    pub fn convert_event(&mut self, event: &AnthropicStreamEvent) -> Vec<StreamEvent> {
        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                if let Some(usage) = &message.usage {
                    self.input_tokens = usage.input_tokens;
                }
                Vec::new()
            }

            AnthropicStreamEvent::Ping | AnthropicStreamEvent::ContentBlockStop { .. } => Vec::new(),

            AnthropicStreamEvent::ContentBlockStart { content_block, .. } => match content_block {
                AnthropicStreamContentBlock::Text { .. } => Vec::new(),
                AnthropicStreamContentBlock::ToolUse { id, name, .. } => {
                    self.current_tool_call_index = self.next_tool_call_index;
                    self.next_tool_call_index += 1;
                    vec![StreamEvent::Delta(StreamDelta {
                        index: 0,
                        content: None,
                        tool_call: Some(StreamToolCall {
                            index: self.current_tool_call_index,
                            id: Some(id.clone()),
                            function: StreamFunctionCall {
                                name: Some(name.clone()),
                                arguments: None,
                            },
                        }),
                        finish_reason: None,
                    })]
                }
            },

            AnthropicStreamEvent::ContentBlockDelta { delta, .. } => match delta {
                AnthropicStreamDelta::TextDelta { text } => {
                    vec![StreamEvent::Delta(StreamDelta::content(text.clone()))]
                }
                AnthropicStreamDelta::InputJsonDelta { partial_json } => {
                    vec![StreamEvent::Delta(StreamDelta {
                        index: 0,
                        content: None,
                        tool_call: Some(StreamToolCall {
                            index: self.current_tool_call_index,
                            id: None,
                            function: StreamFunctionCall {
                                name: None,
                                arguments: Some(partial_json.clone()),
                            },
                        }),
                        finish_reason: None,
                    })]
                }
            },

            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                let mut events = Vec::new();

                let finish_reason = delta.stop_reason.as_deref().and_then(parse_stop_reason);
                if let Some(reason) = finish_reason {
                    events.push(StreamEvent::Delta(StreamDelta::finish(reason)));
                }

                if let Some(usage) = usage {
                    events.push(StreamEvent::Usage(Usage::from_parts(
                        self.input_tokens,
                        usage.output_tokens,
                    )));
                }

                events
            }

            AnthropicStreamEvent::MessageStop => {
                vec![StreamEvent::Done]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SamplingParams;

    fn request(messages: Vec<Message>) -> ChatRequest {
        ChatRequest {
            model: "claude-3-opus-20240229".to_owned(),
            messages,
            params: SamplingParams::default(),
            tools: None,
            tool_choice: None,
            user: None,
            stream: false,
        }
    }

    #[test]
    fn system_message_lifted_out_of_messages() {
        let req = request(vec![
            Message::new(Role::System, "be brief"),
            Message::new(Role::User, "hi"),
        ]);

        let wire: AnthropicRequest = (&req).into();
        assert_eq!(wire.system.as_deref(), Some("be brief"));
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.messages[0].role, "user");
    }

    #[test]
    fn multiple_system_messages_concatenate_in_order() {
        let req = request(vec![
            Message::new(Role::System, "first"),
            Message::new(Role::User, "hi"),
            Message::new(Role::System, "second"),
        ]);

        let wire: AnthropicRequest = (&req).into();
        assert_eq!(wire.system.as_deref(), Some("first\n\nsecond"));
        assert_eq!(wire.messages.len(), 1);
    }

    #[test]
    fn max_tokens_defaults_when_absent() {
        let req = request(vec![Message::new(Role::User, "hi")]);
        let wire: AnthropicRequest = (&req).into();
        assert_eq!(wire.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn tool_result_becomes_user_tool_result_block() {
        let mut msg = Message::new(Role::Tool, "42");
        msg.tool_call_id = Some("call_1".to_owned());

        let req = request(vec![Message::new(Role::User, "hi"), msg]);
        let wire: AnthropicRequest = (&req).into();

        assert_eq!(wire.messages[1].role, "user");
        assert!(matches!(
            &wire.messages[1].content,
            AnthropicContent::Blocks(blocks)
                if matches!(&blocks[0], AnthropicContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "call_1")
        ));
    }

    #[test]
    fn response_usage_totals_input_and_output() {
        let resp: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "hello"}],
            "model": "claude-3-opus-20240229",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 3}
        }))
        .unwrap();

        let canonical: ChatResponse = resp.into();
        assert_eq!(canonical.usage.total_tokens, 13);
        assert_eq!(canonical.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(canonical.choices[0].message.content.as_deref(), Some("hello"));
    }

    #[test]
    fn stream_state_renumbers_tool_calls_and_totals_usage() {
        let mut state = AnthropicStreamState::new();

        let start: AnthropicStreamEvent = serde_json::from_value(serde_json::json!({
            "type": "message_start",
            "message": {
                "id": "msg_1", "type": "message", "role": "assistant",
                "model": "claude-3-opus-20240229",
                "usage": {"input_tokens": 8, "output_tokens": 0}
            }
        }))
        .unwrap();
        assert!(state.convert_event(&start).is_empty());

        // Tool use at content block index 1, after a text block
        let tool_start: AnthropicStreamEvent = serde_json::from_value(serde_json::json!({
            "type": "content_block_start",
            "index": 1,
            "content_block": {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {}}
        }))
        .unwrap();
        let events = state.convert_event(&tool_start);
        assert!(matches!(
            &events[0],
            StreamEvent::Delta(d) if d.tool_call.as_ref().unwrap().index == 0
        ));

        let msg_delta: AnthropicStreamEvent = serde_json::from_value(serde_json::json!({
            "type": "message_delta",
            "delta": {"stop_reason": "tool_use"},
            "usage": {"output_tokens": 5}
        }))
        .unwrap();
        let events = state.convert_event(&msg_delta);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            StreamEvent::Delta(d) if d.finish_reason == Some(FinishReason::ToolCalls)
        ));
        assert!(matches!(&events[1], StreamEvent::Usage(u) if u.total_tokens == 13));

        let stop: AnthropicStreamEvent = serde_json::from_value(serde_json::json!({"type": "message_stop"})).unwrap();
        assert!(matches!(state.convert_event(&stop)[0], StreamEvent::Done));
    }
}
