//! Conversion between canonical types and the Google Generative Language wire format

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::google::{
    GoogleCandidate, GoogleContent, GoogleFunctionCall, GoogleFunctionCallingConfig, GoogleFunctionDeclaration,
    GoogleFunctionResponse, GoogleGenerationConfig, GooglePart, GoogleRequest, GoogleResponse, GoogleTool,
    GoogleToolConfig,
};
use crate::types::{
    ChatRequest, ChatResponse, Choice, ChoiceMessage, FinishReason, FunctionCall, Message, Role, StreamDelta,
    StreamEvent, StreamFunctionCall, StreamToolCall, ToolCall, ToolChoice, ToolChoiceMode, Usage,
};

// -- Outbound: canonical request -> Google wire request --

impl From<&ChatRequest> for GoogleRequest {
    fn from(req: &ChatRequest) -> Self {
        let mut system_parts: Vec<GooglePart> = Vec::new();
        let mut contents = Vec::new();

        for msg in &req.messages {
            match msg.role {
                // System messages accumulate as parts of the single
                // system_instruction, preserving their order
                Role::System => system_parts.push(GooglePart::Text(msg.content.clone())),
                Role::User => contents.push(canonical_message_to_google(msg, "user")),
                Role::Assistant => contents.push(canonical_message_to_google(msg, "model")),
                Role::Tool => {
                    // Tool results become function responses
                    if let Some(tool_call_id) = &msg.tool_call_id {
                        let response_value = serde_json::from_str(&msg.content)
                            .unwrap_or_else(|_| serde_json::json!({"result": msg.content}));
                        contents.push(GoogleContent {
                            role: Some("function".to_owned()),
                            parts: vec![GooglePart::FunctionResponse(GoogleFunctionResponse {
                                name: tool_call_id.clone(),
                                response: response_value,
                            })],
                        });
                    }
                }
            }
        }

        let system_instruction = if system_parts.is_empty() {
            None
        } else {
            Some(GoogleContent {
                role: None,
                parts: system_parts,
            })
        };

        let generation_config = Some(GoogleGenerationConfig {
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            max_output_tokens: req.params.max_tokens,
            stop_sequences: req.params.stop.clone(),
            candidate_count: None,
        });

        let tools = req.tools.as_ref().map(|tools| {
            vec![GoogleTool {
                function_declarations: tools
                    .iter()
                    .map(|t| GoogleFunctionDeclaration {
                        name: t.function.name.clone(),
                        description: t.function.description.clone(),
                        parameters: t.function.parameters.clone(),
                    })
                    .collect(),
            }]
        });

        let tool_config = req.tool_choice.as_ref().map(|tc| {
            let (mode, allowed_names) = match tc {
                ToolChoice::Mode(ToolChoiceMode::None) => ("NONE".to_owned(), None),
                ToolChoice::Mode(ToolChoiceMode::Auto) => ("AUTO".to_owned(), None),
                ToolChoice::Mode(ToolChoiceMode::Required) => ("ANY".to_owned(), None),
                ToolChoice::Function(func) => ("ANY".to_owned(), Some(vec![func.function.name.clone()])),
            };
            GoogleToolConfig {
                function_calling_config: GoogleFunctionCallingConfig {
                    mode,
                    allowed_function_names: allowed_names,
                },
            }
        });

        Self {
            contents,
            system_instruction,
            generation_config,
            tools,
            tool_config,
        }
    }
}

fn canonical_message_to_google(msg: &Message, role: &str) -> GoogleContent {
    let mut parts = Vec::new();

    if !msg.content.is_empty() {
        parts.push(GooglePart::Text(msg.content.clone()));
    }

    if let Some(tool_calls) = &msg.tool_calls {
        for tc in tool_calls {
            let args = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|_| serde_json::json!({}));
            parts.push(GooglePart::FunctionCall(GoogleFunctionCall {
                name: tc.function.name.clone(),
                args,
            }));
        }
    }

    // Google rejects content objects with no parts
    if parts.is_empty() {
        parts.push(GooglePart::Text(String::new()));
    }

    GoogleContent {
        role: Some(role.to_owned()),
        parts,
    }
}

// -- Inbound: Google wire response -> canonical types --

impl From<GoogleResponse> for ChatResponse {
    fn from(resp: GoogleResponse) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        #[allow(clippy::cast_possible_truncation)]
        let choices = resp
            .candidates
            .into_iter()
            .enumerate()
            .map(|(i, candidate)| google_candidate_to_choice(&candidate, i as u32))
            .collect();

        let usage = resp.usage_metadata.map_or_else(Usage::default, |u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: Some(u.candidates_token_count),
            total_tokens: u.total_token_count,
        });

        Self {
            id: format!("gemini-{now}"),
            object: "chat.completion".to_owned(),
            created: now,
            model: String::new(), // Filled in by the provider
            choices,
            usage,
        }
    }
}

fn google_candidate_to_choice(candidate: &GoogleCandidate, default_index: u32) -> Choice {
    let index = candidate.index.unwrap_or(default_index);

    let mut text_content = String::new();
    let mut tool_calls = Vec::new();

    for part in &candidate.content.parts {
        match part {
            GooglePart::Text(text) => text_content.push_str(text.as_str()),
            GooglePart::FunctionCall(fc) => {
                let arguments = serde_json::to_string(&fc.args).unwrap_or_else(|_| "{}".to_owned());
                tool_calls.push(ToolCall {
                    id: format!("call_{}", fc.name),
                    function: FunctionCall {
                        name: fc.name.clone(),
                        arguments,
                    },
                });
            }
            GooglePart::FunctionResponse(_) => {}
        }
    }

    let finish_reason = candidate.finish_reason.as_deref().and_then(parse_google_finish_reason);

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

    Choice {
        index,
        message,
        finish_reason,
    }
}

fn parse_google_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "STOP" => Some(FinishReason::Stop),
        "MAX_TOKENS" => Some(FinishReason::Length),
        "SAFETY" | "RECITATION" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

// -- Stream conversion --

/// Convert a Google streaming chunk to canonical stream events
pub fn google_chunk_to_events(chunk: &GoogleResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    for (i, candidate) in chunk.candidates.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let index = candidate.index.unwrap_or(i as u32);

        for part in &candidate.content.parts {
            match part {
                GooglePart::Text(text) => {
                    events.push(StreamEvent::Delta(StreamDelta {
                        index,
                        content: Some(text.clone()),
                        tool_call: None,
                        finish_reason: None,
                    }));
                }
                GooglePart::FunctionCall(fc) => {
                    // Google sends complete function calls, never fragments
                    let arguments = serde_json::to_string(&fc.args).unwrap_or_else(|_| "{}".to_owned());
                    events.push(StreamEvent::Delta(StreamDelta {
                        index,
                        content: None,
                        tool_call: Some(StreamToolCall {
                            index: 0,
                            id: Some(format!("call_{}", fc.name)),
                            function: StreamFunctionCall {
                                name: Some(fc.name.clone()),
                                arguments: Some(arguments),
                            },
                        }),
                        finish_reason: None,
                    }));
                }
                GooglePart::FunctionResponse(_) => {}
            }
        }

        let finish_reason = candidate.finish_reason.as_deref().and_then(parse_google_finish_reason);
        if finish_reason.is_some() {
            events.push(StreamEvent::Delta(StreamDelta {
                index,
                content: None,
                tool_call: None,
                finish_reason,
            }));
        }
    }

    if let Some(usage) = &chunk.usage_metadata {
        events.push(StreamEvent::Usage(Usage {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: Some(usage.candidates_token_count),
            total_tokens: usage.total_token_count,
        }));
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SamplingParams;

    #[test]
    fn roles_map_to_user_and_model() {
        let req = ChatRequest {
            model: "gemini-pro".to_owned(),
            messages: vec![
                Message::new(Role::System, "be terse"),
                Message::new(Role::User, "hi"),
                Message::new(Role::Assistant, "hello"),
            ],
            params: SamplingParams::default(),
            tools: None,
            tool_choice: None,
            user: None,
            stream: false,
        };

        let wire: GoogleRequest = (&req).into();
        assert!(wire.system_instruction.is_some());
        assert_eq!(wire.contents.len(), 2);
        assert_eq!(wire.contents[0].role.as_deref(), Some("user"));
        assert_eq!(wire.contents[1].role.as_deref(), Some("model"));
    }

    #[test]
    fn uppercase_finish_reasons_normalize() {
        assert_eq!(parse_google_finish_reason("STOP"), Some(FinishReason::Stop));
        assert_eq!(parse_google_finish_reason("MAX_TOKENS"), Some(FinishReason::Length));
        assert_eq!(parse_google_finish_reason("SAFETY"), Some(FinishReason::ContentFilter));
        assert_eq!(parse_google_finish_reason("OTHER"), None);
    }

    #[test]
    fn chunk_emits_content_then_finish_then_usage() {
        let chunk: GoogleResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "hi"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {
                "promptTokenCount": 4,
                "candidatesTokenCount": 1,
                "totalTokenCount": 5
            }
        }))
        .unwrap();

        let events = google_chunk_to_events(&chunk);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::Delta(d) if d.content.as_deref() == Some("hi")));
        assert!(matches!(&events[1], StreamEvent::Delta(d) if d.finish_reason == Some(FinishReason::Stop)));
        assert!(matches!(&events[2], StreamEvent::Usage(u) if u.total_tokens == 5));
    }
}
