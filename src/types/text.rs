use serde::{Deserialize, Serialize};

use crate::config::{ProviderConfig, TextEndpoint};
use crate::error::GenerationError;

/// Chat-completions message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponsesRequest<'a> {
    pub model: &'a str,
    pub input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

/// Request body for whichever text endpoint is configured.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TextRequest<'a> {
    Chat(ChatRequest<'a>),
    Responses(ResponsesRequest<'a>),
}

impl<'a> TextRequest<'a> {
    pub fn build(cfg: &'a ProviderConfig, prompt: &'a str) -> Self {
        match cfg.text_endpoint {
            TextEndpoint::ChatCompletions => {
                let mut messages = Vec::with_capacity(2);
                if let Some(system) = cfg.system_prompt.as_deref() {
                    messages.push(ChatMessage {
                        role: "system",
                        content: system,
                    });
                }
                messages.push(ChatMessage {
                    role: "user",
                    content: prompt,
                });
                TextRequest::Chat(ChatRequest {
                    model: &cfg.text_model,
                    messages,
                    temperature: cfg.temperature,
                    max_tokens: cfg.max_output_tokens,
                })
            }
            TextEndpoint::Responses => TextRequest::Responses(ResponsesRequest {
                model: &cfg.text_model,
                input: prompt,
                instructions: cfg.system_prompt.as_deref(),
                temperature: cfg.temperature,
                max_output_tokens: cfg.max_output_tokens,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponsesOutput {
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
}

fn try_chat(body: &[u8]) -> Option<String> {
    let completion: ChatCompletion = serde_json::from_slice(body).ok()?;
    completion.choices.into_iter().next()?.message.content
}

fn try_output_text(resp: &ResponsesOutput) -> Option<String> {
    resp.output_text.clone()
}

fn try_output_items(resp: &ResponsesOutput) -> Option<String> {
    let texts: Vec<&str> = resp
        .output
        .iter()
        .flat_map(|item| item.content.iter())
        .filter(|c| c.kind.as_deref().is_none_or(|k| k == "output_text" || k == "text"))
        .filter_map(|c| c.text.as_deref())
        .collect();
    (!texts.is_empty()).then(|| texts.concat())
}

/// Extract generated text, trying `choices[0].message.content`, then
/// `output_text`, then `output[].content[].text`.
pub fn decode_text(body: &[u8]) -> Result<String, GenerationError> {
    if let Some(text) = try_chat(body) {
        return Ok(text);
    }

    let resp: ResponsesOutput =
        serde_json::from_slice(body).map_err(|_| GenerationError::InvalidResponse)?;
    try_output_text(&resp)
        .or_else(|| try_output_items(&resp))
        .ok_or(GenerationError::InvalidResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_body_carries_system_and_user_messages() {
        let cfg = ProviderConfig::default();
        let body = serde_json::to_value(TextRequest::build(&cfg, "a haunted lighthouse")).unwrap();
        assert_eq!(body["model"], "o4-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "a haunted lighthouse");
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn responses_body_uses_input() {
        let cfg = ProviderConfig {
            text_endpoint: TextEndpoint::Responses,
            temperature: None,
            ..ProviderConfig::default()
        };
        let body = serde_json::to_value(TextRequest::build(&cfg, "a sleepy dragon")).unwrap();
        assert_eq!(body["input"], "a sleepy dragon");
        assert_eq!(body["instructions"], "You are a creative storyteller.");
        assert!(body.get("messages").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn decodes_chat_shape() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "Once upon a time"}}]});
        let text = decode_text(body.to_string().as_bytes()).unwrap();
        assert_eq!(text, "Once upon a time");
    }

    #[test]
    fn decodes_output_text_shape() {
        let body = json!({"id": "resp_1", "output_text": "The end."});
        assert_eq!(decode_text(body.to_string().as_bytes()).unwrap(), "The end.");
    }

    #[test]
    fn decodes_output_items_shape() {
        let body = json!({
            "output": [
                {"type": "reasoning", "content": []},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "Chapter one. "},
                    {"type": "output_text", "text": "Chapter two."}
                ]}
            ]
        });
        assert_eq!(
            decode_text(body.to_string().as_bytes()).unwrap(),
            "Chapter one. Chapter two."
        );
    }

    #[test]
    fn empty_choices_fall_through_to_next_shape() {
        let body = json!({"choices": [], "output_text": "fallback"});
        assert_eq!(decode_text(body.to_string().as_bytes()).unwrap(), "fallback");
    }

    #[test]
    fn unknown_shape_is_invalid_response() {
        let body = json!({"result": "nope"});
        assert_eq!(
            decode_text(body.to_string().as_bytes()),
            Err(GenerationError::InvalidResponse)
        );
        assert_eq!(decode_text(b"not json"), Err(GenerationError::InvalidResponse));
    }
}
