use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::llm::{ChatMessage, ModelProvider, ModelTurn, ToolCallRequest};
use crate::tools::ToolDeclaration;

#[derive(Serialize)]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTools>,
}

#[derive(Serialize)]
struct GeminiTools {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<Value>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    function_call: Option<Value>,
    #[serde(rename = "functionResponse", skip_serializing_if = "Option::is_none")]
    function_response: Option<Value>,
}

impl GeminiPart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            function_call: None,
            function_response: None,
        }
    }

    fn call(call: &ToolCallRequest) -> Self {
        Self {
            text: None,
            function_call: Some(json!({ "name": call.name, "args": call.arguments })),
            function_response: None,
        }
    }

    fn response(name: &str, response: Value) -> Self {
        Self {
            text: None,
            function_call: None,
            function_response: Some(json!({ "name": name, "response": response })),
        }
    }
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResContent,
}

#[derive(Deserialize)]
struct GeminiResContent {
    #[serde(default)]
    parts: Vec<GeminiResPart>,
}

#[derive(Deserialize)]
struct GeminiResPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "functionCall", default)]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

/// Gemini REST provider. Tool exchanges map onto the API's
/// functionCall/functionResponse parts; everything else is plain text
/// content with alternating user/model roles.
pub struct GeminiProvider {
    api_key: String,
    model_id: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, model_id: String) -> Self {
        Self {
            api_key,
            model_id,
            client: Client::new(),
        }
    }

    fn build_request(messages: &[ChatMessage], tools: &[ToolDeclaration]) -> GeminiRequest {
        let mut system_instruction: Option<GeminiContent> = None;
        let mut contents: Vec<GeminiContent> = Vec::new();

        for m in messages {
            match m.role.as_str() {
                "system" => {
                    // Leading and mid-conversation system text both fold
                    // into the single system_instruction slot.
                    match &mut system_instruction {
                        Some(si) => {
                            if let Some(part) = si.parts.first_mut()
                                && let Some(text) = &mut part.text
                            {
                                text.push('\n');
                                text.push_str(&m.content);
                            }
                        }
                        None => {
                            system_instruction = Some(GeminiContent {
                                role: "user".to_string(),
                                parts: vec![GeminiPart::text(m.content.clone())],
                            });
                        }
                    }
                }
                "tool" => {
                    let parts = m
                        .tool_results
                        .iter()
                        .map(|r| {
                            let payload = if r.success {
                                json!({ "content": r.data })
                            } else {
                                json!({ "error": r.error })
                            };
                            GeminiPart::response(&r.name, payload)
                        })
                        .collect();
                    contents.push(GeminiContent {
                        role: "user".to_string(),
                        parts,
                    });
                }
                "assistant" => {
                    let mut parts = Vec::new();
                    if !m.content.is_empty() {
                        parts.push(GeminiPart::text(m.content.clone()));
                    }
                    parts.extend(m.tool_calls.iter().map(GeminiPart::call));
                    if parts.is_empty() {
                        parts.push(GeminiPart::text(String::new()));
                    }
                    contents.push(GeminiContent {
                        role: "model".to_string(),
                        parts,
                    });
                }
                _ => {
                    contents.push(GeminiContent {
                        role: "user".to_string(),
                        parts: vec![GeminiPart::text(m.content.clone())],
                    });
                }
            }
        }

        let tools = if tools.is_empty() {
            Vec::new()
        } else {
            vec![GeminiTools {
                function_declarations: tools
                    .iter()
                    .map(|t| {
                        json!({
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        })
                    })
                    .collect(),
            }]
        };

        GeminiRequest {
            system_instruction,
            contents,
            tools,
        }
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn send_turn(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDeclaration],
    ) -> Result<ModelTurn> {
        let req = Self::build_request(messages, tools);
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model_id, self.api_key
        );
        let res = self.client.post(&url).json(&req).send().await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "Gemini API Error: {}",
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: GeminiResponse = res.json().await?;

        let mut turn = ModelTurn::default();
        let parts = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts)
            .unwrap_or_default();
        for part in parts {
            if let Some(text) = part.text {
                if !turn.text.is_empty() {
                    turn.text.push('\n');
                }
                turn.text.push_str(&text);
            }
            if let Some(call) = part.function_call {
                turn.tool_calls.push(ToolCallRequest {
                    name: call.name,
                    arguments: call.args,
                });
            }
        }
        Ok(turn)
    }
}
