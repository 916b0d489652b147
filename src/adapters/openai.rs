use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::data::{AgentModel, AgentReply, CompletionError, CompletionPort, Message, Role, ToolCall, ToolSpec};
use crate::settings::Settings;

const RAG_INSTRUCTIONS: &str = "You are a helpful assistant. Use the available context to answer the question. \
If you don't know the answer, respond with \"I don't know.\"";

/// OpenAI-compatible chat-completions client.
///
/// Serves both the plain completion port and the tool-calling agent port.
/// Holds a blocking HTTP client, so it must be created and used off the
/// async runtime threads.
pub struct OpenAiClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(settings: &Settings) -> Result<Self, CompletionError> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                CompletionError::NotConfigured("set KEVIN_API_KEY or OPENAI_API_KEY".to_string())
            })?
            .to_string();
        if settings.model.trim().is_empty() {
            return Err(CompletionError::NotConfigured("model name is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| CompletionError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.trim().to_string(),
        })
    }

    fn chat(&self, body: &Value) -> Result<Value, CompletionError> {
        let url = format!("{}/chat/completions", self.api_base);
        log::debug!("POST {} (model {})", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .map_err(|e| CompletionError::InvalidPayload(e.to_string()))
    }
}

impl CompletionPort for OpenAiClient {
    fn complete(&self, context: &str, question: &str) -> Result<String, CompletionError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": rag_prompt(context, question) }
            ],
            "temperature": 0
        });
        let payload = self.chat(&body)?;
        Ok(parse_reply(&payload)?.content)
    }
}

impl AgentModel for OpenAiClient {
    fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<AgentReply, CompletionError> {
        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(to_wire).collect::<Vec<_>>(),
            "temperature": 0
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.iter().map(tool_to_wire).collect());
            body["parallel_tool_calls"] = Value::Bool(false);
        }
        let payload = self.chat(&body)?;
        parse_reply(&payload)
    }
}

/// Single user message carrying both context and question.
pub fn rag_prompt(context: &str, question: &str) -> String {
    format!(
        "CONTEXT:\n{}\n\nQUERY:\n{}\n\n{}",
        context, question, RAG_INSTRUCTIONS
    )
}

fn to_wire(message: &Message) -> Value {
    match (message.role, &message.tool_call) {
        (Role::Assistant, Some(call)) => json!({
            "role": "assistant",
            "content": nullable(&message.content),
            "tool_calls": [{
                "id": call.id,
                "type": "function",
                "function": {
                    "name": call.name,
                    "arguments": call.arguments.to_string()
                }
            }]
        }),
        (Role::Tool, _) => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
            "content": message.content
        }),
        (role, _) => json!({
            "role": role.as_str(),
            "content": message.content
        }),
    }
}

fn nullable(content: &str) -> Value {
    if content.is_empty() {
        Value::Null
    } else {
        Value::String(content.to_string())
    }
}

fn tool_to_wire(tool: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters
        }
    })
}

/// Reads the first choice. Only the first tool call is kept.
fn parse_reply(payload: &Value) -> Result<AgentReply, CompletionError> {
    let message = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| CompletionError::InvalidPayload(format!("no choices in response: {}", payload)))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let tool_call = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| calls.first())
        .map(|call| {
            let function = call.get("function").cloned().unwrap_or(Value::Null);
            let raw_arguments = function
                .get("arguments")
                .and_then(Value::as_str)
                .unwrap_or("{}");
            ToolCall {
                id: call
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                name: function
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                // Unparsable arguments are passed through; dispatch reports them.
                arguments: serde_json::from_str(raw_arguments)
                    .unwrap_or_else(|_| Value::String(raw_arguments.to_string())),
            }
        });

    Ok(AgentReply { content, tool_call })
}
