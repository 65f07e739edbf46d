//! Chat completion client
//!
//! Talks to an OpenAI-compatible chat completion endpoint. Each request
//! carries the persona system prompt (plus the time/date addendum for the
//! matching quick actions) followed by the full conversation so far. The
//! exchange is plain request/response: no streaming, no automatic retry;
//! a failed request surfaces to the user who may resubmit.

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::message::ConversationMessage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server-resolved context a quick action attaches to its request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatTask {
    /// Tell the current time
    Time,
    /// Tell today's date
    Date,
}

/// Abstraction over the chat endpoint, so the controller can be exercised
/// against a scripted endpoint in tests
pub trait ChatApi: Send + Sync {
    /// Request one completion for the conversation; returns the reply text
    fn complete(
        &self,
        messages: &[ConversationMessage],
        task: Option<ChatTask>,
    ) -> Result<String, ChatError>;
}

/// HTTP client for an OpenAI-compatible chat completion endpoint
pub struct ChatClient {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    persona: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl ChatClient {
    /// Create a client from config
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        if !config.endpoint.starts_with("http://") && !config.endpoint.starts_with("https://") {
            return Err(ChatError::Config(format!(
                "chat.endpoint must start with http:// or https://, got: {}",
                config.endpoint
            )));
        }

        // Check for an API key in config or environment
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("VALET_API_KEY").ok());

        tracing::info!(
            "Configured chat endpoint: {} (model {}, timeout {}s)",
            config.endpoint,
            config.model,
            config.timeout_secs
        );

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            persona: config.persona.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Build the system prompt, appending task context where the endpoint
    /// cannot know it (local time and date)
    fn system_prompt(&self, task: Option<ChatTask>) -> String {
        let mut prompt = self.persona.clone();
        match task {
            Some(ChatTask::Time) => {
                let now = chrono::Local::now();
                prompt.push_str(&format!(
                    "\n\nThe current time is {}.",
                    now.format("%-I:%M:%S %p")
                ));
            }
            Some(ChatTask::Date) => {
                let now = chrono::Local::now();
                prompt.push_str(&format!(
                    "\n\nToday's date is {}.",
                    now.format("%A, %B %-d, %Y")
                ));
            }
            None => {}
        }
        prompt
    }
}

impl ChatApi for ChatClient {
    fn complete(
        &self,
        messages: &[ConversationMessage],
        task: Option<ChatTask>,
    ) -> Result<String, ChatError> {
        let system = self.system_prompt(task);

        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(WireMessage {
            role: "system",
            content: &system,
        });
        wire.extend(messages.iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        let url = format!(
            "{}/chat/completions",
            self.endpoint.trim_end_matches('/')
        );

        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let mut request = agent.post(&url).set("Content-Type", "application/json");
        if let Some(ref key) = self.api_key {
            request = request.set("Authorization", &format!("Bearer {}", key));
        }

        tracing::debug!(
            "Requesting completion for {} message(s), task={:?}",
            messages.len(),
            task
        );
        let start = std::time::Instant::now();

        let response = request
            .send_json(&CompletionRequest {
                model: &self.model,
                messages: wire,
            })
            .map_err(|e| match e {
                ureq::Error::Status(status, resp) => {
                    classify_status(status, &resp.into_string().unwrap_or_default())
                }
                ureq::Error::Transport(t) => ChatError::Network(t.to_string()),
            })?;

        let body: CompletionResponse = response
            .into_json()
            .map_err(|e| ChatError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let reply = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                ChatError::InvalidResponse("response contained no choices".to_string())
            })?;

        tracing::info!(
            "Completion received in {:.2}s ({} chars)",
            start.elapsed().as_secs_f32(),
            reply.len()
        );

        Ok(reply.trim().to_string())
    }
}

/// Map an HTTP error status onto the chat error taxonomy. Rate limiting and
/// exhausted credits carry distinct user messaging; everything else keeps
/// the service's own error text when the body offers one.
fn classify_status(status: u16, body: &str) -> ChatError {
    match status {
        429 => ChatError::RateLimited,
        402 => ChatError::PaymentRequired,
        _ => ChatError::Server {
            status,
            message: extract_error_message(body),
        },
    }
}

/// Pull a human-readable message out of an error body, which may be an
/// OpenAI-style `{"error": {"message": ...}}`, a bare `{"error": "..."}`,
/// or not JSON at all
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(error) = value.get("error") {
            if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
                return message.to_string();
            }
            if let Some(message) = error.as_str() {
                return message.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no details provided".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}
