//! Anthropic session.
//!
//! Stateless per call: every send resends the whole message list. The
//! system prompt is a top-level list of text blocks; the cacheable block is
//! tagged `cache_control: {"type": "ephemeral"}` so repeated calls read the
//! prefix from the provider cache. Cache hits and writes come back in
//! `usage` and are reported as [`TokenUsage`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::transport::{log_usage, Endpoint};
use crate::domain::conversation::Role;
use crate::domain::prompt::SystemPrompt;
use crate::ports::{
    AIError, AISession, GenerationOptions, ProviderKind, SessionReply, SessionSpec, TokenUsage,
    Turn,
};

/// API version header value.
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Stand-in first user turn when history opens with the protagonist.
const CONVERSATION_START: &str = "(The conversation begins.)";

/// A conversation with a Claude model.
#[derive(Debug)]
pub struct AnthropicSession {
    endpoint: Endpoint,
    model: String,
    system_blocks: Vec<SystemBlock>,
    generation: GenerationOptions,
    history: Vec<Turn>,
}

impl AnthropicSession {
    pub fn new(endpoint: Endpoint, spec: SessionSpec, prompt_cache: bool) -> Self {
        Self {
            endpoint,
            model: spec.model_id,
            system_blocks: system_blocks(&spec.system_prompt, prompt_cache),
            generation: spec.generation,
            history: spec.prior_history,
        }
    }

    fn build_request(&self, text: &str) -> AnthropicRequest {
        let mut messages: Vec<AnthropicMessage> = Vec::with_capacity(self.history.len() + 2);
        let new_turn = Turn::user(text);
        for turn in self.history.iter().chain(std::iter::once(&new_turn)) {
            let role = match turn.role {
                Role::User => "user",
                Role::Model => "assistant",
            };
            if messages.is_empty() && role == "assistant" {
                messages.push(AnthropicMessage::new("user", CONVERSATION_START));
            }
            // Consecutive turns from the same side are merged; the API
            // requires strict alternation.
            match messages.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&turn.text);
                }
                _ => messages.push(AnthropicMessage::new(role, &turn.text)),
            }
        }

        AnthropicRequest {
            model: self.model.clone(),
            system: self.system_blocks.clone(),
            messages,
            max_tokens: self.generation.max_output_tokens,
            temperature: self.generation.temperature,
        }
    }
}

fn system_blocks(prompt: &SystemPrompt, prompt_cache: bool) -> Vec<SystemBlock> {
    let mut blocks = Vec::with_capacity(2);
    if !prompt.cacheable.is_empty() {
        blocks.push(SystemBlock {
            kind: "text".to_string(),
            text: prompt.cacheable.clone(),
            cache_control: prompt_cache.then(CacheControl::ephemeral),
        });
    }
    if !prompt.dynamic.is_empty() {
        blocks.push(SystemBlock {
            kind: "text".to_string(),
            text: prompt.dynamic.clone(),
            cache_control: None,
        });
    }
    blocks
}

fn parse_response(response: AnthropicResponse) -> Result<SessionReply, AIError> {
    if response.stop_reason.as_deref() == Some("refusal") {
        return Err(AIError::content_filtered("refusal"));
    }

    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.trim().is_empty() {
        return Err(AIError::parse("No text content in response"));
    }

    let u = response.usage;
    let usage = TokenUsage::new(u.input_tokens, u.output_tokens)
        .with_cache(u.cache_read_input_tokens, u.cache_creation_input_tokens);

    Ok(SessionReply { text, usage })
}

#[async_trait]
impl AISession for AnthropicSession {
    async fn send(&mut self, text: &str) -> Result<SessionReply, AIError> {
        let body = self.build_request(text);
        let request = self
            .endpoint
            .post("v1/messages")
            .header("x-api-key", self.endpoint.api_key())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&body);

        let response: AnthropicResponse = self.endpoint.send_json(request).await?;
        let reply = parse_response(response)?;
        log_usage(ProviderKind::Anthropic, &self.model, &reply.usage);

        self.history.push(Turn::user(text));
        self.history.push(Turn::model(reply.text.clone()));
        Ok(reply)
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn history(&self) -> &[Turn] {
        &self.history
    }
}

// ----- Anthropic API Types -----

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlock>,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
struct SystemBlock {
    #[serde(rename = "type")]
    kind: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Clone, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: String,
}

impl CacheControl {
    fn ephemeral() -> Self {
        Self {
            kind: "ephemeral".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

impl AnthropicMessage {
    fn new(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_creation_input_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: u32,
}
