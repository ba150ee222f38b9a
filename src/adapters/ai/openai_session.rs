//! OpenAI session.
//!
//! Stateless per call: every send resends `[system, ...turns, user]` to the
//! chat completions endpoint. The two prompt parts are joined into the one
//! system message, cacheable part first, which lets OpenAI's automatic prefix
//! caching apply.
//!
//! Reasoning models (`o1`, `o3`, `o4` families) take `max_completion_tokens`
//! and reject `temperature`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::transport::{log_usage, Endpoint};
use crate::domain::conversation::Role;
use crate::ports::{
    AIError, AISession, GenerationOptions, ProviderKind, SessionReply, SessionSpec, TokenUsage,
    Turn,
};

/// A conversation with an OpenAI chat model.
#[derive(Debug)]
pub struct OpenAiSession {
    endpoint: Endpoint,
    model: String,
    system_prompt: String,
    generation: GenerationOptions,
    history: Vec<Turn>,
}

impl OpenAiSession {
    pub fn new(endpoint: Endpoint, spec: SessionSpec) -> Self {
        Self {
            endpoint,
            model: spec.model_id,
            system_prompt: spec.system_prompt.full(),
            generation: spec.generation,
            history: spec.prior_history,
        }
    }

    fn build_request(&self, text: &str) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if !self.system_prompt.is_empty() {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: self.system_prompt.clone(),
            });
        }
        messages.extend(self.history.iter().map(|turn| OpenAIMessage {
            role: match turn.role {
                Role::User => "user",
                Role::Model => "assistant",
            }
            .to_string(),
            content: turn.text.clone(),
        }));
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: text.to_string(),
        });

        let reasoning = is_reasoning_model(&self.model);
        let max_output = Some(self.generation.max_output_tokens);

        OpenAIRequest {
            model: self.model.clone(),
            messages,
            max_tokens: if reasoning { None } else { max_output },
            max_completion_tokens: if reasoning { max_output } else { None },
            temperature: self.generation.temperature.filter(|_| !reasoning),
            response_format: self.generation.json_output.then(|| ResponseFormat {
                kind: "json_object".to_string(),
            }),
        }
    }
}

fn is_reasoning_model(model: &str) -> bool {
    let id = model.trim().to_ascii_lowercase();
    ["o1", "o3", "o4"].iter().any(|p| id.starts_with(p))
}

fn parse_response(response: OpenAIResponse) -> Result<SessionReply, AIError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AIError::parse("No choices in response"))?;

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(AIError::content_filtered("content_filter"));
    }

    let text = choice
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AIError::parse("Empty message content"))?;

    let usage = response
        .usage
        .map(|u| {
            let cached = u.prompt_tokens_details.map(|d| d.cached_tokens).unwrap_or(0);
            TokenUsage::new(u.prompt_tokens, u.completion_tokens).with_cache(cached, 0)
        })
        .unwrap_or_default();

    Ok(SessionReply { text, usage })
}

#[async_trait]
impl AISession for OpenAiSession {
    async fn send(&mut self, text: &str) -> Result<SessionReply, AIError> {
        let body = self.build_request(text);
        let request = self
            .endpoint
            .post("chat/completions")
            .header("Authorization", format!("Bearer {}", self.endpoint.api_key()))
            .json(&body);

        let response: OpenAIResponse = self.endpoint.send_json(request).await?;
        let reply = parse_response(response)?;
        log_usage(ProviderKind::OpenAi, &self.model, &reply.usage);

        self.history.push(Turn::user(text));
        self.history.push(Turn::model(reply.text.clone()));
        Ok(reply)
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn history(&self) -> &[Turn] {
        &self.history
    }
}

// ----- OpenAI API Types -----

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: u32,
}
