//! Gemini session.
//!
//! The system instruction is fixed once when the session is opened and sent
//! as its own field; history travels as `{role, parts: [{text}]}` contents
//! with roles `user` and `model`.
//!
//! The public `generateContent` endpoint keeps no conversation state between
//! calls, so the session object holds the contents and replays them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::transport::{log_usage, Endpoint};
use crate::domain::conversation::Role;
use crate::ports::{
    AIError, AISession, GenerationOptions, ProviderKind, SessionReply, SessionSpec, TokenUsage,
    Turn,
};

/// A conversation with a Gemini model.
#[derive(Debug)]
pub struct GeminiSession {
    endpoint: Endpoint,
    model: String,
    system_instruction: GeminiContent,
    generation: GenerationOptions,
    history: Vec<Turn>,
}

impl GeminiSession {
    pub fn new(endpoint: Endpoint, spec: SessionSpec) -> Self {
        let parts = [spec.system_prompt.cacheable, spec.system_prompt.dynamic]
            .into_iter()
            .filter(|text| !text.is_empty())
            .map(|text| GeminiPart { text })
            .collect();
        Self {
            endpoint,
            model: spec.model_id,
            system_instruction: GeminiContent { role: None, parts },
            generation: spec.generation,
            history: spec.prior_history,
        }
    }

    fn endpoint_path(&self) -> String {
        format!("models/{}:generateContent", self.model)
    }

    fn build_request(&self, text: &str) -> GeminiRequest {
        let mut contents: Vec<GeminiContent> = self.history.iter().map(content_for).collect();
        contents.push(content_for(&Turn::user(text)));

        GeminiRequest {
            system_instruction: (!self.system_instruction.parts.is_empty())
                .then(|| self.system_instruction.clone()),
            contents,
            generation_config: GeminiGenerationConfig {
                max_output_tokens: Some(self.generation.max_output_tokens),
                temperature: self.generation.temperature,
                response_mime_type: self
                    .generation
                    .json_output
                    .then(|| "application/json".to_string()),
            },
        }
    }
}

fn content_for(turn: &Turn) -> GeminiContent {
    GeminiContent {
        role: Some(
            match turn.role {
                Role::User => "user",
                Role::Model => "model",
            }
            .to_string(),
        ),
        parts: vec![GeminiPart {
            text: turn.text.clone(),
        }],
    }
}

fn parse_response(response: GeminiResponse) -> Result<SessionReply, AIError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => AIError::content_filtered(reason),
            None => AIError::parse("No candidates in response"),
        })?;

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(AIError::content_filtered("SAFETY"));
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AIError::parse("Empty candidate content"));
    }

    let usage = response
        .usage_metadata
        .map(|u| {
            TokenUsage::new(u.prompt_token_count, u.candidates_token_count)
                .with_cache(u.cached_content_token_count, 0)
        })
        .unwrap_or_default();

    Ok(SessionReply { text, usage })
}

#[async_trait]
impl AISession for GeminiSession {
    async fn send(&mut self, text: &str) -> Result<SessionReply, AIError> {
        let body = self.build_request(text);
        let request = self
            .endpoint
            .post(&self.endpoint_path())
            .header("x-goog-api-key", self.endpoint.api_key())
            .json(&body);

        let response: GeminiResponse = self.endpoint.send_json(request).await?;
        let reply = parse_response(response)?;
        log_usage(ProviderKind::Gemini, &self.model, &reply.usage);

        self.history.push(Turn::user(text));
        self.history.push(Turn::model(reply.text.clone()));
        Ok(reply)
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn history(&self) -> &[Turn] {
        &self.history
    }
}

// ----- Gemini API Types -----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    cached_content_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prompt::SystemPrompt;
    use reqwest::Client;
    use secrecy::Secret;
    use std::time::Duration;

    fn endpoint(base_url: &str) -> Endpoint {
        Endpoint::new(
            Client::new(),
            Secret::new("test-key".to_string()),
            base_url,
            Duration::from_secs(2),
        )
    }

    fn session() -> GeminiSession {
        let spec = SessionSpec::new("gemini-2.0-flash", SystemPrompt::new("rules", "student"))
            .with_history(vec![Turn::model("Should we stay in catering?")]);
        GeminiSession::new(endpoint("https://generativelanguage.googleapis.com/v1beta"), spec)
    }

    mod request {
        use super::*;

        #[test]
        fn system_instruction_carries_both_parts_in_order() {
            let json = serde_json::to_value(session().build_request("hi")).unwrap();
            let parts = &json["systemInstruction"]["parts"];
            assert_eq!(parts[0]["text"], "rules");
            assert_eq!(parts[1]["text"], "student");
            assert!(json["systemInstruction"].get("role").is_none());
        }

        #[test]
        fn contents_replay_history_then_new_message() {
            let json = serde_json::to_value(session().build_request("I say stay")).unwrap();
            let contents = json["contents"].as_array().unwrap();
            assert_eq!(contents.len(), 2);
            assert_eq!(contents[0]["role"], "model");
            assert_eq!(contents[1]["role"], "user");
            assert_eq!(contents[1]["parts"][0]["text"], "I say stay");
        }

        #[test]
        fn json_output_sets_mime_type() {
            let mut s = session();
            s.generation.json_output = true;
            let json = serde_json::to_value(s.build_request("x")).unwrap();
            assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        }

        #[test]
        fn path_names_model() {
            assert_eq!(session().endpoint_path(), "models/gemini-2.0-flash:generateContent");
        }
    }

    mod response {
        use super::*;

        #[test]
        fn joins_candidate_parts_and_reads_usage() {
            let raw = r#"{
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "there"}]}, "finishReason": "STOP"}],
                "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 8, "cachedContentTokenCount": 100}
            }"#;
            let reply = parse_response(serde_json::from_str(raw).unwrap()).unwrap();
            assert_eq!(reply.text, "Hello there");
            assert_eq!(reply.usage, TokenUsage::new(120, 8).with_cache(100, 0));
        }

        #[test]
        fn blocked_prompt_is_content_filtered() {
            let raw = r#"{"candidates": [], "promptFeedback": {"blockReason": "SAFETY"}}"#;
            let err = parse_response(serde_json::from_str(raw).unwrap()).unwrap_err();
            assert!(matches!(err, AIError::ContentFiltered { .. }));
        }

        #[test]
        fn empty_candidates_is_parse_error() {
            let err = parse_response(serde_json::from_str("{}").unwrap()).unwrap_err();
            assert!(matches!(err, AIError::Parse(_)));
        }
    }

    #[tokio::test]
    async fn failed_send_leaves_history_unchanged() {
        let spec = SessionSpec::new("gemini-2.0-flash", SystemPrompt::new("rules", ""));
        let mut s = GeminiSession::new(endpoint("http://127.0.0.1:1"), spec);
        let result = s.send("hello").await;
        assert!(result.is_err());
        assert!(s.history().is_empty());
    }
}
