//! Minimal OpenAI-compatible client for challenge generation.
//!
//! We only call chat.completions and request a strict JSON object.
//! Calls are instrumented and log model name, latency and token usage (not contents).
//!
//! NOTE: We never log the API key; previews of generated text are truncated.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::Prompts;
use crate::domain::{Challenge, ChallengeKind, ChallengeOrigin, Difficulty};
use crate::error::ProviderError;
use crate::util::{fill_template, preview};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub prompts: Prompts,
}

/// Shape the model is asked to return.
#[derive(Deserialize)]
struct Gen {
  topic: String,
  question: String,
  #[serde(default)]
  code_snippet: String,
  correct_answer: String,
  #[serde(default)]
  explanation: String,
  #[serde(rename = "type", default)]
  kind: ChallengeKind,
  #[serde(default)]
  options: Vec<String>,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model, prompts })
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, ProviderError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "c-arena-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(ProviderError::Status { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();
    if text.trim().is_empty() {
      return Err(ProviderError::EmptyCompletion);
    }

    Ok(serde_json::from_str::<T>(&text)?)
  }

  fn user_prompt(&self, difficulty: Difficulty, topic: Option<&str>) -> String {
    let topic_clause = match topic {
      Some(t) => fill_template(&self.prompts.topic_focus_template, &[("topic", t)]),
      None => self.prompts.random_topic_clause.clone(),
    };
    fill_template(
      &self.prompts.challenge_user_template,
      &[("difficulty", difficulty.as_str()), ("topic_clause", &topic_clause)],
    )
  }

  /// Generate one challenge. The record is validated by the caller.
  #[instrument(level = "info", skip(self), fields(%difficulty, model = %self.model))]
  pub async fn generate_challenge(
    &self,
    difficulty: Difficulty,
    topic: Option<&str>,
  ) -> Result<Challenge, ProviderError> {
    let user = self.user_prompt(difficulty, topic);
    let start = std::time::Instant::now();
    let result = self.chat_json::<Gen>(&self.prompts.challenge_system, &user, 0.8).await;
    let elapsed = start.elapsed();

    let gen = match result {
      Ok(g) => {
        info!(?elapsed, "Model response received successfully");
        g
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during challenge generation");
        return Err(e);
      }
    };

    let ch = Challenge {
      id: Uuid::new_v4().to_string(),
      topic: gen.topic,
      difficulty,
      kind: gen.kind,
      origin: ChallengeOrigin::Generated,
      question: gen.question,
      code_snippet: gen.code_snippet,
      correct_answer: gen.correct_answer,
      explanation: gen.explanation,
      options: match gen.kind {
        ChallengeKind::MultipleChoice => gen.options,
        ChallengeKind::ShortAnswer => Vec::new(),
      },
    };

    info!(
      challenge_id = %ch.id,
      topic = %ch.topic,
      question_preview = %preview(&ch.question, 40),
      "Challenge successfully generated"
    );
    Ok(ch)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
