//! Application state: local challenge bank, optional OpenAI client, match settings,
//! and the sourcing policy every session pulls challenges through.
//!
//! Sourcing policy:
//!   1. generate a fresh challenge via OpenAI when configured
//!   2. otherwise (or on failure) serve from the local bank (TOML entries + seeds)
//!   3. when both fail the caller substitutes the hard fallback

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use crate::config::{load_agent_config_from_env, AgentConfig, MatchSettings};
use crate::domain::{Challenge, Difficulty};
use crate::error::ProviderError;
use crate::openai::OpenAI;
use crate::seeds::seed_challenges;
use crate::source::{ChallengeSource, LocalBank};

pub struct AppState {
    pub bank: LocalBank,
    pub openai: Option<OpenAI>,
    pub settings: MatchSettings,
}

impl AppState {
    /// Build state from env: load config, seed the bank, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();

        let openai = OpenAI::from_env(cfg.prompts.clone());
        if let Some(oa) = &openai {
            info!(target: "arena_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
        } else {
            info!(target: "arena_backend", "OpenAI disabled (no OPENAI_API_KEY). Using local bank.");
        }

        Self::from_parts(&cfg, openai)
    }

    pub fn from_parts(cfg: &AgentConfig, openai: Option<OpenAI>) -> Self {
        Self {
            bank: LocalBank::from_config(&cfg.challenges, seed_challenges()),
            openai,
            settings: cfg.match_settings.clone(),
        }
    }

    /// Selection policy: OpenAI first, then the local bank.
    #[instrument(level = "info", skip(self), fields(%difficulty))]
    pub async fn choose_challenge(
        &self,
        difficulty: Difficulty,
        topic: Option<&str>,
    ) -> Result<Challenge, ProviderError> {
        if let Some(oa) = &self.openai {
            match oa.generate_challenge(difficulty, topic).await.and_then(|c| {
                c.validate()?;
                Ok(c)
            }) {
                Ok(c) => {
                    info!(target: "challenge", %difficulty, chosen = %c.id, source = "openai_generated_new", "Generated fresh challenge");
                    return Ok(c);
                }
                Err(e) => {
                    error!(target: "challenge", %difficulty, error = %e, "OpenAI generation failed; trying local bank");
                }
            }
        }

        let c = self.bank.pick(difficulty, topic).await?;
        warn!(target: "challenge", %difficulty, chosen = %c.id, source = "local_bank", "Serving local challenge");
        Ok(c)
    }
}

#[async_trait]
impl ChallengeSource for AppState {
    async fn generate(&self, difficulty: Difficulty, topic: Option<&str>) -> Result<Challenge, ProviderError> {
        self.choose_challenge(difficulty, topic).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::domain::ChallengeOrigin;

    #[tokio::test]
    async fn without_openai_the_bank_serves() {
        let state = AppState::from_parts(&AgentConfig::default(), None);
        let c = state.choose_challenge(Difficulty::Intermediate, None).await.unwrap();
        assert_eq!(c.origin, ChallengeOrigin::Seed);
        assert_eq!(c.difficulty, Difficulty::Intermediate);
    }

    #[tokio::test]
    async fn failing_openai_falls_through_to_bank() {
        let oa = OpenAI {
            client: reqwest::Client::new(),
            api_key: "test".into(),
            base_url: "http://127.0.0.1:9".into(),
            model: "gpt-test".into(),
            prompts: Prompts::default(),
        };
        let state = AppState::from_parts(&AgentConfig::default(), Some(oa));
        let c = state.choose_challenge(Difficulty::Expert, Some("Bitwise Operators")).await.unwrap();
        assert_eq!(c.topic, "Bitwise Operators");
    }
}
