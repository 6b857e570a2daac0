//! Loading agent configuration (prompts, optional challenge bank, match settings) from TOML.
//!
//! See `AgentConfig`, `Prompts` and `MatchSettings` for expected schema.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{ChallengeKind, Difficulty};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub challenges: Vec<ChallengeCfg>,
  #[serde(default, rename = "match")]
  pub match_settings: MatchSettings,
}

/// Challenge entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ChallengeCfg {
  #[serde(default)] pub id: Option<String>,
  pub difficulty: Difficulty,
  pub topic: String,
  pub question: String,
  #[serde(default)] pub code_snippet: Option<String>,
  pub correct_answer: String,
  #[serde(default)] pub explanation: Option<String>,
  #[serde(default)] pub kind: Option<ChallengeKind>,
  #[serde(default)] pub options: Option<Vec<String>>,
}

/// Prompts used by the OpenAI-compatible client.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub challenge_system: String,
  /// Placeholders: `{difficulty}`, `{topic_clause}`.
  pub challenge_user_template: String,
  /// Placeholder: `{topic}`.
  pub topic_focus_template: String,
  pub random_topic_clause: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      challenge_system: "You write short C programming quiz challenges. Respond ONLY with strict JSON.".into(),
      challenge_user_template: concat!(
        "Generate a unique, single C programming challenge for a {difficulty} level player.\n",
        "{topic_clause}\n\n",
        "Constraints:\n",
        "- Code snippets should be valid C.\n",
        "- Questions should test understanding of output, memory layout, syntax, or potential bugs (segfaults).\n",
        "- If specific topics like \"Pointers\" are chosen, ensure the question involves pointer arithmetic or dereferencing.\n",
        "- Keep answers concise.\n\n",
        "Return JSON with fields: topic, question, code_snippet, correct_answer, explanation, ",
        "type (\"SHORT_ANSWER\" or \"MULTIPLE_CHOICE\") and options (exactly 4 strings when type is ",
        "MULTIPLE_CHOICE, one of them equal to correct_answer; otherwise an empty array)."
      )
      .into(),
      topic_focus_template: "Focus specifically on the topic: {topic}.".into(),
      random_topic_clause: concat!(
        "Choose a random topic from: Basic Syntax, Control Flow, Functions, Pointers, Arrays, Strings, ",
        "Structs, Unions, Dynamic Memory, Bitwise Ops, Preprocessor, File I/O, Advanced Pointers, Standard Library."
      )
      .into(),
    }
  }
}

/// Per-match knobs shared by every session of this process.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
  pub player_name: String,
  pub opponent_name: String,
  /// Upper bound for one challenge fetch; past it the fallback challenge is used.
  pub fetch_timeout_secs: u64,
}

impl Default for MatchSettings {
  fn default() -> Self {
    Self { player_name: "User".into(), opponent_name: "Arena Core".into(), fetch_timeout_secs: 25 }
  }
}

impl MatchSettings {
  pub fn fetch_timeout(&self) -> Duration {
    Duration::from_secs(self.fetch_timeout_secs.max(1))
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "arena_backend", %path, bank = cfg.challenges.len(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "arena_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "arena_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
