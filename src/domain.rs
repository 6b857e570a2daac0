//! Domain models: difficulty, challenges, contestants, battle log and the match setup.

use serde::{Deserialize, Serialize};

use crate::error::{ChallengeError, MatchError};
use crate::util::normalize_answer;

/// Health every contestant starts the match with.
pub const MAX_HEALTH: u32 = 3;

/// Lobby sentinel: let the provider pick the topic.
pub const RANDOM_MIX: &str = "Random Mix";

/// Topic catalog offered by the lobby. The first entry is the sentinel.
pub const TOPICS: [&str; 20] = [
  RANDOM_MIX,
  "Variables & Data Types",
  "Operators & Expressions",
  "Control Flow (If/Switch/Loops)",
  "Functions & Recursion",
  "Arrays & Multidimensional Arrays",
  "Pointers & Memory Addressing",
  "Strings & String Library",
  "Structures & Unions",
  "Dynamic Memory Allocation",
  "File Input/Output",
  "Preprocessor Directives",
  "Bitwise Operators",
  "Type Casting & Storage Classes",
  "Function Pointers",
  "Command Line Arguments",
  "Error Handling & Errno",
  "Standard Library Functions",
  "Variadic Functions",
  "Complex Memory Layouts",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
  #[serde(alias = "novice", alias = "NOVICE")]
  Novice,
  #[serde(alias = "intermediate", alias = "INTERMEDIATE")]
  Intermediate,
  #[serde(alias = "expert", alias = "EXPERT")]
  Expert,
}

impl Difficulty {
  pub const ALL: [Difficulty; 3] = [Difficulty::Novice, Difficulty::Intermediate, Difficulty::Expert];

  pub fn as_str(self) -> &'static str {
    match self {
      Difficulty::Novice => "Novice",
      Difficulty::Intermediate => "Intermediate",
      Difficulty::Expert => "Expert",
    }
  }
}

impl std::fmt::Display for Difficulty {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// How the player answers a challenge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeKind {
  /// Free text typed by the player.
  #[default]
  ShortAnswer,
  /// One of exactly four options.
  MultipleChoice,
}

/// Where did we get the challenge from?
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeOrigin {
  LocalBank, // user-provided TOML bank
  Generated, // OpenAI-compatible provider
  Seed,      // built-in seeds
  Fallback,  // fixed last-resort challenge
}

/// One question for one round. Never mutated after creation.
#[derive(Clone, Debug, Serialize)]
pub struct Challenge {
  pub id: String,
  pub topic: String,
  pub difficulty: Difficulty,
  pub kind: ChallengeKind,
  pub origin: ChallengeOrigin,

  pub question: String,
  pub code_snippet: String,
  pub correct_answer: String,
  pub explanation: String,
  pub options: Vec<String>,
}

impl Challenge {
  /// Check the record shape before it reaches a round.
  pub fn validate(&self) -> Result<(), ChallengeError> {
    if self.question.trim().is_empty() {
      return Err(ChallengeError::MissingField("question"));
    }
    if self.correct_answer.trim().is_empty() {
      return Err(ChallengeError::MissingField("correct_answer"));
    }
    if self.kind == ChallengeKind::MultipleChoice {
      if self.options.len() != 4 {
        return Err(ChallengeError::OptionCount(self.options.len()));
      }
      let expected = normalize_answer(&self.correct_answer);
      if !self.options.iter().any(|o| normalize_answer(o) == expected) {
        return Err(ChallengeError::AnswerNotInOptions);
      }
    }
    Ok(())
  }

  /// Case- and surrounding-whitespace-insensitive comparison.
  pub fn is_correct(&self, answer: &str) -> bool {
    normalize_answer(answer) == normalize_answer(&self.correct_answer)
  }
}

#[derive(Clone, Debug, Serialize)]
pub struct Contestant {
  pub name: String,
  pub score: u32,
  pub health: u32,
  pub avatar: String,
  pub is_ai: bool,
}

impl Contestant {
  pub fn player(name: impl Into<String>) -> Self {
    Self { name: name.into(), score: 0, health: MAX_HEALTH, avatar: "👤".into(), is_ai: false }
  }

  pub fn opponent(name: impl Into<String>) -> Self {
    Self { name: name.into(), score: 0, health: MAX_HEALTH, avatar: "🤖".into(), is_ai: true }
  }

  pub fn add_score(&mut self, delta: i64) {
    self.score = (i64::from(self.score) + delta).max(0) as u32;
  }

  pub fn take_damage(&mut self) {
    self.health = self.health.saturating_sub(1);
  }

  pub fn is_down(&self) -> bool {
    self.health == 0
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
  Info,
  Success,
  Damage,
  Ai,
}

#[derive(Clone, Debug, Serialize)]
pub struct LogEntry {
  pub message: String,
  pub category: LogCategory,
  /// Milliseconds since the Unix epoch.
  pub timestamp: u64,
}

/// Lobby choice, fixed for the whole match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchConfig {
  pub difficulty: Difficulty,
  pub topic: String,
}

impl MatchConfig {
  pub fn new(difficulty: Difficulty, topic: &str) -> Result<Self, MatchError> {
    let topic = topic.trim();
    match TOPICS.iter().find(|t| t.eq_ignore_ascii_case(topic)) {
      Some(t) => Ok(Self { difficulty, topic: (*t).to_string() }),
      None => Err(MatchError::UnknownTopic(topic.to_string())),
    }
  }

  /// Topic to hand to the provider; `None` for the sentinel.
  pub fn topic_filter(&self) -> Option<&str> {
    if self.topic == RANDOM_MIX { None } else { Some(self.topic.as_str()) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn mc(options: &[&str], answer: &str) -> Challenge {
    Challenge {
      id: "t".into(),
      topic: "Pointers".into(),
      difficulty: Difficulty::Novice,
      kind: ChallengeKind::MultipleChoice,
      origin: ChallengeOrigin::Seed,
      question: "q?".into(),
      code_snippet: String::new(),
      correct_answer: answer.into(),
      explanation: String::new(),
      options: options.iter().map(|s| s.to_string()).collect(),
    }
  }

  #[test]
  fn multiple_choice_needs_four_options() {
    let c = mc(&["A", "B", "C"], "B");
    assert_eq!(c.validate(), Err(ChallengeError::OptionCount(3)));
  }

  #[test]
  fn multiple_choice_answer_must_be_an_option() {
    let c = mc(&["A", "B", "C", "D"], "E");
    assert_eq!(c.validate(), Err(ChallengeError::AnswerNotInOptions));

    let c = mc(&["A", " b ", "C", "D"], "B");
    assert!(c.validate().is_ok());
  }

  #[test]
  fn empty_answer_is_rejected() {
    let mut c = mc(&["A", "B", "C", "D"], "B");
    c.correct_answer = "  ".into();
    assert_eq!(c.validate(), Err(ChallengeError::MissingField("correct_answer")));
  }

  #[test]
  fn answers_compare_normalized() {
    let c = mc(&["A", "B", "C", "D"], "B");
    assert!(c.is_correct("b"));
    assert!(c.is_correct("  B\n"));
    assert!(!c.is_correct("C"));
  }

  #[test]
  fn score_is_floored_and_health_clamped() {
    let mut p = Contestant::player("User");
    p.add_score(-50);
    assert_eq!(p.score, 0);
    p.add_score(100);
    p.add_score(-50);
    assert_eq!(p.score, 50);

    for _ in 0..5 {
      p.take_damage();
    }
    assert_eq!(p.health, 0);
    assert!(p.is_down());
  }

  #[test]
  fn random_mix_has_no_topic_filter() {
    let cfg = MatchConfig::new(Difficulty::Expert, "random mix").unwrap();
    assert_eq!(cfg.topic, RANDOM_MIX);
    assert_eq!(cfg.topic_filter(), None);

    let cfg = MatchConfig::new(Difficulty::Expert, "Function Pointers").unwrap();
    assert_eq!(cfg.topic_filter(), Some("Function Pointers"));
  }

  #[test]
  fn unknown_topic_is_refused() {
    let err = MatchConfig::new(Difficulty::Novice, "Rust Lifetimes").unwrap_err();
    assert_eq!(err, MatchError::UnknownTopic("Rust Lifetimes".into()));
  }

  #[test]
  fn difficulty_accepts_lowercase() {
    let d: Difficulty = serde_json::from_str("\"expert\"").unwrap();
    assert_eq!(d, Difficulty::Expert);
    assert_eq!(serde_json::to_string(&Difficulty::Novice).unwrap(), "\"Novice\"");
  }
}
