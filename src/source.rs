//! Challenge sources: the async contract the session pulls from, the local bank,
//! and the fetch wrapper that turns every failure into the fallback challenge.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::ChallengeCfg;
use crate::domain::{Challenge, ChallengeKind, ChallengeOrigin, Difficulty};
use crate::error::ProviderError;
use crate::seeds::hard_fallback_challenge;

/// Anything able to produce a challenge for a difficulty and optional topic.
#[async_trait]
pub trait ChallengeSource: Send + Sync {
  async fn generate(&self, difficulty: Difficulty, topic: Option<&str>) -> Result<Challenge, ProviderError>;
}

/// One attempt against `source`, bounded by `limit`. Rejections, timeouts and
/// malformed records all resolve to the fixed fallback challenge.
#[instrument(level = "info", skip(source), fields(%difficulty, topic = topic.unwrap_or("<random>")))]
pub async fn fetch_or_fallback(
  source: &dyn ChallengeSource,
  difficulty: Difficulty,
  topic: Option<&str>,
  limit: Duration,
) -> Challenge {
  let result = match tokio::time::timeout(limit, source.generate(difficulty, topic)).await {
    Ok(r) => r,
    Err(_) => Err(ProviderError::Timeout(limit)),
  };
  let checked = result.and_then(|c| {
    c.validate()?;
    Ok(c)
  });
  match checked {
    Ok(c) => {
      info!(target: "challenge", id = %c.id, origin = ?c.origin, topic = %c.topic, "Challenge sourced");
      c
    }
    Err(e) => {
      error!(target: "challenge", %difficulty, error = %e, "Challenge sourcing failed; using hard fallback");
      hard_fallback_challenge(difficulty)
    }
  }
}

/// In-memory bank made of TOML entries and built-in seeds.
pub struct LocalBank {
  challenges: Vec<Challenge>,
  last_by_diff: RwLock<HashMap<Difficulty, String>>,
}

impl LocalBank {
  pub fn new(challenges: Vec<Challenge>) -> Self {
    Self { challenges, last_by_diff: RwLock::new(HashMap::new()) }
  }

  /// Build the bank from config entries (malformed ones are skipped) plus `seeds`.
  /// Config entries win on id collisions.
  pub fn from_config(entries: &[ChallengeCfg], seeds: Vec<Challenge>) -> Self {
    let mut challenges: Vec<Challenge> = Vec::new();
    for cc in entries {
      let options = cc.options.clone().unwrap_or_default();
      let kind = cc.kind.unwrap_or(if options.is_empty() {
        ChallengeKind::ShortAnswer
      } else {
        ChallengeKind::MultipleChoice
      });
      let c = Challenge {
        id: cc.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()),
        topic: cc.topic.clone(),
        difficulty: cc.difficulty,
        kind,
        origin: ChallengeOrigin::LocalBank,
        question: cc.question.clone(),
        code_snippet: cc.code_snippet.clone().unwrap_or_default(),
        correct_answer: cc.correct_answer.clone(),
        explanation: cc.explanation.clone().unwrap_or_default(),
        options,
      };
      if let Err(e) = c.validate() {
        error!(target: "challenge", id = %c.id, difficulty = %c.difficulty, error = %e, "Skipping bank item");
        continue;
      }
      challenges.push(c);
    }
    for s in seeds {
      if !challenges.iter().any(|c| c.id == s.id) {
        challenges.push(s);
      }
    }

    for d in Difficulty::ALL {
      let bank = challenges.iter().filter(|c| c.difficulty == d && c.origin == ChallengeOrigin::LocalBank).count();
      let seed = challenges.iter().filter(|c| c.difficulty == d && c.origin == ChallengeOrigin::Seed).count();
      info!(target: "challenge", difficulty = %d, local_bank = bank, seed, "Startup challenge inventory");
    }
    Self::new(challenges)
  }

  pub fn len(&self) -> usize {
    self.challenges.len()
  }

  /// Random pick by difficulty, narrowed to `topic` when the bank covers it,
  /// never serving the same id twice in a row when there is a choice.
  #[instrument(level = "debug", skip(self), fields(%difficulty))]
  pub async fn pick(&self, difficulty: Difficulty, topic: Option<&str>) -> Result<Challenge, ProviderError> {
    let by_diff: Vec<&Challenge> = self.challenges.iter().filter(|c| c.difficulty == difficulty).collect();
    if by_diff.is_empty() {
      return Err(ProviderError::Exhausted { difficulty: difficulty.to_string() });
    }

    let mut pool = by_diff.clone();
    if let Some(t) = topic {
      let on_topic: Vec<&Challenge> = by_diff.iter().copied().filter(|c| c.topic.eq_ignore_ascii_case(t)).collect();
      if on_topic.is_empty() {
        warn!(target: "challenge", %difficulty, topic = t, "No local challenge for topic; serving any topic");
      } else {
        pool = on_topic;
      }
    }

    let last = { self.last_by_diff.read().await.get(&difficulty).cloned() };
    if let Some(last_id) = &last {
      if pool.len() > 1 {
        pool.retain(|c| &c.id != last_id);
      }
    }

    let chosen = {
      let mut rng = rand::thread_rng();
      pool.choose(&mut rng).map(|c| (*c).clone())
    };
    let chosen = chosen.ok_or_else(|| ProviderError::Exhausted { difficulty: difficulty.to_string() })?;
    self.last_by_diff.write().await.insert(difficulty, chosen.id.clone());
    Ok(chosen)
  }
}


#[cfg(test)]
mod tests {
  use super::testing::*;
  use super::*;
  use crate::seeds::{seed_challenges, FALLBACK_ID};

  fn cfg_entry(id: &str, topic: &str, options: Option<Vec<&str>>) -> ChallengeCfg {
    ChallengeCfg {
      id: Some(id.into()),
      difficulty: Difficulty::Expert,
      topic: topic.into(),
      question: "q?".into(),
      code_snippet: None,
      correct_answer: "b".into(),
      explanation: None,
      kind: None,
      options: options.map(|o| o.into_iter().map(String::from).collect()),
    }
  }

  #[test]
  fn malformed_bank_entries_are_skipped() {
    let entries = vec![
      cfg_entry("ok", "Bitwise Operators", Some(vec!["a", "b", "c", "d"])),
      cfg_entry("bad", "Bitwise Operators", Some(vec!["a", "c"])),
    ];
    let bank = LocalBank::from_config(&entries, Vec::new());
    assert_eq!(bank.len(), 1);
  }

  #[tokio::test]
  async fn pick_prefers_topic_and_avoids_repeats() {
    let entries = vec![
      cfg_entry("x1", "Bitwise Operators", None),
      cfg_entry("x2", "Bitwise Operators", None),
      cfg_entry("y1", "Function Pointers", None),
    ];
    let bank = LocalBank::from_config(&entries, Vec::new());

    let mut prev = bank.pick(Difficulty::Expert, Some("bitwise operators")).await.unwrap();
    for _ in 0..10 {
      let next = bank.pick(Difficulty::Expert, Some("Bitwise Operators")).await.unwrap();
      assert_eq!(next.topic, "Bitwise Operators");
      assert_ne!(next.id, prev.id);
      prev = next;
    }
  }

  #[tokio::test]
  async fn uncovered_topic_falls_back_to_difficulty() {
    let bank = LocalBank::from_config(&[], seed_challenges());
    let c = bank.pick(Difficulty::Novice, Some("Variadic Functions")).await.unwrap();
    assert_eq!(c.difficulty, Difficulty::Novice);
  }

  #[tokio::test]
  async fn empty_bank_is_exhausted() {
    let bank = LocalBank::new(Vec::new());
    let err = bank.pick(Difficulty::Novice, None).await.unwrap_err();
    assert!(matches!(err, ProviderError::Exhausted { .. }));
  }

  #[tokio::test]
  async fn failure_resolves_to_fallback() {
    let source = Scripted::new(Vec::new());
    let c = fetch_or_fallback(&source, Difficulty::Novice, None, Duration::from_secs(1)).await;
    assert_eq!(c.id, FALLBACK_ID);
  }

  #[tokio::test]
  async fn malformed_result_resolves_to_fallback() {
    let mut bad = short("mc", "B");
    bad.kind = ChallengeKind::MultipleChoice;
    bad.options = vec!["A".into(), "B".into()];
    let source = Scripted::new(vec![bad]);
    let c = fetch_or_fallback(&source, Difficulty::Novice, None, Duration::from_secs(1)).await;
    assert_eq!(c.id, FALLBACK_ID);
  }

  #[tokio::test(start_paused = true)]
  async fn hang_resolves_to_fallback_after_limit() {
    let started = tokio::time::Instant::now();
    let c = fetch_or_fallback(&Hanging, Difficulty::Expert, Some("Pointers"), Duration::from_secs(25)).await;
    assert_eq!(c.id, FALLBACK_ID);
    assert_eq!(c.difficulty, Difficulty::Expert);
    assert!(started.elapsed() >= Duration::from_secs(25));
  }

  #[tokio::test]
  async fn good_result_passes_through() {
    let source = Scripted::new(vec![short("g1", "42")]);
    let c = fetch_or_fallback(&source, Difficulty::Novice, Some("Pointers"), Duration::from_secs(1)).await;
    assert_eq!(c.id, "g1");
    assert_eq!(source.topics.lock().unwrap().as_slice(), &[Some("Pointers".to_string())]);
  }
}
