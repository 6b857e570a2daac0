//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::battle::{Battle, FinalOutcome, Outcome, RoundStatus, Winner};
use crate::domain::{Challenge, ChallengeKind, ChallengeOrigin, Contestant, Difficulty, LogEntry};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartMatch {
        difficulty: Difficulty,
        topic: String,
    },
    SubmitAnswer {
        answer: String,
    },
    NextRound,
    Leave,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    State {
        snapshot: BattleSnapshot,
    },
    Progress {
        round: u64,
        value: f64,
    },
    Error {
        message: String,
    },
}

/// Challenge as shown to the player. The answer and explanation stay hidden
/// until the round is resolved.
#[derive(Debug, Serialize)]
pub struct ChallengeOut {
    pub id: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub kind: ChallengeKind,
    pub origin: ChallengeOrigin,
    pub question: String,
    pub code_snippet: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

pub fn to_out(c: &Challenge, reveal: bool) -> ChallengeOut {
    ChallengeOut {
        id: c.id.clone(),
        topic: c.topic.clone(),
        difficulty: c.difficulty,
        kind: c.kind,
        origin: c.origin,
        question: c.question.clone(),
        code_snippet: c.code_snippet.clone(),
        options: c.options.clone(),
        correct_answer: reveal.then(|| c.correct_answer.clone()),
        explanation: reveal.then(|| c.explanation.clone()),
    }
}

#[derive(Debug, Serialize)]
pub struct RoundResultOut {
    pub outcome: Outcome,
    pub winner: Winner,
    pub message: String,
    pub correct_answer: String,
    pub explanation: String,
}

/// Everything a host UI renders.
#[derive(Debug, Serialize)]
pub struct BattleSnapshot {
    pub round: u64,
    pub status: RoundStatus,
    pub difficulty: Difficulty,
    pub topic: String,
    pub player: Contestant,
    pub opponent: Contestant,
    pub loading: bool,
    pub challenge: Option<ChallengeOut>,
    pub progress: f64,
    pub logs: Vec<LogEntry>,
    pub result: Option<RoundResultOut>,
    #[serde(rename = "final")]
    pub final_outcome: Option<FinalOutcome>,
}

impl BattleSnapshot {
    pub fn of(b: &Battle) -> Self {
        let reveal = b.status() != RoundStatus::Playing;
        let result = match (b.outcome(), b.challenge()) {
            (Some(o), Some(c)) => Some(RoundResultOut {
                outcome: o,
                winner: o.winner(),
                message: o.message().to_string(),
                correct_answer: c.correct_answer.clone(),
                explanation: c.explanation.clone(),
            }),
            _ => None,
        };
        Self {
            round: b.round(),
            status: b.status(),
            difficulty: b.config().difficulty,
            topic: b.config().topic.clone(),
            player: b.player().clone(),
            opponent: b.opponent().clone(),
            loading: b.status() == RoundStatus::Playing && b.challenge().is_none(),
            challenge: b.challenge().map(|c| to_out(c, reveal)),
            progress: b.progress(),
            logs: b.logs().to_vec(),
            result,
            final_outcome: b.final_outcome(),
        }
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct ChallengeQuery {
    pub difficulty: Option<Difficulty>,
    pub topic: Option<String>,
}

#[derive(Serialize)]
pub struct DifficultyOut {
    pub name: Difficulty,
    pub base_duration_ms: u64,
}

#[derive(Serialize)]
pub struct CatalogOut {
    pub difficulties: Vec<DifficultyOut>,
    pub topics: Vec<&'static str>,
    pub random_topic: &'static str,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::BattleEvent;
    use crate::domain::MatchConfig;
    use crate::seeds::hard_fallback_challenge;

    fn battle() -> Battle {
        Battle::new(
            MatchConfig::new(Difficulty::Novice, "Random Mix").unwrap(),
            Contestant::player("User"),
            Contestant::opponent("Arena Core"),
        )
    }

    #[test]
    fn client_messages_parse() {
        let m: ClientWsMessage =
            serde_json::from_str(r#"{"type":"start_match","difficulty":"Expert","topic":"Random Mix"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::StartMatch { difficulty: Difficulty::Expert, .. }));
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"submit_answer","answer":"30"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SubmitAnswer { .. }));
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"next_round"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::NextRound));
    }

    #[test]
    fn answer_hidden_while_playing_and_revealed_after() {
        let mut b = battle();
        b.dispatch(BattleEvent::Start, 1);
        let snap = serde_json::to_value(BattleSnapshot::of(&b)).unwrap();
        assert_eq!(snap["loading"], true);
        assert_eq!(snap["status"], "PLAYING");
        assert!(snap["challenge"].is_null());

        b.dispatch(BattleEvent::ChallengeLoaded { round: 1, challenge: hard_fallback_challenge(Difficulty::Novice) }, 2);
        let snap = serde_json::to_value(BattleSnapshot::of(&b)).unwrap();
        assert_eq!(snap["loading"], false);
        assert!(snap["challenge"].get("correct_answer").is_none());
        assert!(snap["result"].is_null());

        b.dispatch(BattleEvent::Submit { answer: "30".into() }, 3);
        let snap = serde_json::to_value(BattleSnapshot::of(&b)).unwrap();
        assert_eq!(snap["status"], "RESULT");
        assert_eq!(snap["challenge"]["correct_answer"], "30");
        assert_eq!(snap["result"]["winner"], "player");
        assert_eq!(snap["result"]["message"], "Correct! Memory Safe.");
        assert_eq!(snap["result"]["explanation"], "Basic arithmetic addition.");
        assert_eq!(snap["player"]["score"], 100);
        assert!(snap["final"].is_null());
        assert_eq!(snap["logs"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn server_messages_are_tagged() {
        let v = serde_json::to_value(ServerWsMessage::Progress { round: 2, value: 12.5 }).unwrap();
        assert_eq!(v["type"], "progress");
        assert_eq!(v["round"], 2);
    }
}
