//! Battle state machine.
//!
//! Every event goes through `Battle::transition`, a pure function of the
//! current state that either rejects the event or returns the effects to apply
//! and the commands the session must run (fetch, arm, cancel). `dispatch`
//! applies the effects and derives GAME_OVER from health after each one.
//!
//! Round ids: every requested round gets a fresh id. Fetch results and clock
//! signals carry the id they were started for and are dropped on mismatch.

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{Challenge, Contestant, LogCategory, LogEntry, MatchConfig};

pub const WIN_POINTS: i64 = 100;
pub const WRONG_PENALTY: i64 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
  Playing,
  Result,
  GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
  Player,
  Ai,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
  PlayerWin,
  /// Wrong answer: score penalty plus a lost round.
  PlayerWrong,
  /// Opponent finished first.
  AiWin,
}

impl Outcome {
  pub fn winner(self) -> Winner {
    match self {
      Outcome::PlayerWin => Winner::Player,
      Outcome::PlayerWrong | Outcome::AiWin => Winner::Ai,
    }
  }

  pub fn message(self) -> &'static str {
    match self {
      Outcome::PlayerWin => "Correct! Memory Safe.",
      Outcome::PlayerWrong => "Segmentation Fault (Wrong Answer)",
      Outcome::AiWin => "Too Slow! AI compiled first.",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
  Player,
  Opponent,
}

#[derive(Clone, Debug)]
pub enum BattleEvent {
  Start,
  ChallengeLoaded { round: u64, challenge: Challenge },
  Submit { answer: String },
  ClockExpired { round: u64 },
  Advance,
}

impl BattleEvent {
  fn name(&self) -> &'static str {
    match self {
      BattleEvent::Start => "start",
      BattleEvent::ChallengeLoaded { .. } => "challenge_loaded",
      BattleEvent::Submit { .. } => "submit",
      BattleEvent::ClockExpired { .. } => "clock_expired",
      BattleEvent::Advance => "advance",
    }
  }
}

#[derive(Clone, Debug)]
pub enum Effect {
  Score { side: Side, delta: i64 },
  Damage { side: Side },
  Log { category: LogCategory, message: String },
  BeginRound { round: u64 },
  SetChallenge(Challenge),
  Progress(f64),
  Resolve(Outcome),
}

/// Work the session performs on behalf of the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
  FetchChallenge { round: u64 },
  ArmClock { round: u64 },
  CancelClock,
}

#[derive(Clone, Debug)]
pub struct Transition {
  pub next: RoundStatus,
  pub effects: Vec<Effect>,
  pub commands: Vec<Command>,
}

/// Final tally exposed once the match is over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FinalOutcome {
  pub is_win: bool,
  pub player_score: u32,
  pub opponent_score: u32,
}

#[derive(Clone, Debug)]
pub struct Battle {
  config: MatchConfig,
  status: RoundStatus,
  round: u64,
  player: Contestant,
  opponent: Contestant,
  challenge: Option<Challenge>,
  progress: f64,
  outcome: Option<Outcome>,
  logs: Vec<LogEntry>,
}

fn wrong_answer_log(answer: &str, opponent: &str) -> String {
  format!("Incorrect answer \"{}\". {} takes the round.", answer.trim(), opponent)
}

impl Battle {
  pub fn new(config: MatchConfig, player: Contestant, opponent: Contestant) -> Self {
    Self {
      config,
      status: RoundStatus::Playing,
      round: 0,
      player,
      opponent,
      challenge: None,
      progress: 0.0,
      outcome: None,
      logs: Vec::new(),
    }
  }

  pub fn config(&self) -> &MatchConfig { &self.config }
  pub fn status(&self) -> RoundStatus { self.status }
  pub fn round(&self) -> u64 { self.round }
  pub fn player(&self) -> &Contestant { &self.player }
  pub fn opponent(&self) -> &Contestant { &self.opponent }
  pub fn challenge(&self) -> Option<&Challenge> { self.challenge.as_ref() }
  pub fn progress(&self) -> f64 { self.progress }
  pub fn outcome(&self) -> Option<Outcome> { self.outcome }
  pub fn logs(&self) -> &[LogEntry] { &self.logs }

  pub fn final_outcome(&self) -> Option<FinalOutcome> {
    (self.status == RoundStatus::GameOver).then(|| FinalOutcome {
      is_win: self.player.health > 0,
      player_score: self.player.score,
      opponent_score: self.opponent.score,
    })
  }

  fn contestant_mut(&mut self, side: Side) -> &mut Contestant {
    match side {
      Side::Player => &mut self.player,
      Side::Opponent => &mut self.opponent,
    }
  }

  /// Decide what `event` does in the current state; `None` rejects it.
  pub fn transition(&self, event: &BattleEvent) -> Option<Transition> {
    let opp = self.opponent.name.as_str();
    match (self.status, event) {
      (RoundStatus::Playing, BattleEvent::Start) if self.round == 0 => {
        let round = 1;
        Some(Transition {
          next: RoundStatus::Playing,
          effects: vec![
            Effect::BeginRound { round },
            Effect::Log {
              category: LogCategory::Info,
              message: format!("Match started: {} / {}.", self.config.difficulty, self.config.topic),
            },
          ],
          commands: vec![Command::FetchChallenge { round }],
        })
      }

      (RoundStatus::Playing, BattleEvent::ChallengeLoaded { round, challenge })
        if *round == self.round && self.challenge.is_none() =>
      {
        Some(Transition {
          next: RoundStatus::Playing,
          effects: vec![
            Effect::Progress(0.0),
            Effect::Log { category: LogCategory::Info, message: format!("New challenge loaded: {}", challenge.topic) },
            Effect::SetChallenge(challenge.clone()),
          ],
          commands: vec![Command::ArmClock { round: *round }],
        })
      }

      (RoundStatus::Playing, BattleEvent::Submit { answer }) => {
        let challenge = self.challenge.as_ref()?;
        if challenge.is_correct(answer) {
          Some(Transition {
            next: RoundStatus::Result,
            effects: vec![
              Effect::Score { side: Side::Player, delta: WIN_POINTS },
              Effect::Damage { side: Side::Opponent },
              Effect::Log {
                category: LogCategory::Success,
                message: format!("{} submitted correct answer. {} took damage.", self.player.name, opp),
              },
              Effect::Resolve(Outcome::PlayerWin),
            ],
            commands: vec![Command::CancelClock],
          })
        } else {
          Some(Transition {
            next: RoundStatus::Result,
            effects: vec![
              Effect::Score { side: Side::Player, delta: -WRONG_PENALTY },
              Effect::Log { category: LogCategory::Damage, message: wrong_answer_log(answer, opp) },
              Effect::Score { side: Side::Opponent, delta: WIN_POINTS },
              Effect::Damage { side: Side::Player },
              Effect::Resolve(Outcome::PlayerWrong),
            ],
            commands: vec![Command::CancelClock],
          })
        }
      }

      (RoundStatus::Playing, BattleEvent::ClockExpired { round })
        if *round == self.round && self.challenge.is_some() =>
      {
        Some(Transition {
          next: RoundStatus::Result,
          effects: vec![
            Effect::Progress(100.0),
            Effect::Score { side: Side::Opponent, delta: WIN_POINTS },
            Effect::Damage { side: Side::Player },
            Effect::Log { category: LogCategory::Ai, message: format!("{} solved the challenge first.", opp) },
            Effect::Resolve(Outcome::AiWin),
          ],
          commands: vec![Command::CancelClock],
        })
      }

      (RoundStatus::Result, BattleEvent::Advance) if !self.player.is_down() && !self.opponent.is_down() => {
        let round = self.round + 1;
        Some(Transition {
          next: RoundStatus::Playing,
          effects: vec![
            Effect::BeginRound { round },
            Effect::Log { category: LogCategory::Info, message: format!("Round {} requested.", round) },
          ],
          commands: vec![Command::CancelClock, Command::FetchChallenge { round }],
        })
      }

      _ => None,
    }
  }

  /// Run `event` through the state machine. `None` means it was ignored.
  pub fn dispatch(&mut self, event: BattleEvent, now_ms: u64) -> Option<Vec<Command>> {
    let Some(t) = self.transition(&event) else {
      debug!(target: "battle", status = ?self.status, round = self.round, event = event.name(), "Event ignored");
      return None;
    };
    let from = self.status;
    self.status = t.next;
    for effect in t.effects {
      self.apply(effect, now_ms);
    }
    info!(target: "battle", round = self.round, ?from, to = ?self.status, event = event.name(), "Battle transition");
    Some(t.commands)
  }

  fn apply(&mut self, effect: Effect, now_ms: u64) {
    match effect {
      Effect::Score { side, delta } => self.contestant_mut(side).add_score(delta),
      Effect::Damage { side } => self.contestant_mut(side).take_damage(),
      Effect::Log { category, message } => self.logs.push(LogEntry { message, category, timestamp: now_ms }),
      Effect::BeginRound { round } => {
        self.round = round;
        self.challenge = None;
        self.outcome = None;
        self.progress = 0.0;
      }
      Effect::SetChallenge(c) => self.challenge = Some(c),
      Effect::Progress(p) => self.progress = p.clamp(self.progress, 100.0),
      Effect::Resolve(o) => self.outcome = Some(o),
    }
    if self.player.is_down() || self.opponent.is_down() {
      self.status = RoundStatus::GameOver;
    }
  }

  /// Clock tick for `round`. Ignored unless that round is live; never moves backwards.
  pub fn record_progress(&mut self, round: u64, value: f64) -> bool {
    if self.status != RoundStatus::Playing || round != self.round || self.challenge.is_none() {
      return false;
    }
    let before = self.progress;
    self.apply(Effect::Progress(value), 0);
    self.progress > before
  }
}
