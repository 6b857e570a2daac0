//! Round clock: the opponent's "thinking time" for one round.
//!
//! A spawned task ticks every 100ms and reports progress in [0, 100] tagged with
//! the round id it was armed for. When progress reaches 100 it reports a final
//! `Tick(100.0)` followed by one `Expired`, then stops.

use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, instrument};

use crate::domain::Difficulty;

pub const TICK: Duration = Duration::from_millis(100);
/// Uniform perturbation applied to every armed duration, in both directions.
pub const JITTER_MS: i64 = 2_500;

pub fn base_duration(difficulty: Difficulty) -> Duration {
  match difficulty {
    Difficulty::Novice => Duration::from_millis(30_000),
    Difficulty::Intermediate => Duration::from_millis(20_000),
    Difficulty::Expert => Duration::from_millis(12_000),
  }
}

/// `base_duration` shifted by `jitter_ms` (clamped to the allowed range).
pub fn round_duration(difficulty: Difficulty, jitter_ms: i64) -> Duration {
  let base = base_duration(difficulty).as_millis() as i64;
  let ms = base + jitter_ms.clamp(-JITTER_MS, JITTER_MS);
  Duration::from_millis(ms as u64)
}

pub fn random_duration(difficulty: Difficulty) -> Duration {
  let jitter = rand::thread_rng().gen_range(-JITTER_MS..=JITTER_MS);
  round_duration(difficulty, jitter)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClockEvent {
  Tick(f64),
  Expired,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockSignal {
  pub round: u64,
  pub event: ClockEvent,
}

/// Progress accumulator, one per armed round.
#[derive(Clone, Debug)]
pub struct Progress {
  value: f64,
  step: f64,
  expired: bool,
}

impl Progress {
  pub fn new(duration: Duration) -> Self {
    let ticks = (duration.as_millis() as f64 / TICK.as_millis() as f64).max(1.0);
    Self { value: 0.0, step: 100.0 / ticks, expired: false }
  }

  /// Advance one tick. Returns the new value and whether this tick expired
  /// the round; `None` once expired.
  pub fn advance(&mut self) -> Option<(f64, bool)> {
    if self.expired {
      return None;
    }
    let next = self.value + self.step;
    if next >= 100.0 {
      self.value = 100.0;
      self.expired = true;
    } else {
      self.value = next;
    }
    Some((self.value, self.expired))
  }
}

/// Running clock; dropping it cancels the task.
#[derive(Debug)]
pub struct ClockHandle {
  task: JoinHandle<()>,
}

impl ClockHandle {
  /// Stop ticking. Idempotent, also fine after expiry.
  pub fn cancel(&self) {
    self.task.abort();
  }
}

impl Drop for ClockHandle {
  fn drop(&mut self) {
    self.task.abort();
  }
}

pub struct RoundClock;

impl RoundClock {
  /// Arm with the difficulty's duration plus random jitter.
  pub fn arm(difficulty: Difficulty, round: u64, tx: UnboundedSender<ClockSignal>) -> ClockHandle {
    Self::arm_for(random_duration(difficulty), round, tx)
  }

  #[instrument(level = "debug", skip(tx), fields(duration_ms = duration.as_millis() as u64))]
  pub fn arm_for(duration: Duration, round: u64, tx: UnboundedSender<ClockSignal>) -> ClockHandle {
    let task = tokio::spawn(async move {
      let mut progress = Progress::new(duration);
      let mut ticker = interval_at(Instant::now() + TICK, TICK);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        ticker.tick().await;
        let Some((value, expired)) = progress.advance() else { break };
        if tx.send(ClockSignal { round, event: ClockEvent::Tick(value) }).is_err() {
          break;
        }
        if expired {
          debug!(target: "battle", round, "Round clock expired");
          let _ = tx.send(ClockSignal { round, event: ClockEvent::Expired });
          break;
        }
      }
    });
    ClockHandle { task }
  }
}
