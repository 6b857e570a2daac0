//! Session controller: one match, owned by one task.
//!
//! The session owns the `Battle`, runs the commands it emits (fetch a challenge,
//! arm or cancel the round clock) and funnels clock signals and fetch results
//! back into it through channels. Nothing else touches the battle, so it needs
//! no locking.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::battle::{Battle, BattleEvent, Command};
use crate::clock::{ClockEvent, ClockHandle, ClockSignal, RoundClock};
use crate::config::MatchSettings;
use crate::domain::{Challenge, Contestant, MatchConfig};
use crate::source::{fetch_or_fallback, ChallengeSource};
use crate::util::now_ms;

/// What changed while the session was waiting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Notice {
    /// Clock tick for the live round.
    Progress { round: u64, value: f64 },
    /// A transition happened; the host should re-render.
    Changed,
}

struct Fetched {
    round: u64,
    challenge: Challenge,
}

enum Signal {
    Clock(ClockSignal),
    Fetched(Fetched),
}

pub struct Session {
    battle: Battle,
    source: Arc<dyn ChallengeSource>,
    fetch_timeout: Duration,
    clock: Option<ClockHandle>,
    fetch: Option<JoinHandle<()>>,
    clock_tx: UnboundedSender<ClockSignal>,
    clock_rx: UnboundedReceiver<ClockSignal>,
    fetch_tx: UnboundedSender<Fetched>,
    fetch_rx: UnboundedReceiver<Fetched>,
}

impl Session {
    pub fn new(config: MatchConfig, settings: &MatchSettings, source: Arc<dyn ChallengeSource>) -> Self {
        let battle = Battle::new(
            config,
            Contestant::player(settings.player_name.clone()),
            Contestant::opponent(settings.opponent_name.clone()),
        );
        let (clock_tx, clock_rx) = mpsc::unbounded_channel();
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        Self {
            battle,
            source,
            fetch_timeout: settings.fetch_timeout(),
            clock: None,
            fetch: None,
            clock_tx,
            clock_rx,
            fetch_tx,
            fetch_rx,
        }
    }

    pub fn battle(&self) -> &Battle {
        &self.battle
    }

    /// Request the first challenge.
    #[instrument(level = "info", skip(self), fields(difficulty = %self.battle.config().difficulty, topic = %self.battle.config().topic))]
    pub fn start(&mut self) -> bool {
        self.dispatch(BattleEvent::Start)
    }

    #[instrument(level = "info", skip(self, answer), fields(round = self.battle.round(), answer_len = answer.len()))]
    pub fn submit(&mut self, answer: &str) -> bool {
        self.dispatch(BattleEvent::Submit { answer: answer.to_string() })
    }

    #[instrument(level = "info", skip(self), fields(round = self.battle.round()))]
    pub fn advance(&mut self) -> bool {
        self.dispatch(BattleEvent::Advance)
    }

    /// Wait for the next clock signal or fetch result that changes something.
    /// Stale signals from earlier rounds are consumed silently. Cancel-safe.
    pub async fn next_notice(&mut self) -> Option<Notice> {
        loop {
            let signal = tokio::select! {
                Some(sig) = self.clock_rx.recv() => Signal::Clock(sig),
                Some(f) = self.fetch_rx.recv() => Signal::Fetched(f),
                else => return None,
            };
            match signal {
                Signal::Clock(ClockSignal { round, event: ClockEvent::Tick(value) }) => {
                    if self.battle.record_progress(round, value) {
                        return Some(Notice::Progress { round, value: self.battle.progress() });
                    }
                }
                Signal::Clock(ClockSignal { round, event: ClockEvent::Expired }) => {
                    if self.dispatch(BattleEvent::ClockExpired { round }) {
                        return Some(Notice::Changed);
                    }
                }
                Signal::Fetched(Fetched { round, challenge }) => {
                    if self.dispatch(BattleEvent::ChallengeLoaded { round, challenge }) {
                        return Some(Notice::Changed);
                    }
                }
            }
        }
    }

    /// Stop the clock and drop any in-flight fetch.
    pub fn close(&mut self) {
        self.cancel_clock();
        if let Some(task) = self.fetch.take() {
            task.abort();
        }
        debug!(target: "battle", round = self.battle.round(), "Session closed");
    }

    fn dispatch(&mut self, event: BattleEvent) -> bool {
        match self.battle.dispatch(event, now_ms()) {
            Some(commands) => {
                for cmd in commands {
                    self.run(cmd);
                }
                true
            }
            None => false,
        }
    }

    fn run(&mut self, cmd: Command) {
        match cmd {
            Command::FetchChallenge { round } => self.spawn_fetch(round),
            Command::ArmClock { round } => {
                self.cancel_clock();
                let difficulty = self.battle.config().difficulty;
                self.clock = Some(RoundClock::arm(difficulty, round, self.clock_tx.clone()));
                info!(target: "battle", round, %difficulty, "Round clock armed");
            }
            Command::CancelClock => self.cancel_clock(),
        }
    }

    fn cancel_clock(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.cancel();
        }
    }

    fn spawn_fetch(&mut self, round: u64) {
        if let Some(previous) = self.fetch.take() {
            previous.abort();
        }
        let source = Arc::clone(&self.source);
        let tx = self.fetch_tx.clone();
        let difficulty = self.battle.config().difficulty;
        let topic = self.battle.config().topic_filter().map(str::to_string);
        let limit = self.fetch_timeout;
        info!(target: "battle", round, %difficulty, topic = topic.as_deref().unwrap_or("<random>"), "Requesting challenge");
        self.fetch = Some(tokio::spawn(async move {
            let challenge = fetch_or_fallback(source.as_ref(), difficulty, topic.as_deref(), limit).await;
            let _ = tx.send(Fetched { round, challenge });
        }));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::time::timeout;

    use super::*;
    use crate::battle::{Outcome, RoundStatus};
    use crate::domain::{Difficulty, MAX_HEALTH};
    use crate::error::ProviderError;
    use crate::seeds::FALLBACK_ID;
    use crate::source::testing::{short, Hanging, Scripted};

    fn settings() -> MatchSettings {
        MatchSettings { fetch_timeout_secs: 25, ..MatchSettings::default() }
    }

    fn session(difficulty: Difficulty, topic: &str, source: Arc<dyn ChallengeSource>) -> Session {
        Session::new(MatchConfig::new(difficulty, topic).unwrap(), &settings(), source)
    }

    /// Pump notices until the battle leaves PLAYING.
    async fn until_resolved(s: &mut Session) {
        while s.battle().status() == RoundStatus::Playing {
            s.next_notice().await.unwrap();
        }
    }

    /// Pump notices until the live round has its challenge.
    async fn until_loaded(s: &mut Session) {
        while s.battle().challenge().is_none() {
            s.next_notice().await.unwrap();
        }
    }

    struct Slow(Duration);

    #[async_trait]
    impl ChallengeSource for Slow {
        async fn generate(&self, _d: Difficulty, _t: Option<&str>) -> Result<Challenge, ProviderError> {
            tokio::time::sleep(self.0).await;
            Ok(short("slow", "1"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn random_mix_sends_no_topic() {
        let source = Arc::new(Scripted::new(vec![short("a", "30")]));
        let mut s = session(Difficulty::Novice, "Random Mix", source.clone());
        assert!(s.start());
        assert!(s.battle().challenge().is_none());
        assert_eq!(s.next_notice().await, Some(Notice::Changed));
        assert_eq!(s.battle().challenge().unwrap().id, "a");
        assert_eq!(source.topics.lock().unwrap().as_slice(), &[None]);

        let source = Arc::new(Scripted::new(vec![short("b", "30")]));
        let mut s = session(Difficulty::Novice, "Function Pointers", source.clone());
        s.start();
        until_loaded(&mut s).await;
        assert_eq!(source.topics.lock().unwrap().as_slice(), &[Some("Function Pointers".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn correct_answer_wins_round_and_stops_clock() {
        let mut s = session(Difficulty::Novice, "Random Mix", Arc::new(Scripted::new(vec![short("a", "30")])));
        s.start();
        until_loaded(&mut s).await;

        match s.next_notice().await {
            Some(Notice::Progress { round, value }) => {
                assert_eq!(round, 1);
                assert!(value > 0.0 && value < 100.0);
            }
            other => panic!("expected progress, got {other:?}"),
        }

        assert!(s.submit(" 30 "));
        assert!(!s.submit("31"));
        assert_eq!(s.battle().status(), RoundStatus::Result);
        assert_eq!(s.battle().outcome(), Some(Outcome::PlayerWin));
        assert_eq!(s.battle().player().score, 100);
        assert_eq!(s.battle().opponent().health, 2);

        // Clock is gone: nothing arrives even after the full round time.
        assert!(timeout(Duration::from_secs(60), s.next_notice()).await.is_err());
        assert_eq!(s.battle().opponent().score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silence_lets_the_clock_win() {
        let mut s = session(Difficulty::Expert, "Random Mix", Arc::new(Scripted::new(vec![short("a", "30")])));
        s.start();
        until_loaded(&mut s).await;
        let armed_at = tokio::time::Instant::now();

        let mut last = 0.0;
        loop {
            match s.next_notice().await.unwrap() {
                Notice::Progress { value, .. } => {
                    assert!(value >= last);
                    last = value;
                }
                Notice::Changed => break,
            }
        }
        let elapsed = armed_at.elapsed();
        assert!(elapsed >= Duration::from_millis(9_500) && elapsed <= Duration::from_millis(14_600), "{elapsed:?}");
        assert_eq!(last, 100.0);
        assert_eq!(s.battle().status(), RoundStatus::Result);
        assert_eq!(s.battle().outcome(), Some(Outcome::AiWin));
        assert_eq!(s.battle().opponent().score, 100);
        assert_eq!(s.battle().player().health, 2);
        assert!(!s.submit("30"));
        assert_eq!(s.battle().player().score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_source_uses_fallback() {
        let mut s = session(Difficulty::Intermediate, "Random Mix", Arc::new(Scripted::new(Vec::new())));
        s.start();
        until_loaded(&mut s).await;
        assert_eq!(s.battle().challenge().unwrap().id, FALLBACK_ID);
        assert!(s.submit("30"));
        assert_eq!(s.battle().outcome(), Some(Outcome::PlayerWin));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_source_times_out_into_fallback() {
        let mut s = session(Difficulty::Novice, "Pointers & Memory Addressing", Arc::new(Hanging));
        s.start();
        let started = tokio::time::Instant::now();
        until_loaded(&mut s).await;
        assert!(started.elapsed() >= Duration::from_secs(25));
        assert_eq!(s.battle().challenge().unwrap().id, FALLBACK_ID);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_while_loading_is_ignored() {
        let mut s = session(Difficulty::Novice, "Random Mix", Arc::new(Slow(Duration::from_secs(3))));
        s.start();
        assert!(!s.submit("1"));
        until_loaded(&mut s).await;
        assert!(s.submit("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_session_drops_late_fetch() {
        let mut s = session(Difficulty::Novice, "Random Mix", Arc::new(Slow(Duration::from_secs(5))));
        s.start();
        s.close();
        assert!(timeout(Duration::from_secs(30), s.next_notice()).await.is_err());
        assert!(s.battle().challenge().is_none());
        assert!(!s.submit("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_clock_signals_are_ignored() {
        let items = vec![short("a", "30"), short("b", "30")];
        let mut s = session(Difficulty::Novice, "Random Mix", Arc::new(Scripted::new(items)));
        s.start();
        until_loaded(&mut s).await;
        s.submit("30");
        assert!(s.advance());
        assert_eq!(s.battle().round(), 2);

        // A tick and an expiry from round 1 racing the cancellation.
        s.clock_tx.send(ClockSignal { round: 1, event: ClockEvent::Tick(99.0) }).unwrap();
        s.clock_tx.send(ClockSignal { round: 1, event: ClockEvent::Expired }).unwrap();

        assert_eq!(s.next_notice().await, Some(Notice::Changed));
        assert_eq!(s.battle().challenge().unwrap().id, "b");
        assert_eq!(s.battle().status(), RoundStatus::Playing);
        assert_eq!(s.battle().player().health, MAX_HEALTH);
        assert_eq!(s.battle().opponent().score, 0);
        assert!(s.battle().progress() < 99.0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_run_the_match_to_game_over() {
        let mut s = session(Difficulty::Expert, "Random Mix", Arc::new(Scripted::new(Vec::new())));
        s.start();
        let mut rounds = 0;
        loop {
            until_resolved(&mut s).await;
            rounds += 1;
            if s.battle().status() == RoundStatus::GameOver {
                break;
            }
            assert!(s.advance());
        }
        assert_eq!(rounds, MAX_HEALTH);
        let fin = s.battle().final_outcome().unwrap();
        assert!(!fin.is_win);
        assert_eq!(fin.opponent_score, 300);
        assert_eq!(fin.player_score, 0);

        assert!(!s.advance());
        assert!(!s.submit("30"));
        assert!(timeout(Duration::from_secs(60), s.next_notice()).await.is_err());
    }
}
