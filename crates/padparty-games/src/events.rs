//! The shared event surface between the outside world and the engines.
//!
//! All three engines consume the same [`GameEvent`] stream — membership
//! changes, decoded input, and host controls — and emit
//! [`GameNotification`]s for the (out-of-scope) renderer and HUD.

use std::time::Duration;

use padparty_protocol::{Color, ConnectionId, GameId, InputEvent, Player};
use serde::Serialize;

/// An event pushed into an engine's inbox.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// A player entered the room.
    PlayerJoined { player: Player },
    /// A player left; the engine removes their entity and cancels any
    /// timers tied to them (e.g., a scheduled respawn).
    PlayerLeft { id: ConnectionId },
    /// Decoded gamepad input, tagged with the sender.
    Input(InputEvent),
    /// A host-side control action.
    Control(ControlEvent),
}

/// Host controls, shared by every game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Start,
    Pause,
    Resume,
    Restart,
    /// Add one minute to the countdown.
    AddTime,
    /// Remove one minute from the countdown (floored at zero).
    SubTime,
}

/// One row of a per-player ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreEntry {
    pub id: ConnectionId,
    pub nickname: String,
    pub score: u32,
    pub color: Color,
}

/// A score snapshot. Snake ranks players; soccer counts two sides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScoreBoard {
    /// Per-player scores, ranked descending, ties in join order.
    Players(Vec<ScoreEntry>),
    /// Side-based score. The higher side wins; equal is a draw.
    Sides { left: u32, right: u32 },
}

/// Notifications emitted by an engine for the renderer/HUD.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GameNotification {
    /// The scoreboard changed.
    Score(ScoreBoard),
    /// Another second ticked off the countdown.
    Time(u32),
    /// The match ended.
    GameOver(ScoreBoard),
    /// A player's power-shot availability changed. The host runtime
    /// forwards this to that player's controller through the relay.
    PowerShot {
        player: ConnectionId,
        available: bool,
    },
    /// The turn moved to this player.
    Turn { player: ConnectionId },
}

/// An authoritative game state machine.
///
/// `apply` handles discrete events; `tick` advances continuous time by
/// the scheduler's fixed step. Both return notifications in the order
/// they occurred.
pub trait Engine: Send + 'static {
    /// Which game this engine runs.
    fn game_id(&self) -> GameId;

    /// Feeds one event into the state machine.
    fn apply(&mut self, event: GameEvent) -> Vec<GameNotification>;

    /// Advances the simulation by `dt`.
    fn tick(&mut self, dt: Duration) -> Vec<GameNotification>;
}

/// Builds the engine for a game, optionally seeded for deterministic
/// simulation (tests; live rooms pass `None`).
pub fn create_engine(game: GameId, seed: Option<u64>) -> Box<dyn Engine> {
    match game {
        GameId::Snake => Box::new(crate::SnakeGame::new(
            crate::SnakeConfig {
                seed,
                ..Default::default()
            },
        )),
        GameId::Soccer => Box::new(crate::SoccerGame::new(
            crate::SoccerConfig {
                seed,
                ..Default::default()
            },
        )),
        GameId::Tanks => {
            Box::new(crate::TanksGame::new(crate::TanksConfig::default()))
        }
    }
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

/// A second-granular match countdown advanced by fixed-step `dt`.
#[derive(Debug, Clone, Serialize)]
pub struct Countdown {
    remaining_secs: u32,
    #[serde(skip)]
    accum: Duration,
}

impl Countdown {
    pub fn new(secs: u32) -> Self {
        Self {
            remaining_secs: secs,
            accum: Duration::ZERO,
        }
    }

    /// Accumulates `dt`; returns how many whole seconds elapsed in this
    /// call (each already subtracted from the remaining time).
    pub fn advance(&mut self, dt: Duration) -> u32 {
        self.accum += dt;
        let mut crossed = 0;
        while self.accum >= Duration::from_secs(1) && self.remaining_secs > 0
        {
            self.accum -= Duration::from_secs(1);
            self.remaining_secs -= 1;
            crossed += 1;
        }
        crossed
    }

    pub fn remaining(&self) -> u32 {
        self.remaining_secs
    }

    pub fn expired(&self) -> bool {
        self.remaining_secs == 0
    }

    pub fn add(&mut self, secs: u32) {
        self.remaining_secs += secs;
    }

    pub fn sub(&mut self, secs: u32) {
        self.remaining_secs = self.remaining_secs.saturating_sub(secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_crosses_whole_seconds() {
        let mut countdown = Countdown::new(3);
        assert_eq!(countdown.advance(Duration::from_millis(900)), 0);
        assert_eq!(countdown.advance(Duration::from_millis(200)), 1);
        assert_eq!(countdown.remaining(), 2);
    }

    #[test]
    fn test_countdown_large_step_crosses_several() {
        let mut countdown = Countdown::new(10);
        assert_eq!(countdown.advance(Duration::from_millis(2500)), 2);
        assert_eq!(countdown.remaining(), 8);
    }

    #[test]
    fn test_countdown_stops_at_zero() {
        let mut countdown = Countdown::new(1);
        countdown.advance(Duration::from_secs(5));
        assert!(countdown.expired());
        assert_eq!(countdown.remaining(), 0);
    }

    #[test]
    fn test_countdown_add_and_sub_minutes() {
        let mut countdown = Countdown::new(30);
        countdown.add(60);
        assert_eq!(countdown.remaining(), 90);
        countdown.sub(60);
        assert_eq!(countdown.remaining(), 30);
        countdown.sub(60);
        assert_eq!(countdown.remaining(), 0);
    }
}
