//! Authoritative game simulation engines for Padparty.
//!
//! One engine per mini-game, all behind the [`Engine`] trait: a pure
//! state machine that consumes typed [`GameEvent`]s and advances on
//! fixed-step `tick` calls from an external scheduler. Engines own their
//! entities as id-keyed maps; the outside world only ever sends
//! id-addressed commands and receives [`GameNotification`]s — nothing
//! holds references into simulation internals.
//!
//! # Engines
//!
//! - [`SnakeGame`] — grid snake, 100 ms steps, countdown match
//! - [`SoccerGame`] — continuous-time car soccer with boost and power shots
//! - [`TanksGame`] — turn-based artillery with time-boxed projectiles

mod events;
mod math;
mod snake;
mod soccer;
mod tanks;

pub use events::{
    create_engine, ControlEvent, Countdown, Engine, GameEvent,
    GameNotification, ScoreBoard, ScoreEntry,
};
pub use math::Vec2;
pub use snake::{Cell, SnakeConfig, SnakeGame};
pub use soccer::{SoccerConfig, SoccerGame};
pub use tanks::{TanksConfig, TanksGame};
