//! The turn-based artillery engine.
//!
//! Turn order is player join order, tracked by a single pointer. A fire
//! action is accepted only from the turn holder, and only while nothing
//! is in flight; everything else is a silent no-op. An accepted shot
//! launches a projectile along the supplied angle/power vector under
//! constant gravity.
//!
//! Projectile lifetime and turn advancement are purely time-based: after
//! a fixed flight duration the projectile is removed and the turn passes.
//! There is no collision or landing detection yet — see DESIGN.md before
//! adding impact termination, since clients time their turn UI to the
//! fixed flight window.

use std::collections::HashMap;
use std::time::Duration;

use padparty_protocol::{ConnectionId, GameId, Input, Player};
use serde::Serialize;

use crate::{
    ControlEvent, Engine, GameEvent, GameNotification, Vec2,
};

/// Tanks engine settings.
#[derive(Debug, Clone)]
pub struct TanksConfig {
    pub width: f64,
    pub height: f64,
    /// Fixed projectile flight duration.
    pub flight: Duration,
    /// Downward acceleration on projectiles.
    pub gravity: f64,
}

impl Default for TanksConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            flight: Duration::from_millis(3000),
            gravity: 600.0,
        }
    }
}

/// Horizontal spacing between tanks, by join index.
const TANK_SPACING: f64 = 200.0;
const FIRST_TANK_X: f64 = 100.0;
/// Tanks sit this far above the bottom edge.
const TANK_FLOOR_OFFSET: f64 = 100.0;
/// Shots leave from above the hull.
const MUZZLE_OFFSET: f64 = 40.0;
/// Controller power (0–100) → launch speed.
const LAUNCH_SCALE: f64 = 30.0;

/// One player's tank.
#[derive(Debug, Clone, Serialize)]
pub struct Tank {
    pub player: Player,
    pub pos: Vec2,
}

/// The single in-flight projectile.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Projectile {
    pub pos: Vec2,
    pub vel: Vec2,
    #[serde(skip)]
    remaining: Duration,
}

/// The tanks room state machine.
pub struct TanksGame {
    config: TanksConfig,
    tanks: HashMap<ConnectionId, Tank>,
    /// Join order doubles as turn order.
    order: Vec<ConnectionId>,
    /// Index into `order` of the current turn holder.
    turn: usize,
    projectile: Option<Projectile>,
    paused: bool,
}

impl TanksGame {
    pub fn new(config: TanksConfig) -> Self {
        Self {
            config,
            tanks: HashMap::new(),
            order: Vec::new(),
            turn: 0,
            projectile: None,
            paused: false,
        }
    }

    /// Read access for the renderer.
    pub fn tank(&self, id: ConnectionId) -> Option<&Tank> {
        self.tanks.get(&id)
    }

    /// The player whose turn it is, if anyone has joined.
    pub fn turn_holder(&self) -> Option<ConnectionId> {
        self.order.get(self.turn).copied()
    }

    /// The in-flight projectile, if any.
    pub fn projectile(&self) -> Option<&Projectile> {
        self.projectile.as_ref()
    }

    fn spawn_pos(&self, join_index: usize) -> Vec2 {
        let x = (FIRST_TANK_X + join_index as f64 * TANK_SPACING)
            .min(self.config.width - FIRST_TANK_X);
        Vec2::new(x, self.config.height - TANK_FLOOR_OFFSET)
    }

    fn fire(
        &mut self,
        shooter: ConnectionId,
        angle: f64,
        power: f64,
    ) {
        // Turn ownership and single-projectile gating. Violations are
        // illegal-but-non-fatal: drop silently, surface nothing.
        if self.turn_holder() != Some(shooter) {
            tracing::trace!(player = %shooter, "fire out of turn, dropped");
            return;
        }
        if self.projectile.is_some() {
            tracing::trace!(player = %shooter, "projectile in flight, dropped");
            return;
        }
        let Some(tank) = self.tanks.get(&shooter) else { return };

        let muzzle = tank.pos + Vec2::new(0.0, -MUZZLE_OFFSET);
        self.projectile = Some(Projectile {
            pos: muzzle,
            vel: Vec2::from_angle(angle).scaled(power * LAUNCH_SCALE),
            remaining: self.config.flight,
        });
        tracing::debug!(player = %shooter, angle, power, "shot fired");
    }

    fn advance_turn(&mut self, notes: &mut Vec<GameNotification>) {
        if self.order.is_empty() {
            self.turn = 0;
            return;
        }
        self.turn = (self.turn + 1) % self.order.len();
        notes.push(GameNotification::Turn {
            player: self.order[self.turn],
        });
    }

    fn remove_player(
        &mut self,
        id: ConnectionId,
        notes: &mut Vec<GameNotification>,
    ) {
        let Some(index) = self.order.iter().position(|p| *p == id) else {
            return;
        };
        self.tanks.remove(&id);
        self.order.remove(index);

        if self.order.is_empty() {
            self.turn = 0;
            return;
        }
        if index < self.turn {
            // The pointer shifts down with the removal.
            self.turn -= 1;
        } else if index == self.turn {
            // The holder left: the turn passes to the next in order,
            // which now sits at the same index (wrapping).
            self.turn %= self.order.len();
            notes.push(GameNotification::Turn {
                player: self.order[self.turn],
            });
        }
        // An in-flight projectile of a leaver still expires by time.
    }

    fn restart(&mut self, notes: &mut Vec<GameNotification>) {
        self.projectile = None;
        self.turn = 0;
        let ids = self.order.clone();
        for (index, id) in ids.iter().enumerate() {
            let pos = self.spawn_pos(index);
            if let Some(tank) = self.tanks.get_mut(id) {
                tank.pos = pos;
            }
        }
        if let Some(holder) = self.turn_holder() {
            notes.push(GameNotification::Turn { player: holder });
        }
    }
}

impl Engine for TanksGame {
    fn game_id(&self) -> GameId {
        GameId::Tanks
    }

    fn apply(&mut self, event: GameEvent) -> Vec<GameNotification> {
        let mut notes = Vec::new();
        match event {
            GameEvent::PlayerJoined { player } => {
                if !self.tanks.contains_key(&player.id) {
                    let id = player.id;
                    let pos = self.spawn_pos(self.order.len());
                    self.tanks.insert(id, Tank { player, pos });
                    self.order.push(id);
                    if self.order.len() == 1 {
                        notes.push(GameNotification::Turn { player: id });
                    }
                }
            }
            GameEvent::PlayerLeft { id } => {
                self.remove_player(id, &mut notes);
            }
            GameEvent::Input(input_event) => {
                if let Input::FireShot { angle, power } = input_event.input {
                    self.fire(input_event.player, angle, power);
                }
                // Joystick/buttons/d-pad mean nothing here.
            }
            GameEvent::Control(control) => match control {
                ControlEvent::Pause => self.paused = true,
                ControlEvent::Start | ControlEvent::Resume => {
                    self.paused = false;
                }
                ControlEvent::Restart => self.restart(&mut notes),
                // No match clock in artillery.
                ControlEvent::AddTime | ControlEvent::SubTime => {}
            },
        }
        notes
    }

    fn tick(&mut self, dt: Duration) -> Vec<GameNotification> {
        let mut notes = Vec::new();
        if self.paused {
            return notes;
        }

        if let Some(projectile) = &mut self.projectile {
            let dt_secs = dt.as_secs_f64();
            projectile.vel.y += self.config.gravity * dt_secs;
            projectile.pos += projectile.vel.scaled(dt_secs);
            projectile.remaining = projectile.remaining.saturating_sub(dt);

            // Flight is over purely by time; the turn passes.
            if projectile.remaining.is_zero() {
                self.projectile = None;
                self.advance_turn(&mut notes);
            }
        }

        notes
    }
}

// =========================================================================
// Tests
// =========================================================================
