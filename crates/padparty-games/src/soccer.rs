//! The car-soccer engine.
//!
//! Continuous-time simulation on an 800×600 field with a goal mouth
//! centered on each edge. Actors are driven by the most recent joystick
//! snapshot, with a short boost impulse on the primary button and a
//! one-use power shot unlocked by scoring. The match starts paused and
//! runs against a countdown; pause suspends stepping entirely.

use std::collections::HashMap;
use std::time::Duration;

use padparty_protocol::{
    Button, ConnectionId, GameId, Input, Player,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::{
    ControlEvent, Countdown, Engine, GameEvent, GameNotification, ScoreBoard,
    Vec2,
};

/// Soccer engine settings.
#[derive(Debug, Clone)]
pub struct SoccerConfig {
    pub width: f64,
    pub height: f64,
    pub match_secs: u32,
    /// RNG seed for deterministic simulation (tests).
    pub seed: Option<u64>,
}

impl Default for SoccerConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            match_secs: 300,
            seed: None,
        }
    }
}

/// Joystick deflection → speed factor.
const STICK_SPEED: f64 = 400.0;
/// Hard cap on actor speed, boosts included.
const MAX_SPEED: f64 = 500.0;
/// Deceleration when the stick is centered.
const ACTOR_DRAG: f64 = 800.0;
/// Primary-button boost: acceleration and how long it lasts.
const BOOST_ACCEL: f64 = 800.0;
const BOOST_DURATION: Duration = Duration::from_millis(200);
/// Power shot: stronger and longer, consumed on use.
const POWER_ACCEL: f64 = 2000.0;
const POWER_DURATION: Duration = Duration::from_millis(400);

const ACTOR_RADIUS: f64 = 20.0;
const BALL_RADIUS: f64 = 16.0;
/// Ball deceleration per second.
const BALL_DRAG: f64 = 50.0;
/// Velocity kept after a wall bounce.
const BALL_BOUNCE: f64 = 0.9;

/// How far the goal mouth reaches into the field, and its height.
const GOAL_DEPTH: f64 = 30.0;
const GOAL_HEIGHT: f64 = 200.0;
/// Ball-reset delay after a goal; goal detection is disarmed meanwhile.
const RESET_GRACE: Duration = Duration::from_millis(1000);

/// A transient acceleration along the actor's heading.
#[derive(Debug, Clone, Copy, Serialize)]
struct Impulse {
    accel: f64,
    #[serde(skip)]
    remaining: Duration,
}

/// One player's car.
#[derive(Debug, Clone, Serialize)]
pub struct Actor {
    pub player: Player,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Heading in radians, set by the last non-zero stick vector.
    pub rot: f64,
    /// Most recent joystick snapshot (overwrite semantics).
    pub stick: Vec2,
    pub power_shot: bool,
    /// Whether this actor touched the ball most recently.
    pub last_touch: bool,
    #[serde(skip)]
    boost: Option<Impulse>,
}

/// The ball.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Ball {
    pub pos: Vec2,
    pub vel: Vec2,
}

/// The soccer room state machine.
pub struct SoccerGame {
    config: SoccerConfig,
    actors: HashMap<ConnectionId, Actor>,
    join_order: Vec<ConnectionId>,
    ball: Ball,
    score_left: u32,
    score_right: u32,
    countdown: Countdown,
    /// Matches start paused; an explicit Start un-pauses.
    paused: bool,
    /// Post-goal grace: ball resets when it elapses.
    reset_in: Option<Duration>,
    over: bool,
    rng: StdRng,
}

impl SoccerGame {
    pub fn new(config: SoccerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let ball = Ball {
            pos: Vec2::new(config.width / 2.0, config.height / 2.0),
            vel: Vec2::ZERO,
        };
        let countdown = Countdown::new(config.match_secs);
        Self {
            config,
            actors: HashMap::new(),
            join_order: Vec::new(),
            ball,
            score_left: 0,
            score_right: 0,
            countdown,
            paused: true,
            reset_in: None,
            over: false,
            rng,
        }
    }

    /// Read access for the renderer.
    pub fn actor(&self, id: ConnectionId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn ball(&self) -> Ball {
        self.ball
    }

    pub fn score(&self) -> (u32, u32) {
        (self.score_left, self.score_right)
    }

    pub fn time_left(&self) -> u32 {
        self.countdown.remaining()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    fn scoreboard(&self) -> ScoreBoard {
        ScoreBoard::Sides {
            left: self.score_left,
            right: self.score_right,
        }
    }

    fn random_pos(&mut self) -> Vec2 {
        Vec2::new(
            self.rng.random_range(ACTOR_RADIUS..self.config.width - ACTOR_RADIUS),
            self.rng
                .random_range(ACTOR_RADIUS..self.config.height - ACTOR_RADIUS),
        )
    }

    fn add_actor(&mut self, player: Player) {
        if self.actors.contains_key(&player.id) {
            return;
        }
        let id = player.id;
        let pos = self.random_pos();
        self.actors.insert(
            id,
            Actor {
                player,
                pos,
                vel: Vec2::ZERO,
                rot: 0.0,
                stick: Vec2::ZERO,
                power_shot: false,
                last_touch: false,
                boost: None,
            },
        );
        self.join_order.push(id);
    }

    fn handle_input(
        &mut self,
        player: ConnectionId,
        input: Input,
        notes: &mut Vec<GameNotification>,
    ) {
        let Some(actor) = self.actors.get_mut(&player) else {
            return;
        };
        match input {
            Input::Joystick { x, y } => {
                actor.stick = Vec2::new(x, y);
            }
            Input::ButtonDown { button: Button::A } => {
                actor.boost = Some(Impulse {
                    accel: BOOST_ACCEL,
                    remaining: BOOST_DURATION,
                });
            }
            Input::ButtonDown {
                button: Button::Power,
            } => {
                // Only with the flag, and using it spends it.
                if actor.power_shot {
                    actor.power_shot = false;
                    actor.boost = Some(Impulse {
                        accel: POWER_ACCEL,
                        remaining: POWER_DURATION,
                    });
                    notes.push(GameNotification::PowerShot {
                        player,
                        available: false,
                    });
                }
            }
            // Aim and d-pad inputs have no meaning on the pitch.
            Input::FireShot { .. } | Input::Dpad { .. } => {}
        }
    }

    fn step_actors(&mut self, dt: f64, dt_duration: Duration) {
        let order = self.join_order.clone();
        for id in &order {
            let Some(actor) = self.actors.get_mut(id) else { continue };

            // Velocity follows the stick; drag applies when centered.
            let deflection = actor.stick.len();
            if deflection > f64::EPSILON {
                actor.rot = actor.stick.y.atan2(actor.stick.x);
                let speed = (deflection * STICK_SPEED).min(MAX_SPEED);
                actor.vel = Vec2::from_angle(actor.rot).scaled(speed);
            } else {
                let speed = actor.vel.len();
                let slowed = (speed - ACTOR_DRAG * dt).max(0.0);
                actor.vel = actor.vel.normalized().scaled(slowed);
            }

            // Boost impulse along the heading, then decay.
            if let Some(boost) = &mut actor.boost {
                actor.vel +=
                    Vec2::from_angle(actor.rot).scaled(boost.accel * dt);
                boost.remaining = boost.remaining.saturating_sub(dt_duration);
                if boost.remaining.is_zero() {
                    actor.boost = None;
                }
            }
            actor.vel = actor.vel.capped(MAX_SPEED);

            // Integrate, clamping to the field (no bounce for cars).
            actor.pos += actor.vel.scaled(dt);
            if actor.pos.x < ACTOR_RADIUS {
                actor.pos.x = ACTOR_RADIUS;
                actor.vel.x = 0.0;
            } else if actor.pos.x > self.config.width - ACTOR_RADIUS {
                actor.pos.x = self.config.width - ACTOR_RADIUS;
                actor.vel.x = 0.0;
            }
            if actor.pos.y < ACTOR_RADIUS {
                actor.pos.y = ACTOR_RADIUS;
                actor.vel.y = 0.0;
            } else if actor.pos.y > self.config.height - ACTOR_RADIUS {
                actor.pos.y = self.config.height - ACTOR_RADIUS;
                actor.vel.y = 0.0;
            }
        }

        // Push overlapping cars apart, half the overlap each.
        for i in 0..order.len() {
            for j in (i + 1)..order.len() {
                let (Some(a), Some(b)) =
                    (self.actors.get(&order[i]), self.actors.get(&order[j]))
                else {
                    continue;
                };
                let gap = a.pos.distance(b.pos);
                let min_gap = 2.0 * ACTOR_RADIUS;
                if gap < min_gap && gap > f64::EPSILON {
                    let push = (b.pos - a.pos)
                        .normalized()
                        .scaled((min_gap - gap) / 2.0);
                    let (ai, bi) = (order[i], order[j]);
                    if let Some(a) = self.actors.get_mut(&ai) {
                        a.pos += push.scaled(-1.0);
                    }
                    if let Some(b) = self.actors.get_mut(&bi) {
                        b.pos += push;
                    }
                }
            }
        }
    }

    fn step_ball(&mut self, dt: f64, notes: &mut Vec<GameNotification>) {
        // Drag, integrate, bounce off walls.
        let speed = self.ball.vel.len();
        let slowed = (speed - BALL_DRAG * dt).max(0.0);
        self.ball.vel = self.ball.vel.normalized().scaled(slowed);
        self.ball.pos += self.ball.vel.scaled(dt);

        if self.ball.pos.x < BALL_RADIUS {
            self.ball.pos.x = BALL_RADIUS;
            self.ball.vel.x = -self.ball.vel.x * BALL_BOUNCE;
        } else if self.ball.pos.x > self.config.width - BALL_RADIUS {
            self.ball.pos.x = self.config.width - BALL_RADIUS;
            self.ball.vel.x = -self.ball.vel.x * BALL_BOUNCE;
        }
        if self.ball.pos.y < BALL_RADIUS {
            self.ball.pos.y = BALL_RADIUS;
            self.ball.vel.y = -self.ball.vel.y * BALL_BOUNCE;
        } else if self.ball.pos.y > self.config.height - BALL_RADIUS {
            self.ball.pos.y = self.config.height - BALL_RADIUS;
            self.ball.vel.y = -self.ball.vel.y * BALL_BOUNCE;
        }

        // Contact: kick the ball along the contact normal and move the
        // last-touch flag to this actor.
        let contact_range = ACTOR_RADIUS + BALL_RADIUS;
        let toucher = self.join_order.iter().copied().find(|id| {
            self.actors
                .get(id)
                .is_some_and(|a| a.pos.distance(self.ball.pos) < contact_range)
        });
        if let Some(id) = toucher {
            let actor = self.actors.get_mut(&id).expect("found above");
            let normal = (self.ball.pos - actor.pos).normalized();
            let kick = actor.vel.len().max(speed * BALL_BOUNCE).max(60.0);
            self.ball.pos = actor.pos + normal.scaled(contact_range + 0.5);
            self.ball.vel = normal.scaled(kick);
            for other in self.actors.values_mut() {
                other.last_touch = false;
            }
            self.actors
                .get_mut(&id)
                .expect("found above")
                .last_touch = true;
        }

        self.detect_goal(notes);
    }

    /// Scores at most once per overlap: the grace window disarms
    /// detection until the ball has been reset.
    fn detect_goal(&mut self, notes: &mut Vec<GameNotification>) {
        if self.reset_in.is_some() {
            return;
        }
        let center_y = self.config.height / 2.0;
        let in_mouth =
            (self.ball.pos.y - center_y).abs() <= GOAL_HEIGHT / 2.0;
        if !in_mouth {
            return;
        }

        let in_left = self.ball.pos.x - BALL_RADIUS <= GOAL_DEPTH;
        let in_right = self.ball.pos.x + BALL_RADIUS
            >= self.config.width - GOAL_DEPTH;
        if !in_left && !in_right {
            return;
        }

        // Ball in the left mouth scores for the right side.
        if in_left {
            self.score_right += 1;
        } else {
            self.score_left += 1;
        }
        notes.push(GameNotification::Score(self.scoreboard()));
        tracing::debug!(
            left = self.score_left,
            right = self.score_right,
            "goal"
        );

        // The scorer is whoever touched the ball last; the goal grants
        // their one-use power shot.
        if let Some(scorer) =
            self.actors.values_mut().find(|a| a.last_touch)
        {
            scorer.power_shot = true;
            notes.push(GameNotification::PowerShot {
                player: scorer.player.id,
                available: true,
            });
        }

        self.reset_in = Some(RESET_GRACE);
    }

    /// Elapses the post-goal grace; on expiry the ball re-centers and
    /// touch tracking re-arms.
    fn advance_reset(&mut self, dt: Duration) {
        if let Some(remaining) = &mut self.reset_in {
            *remaining = remaining.saturating_sub(dt);
            if remaining.is_zero() {
                self.ball.pos = Vec2::new(
                    self.config.width / 2.0,
                    self.config.height / 2.0,
                );
                self.ball.vel = Vec2::ZERO;
                for actor in self.actors.values_mut() {
                    actor.last_touch = false;
                }
                self.reset_in = None;
            }
        }
    }

    fn restart(&mut self) {
        self.score_left = 0;
        self.score_right = 0;
        self.countdown = Countdown::new(self.config.match_secs);
        self.over = false;
        self.paused = true;
        self.reset_in = None;
        self.ball.pos =
            Vec2::new(self.config.width / 2.0, self.config.height / 2.0);
        self.ball.vel = Vec2::ZERO;
        let ids = self.join_order.clone();
        for id in ids {
            let pos = self.random_pos();
            let actor = self.actors.get_mut(&id).expect("in join order");
            actor.pos = pos;
            actor.vel = Vec2::ZERO;
            actor.stick = Vec2::ZERO;
            actor.boost = None;
            actor.power_shot = false;
            actor.last_touch = false;
        }
    }
}

impl Engine for SoccerGame {
    fn game_id(&self) -> GameId {
        GameId::Soccer
    }

    fn apply(&mut self, event: GameEvent) -> Vec<GameNotification> {
        let mut notes = Vec::new();
        match event {
            GameEvent::PlayerJoined { player } => self.add_actor(player),
            GameEvent::PlayerLeft { id } => {
                self.actors.remove(&id);
                self.join_order.retain(|other| *other != id);
            }
            GameEvent::Input(input_event) => {
                // Input is meaningless while the pitch is frozen.
                if !self.paused && !self.over {
                    self.handle_input(
                        input_event.player,
                        input_event.input,
                        &mut notes,
                    );
                }
            }
            GameEvent::Control(control) => match control {
                ControlEvent::Start | ControlEvent::Resume => {
                    if !self.over {
                        self.paused = false;
                    }
                }
                ControlEvent::Pause => self.paused = true,
                ControlEvent::Restart => {
                    self.restart();
                    notes.push(GameNotification::Score(self.scoreboard()));
                    notes.push(GameNotification::Time(
                        self.countdown.remaining(),
                    ));
                }
                ControlEvent::AddTime => {
                    self.countdown.add(60);
                    notes.push(GameNotification::Time(
                        self.countdown.remaining(),
                    ));
                }
                ControlEvent::SubTime => {
                    self.countdown.sub(60);
                    notes.push(GameNotification::Time(
                        self.countdown.remaining(),
                    ));
                }
            },
        }
        notes
    }

    fn tick(&mut self, dt: Duration) -> Vec<GameNotification> {
        let mut notes = Vec::new();
        // Pause suspends the simulation entirely, clock included.
        if self.paused || self.over {
            return notes;
        }
        let dt_secs = dt.as_secs_f64();

        self.step_actors(dt_secs, dt);
        self.step_ball(dt_secs, &mut notes);
        self.advance_reset(dt);

        let crossed = self.countdown.advance(dt);
        for _ in 0..crossed {
            notes.push(GameNotification::Time(self.countdown.remaining()));
        }
        if self.countdown.expired() {
            self.over = true;
            self.paused = true;
            notes.push(GameNotification::GameOver(self.scoreboard()));
        }

        notes
    }
}

// =========================================================================
// Tests
// =========================================================================
