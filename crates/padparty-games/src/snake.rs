//! The grid snake engine.
//!
//! A fixed 40×30 grid stepped every 100 ms. Each alive snake applies its
//! buffered direction (180° reversals rejected), projects a new head, and
//! dies on walls, its own body, or any other alive snake's body. Eating
//! the food grows the snake and scores; dying schedules a respawn that
//! keeps the accumulated score. A room-wide countdown ends the match with
//! a ranking.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use padparty_protocol::{ConnectionId, Direction, GameId, Input, Player};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::{
    ControlEvent, Countdown, Engine, GameEvent, GameNotification, ScoreBoard,
    ScoreEntry,
};

/// A grid cell. Also used as a heading delta (one of the four units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    fn offset(self, delta: Cell) -> Cell {
        Cell {
            x: self.x + delta.x,
            y: self.y + delta.y,
        }
    }
}

fn heading_of(direction: Direction) -> Cell {
    match direction {
        Direction::Up => Cell { x: 0, y: -1 },
        Direction::Down => Cell { x: 0, y: 1 },
        Direction::Left => Cell { x: -1, y: 0 },
        Direction::Right => Cell { x: 1, y: 0 },
    }
}

fn reverses(a: Cell, b: Cell) -> bool {
    a.x == -b.x && a.y == -b.y
}

/// Snake engine settings.
#[derive(Debug, Clone)]
pub struct SnakeConfig {
    pub width: i32,
    pub height: i32,
    /// Grid step period.
    pub step: Duration,
    pub match_secs: u32,
    /// Delay between death and reappearance.
    pub respawn_delay: Duration,
    /// RNG seed for deterministic simulation (tests).
    pub seed: Option<u64>,
}

impl Default for SnakeConfig {
    fn default() -> Self {
        Self {
            width: 40,
            height: 30,
            step: Duration::from_millis(100),
            match_secs: 180,
            respawn_delay: Duration::from_millis(2000),
            seed: None,
        }
    }
}

/// Points per food eaten.
const FOOD_SCORE: u32 = 10;
/// Fresh snakes are three segments, heading up.
const SPAWN_LENGTH: i32 = 3;

/// One player's snake.
#[derive(Debug, Clone, Serialize)]
pub struct Snake {
    pub player: Player,
    /// Head first.
    pub body: VecDeque<Cell>,
    pub heading: Cell,
    /// Last buffered direction request, consumed at the next step.
    pub pending: Option<Direction>,
    pub alive: bool,
    pub score: u32,
    /// Time until reappearance while dead.
    pub respawn_in: Option<Duration>,
}

/// The snake room state machine.
pub struct SnakeGame {
    config: SnakeConfig,
    snakes: HashMap<ConnectionId, Snake>,
    /// Join order: drives step order and ranking tie-breaks.
    join_order: Vec<ConnectionId>,
    food: Cell,
    step_accum: Duration,
    countdown: Countdown,
    paused: bool,
    over: bool,
    rng: StdRng,
}

impl SnakeGame {
    pub fn new(config: SnakeConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let food = Cell {
            x: rng.random_range(0..config.width),
            y: rng.random_range(0..config.height),
        };
        let countdown = Countdown::new(config.match_secs);
        Self {
            config,
            snakes: HashMap::new(),
            join_order: Vec::new(),
            food,
            step_accum: Duration::ZERO,
            countdown,
            paused: false,
            over: false,
            rng,
        }
    }

    /// Read access for the renderer.
    pub fn snake(&self, id: ConnectionId) -> Option<&Snake> {
        self.snakes.get(&id)
    }

    /// The current food cell.
    pub fn food(&self) -> Cell {
        self.food
    }

    /// Seconds left on the match clock.
    pub fn time_left(&self) -> u32 {
        self.countdown.remaining()
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    fn add_snake(&mut self, player: Player) {
        if self.snakes.contains_key(&player.id) {
            return;
        }
        let id = player.id;
        let (body, heading) = self.spawn_body();
        self.snakes.insert(
            id,
            Snake {
                player,
                body,
                heading,
                pending: None,
                alive: true,
                score: 0,
                respawn_in: None,
            },
        );
        self.join_order.push(id);
    }

    /// A fresh vertical 3-segment body at a random cell, heading up.
    /// The spawn row is clamped so the whole body fits the grid.
    fn spawn_body(&mut self) -> (VecDeque<Cell>, Cell) {
        let x = self.rng.random_range(0..self.config.width);
        let y = self
            .rng
            .random_range(0..self.config.height - (SPAWN_LENGTH - 1));
        let body = (0..SPAWN_LENGTH)
            .map(|i| Cell { x, y: y + i })
            .collect();
        (body, heading_of(Direction::Up))
    }

    /// A random cell not occupied by any snake's body.
    fn spawn_food(&mut self) {
        loop {
            let candidate = Cell {
                x: self.rng.random_range(0..self.config.width),
                y: self.rng.random_range(0..self.config.height),
            };
            let occupied = self
                .snakes
                .values()
                .any(|s| s.body.contains(&candidate));
            if !occupied {
                self.food = candidate;
                return;
            }
        }
    }

    /// Scores ranked descending; the stable sort keeps ties in join order.
    fn ranking(&self) -> ScoreBoard {
        let mut entries: Vec<ScoreEntry> = self
            .join_order
            .iter()
            .filter_map(|id| self.snakes.get(id))
            .map(|s| ScoreEntry {
                id: s.player.id,
                nickname: s.player.nickname.clone(),
                score: s.score,
                color: s.player.color,
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        ScoreBoard::Players(entries)
    }

    /// One grid step for every alive snake, in join order.
    fn step(&mut self, notes: &mut Vec<GameNotification>) {
        let order = self.join_order.clone();
        for id in order {
            let Some(snake) = self.snakes.get(&id) else { continue };
            if !snake.alive {
                continue;
            }

            // Apply the buffered request unless it reverses the heading.
            let snake = self.snakes.get_mut(&id).expect("checked above");
            if let Some(request) = snake.pending.take() {
                let requested = heading_of(request);
                if !reverses(requested, snake.heading) {
                    snake.heading = requested;
                }
            }

            let head = *snake.body.front().expect("snakes are never empty");
            let new_head = head.offset(snake.heading);

            let hit_wall = new_head.x < 0
                || new_head.x >= self.config.width
                || new_head.y < 0
                || new_head.y >= self.config.height;
            let hit_body = self.snakes.values().any(|other| {
                (other.player.id == id || other.alive)
                    && other.body.contains(&new_head)
            });

            if hit_wall || hit_body {
                self.kill(id);
                continue;
            }

            let snake = self.snakes.get_mut(&id).expect("checked above");
            snake.body.push_front(new_head);
            if new_head == self.food {
                snake.score += FOOD_SCORE;
                self.spawn_food();
                notes.push(GameNotification::Score(self.ranking()));
            } else {
                snake.body.pop_back();
            }
        }
    }

    fn kill(&mut self, id: ConnectionId) {
        if let Some(snake) = self.snakes.get_mut(&id) {
            snake.alive = false;
            snake.pending = None;
            snake.respawn_in = Some(self.config.respawn_delay);
            tracing::debug!(player = %id, "snake died");
        }
    }

    /// Counts down pending respawns; a timer that reaches zero rebuilds
    /// the snake at a fresh random cell with its score intact.
    fn advance_respawns(
        &mut self,
        dt: Duration,
        notes: &mut Vec<GameNotification>,
    ) {
        let due: Vec<ConnectionId> = self
            .snakes
            .iter_mut()
            .filter_map(|(id, snake)| {
                let remaining = snake.respawn_in.as_mut()?;
                *remaining = remaining.saturating_sub(dt);
                remaining.is_zero().then_some(*id)
            })
            .collect();

        for id in due {
            let (body, heading) = self.spawn_body();
            let snake = self.snakes.get_mut(&id).expect("still present");
            snake.body = body;
            snake.heading = heading;
            snake.pending = None;
            snake.alive = true;
            snake.respawn_in = None;
            notes.push(GameNotification::Score(self.ranking()));
        }
    }

    fn restart(&mut self) {
        self.countdown = Countdown::new(self.config.match_secs);
        self.step_accum = Duration::ZERO;
        self.over = false;
        self.food = Cell {
            x: self.rng.random_range(0..self.config.width),
            y: self.rng.random_range(0..self.config.height),
        };
        let ids: Vec<ConnectionId> = self.join_order.clone();
        for id in ids {
            let (body, heading) = self.spawn_body();
            let snake = self.snakes.get_mut(&id).expect("in join order");
            snake.body = body;
            snake.heading = heading;
            snake.pending = None;
            snake.alive = true;
            snake.score = 0;
            snake.respawn_in = None;
        }
    }
}

impl Engine for SnakeGame {
    fn game_id(&self) -> GameId {
        GameId::Snake
    }

    fn apply(&mut self, event: GameEvent) -> Vec<GameNotification> {
        let mut notes = Vec::new();
        match event {
            GameEvent::PlayerJoined { player } => {
                self.add_snake(player);
                notes.push(GameNotification::Score(self.ranking()));
            }
            GameEvent::PlayerLeft { id } => {
                // Dropping the snake also drops its respawn timer.
                self.snakes.remove(&id);
                self.join_order.retain(|other| *other != id);
                notes.push(GameNotification::Score(self.ranking()));
            }
            GameEvent::Input(input_event) => {
                if let Input::Dpad { direction } = input_event.input {
                    if let Some(snake) =
                        self.snakes.get_mut(&input_event.player)
                    {
                        if snake.alive {
                            snake.pending = Some(direction);
                        }
                    }
                }
                // Joystick/buttons mean nothing on a grid.
            }
            GameEvent::Control(control) => match control {
                ControlEvent::Pause => self.paused = true,
                ControlEvent::Start | ControlEvent::Resume => {
                    self.paused = false;
                }
                ControlEvent::Restart => {
                    self.restart();
                    notes.push(GameNotification::Score(self.ranking()));
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
        if self.paused || self.over {
            return notes;
        }

        self.advance_respawns(dt, &mut notes);

        self.step_accum += dt;
        while self.step_accum >= self.config.step {
            self.step_accum -= self.config.step;
            self.step(&mut notes);
        }

        let crossed = self.countdown.advance(dt);
        for _ in 0..crossed {
            notes.push(GameNotification::Time(self.countdown.remaining()));
        }
        if self.countdown.expired() {
            self.over = true;
            notes.push(GameNotification::GameOver(self.ranking()));
        }

        notes
    }
}

// =========================================================================
// Tests
// =========================================================================
