//! The compact gamepad input encoding.
//!
//! Joystick snapshots are sent dozens of times per second from every
//! controller, so they travel as fixed-shape positional arrays instead of
//! keyed objects: `[kind, ...payload]`. Button and d-pad names go through a
//! small shared symbol table so a press is two numbers on the wire.
//!
//! | Kind        | Shape                | Numeric policy                  |
//! |-------------|----------------------|---------------------------------|
//! | Joystick    | `[0, x, y]`          | x, y rounded to 4 decimals      |
//! | ButtonDown  | `[1, button_id]`     | symbol table                    |
//! | FireShot    | `[2, angle, power]`  | angle 4 decimals, power 2       |
//! | Dpad        | `[3, direction_id]`  | symbol table                    |
//!
//! Decoding reverses the table exactly and *fails* (the caller drops the
//! event) on an unknown kind tag, a wrong arity, or a symbol id that maps
//! to nothing. A direct-channel frame carries no sender metadata, so the
//! receiving side attaches the link's peer id via [`EncodedInput::decode_from`];
//! relay-delivered frames arrive enveloped with the sender id and unwrap to
//! the identical [`InputEvent`] shape.

use serde::{Deserialize, Serialize};

use crate::{ConnectionId, ProtocolError};

// Kind tags. Positional slot 0 of every encoded array.
const KIND_JOYSTICK: f64 = 0.0;
const KIND_BUTTON_DOWN: f64 = 1.0;
const KIND_FIRE_SHOT: f64 = 2.0;
const KIND_DPAD: f64 = 3.0;

/// A gamepad button. `Power` is the one-use power shot trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Button {
    A,
    Power,
}

/// A d-pad direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

// One symbol table covers both buttons and directions — they share the id
// space so controllers only carry a single lookup.
fn symbol_of_button(button: Button) -> f64 {
    match button {
        Button::A => 0.0,
        Button::Power => 1.0,
    }
}

fn symbol_of_direction(direction: Direction) -> f64 {
    match direction {
        Direction::Up => 2.0,
        Direction::Down => 3.0,
        Direction::Left => 4.0,
        Direction::Right => 5.0,
    }
}

fn button_from_symbol(id: f64) -> Option<Button> {
    if id.fract() != 0.0 {
        return None;
    }
    match id as i64 {
        0 => Some(Button::A),
        1 => Some(Button::Power),
        _ => None,
    }
}

fn direction_from_symbol(id: f64) -> Option<Direction> {
    if id.fract() != 0.0 {
        return None;
    }
    match id as i64 {
        2 => Some(Direction::Up),
        3 => Some(Direction::Down),
        4 => Some(Direction::Left),
        5 => Some(Direction::Right),
        _ => None,
    }
}

/// Rounds to `places` decimal places (half away from zero).
fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Input — the decoded, typed event
// ---------------------------------------------------------------------------

/// A decoded gamepad input. This is the only shape engines ever see;
/// the positional array never travels past the protocol boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Input {
    /// A full joystick snapshot. Idempotent: each message is the current
    /// stick position, not a delta, so lost messages are harmless.
    Joystick { x: f64, y: f64 },
    /// A button press.
    ButtonDown { button: Button },
    /// An aimed shot: `angle` in radians, `power` in `0..=100`.
    FireShot { angle: f64, power: f64 },
    /// A d-pad press.
    Dpad { direction: Direction },
}

impl Input {
    /// Encodes into the positional wire shape, applying the rounding
    /// policy (coordinates/angle to 4 decimals, power to 2).
    pub fn encode(&self) -> EncodedInput {
        let array = match *self {
            Input::Joystick { x, y } => {
                vec![KIND_JOYSTICK, round_to(x, 4), round_to(y, 4)]
            }
            Input::ButtonDown { button } => {
                vec![KIND_BUTTON_DOWN, symbol_of_button(button)]
            }
            Input::FireShot { angle, power } => {
                vec![KIND_FIRE_SHOT, round_to(angle, 4), round_to(power, 2)]
            }
            Input::Dpad { direction } => {
                vec![KIND_DPAD, symbol_of_direction(direction)]
            }
        };
        EncodedInput(array)
    }
}

/// An input tagged with the player it came from.
///
/// Constructed at the receive boundary: either by attaching the direct
/// link's peer id ([`EncodedInput::decode_from`]) or by unwrapping the
/// relay envelope's `player_id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputEvent {
    pub player: ConnectionId,
    pub input: Input,
}

// ---------------------------------------------------------------------------
// EncodedInput — the positional wire shape
// ---------------------------------------------------------------------------

/// The raw positional array as it travels on the wire.
///
/// `#[serde(transparent)]` keeps the JSON a bare array (`[0, 0.5, -0.25]`),
/// not an object wrapping one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedInput(pub Vec<f64>);

impl EncodedInput {
    /// Decodes back into a typed [`Input`].
    ///
    /// # Errors
    /// [`ProtocolError::MalformedInput`] on an unknown kind tag, wrong
    /// arity, non-finite number, or unknown symbol id. Callers drop the
    /// single event and keep the link alive.
    pub fn decode(&self) -> Result<Input, ProtocolError> {
        let malformed = |what: &str| {
            ProtocolError::MalformedInput(format!("{what}: {:?}", self.0))
        };

        let (&kind, rest) = self
            .0
            .split_first()
            .ok_or_else(|| malformed("empty input array"))?;
        if rest.iter().any(|n| !n.is_finite()) {
            return Err(malformed("non-finite payload"));
        }

        match (kind, rest) {
            (k, &[x, y]) if k == KIND_JOYSTICK => Ok(Input::Joystick { x, y }),
            (k, &[id]) if k == KIND_BUTTON_DOWN => {
                let button = button_from_symbol(id)
                    .ok_or_else(|| malformed("unknown button symbol"))?;
                Ok(Input::ButtonDown { button })
            }
            (k, &[angle, power]) if k == KIND_FIRE_SHOT => {
                Ok(Input::FireShot { angle, power })
            }
            (k, &[id]) if k == KIND_DPAD => {
                let direction = direction_from_symbol(id)
                    .ok_or_else(|| malformed("unknown direction symbol"))?;
                Ok(Input::Dpad { direction })
            }
            _ => Err(malformed("unknown kind or wrong arity")),
        }
    }

    /// Decodes and attaches the sender's id.
    ///
    /// Used on the host side for direct-channel frames, where the sender
    /// is known only from which link delivered the bytes.
    pub fn decode_from(
        &self,
        player: ConnectionId,
    ) -> Result<InputEvent, ProtocolError> {
        Ok(InputEvent {
            player,
            input: self.decode()?,
        })
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tolerance: f64) {
        assert!(
            (a - b).abs() <= tolerance,
            "{a} and {b} differ by more than {tolerance}"
        );
    }

    #[test]
    fn test_joystick_encodes_positionally() {
        let encoded = Input::Joystick { x: 0.5, y: -0.25 }.encode();
        assert_eq!(encoded.0, vec![0.0, 0.5, -0.25]);
    }

    #[test]
    fn test_joystick_rounds_to_four_decimals() {
        let encoded = Input::Joystick {
            x: 0.123456789,
            y: -0.987654321,
        }
        .encode();
        assert_eq!(encoded.0[1], 0.1235);
        assert_eq!(encoded.0[2], -0.9877);
    }

    #[test]
    fn test_joystick_round_trip_within_tolerance() {
        let original = Input::Joystick {
            x: 0.70710678,
            y: -0.70710678,
        };
        let Input::Joystick { x, y } = original.encode().decode().unwrap()
        else {
            panic!("wrong kind");
        };
        assert_close(x, 0.70710678, 1e-4);
        assert_close(y, -0.70710678, 1e-4);
    }

    #[test]
    fn test_fire_shot_rounds_angle_and_power_differently() {
        let encoded = Input::FireShot {
            angle: -1.23456789,
            power: 87.6543,
        }
        .encode();
        assert_eq!(encoded.0, vec![2.0, -1.2346, 87.65]);

        let Input::FireShot { angle, power } = encoded.decode().unwrap()
        else {
            panic!("wrong kind");
        };
        assert_close(angle, -1.23456789, 1e-4);
        assert_close(power, 87.6543, 1e-2);
    }

    #[test]
    fn test_buttons_and_directions_reverse_exactly() {
        for button in [Button::A, Button::Power] {
            let decoded = Input::ButtonDown { button }.encode().decode();
            assert_eq!(decoded.unwrap(), Input::ButtonDown { button });
        }
        for direction in [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ] {
            let decoded = Input::Dpad { direction }.encode().decode();
            assert_eq!(decoded.unwrap(), Input::Dpad { direction });
        }
    }

    #[test]
    fn test_buttons_and_directions_share_one_symbol_space() {
        // Symbol ids must not collide across the two input kinds' tables.
        let button_ids: Vec<f64> = [Button::A, Button::Power]
            .iter()
            .map(|b| symbol_of_button(*b))
            .collect();
        for direction in [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ] {
            assert!(!button_ids.contains(&symbol_of_direction(direction)));
        }
    }

    #[test]
    fn test_decode_unknown_kind_fails() {
        let result = EncodedInput(vec![9.0, 1.0]).decode();
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_wrong_arity_fails() {
        assert!(EncodedInput(vec![0.0, 1.0]).decode().is_err());
        assert!(EncodedInput(vec![1.0]).decode().is_err());
        assert!(EncodedInput(vec![]).decode().is_err());
    }

    #[test]
    fn test_decode_unknown_symbol_fails() {
        assert!(EncodedInput(vec![1.0, 42.0]).decode().is_err());
        assert!(EncodedInput(vec![3.0, 0.0]).decode().is_err()); // A is not a direction
    }

    #[test]
    fn test_decode_non_finite_fails() {
        assert!(EncodedInput(vec![0.0, f64::NAN, 0.0]).decode().is_err());
        assert!(
            EncodedInput(vec![2.0, f64::INFINITY, 50.0]).decode().is_err()
        );
    }

    #[test]
    fn test_decode_from_attaches_sender() {
        let encoded = Input::Dpad {
            direction: Direction::Left,
        }
        .encode();
        let event = encoded.decode_from(ConnectionId(7)).unwrap();
        assert_eq!(event.player, ConnectionId(7));
        assert_eq!(
            event.input,
            Input::Dpad {
                direction: Direction::Left
            }
        );
    }

    #[test]
    fn test_wire_json_is_a_bare_array() {
        let encoded = Input::Joystick { x: 1.0, y: 0.0 }.encode();
        let json = serde_json::to_string(&encoded).unwrap();
        assert_eq!(json, "[0.0,1.0,0.0]");
    }
}
