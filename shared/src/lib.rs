use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod codec;

pub use codec::CodecError;

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const UNIT_SIZE: f32 = 32.0;
pub const UNIT_SPEED: f32 = 120.0;

/// Tag of `Event::Opaque` payloads that carry a bincode-encoded [`Command`].
pub const COMMAND_KIND: u16 = 1;

/// Player identifier handed out by the simulation.
pub type PlayerId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit vector in screen coordinates (y grows downwards).
    pub fn vector(self) -> (f32, f32) {
        match self {
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Idle,
    Move,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Unit {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub direction: Direction,
    pub action: Action,
    pub speed: f32,
    pub skin: u8,
}

impl Unit {
    pub fn new(id: PlayerId, x: f32, y: f32, skin: u8) -> Self {
        Self {
            id,
            x,
            y,
            direction: Direction::Down,
            action: Action::Idle,
            speed: UNIT_SPEED,
            skin,
        }
    }

    /// Advances a moving unit by `dt` seconds, keeping it inside the world.
    pub fn step(&mut self, dt: f32) {
        if self.action != Action::Move {
            return;
        }

        let (dx, dy) = self.direction.vector();
        self.x = (self.x + dx * self.speed * dt).clamp(0.0, WORLD_WIDTH - UNIT_SIZE);
        self.y = (self.y + dy * self.speed * dt).clamp(0.0, WORLD_HEIGHT - UNIT_SIZE);
    }

    pub fn apply(&mut self, command: &Command) {
        match command {
            Command::Move { direction, .. } => {
                self.direction = *direction;
                self.action = Action::Move;
            }
            Command::Stop { .. } => {
                self.action = Action::Idle;
            }
        }
    }
}

/// Player input understood by the reference world.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Command {
    Move {
        player_id: PlayerId,
        direction: Direction,
    },
    Stop {
        player_id: PlayerId,
    },
}

impl Command {
    pub fn player_id(&self) -> PlayerId {
        match self {
            Command::Move { player_id, .. } | Command::Stop { player_id } => *player_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Event {
    /// Sent point-to-point to a freshly joined player.
    Init {
        player_id: PlayerId,
        units: HashMap<PlayerId, Unit>,
    },
    /// Announces a new unit to every connected player.
    Connect { unit: Unit },
    Exit { player_id: PlayerId },
    /// Simulation-specific payload, forwarded verbatim.
    Opaque { kind: u16, payload: Vec<u8> },
}

impl Event {
    pub fn command(command: &Command) -> Result<Event, CodecError> {
        let payload = bincode::serialize(command).map_err(CodecError::Encode)?;
        Ok(Event::Opaque {
            kind: COMMAND_KIND,
            payload,
        })
    }

    /// Decodes the [`Command`] inside an opaque event, if it carries one.
    pub fn as_command(&self) -> Option<Command> {
        match self {
            Event::Opaque { kind, payload } if *kind == COMMAND_KIND => {
                bincode::deserialize(payload).ok()
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::Init { .. } => "init",
            Event::Connect { .. } => "connect",
            Event::Exit { .. } => "exit",
            Event::Opaque { .. } => "opaque",
        }
    }
}
