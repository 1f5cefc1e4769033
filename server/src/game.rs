use log::{debug, info, warn};
use shared::{Event, PlayerId, Unit, UNIT_SIZE, WORLD_HEIGHT, WORLD_WIDTH};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// The authoritative game state as seen by the transport layer.
///
/// Every connection's reader calls into the simulation from its own task, so
/// implementations must tolerate concurrent calls.
pub trait Simulation: Send + Sync {
    /// Creates a unit for a new player and returns its id.
    fn add_player(&self) -> PlayerId;

    /// Applies one event to the world.
    fn handle_event(&self, event: &Event);

    /// Snapshot of every unit, keyed by owner.
    fn units(&self) -> HashMap<PlayerId, Unit>;

    fn unit(&self, player_id: PlayerId) -> Option<Unit> {
        self.units().remove(&player_id)
    }
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u32,
    pub next_player_id: PlayerId,
    pub units: HashMap<PlayerId, Unit>,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            next_player_id: 1,
            units: HashMap::new(),
        }
    }

    pub fn add_player(&mut self) -> PlayerId {
        let player_id = self.next_player_id;
        self.next_player_id += 1;

        let spawn_x = 100.0 + (player_id as f32 * 60.0) % (WORLD_WIDTH - 200.0);
        let spawn_y = 100.0 + (player_id as f32 * 45.0) % (WORLD_HEIGHT - 200.0 - UNIT_SIZE);
        let unit = Unit::new(player_id, spawn_x, spawn_y, (player_id % 4) as u8);

        info!("Added player {} at ({}, {})", player_id, unit.x, unit.y);
        self.units.insert(player_id, unit);
        player_id
    }

    pub fn remove_player(&mut self, player_id: PlayerId) {
        if self.units.remove(&player_id).is_some() {
            info!("Removed player {}", player_id);
        }
    }

    pub fn handle_event(&mut self, event: &Event) {
        match event {
            Event::Exit { player_id } => self.remove_player(*player_id),
            Event::Opaque { kind, .. } => match event.as_command() {
                Some(command) => match self.units.get_mut(&command.player_id()) {
                    Some(unit) => unit.apply(&command),
                    None => debug!("Command for unknown player {}", command.player_id()),
                },
                None => debug!("Ignoring opaque event of kind {}", kind),
            },
            Event::Init { .. } | Event::Connect { .. } => {
                warn!("Unexpected {} event from a peer", event.name());
            }
        }
    }

    pub fn step(&mut self, dt: f32) {
        for unit in self.units.values_mut() {
            unit.step(dt);
        }
        self.tick += 1;
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference [`Simulation`] guarding a [`GameState`] with a lock.
#[derive(Debug, Default)]
pub struct World {
    state: RwLock<GameState>,
}

impl World {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GameState::new()),
        }
    }

    pub fn step(&self, dt: f32) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .step(dt);
    }

    pub fn tick(&self) -> u32 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tick
    }
}

impl Simulation for World {
    fn add_player(&self) -> PlayerId {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_player()
    }

    fn handle_event(&self, event: &Event) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .handle_event(event);
    }

    fn units(&self) -> HashMap<PlayerId, Unit> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .units
            .clone()
    }

    fn unit(&self, player_id: PlayerId) -> Option<Unit> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .units
            .get(&player_id)
            .cloned()
    }
}
