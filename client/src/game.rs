use log::debug;
use shared::{Event, PlayerId, Unit};
use std::collections::HashMap;

/// Local mirror of the world, rebuilt from the server's event stream
#[derive(Debug, Clone, Default)]
pub struct ClientWorld {
    pub player_id: Option<PlayerId>,
    pub units: HashMap<PlayerId, Unit>,
}

impl ClientWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::Init { player_id, units } => {
                self.player_id = Some(*player_id);
                self.units = units.clone();
            }
            Event::Connect { unit } => {
                self.units.insert(unit.id, unit.clone());
            }
            Event::Exit { player_id } => {
                self.units.remove(player_id);
            }
            Event::Opaque { kind, .. } => match event.as_command() {
                Some(command) => {
                    if let Some(unit) = self.units.get_mut(&command.player_id()) {
                        unit.apply(&command);
                    }
                }
                None => debug!("Skipping opaque event of kind {}", kind),
            },
        }
    }

    pub fn step(&mut self, dt: f32) {
        for unit in self.units.values_mut() {
            unit.step(dt);
        }
    }

    /// The unit owned by this client, once joined.
    pub fn own_unit(&self) -> Option<&Unit> {
        self.player_id.and_then(|id| self.units.get(&id))
    }
}
