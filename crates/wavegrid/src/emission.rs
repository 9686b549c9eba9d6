//! Emitter bookkeeping: identities and world positions.

use crate::simulation::Vec3;
use std::fmt;

/// Handle of an emitter registered with an [`EmissionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmissionId(u32);

impl EmissionId {
    /// Raw id value.
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "emitter#{}", self.0)
    }
}

/// A live emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emitter {
    pub id: EmissionId,
    pub position: Vec3,
}

/// Tracks emitters by id. Ids are never reused.
#[derive(Debug, Default)]
pub struct EmissionManager {
    emitters: Vec<Emitter>,
    next_id: u32,
}

impl EmissionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an emitter and return its id.
    pub fn emit(&mut self, position: Vec3) -> EmissionId {
        let id = EmissionId(self.next_id);
        self.next_id += 1;
        self.emitters.push(Emitter { id, position });
        id
    }

    /// Move an emitter. Returns false if the id is unknown.
    pub fn update(&mut self, id: EmissionId, position: Vec3) -> bool {
        match self.emitters.iter_mut().find(|e| e.id == id) {
            Some(emitter) => {
                emitter.position = position;
                true
            }
            None => false,
        }
    }

    /// Remove an emitter. Returns false if the id is unknown.
    pub fn end(&mut self, id: EmissionId) -> bool {
        if let Some(pos) = self.emitters.iter().position(|e| e.id == id) {
            self.emitters.remove(pos);
            true
        } else {
            false
        }
    }

    /// World position of an emitter, `None` if the id is unknown.
    pub fn get(&self, id: EmissionId) -> Option<Vec3> {
        self.emitters
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.position)
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    /// Iterate over live emitters in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Emitter> {
        self.emitters.iter()
    }
}
