//! Socket watch registry.

use std::collections::HashMap;

use crate::engine::{Interest, Socket};

/// The descriptors the engine currently wants watched.
///
/// Updated only from engine socket events; read by `wait`/`poll` and by the
/// reactor when it registers OS-level watches.
#[derive(Debug, Default)]
pub struct SocketRegistry {
    entries: HashMap<Socket, Interest>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one engine socket event. `Interest::None` unwatches.
    pub fn apply(&mut self, socket: Socket, interest: Interest) {
        if interest.is_none() {
            self.entries.remove(&socket);
        } else {
            self.entries.insert(socket, interest);
        }
    }

    pub fn interest(&self, socket: Socket) -> Option<Interest> {
        self.entries.get(&socket).copied()
    }

    pub fn contains(&self, socket: Socket) -> bool {
        self.interest(socket).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Socket, Interest)> + '_ {
        self.entries.iter().map(|(socket, interest)| (*socket, *interest))
    }

    /// Unwatch everything, returning the descriptors that were watched.
    pub fn drain(&mut self) -> Vec<Socket> {
        self.entries.drain().map(|(socket, _)| socket).collect()
    }
}
