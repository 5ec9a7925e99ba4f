/// Registry of live Stratum connections
///
/// Owns the id → connection map and the quarantine set. The server keeps
/// one instance behind a single lock so register, unregister, quarantine
/// and broadcast never interleave.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use super::connection::Connection;

#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<u64, Arc<Connection>>,
    quarantined: HashSet<u64>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connection: Arc<Connection>) {
        self.sessions.insert(connection.id(), connection);
    }

    /// Remove from both the session map and the quarantine set
    pub fn unregister(&mut self, id: u64) -> Option<Arc<Connection>> {
        self.quarantined.remove(&id);
        self.sessions.remove(&id)
    }

    /// Mark a live session as quarantined.
    ///
    /// Returns the connection only the first time, so callers notify once.
    pub fn quarantine(&mut self, id: u64) -> Option<Arc<Connection>> {
        let connection = self.sessions.get(&id)?;
        if self.quarantined.insert(id) {
            Some(Arc::clone(connection))
        } else {
            None
        }
    }

    pub fn is_quarantined(&self, id: u64) -> bool {
        self.quarantined.contains(&id)
    }

    pub fn get(&self, id: u64) -> Option<&Arc<Connection>> {
        self.sessions.get(&id)
    }

    /// Registered sessions, quarantined ones included
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn quarantined_count(&self) -> usize {
        self.quarantined.len()
    }

    /// Registered sessions minus quarantined ones
    pub fn live_count(&self) -> usize {
        self.sessions.len() - self.quarantined.len()
    }

    pub fn connections(&self) -> impl Iterator<Item = &Arc<Connection>> + '_ {
        self.sessions.values()
    }

    /// Sessions that should receive a broadcast
    pub fn broadcast_targets(&self) -> impl Iterator<Item = &Arc<Connection>> + '_ {
        self.sessions
            .values()
            .filter(|c| !self.quarantined.contains(&c.id()) && c.is_connected())
    }

    /// Distinct miner addresses claimed by registered sessions, sorted
    pub fn miner_addresses(&self) -> Vec<String> {
        self.sessions
            .values()
            .filter_map(|c| c.miner_address())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn has_miner_address(&self, address: &str) -> bool {
        self.sessions
            .values()
            .any(|c| c.miner_address() == Some(address))
    }
}
