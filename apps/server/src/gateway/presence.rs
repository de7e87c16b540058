//! In-memory presence registry: connection identity → last display name.
//!
//! Owned by the relay task, which is its only writer. Roster order is the order
//! in which identities first reported; renaming keeps the original slot.

use std::collections::HashMap;

use geoshare_common::{ConnectionId, RosterEntry};

/// Per-connection presence state.
struct Presence {
    /// Insertion slot, used to keep roster order stable.
    slot: u64,
    /// Display name from the most recent report.
    name: String,
}

/// Mapping from connection identity to display name.
pub struct PresenceRegistry {
    inner: HashMap<ConnectionId, Presence>,
    next_slot: u64,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
            next_slot: 0,
        }
    }

    /// Create or overwrite the entry for `id`.
    ///
    /// Returns `true` if the identity was not present before.
    pub fn upsert(&mut self, id: &ConnectionId, name: &str) -> bool {
        if let Some(entry) = self.inner.get_mut(id) {
            if entry.name != name {
                entry.name = name.to_string();
            }
            return false;
        }

        let slot = self.next_slot;
        self.next_slot += 1;
        self.inner.insert(
            id.clone(),
            Presence {
                slot,
                name: name.to_string(),
            },
        );
        true
    }

    /// Drop the entry for `id`. Absent identities are not an error.
    pub fn remove(&mut self, id: &ConnectionId) -> bool {
        self.inner.remove(id).is_some()
    }

    /// Current display name for `id`, if it has reported.
    pub fn get(&self, id: &ConnectionId) -> Option<&str> {
        self.inner.get(id).map(|p| p.name.as_str())
    }

    /// The roster in insertion order.
    pub fn snapshot(&self) -> Vec<RosterEntry> {
        let mut entries: Vec<(&ConnectionId, &Presence)> = self.inner.iter().collect();
        entries.sort_by_key(|(_, p)| p.slot);
        entries
            .into_iter()
            .map(|(id, p)| RosterEntry {
                id: id.clone(),
                name: p.name.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
