use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Runtime presence tracking: which participants currently hold a live
/// connection into which match. Owns no durable data; the participant rows
/// in the match store remain the source of truth for membership, and this
/// set is always a subset of them. Everything here is in-memory and
/// non-blocking.
#[derive(Default)]
pub struct RoomRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    // match_id -> present user ids
    rooms: HashMap<String, HashSet<String>>,
    // connection_id -> (user_id, match_id), for O(1) disconnect cleanup
    connections: HashMap<String, (String, String)>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a user's connection into a match and returns the number of
    /// users now present.
    pub fn register(&self, match_id: &str, user_id: &str, connection_id: &str) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner
            .rooms
            .entry(match_id.to_string())
            .or_default()
            .insert(user_id.to_string());
        inner.connections.insert(
            connection_id.to_string(),
            (user_id.to_string(), match_id.to_string()),
        );
        inner.rooms.get(match_id).map(|r| r.len()).unwrap_or(0)
    }

    /// Reverse-index cleanup on disconnect. Returns the (user, match) the
    /// connection belonged to, if any.
    pub fn unregister_connection(&self, connection_id: &str) -> Option<(String, String)> {
        let mut inner = self.inner.lock().unwrap();
        let (user_id, match_id) = inner.connections.remove(connection_id)?;

        // Only drop presence if no other connection of the same user
        // remains in the room.
        let still_connected = inner
            .connections
            .values()
            .any(|(u, m)| u == &user_id && m == &match_id);
        if !still_connected {
            if let Some(room) = inner.rooms.get_mut(&match_id) {
                room.remove(&user_id);
                if room.is_empty() {
                    inner.rooms.remove(&match_id);
                }
            }
        }

        Some((user_id, match_id))
    }

    /// Drops a user's presence and any of their connections in the match.
    pub fn remove_user(&self, match_id: &str, user_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(room) = inner.rooms.get_mut(match_id) {
            room.remove(user_id);
            if room.is_empty() {
                inner.rooms.remove(match_id);
            }
        }
        inner
            .connections
            .retain(|_, (u, m)| !(u == user_id && m == match_id));
    }

    pub fn present_users(&self, match_id: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .rooms
            .get(match_id)
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn present_count(&self, match_id: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.rooms.get(match_id).map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_present(&self, match_id: &str, user_id: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .rooms
            .get(match_id)
            .map(|r| r.contains(user_id))
            .unwrap_or(false)
    }

    /// Removes the whole room and all its connections, e.g. when a match
    /// completes or is deleted.
    pub fn clear_room(&self, match_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.rooms.remove(match_id);
        inner.connections.retain(|_, (_, m)| m != match_id);
    }
}
