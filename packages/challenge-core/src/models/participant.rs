use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One seat in a challenge. `seat` records arrival order and is the
/// tie-break of last resort when score and total time are both equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub match_id: String,
    pub user_id: String,
    pub username: String,
    pub score: u32,
    pub total_time_seconds: u32,
    pub is_ready: bool,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub rank: Option<u32>,
    pub seat: u32,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(match_id: &str, user_id: &str, username: &str, seat: u32) -> Self {
        Participant {
            match_id: match_id.to_string(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            score: 0,
            total_time_seconds: 0,
            is_ready: false,
            completed: false,
            completed_at: None,
            rank: None,
            seat,
            joined_at: Utc::now(),
        }
    }

    /// Clears everything accumulated during play. Used when a duel is
    /// accepted, in case a retried match left stale values behind.
    pub fn reset_transient(&mut self) {
        self.score = 0;
        self.total_time_seconds = 0;
        self.completed = false;
        self.completed_at = None;
        self.rank = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_participant_defaults() {
        let p = Participant::new("match-1", "user-1", "alice", 0);

        assert_eq!(p.match_id, "match-1");
        assert_eq!(p.user_id, "user-1");
        assert_eq!(p.username, "alice");
        assert_eq!(p.score, 0);
        assert_eq!(p.total_time_seconds, 0);
        assert!(!p.is_ready);
        assert!(!p.completed);
        assert!(p.completed_at.is_none());
        assert!(p.rank.is_none());
        assert_eq!(p.seat, 0);
    }

    #[test]
    fn test_reset_transient_clears_play_state() {
        let mut p = Participant::new("match-1", "user-1", "alice", 1);
        p.score = 40;
        p.total_time_seconds = 120;
        p.completed = true;
        p.completed_at = Some(Utc::now());
        p.rank = Some(2);
        p.is_ready = true;

        p.reset_transient();

        assert_eq!(p.score, 0);
        assert_eq!(p.total_time_seconds, 0);
        assert!(!p.completed);
        assert!(p.completed_at.is_none());
        assert!(p.rank.is_none());
        // Readiness is lobby state, not play state.
        assert!(p.is_ready);
    }

    #[test]
    fn test_participant_serialization() {
        let p = Participant::new("match-1", "user-1", "alice", 3);

        let serialized = serde_json::to_string(&p).unwrap();
        assert!(serialized.contains("\"user_id\""));
        assert!(serialized.contains("\"seat\":3"));

        let deserialized: Participant = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.user_id, p.user_id);
        assert_eq!(deserialized.seat, 3);
    }
}
