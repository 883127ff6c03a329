use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeKind {
    Duel,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeStatus {
    Pending,
    Waiting,
    Active,
    Completed,
    Cancelled,
}

impl ChallengeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChallengeStatus::Completed | ChallengeStatus::Cancelled)
    }
}

/// A challenge covers both a 1v1 duel and a multi-player group room.
/// Structural fields (status, version, winner, timestamps) only change
/// through version-checked writes; per-participant scores live on the
/// Participant rows and are incremented atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub match_id: String,
    pub kind: ChallengeKind,
    pub quiz_id: String,
    pub status: ChallengeStatus,
    pub version: u64,
    pub max_participants: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub creator_id: String,
    pub opponent_id: Option<String>,
    pub winner_id: Option<String>,
    pub leader_id: Option<String>,
    pub room_code: Option<String>,
}

impl Challenge {
    pub fn new_duel(quiz_id: &str, creator_id: &str, opponent_id: &str) -> Self {
        Challenge {
            match_id: Uuid::new_v4().to_string(),
            kind: ChallengeKind::Duel,
            quiz_id: quiz_id.to_string(),
            status: ChallengeStatus::Pending,
            version: 1,
            max_participants: 2,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            creator_id: creator_id.to_string(),
            opponent_id: Some(opponent_id.to_string()),
            winner_id: None,
            leader_id: None,
            room_code: None,
        }
    }

    pub fn new_group(quiz_id: &str, leader_id: &str, max_participants: u32, room_code: &str) -> Self {
        Challenge {
            match_id: Uuid::new_v4().to_string(),
            kind: ChallengeKind::Group,
            quiz_id: quiz_id.to_string(),
            status: ChallengeStatus::Waiting,
            version: 1,
            max_participants,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            creator_id: leader_id.to_string(),
            opponent_id: None,
            winner_id: None,
            leader_id: Some(leader_id.to_string()),
            room_code: Some(room_code.to_string()),
        }
    }

    /// Status transitions are monotonic: pending -> waiting -> active ->
    /// completed, plus any non-terminal state -> cancelled.
    pub fn can_transition_to(&self, next: ChallengeStatus) -> bool {
        use ChallengeStatus::*;
        match (self.status, next) {
            (Pending, Active) | (Pending, Cancelled) => true,
            (Waiting, Active) | (Waiting, Cancelled) => true,
            (Active, Completed) | (Active, Cancelled) => true,
            _ => false,
        }
    }
}
