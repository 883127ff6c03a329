use serde::{Deserialize, Serialize};

use crate::models::participant::Participant;

/// Outbound events pushed to connected participants. Serialized as tagged
/// JSON so any transport can fan them out verbatim.
///
/// `AnswerResult` is unicast to the submitter only; progress broadcasts to
/// the rest of the room never carry the correct answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChallengeEvent {
    ChallengeReceived {
        match_id: String,
        quiz_id: String,
        from_user_id: String,
        from_username: String,
    },
    ChallengeDeclined {
        match_id: String,
    },
    ParticipantJoined {
        user_id: String,
        username: String,
    },
    OpponentJoined {
        user_id: String,
        username: String,
    },
    AllReady,
    MatchStarting {
        countdown_seconds: u64,
    },
    MatchStarted,
    ProgressUpdate {
        user_id: String,
        score: u32,
        current_question: u32,
    },
    AnswerResult {
        correct: bool,
        correct_answer: String,
    },
    ParticipantCompleted {
        user_id: String,
        completed_count: u32,
        total: u32,
    },
    AutoEndTimerStarted {
        seconds_remaining: u64,
    },
    MatchFinished {
        winner_id: Option<String>,
        participants: Vec<Participant>,
    },
    ParticipantLeft {
        user_id: String,
    },
    RoomDeleted,
}
