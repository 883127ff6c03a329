use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::{error, info, warn};

use crate::models::challenge::{Challenge, ChallengeKind, ChallengeStatus};
use crate::models::events::ChallengeEvent;
use crate::models::participant::Participant;
use crate::models::quiz::validate_answer;
use crate::repositories::errors::user_repository_errors::UserRepositoryError;
use crate::repositories::match_repository::MatchRepository;
use crate::repositories::quiz_repository::QuizRepository;
use crate::repositories::user_repository::UserRepository;
use crate::services::errors::challenge_service_errors::ChallengeServiceError;
use crate::services::notifier::Notifier;
use crate::services::room_registry::RoomRegistry;
use crate::services::scoring;
use crate::services::timer_service::{TimerKind, TimerService};

pub const START_COUNTDOWN_SECS: u64 = 3;
pub const GRACE_PERIOD_SECS: u64 = 15;
pub const MAX_DURATION_SECS: u64 = 600;

pub const MIN_PARTICIPANTS: u32 = 2;
pub const MAX_GROUP_PARTICIPANTS: u32 = 8;

pub const ROOM_CODE_LENGTH: usize = 6;
// No 0/O or 1/I, codes are read out loud.
const ROOM_CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ROOM_CODE_ATTEMPTS: usize = 8;

/// What the submitter of an answer gets back. Only they see the correct
/// answer; the room sees a progress update without it.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_answer: String,
}

/// The match state machine and command processor.
///
/// Commands for a given match are serialized through a per-match mutex;
/// commands for different matches run in parallel. Structural writes to
/// the match store are version-checked, score accumulation is an atomic
/// per-participant increment, and the two together make every command
/// race-safe across processes as well.
pub struct ChallengeService {
    matches: Arc<dyn MatchRepository>,
    quizzes: Arc<dyn QuizRepository>,
    users: Arc<dyn UserRepository>,
    notifier: Arc<dyn Notifier>,
    registry: Arc<RoomRegistry>,
    timers: Arc<TimerService>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    // Duel auto-start countdowns that already ran, so reconnects do not
    // replay the countdown.
    countdowns_run: Mutex<HashSet<String>>,
    // Handle to ourselves for timer callbacks. Dead once the service is
    // dropped, which also makes late callbacks no-ops.
    weak: Weak<ChallengeService>,
}

impl ChallengeService {
    pub fn new(
        matches: Arc<dyn MatchRepository>,
        quizzes: Arc<dyn QuizRepository>,
        users: Arc<dyn UserRepository>,
        notifier: Arc<dyn Notifier>,
        registry: Arc<RoomRegistry>,
        timers: Arc<TimerService>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| ChallengeService {
            matches,
            quizzes,
            users,
            notifier,
            registry,
            timers,
            locks: Mutex::new(HashMap::new()),
            countdowns_run: Mutex::new(HashSet::new()),
            weak: weak.clone(),
        })
    }

    /// The serialization point: one mutex per match id, created lazily.
    fn match_lock(&self, match_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        Arc::clone(
            locks
                .entry(match_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    fn forget_match(&self, match_id: &str) {
        self.locks.lock().unwrap().remove(match_id);
        self.countdowns_run.lock().unwrap().remove(match_id);
    }

    async fn require_quiz_with_questions(
        &self,
        quiz_id: &str,
    ) -> Result<(), ChallengeServiceError> {
        if quiz_id.trim().is_empty() {
            return Err(ChallengeServiceError::ValidationError(
                "quiz id is required".to_string(),
            ));
        }
        let quiz = self
            .quizzes
            .get_quiz(quiz_id)
            .await?
            .ok_or_else(|| ChallengeServiceError::NotFound("quiz".to_string()))?;
        if quiz.questions.is_empty() {
            return Err(ChallengeServiceError::ValidationError(
                "quiz has no questions".to_string(),
            ));
        }
        Ok(())
    }

    /// Creates a 1v1 challenge against an opponent resolved by username.
    /// The opponent gets an invite push and must accept via `respond`
    /// before the match becomes active.
    pub async fn create_duel(
        &self,
        quiz_id: &str,
        creator_id: &str,
        opponent_username: &str,
    ) -> Result<Challenge, ChallengeServiceError> {
        self.require_quiz_with_questions(quiz_id).await?;

        let creator = self.users.find_by_id(creator_id).await?;
        let opponent = self
            .users
            .find_by_username(opponent_username)
            .await
            .map_err(|e| match e {
                UserRepositoryError::NotFound => {
                    ChallengeServiceError::NotFound("opponent".to_string())
                }
                other => other.into(),
            })?;

        if opponent.user_id == creator_id {
            return Err(ChallengeServiceError::ValidationError(
                "cannot challenge yourself".to_string(),
            ));
        }

        let challenge = Challenge::new_duel(quiz_id, creator_id, &opponent.user_id);
        let participants = vec![
            Participant::new(&challenge.match_id, &creator.user_id, &creator.username, 0),
            Participant::new(&challenge.match_id, &opponent.user_id, &opponent.username, 1),
        ];

        self.matches
            .create_challenge(&challenge, &participants)
            .await?;

        info!(
            "Duel {} created: {} challenged {}",
            challenge.match_id, creator.username, opponent.username
        );

        self.notifier
            .to_user(
                &opponent.user_id,
                &ChallengeEvent::ChallengeReceived {
                    match_id: challenge.match_id.clone(),
                    quiz_id: quiz_id.to_string(),
                    from_user_id: creator.user_id.clone(),
                    from_username: creator.username.clone(),
                },
            )
            .await;

        Ok(challenge)
    }

    /// Creates a group room with a fresh shareable code. The leader is
    /// seated immediately and counts as ready.
    pub async fn create_group(
        &self,
        quiz_id: &str,
        leader_id: &str,
        max_participants: u32,
    ) -> Result<Challenge, ChallengeServiceError> {
        self.require_quiz_with_questions(quiz_id).await?;

        if !(MIN_PARTICIPANTS..=MAX_GROUP_PARTICIPANTS).contains(&max_participants) {
            return Err(ChallengeServiceError::ValidationError(format!(
                "max participants must be between {} and {}",
                MIN_PARTICIPANTS, MAX_GROUP_PARTICIPANTS
            )));
        }

        let leader = self.users.find_by_id(leader_id).await?;

        // Codes are only unique among non-terminal rooms, so collide-and-
        // retry against the store rather than trusting randomness.
        let mut room_code = None;
        for _ in 0..ROOM_CODE_ATTEMPTS {
            let candidate = generate_room_code();
            if self.matches.find_by_room_code(&candidate).await?.is_none() {
                room_code = Some(candidate);
                break;
            }
        }
        let room_code = room_code.ok_or_else(|| {
            ChallengeServiceError::Capacity("could not allocate a unique room code".to_string())
        })?;

        let challenge = Challenge::new_group(quiz_id, leader_id, max_participants, &room_code);
        let mut leader_seat =
            Participant::new(&challenge.match_id, &leader.user_id, &leader.username, 0);
        leader_seat.is_ready = true;

        self.matches
            .create_challenge(&challenge, &[leader_seat])
            .await?;

        info!(
            "Group room {} ({}) created by {}",
            challenge.match_id, room_code, leader.username
        );

        Ok(challenge)
    }

    /// Duel opponent accepts or declines. Accepting is the authoritative
    /// pending -> active transition; declining removes the match outright.
    pub async fn respond(
        &self,
        match_id: &str,
        user_id: &str,
        accept: bool,
    ) -> Result<(), ChallengeServiceError> {
        let lock = self.match_lock(match_id);
        let _guard = lock.lock().await;

        let mut challenge = self
            .matches
            .get_challenge(match_id)
            .await?
            .ok_or_else(|| ChallengeServiceError::NotFound("match".to_string()))?;

        if challenge.kind != ChallengeKind::Duel {
            return Err(ChallengeServiceError::InvalidState(
                "only duels take a response".to_string(),
            ));
        }
        if challenge.opponent_id.as_deref() != Some(user_id) {
            return Err(ChallengeServiceError::NotAuthorized(
                "only the challenged opponent may respond".to_string(),
            ));
        }
        if challenge.status != ChallengeStatus::Pending {
            return Err(ChallengeServiceError::InvalidState(format!(
                "duel is {:?}, not pending",
                challenge.status
            )));
        }

        if accept {
            // Re-initialize both seats in case a retried match left stale
            // values behind.
            for mut participant in self.matches.get_participants(match_id).await? {
                participant.reset_transient();
                self.matches.put_participant(&participant).await?;
            }

            let read_version = challenge.version;
            challenge.status = ChallengeStatus::Active;
            challenge.started_at = Some(Utc::now());
            self.matches
                .update_challenge(&challenge, read_version)
                .await?;

            self.arm_max_duration(match_id);
            info!("Duel {} accepted by {}", match_id, user_id);
        } else {
            let creator_id = challenge.creator_id.clone();
            self.matches
                .delete_challenge(match_id, challenge.version)
                .await?;
            self.timers.cancel_all(match_id);
            self.registry.clear_room(match_id);
            self.forget_match(match_id);

            self.notifier
                .to_user(
                    &creator_id,
                    &ChallengeEvent::ChallengeDeclined {
                        match_id: match_id.to_string(),
                    },
                )
                .await;
            info!("Duel {} declined by {}", match_id, user_id);
        }

        Ok(())
    }

    /// Joins a waiting group room. Re-joining with a seated user id is a
    /// successful no-op so reconnects are painless.
    pub async fn join_room(
        &self,
        match_id: &str,
        user_id: &str,
        username: &str,
    ) -> Result<(), ChallengeServiceError> {
        let lock = self.match_lock(match_id);
        let _guard = lock.lock().await;

        let challenge = self
            .matches
            .get_challenge(match_id)
            .await?
            .ok_or_else(|| ChallengeServiceError::NotFound("match".to_string()))?;

        if challenge.kind != ChallengeKind::Group {
            return Err(ChallengeServiceError::InvalidState(
                "only group rooms can be joined".to_string(),
            ));
        }

        if self
            .matches
            .get_participant(match_id, user_id)
            .await?
            .is_some()
        {
            return Ok(());
        }

        if challenge.status != ChallengeStatus::Waiting {
            return Err(ChallengeServiceError::InvalidState(
                "room has already started".to_string(),
            ));
        }

        let participants = self.matches.get_participants(match_id).await?;
        if participants.len() as u32 >= challenge.max_participants {
            return Err(ChallengeServiceError::Capacity("room is full".to_string()));
        }

        // Seats must stay unique after pre-start withdrawals, so an index is
        // never reused.
        let seat = participants.iter().map(|p| p.seat + 1).max().unwrap_or(0);
        let participant = Participant::new(match_id, user_id, username, seat);
        self.matches.put_participant(&participant).await?;

        self.notifier
            .to_room(
                match_id,
                &ChallengeEvent::ParticipantJoined {
                    user_id: user_id.to_string(),
                    username: username.to_string(),
                },
            )
            .await;

        Ok(())
    }

    /// Updates the caller's own readiness. Returns whether every seated
    /// participant is now ready, so the UI can prompt the leader.
    pub async fn set_ready(
        &self,
        match_id: &str,
        user_id: &str,
        ready: bool,
    ) -> Result<bool, ChallengeServiceError> {
        let lock = self.match_lock(match_id);
        let _guard = lock.lock().await;

        let challenge = self
            .matches
            .get_challenge(match_id)
            .await?
            .ok_or_else(|| ChallengeServiceError::NotFound("match".to_string()))?;

        if challenge.status != ChallengeStatus::Waiting {
            return Err(ChallengeServiceError::InvalidState(
                "readiness only applies before the room starts".to_string(),
            ));
        }
        if self
            .matches
            .get_participant(match_id, user_id)
            .await?
            .is_none()
        {
            return Err(ChallengeServiceError::NotAuthorized(
                "not a participant of this room".to_string(),
            ));
        }

        self.matches
            .set_participant_ready(match_id, user_id, ready)
            .await?;

        let participants = self.matches.get_participants(match_id).await?;
        let all_ready = participants.iter().all(|p| p.is_ready);

        if all_ready && participants.len() as u32 >= MIN_PARTICIPANTS {
            self.notifier
                .to_room(match_id, &ChallengeEvent::AllReady)
                .await;
        }

        Ok(all_ready)
    }

    /// Leader starts a waiting group room once everyone is ready.
    pub async fn start_group(
        &self,
        match_id: &str,
        leader_id: &str,
        expected_version: u64,
    ) -> Result<(), ChallengeServiceError> {
        let lock = self.match_lock(match_id);
        let _guard = lock.lock().await;

        let mut challenge = self
            .matches
            .get_challenge(match_id)
            .await?
            .ok_or_else(|| ChallengeServiceError::NotFound("match".to_string()))?;

        if challenge.kind != ChallengeKind::Group {
            return Err(ChallengeServiceError::InvalidState(
                "only group rooms are started by a leader".to_string(),
            ));
        }
        if challenge.leader_id.as_deref() != Some(leader_id) {
            return Err(ChallengeServiceError::NotAuthorized(
                "only the room leader may start the match".to_string(),
            ));
        }
        if challenge.status != ChallengeStatus::Waiting {
            return Err(ChallengeServiceError::InvalidState(format!(
                "room is {:?}, not waiting",
                challenge.status
            )));
        }

        let participants = self.matches.get_participants(match_id).await?;
        if (participants.len() as u32) < MIN_PARTICIPANTS {
            return Err(ChallengeServiceError::Capacity(format!(
                "at least {} participants are required",
                MIN_PARTICIPANTS
            )));
        }
        if !participants.iter().all(|p| p.is_ready) {
            return Err(ChallengeServiceError::InvalidState(
                "not all participants are ready".to_string(),
            ));
        }

        challenge.status = ChallengeStatus::Active;
        challenge.started_at = Some(Utc::now());
        self.matches
            .update_challenge(&challenge, expected_version)
            .await?;

        info!("Group room {} started by {}", match_id, leader_id);

        self.notifier
            .to_room(
                match_id,
                &ChallengeEvent::MatchStarting {
                    countdown_seconds: START_COUNTDOWN_SECS,
                },
            )
            .await;
        self.arm_start_countdown(match_id);
        self.arm_max_duration(match_id);

        Ok(())
    }

    /// Scores one answer. Correct answers add a flat point value and the
    /// time spent as an atomic increment, so concurrent submissions from
    /// different participants never conflict. The room hears progress but
    /// never the correct answer.
    pub async fn submit_answer(
        &self,
        match_id: &str,
        user_id: &str,
        question_id: &str,
        answer: &str,
        time_taken_seconds: u32,
    ) -> Result<AnswerOutcome, ChallengeServiceError> {
        let lock = self.match_lock(match_id);
        let _guard = lock.lock().await;

        let challenge = self
            .matches
            .get_challenge(match_id)
            .await?
            .ok_or_else(|| ChallengeServiceError::NotFound("match".to_string()))?;

        if challenge.status != ChallengeStatus::Active {
            return Err(ChallengeServiceError::InvalidState(format!(
                "match is {:?}, not active",
                challenge.status
            )));
        }
        let participant = self
            .matches
            .get_participant(match_id, user_id)
            .await?
            .ok_or_else(|| {
                ChallengeServiceError::NotAuthorized("not a participant of this match".to_string())
            })?;
        // MarkComplete finalized this participant's score; late submissions
        // must not mutate it.
        if participant.completed {
            return Err(ChallengeServiceError::InvalidState(
                "participant has already finished".to_string(),
            ));
        }

        let quiz = self
            .quizzes
            .get_quiz(&challenge.quiz_id)
            .await?
            .ok_or_else(|| ChallengeServiceError::NotFound("quiz".to_string()))?;
        let position = quiz
            .questions
            .iter()
            .position(|q| q.question_id == question_id)
            .ok_or_else(|| ChallengeServiceError::NotFound("question".to_string()))?;
        let question = &quiz.questions[position];

        let correct = validate_answer(question, answer);
        if correct {
            self.matches
                .add_score_and_time(
                    match_id,
                    user_id,
                    scoring::POINTS_PER_CORRECT_ANSWER,
                    time_taken_seconds,
                )
                .await?;
        }

        let score = self
            .matches
            .get_participant(match_id, user_id)
            .await?
            .map(|p| p.score)
            .unwrap_or(0);

        self.notifier
            .to_room_except(
                match_id,
                user_id,
                &ChallengeEvent::ProgressUpdate {
                    user_id: user_id.to_string(),
                    score,
                    current_question: position as u32 + 1,
                },
            )
            .await;

        // A completion that previously failed to commit gets another
        // chance on the next natural check-in.
        let participants = self.matches.get_participants(match_id).await?;
        if scoring::all_completed(&participants) {
            if let Err(e) = self.complete_match(match_id, false).await {
                warn!("Deferred completion of match {} failed: {}", match_id, e);
            }
        }

        let outcome = AnswerOutcome {
            correct,
            correct_answer: question.correct_answer.clone(),
        };

        self.notifier
            .to_user(
                user_id,
                &ChallengeEvent::AnswerResult {
                    correct: outcome.correct,
                    correct_answer: outcome.correct_answer.clone(),
                },
            )
            .await;

        Ok(outcome)
    }

    /// Finalizes one participant's run. The first finisher arms the grace
    /// period; the last finisher completes the match immediately. Calls
    /// after the match completed are no-ops.
    pub async fn mark_complete(
        &self,
        match_id: &str,
        user_id: &str,
        final_score: u32,
        total_time_seconds: u32,
    ) -> Result<(), ChallengeServiceError> {
        let lock = self.match_lock(match_id);
        let _guard = lock.lock().await;

        let challenge = self
            .matches
            .get_challenge(match_id)
            .await?
            .ok_or_else(|| ChallengeServiceError::NotFound("match".to_string()))?;

        if challenge.status == ChallengeStatus::Completed {
            return Ok(());
        }
        if challenge.status != ChallengeStatus::Active {
            return Err(ChallengeServiceError::InvalidState(format!(
                "match is {:?}, not active",
                challenge.status
            )));
        }

        let participant = self
            .matches
            .get_participant(match_id, user_id)
            .await?
            .ok_or_else(|| {
                ChallengeServiceError::NotAuthorized("not a participant of this match".to_string())
            })?;
        if participant.completed {
            return Ok(());
        }

        self.matches
            .set_participant_completed(
                match_id,
                user_id,
                final_score,
                total_time_seconds,
                Utc::now(),
            )
            .await?;

        let participants = self.matches.get_participants(match_id).await?;
        let completed_count = participants.iter().filter(|p| p.completed).count() as u32;
        let total = participants.len() as u32;

        self.notifier
            .to_room(
                match_id,
                &ChallengeEvent::ParticipantCompleted {
                    user_id: user_id.to_string(),
                    completed_count,
                    total,
                },
            )
            .await;

        if scoring::all_completed(&participants) {
            self.complete_match(match_id, false).await?;
        } else if completed_count == 1 {
            // First finisher: give everyone else a bounded window instead
            // of waiting forever.
            self.arm_grace_period(match_id);
            self.notifier
                .to_room(
                    match_id,
                    &ChallengeEvent::AutoEndTimerStarted {
                        seconds_remaining: GRACE_PERIOD_SECS,
                    },
                )
                .await;
        }

        Ok(())
    }

    /// The single convergence point for all completion paths. Runs at most
    /// once per match: a status other than active means another path got
    /// here first and this call is a no-op.
    ///
    /// Callers must hold the per-match lock.
    async fn complete_match(
        &self,
        match_id: &str,
        forced: bool,
    ) -> Result<(), ChallengeServiceError> {
        let mut challenge = match self.matches.get_challenge(match_id).await? {
            Some(challenge) => challenge,
            None => return Ok(()),
        };
        if !challenge.can_transition_to(ChallengeStatus::Completed) {
            return Ok(());
        }

        let mut participants = self.matches.get_participants(match_id).await?;

        if forced {
            // Freeze-in-place: whoever never marked complete keeps their
            // last recorded score and time.
            let now = Utc::now();
            for participant in participants.iter_mut().filter(|p| !p.completed) {
                self.matches
                    .set_participant_completed(
                        match_id,
                        &participant.user_id,
                        participant.score,
                        participant.total_time_seconds,
                        now,
                    )
                    .await?;
                participant.completed = true;
                participant.completed_at = Some(now);
            }
        }

        scoring::rank_participants(&mut participants);
        for participant in &participants {
            self.matches
                .set_participant_rank(match_id, &participant.user_id, participant.rank.unwrap_or(0))
                .await?;
        }

        let winner_id = if challenge.kind == ChallengeKind::Duel && participants.len() == 2 {
            scoring::determine_winner(&participants[0], &participants[1])
        } else {
            None
        };

        let read_version = challenge.version;
        challenge.status = ChallengeStatus::Completed;
        challenge.completed_at = Some(Utc::now());
        challenge.winner_id = winner_id.clone();
        self.matches
            .update_challenge(&challenge, read_version)
            .await?;

        self.timers.cancel_all(match_id);

        info!(
            "Match {} completed ({}){}",
            match_id,
            if forced { "forced" } else { "all finished" },
            winner_id
                .as_deref()
                .map(|w| format!(", winner {}", w))
                .unwrap_or_default()
        );

        self.notifier
            .to_room(
                match_id,
                &ChallengeEvent::MatchFinished {
                    winner_id,
                    participants,
                },
            )
            .await;

        self.registry.clear_room(match_id);
        self.forget_match(match_id);

        Ok(())
    }

    /// Timer-driven completion. Failures are logged, not fatal: the next
    /// check-in from a live connection retries.
    async fn force_complete(&self, match_id: &str) {
        let lock = self.match_lock(match_id);
        let _guard = lock.lock().await;

        if let Err(e) = self.complete_match(match_id, true).await {
            error!("Forced completion of match {} failed: {}", match_id, e);
        }
    }

    /// Drops runtime presence. Leaving a room that has not started is a
    /// real withdrawal and frees the seat; once active, the durable row
    /// stays and only MarkComplete or timers can end the match.
    pub async fn leave(&self, match_id: &str, user_id: &str) -> Result<(), ChallengeServiceError> {
        let lock = self.match_lock(match_id);
        let _guard = lock.lock().await;

        self.registry.remove_user(match_id, user_id);

        if let Some(challenge) = self.matches.get_challenge(match_id).await? {
            if challenge.status == ChallengeStatus::Waiting {
                self.matches.delete_participant(match_id, user_id).await?;
            }
        }

        self.notifier
            .to_room(
                match_id,
                &ChallengeEvent::ParticipantLeft {
                    user_id: user_id.to_string(),
                },
            )
            .await;

        Ok(())
    }

    /// Creator/leader tears down a match that has not started.
    pub async fn cancel(
        &self,
        match_id: &str,
        caller_id: &str,
        expected_version: u64,
    ) -> Result<(), ChallengeServiceError> {
        let lock = self.match_lock(match_id);
        let _guard = lock.lock().await;

        let challenge = self
            .matches
            .get_challenge(match_id)
            .await?
            .ok_or_else(|| ChallengeServiceError::NotFound("match".to_string()))?;

        if !matches!(
            challenge.status,
            ChallengeStatus::Pending | ChallengeStatus::Waiting
        ) {
            return Err(ChallengeServiceError::InvalidState(
                "only unstarted matches can be deleted".to_string(),
            ));
        }
        if challenge.creator_id != caller_id {
            return Err(ChallengeServiceError::NotAuthorized(
                "only the creator may delete the match".to_string(),
            ));
        }
        if challenge.version != expected_version {
            return Err(ChallengeServiceError::ConcurrencyConflict);
        }

        self.notifier
            .to_room(match_id, &ChallengeEvent::RoomDeleted)
            .await;
        if challenge.kind == ChallengeKind::Duel {
            if let Some(opponent_id) = &challenge.opponent_id {
                self.notifier
                    .to_user(opponent_id, &ChallengeEvent::RoomDeleted)
                    .await;
            }
        }

        self.matches
            .delete_challenge(match_id, challenge.version)
            .await?;
        self.timers.cancel_all(match_id);
        self.registry.clear_room(match_id);
        self.forget_match(match_id);

        info!("Match {} deleted by {}", match_id, caller_id);

        Ok(())
    }

    /// A participant's socket came up. Registers presence and, for duels,
    /// kicks off the cosmetic start countdown once both sides are present.
    /// The countdown never changes durable state; `respond(accept)` is the
    /// authoritative transition to active.
    pub async fn handle_connect(
        &self,
        match_id: &str,
        user_id: &str,
        connection_id: &str,
    ) -> Result<(), ChallengeServiceError> {
        let lock = self.match_lock(match_id);
        let _guard = lock.lock().await;

        let challenge = self
            .matches
            .get_challenge(match_id)
            .await?
            .ok_or_else(|| ChallengeServiceError::NotFound("match".to_string()))?;

        if challenge.status.is_terminal() {
            return Err(ChallengeServiceError::InvalidState(
                "match is already over".to_string(),
            ));
        }
        if self
            .matches
            .get_participant(match_id, user_id)
            .await?
            .is_none()
        {
            return Err(ChallengeServiceError::NotAuthorized(
                "not a participant of this match".to_string(),
            ));
        }

        let was_present = self.registry.is_present(match_id, user_id);
        let present = self.registry.register(match_id, user_id, connection_id);

        if challenge.kind == ChallengeKind::Duel {
            // Only the first connection announces the arrival; reconnects
            // on a fresh socket stay silent.
            if !was_present {
                let username = self
                    .matches
                    .get_participant(match_id, user_id)
                    .await?
                    .map(|p| p.username)
                    .unwrap_or_default();
                self.notifier
                    .to_room_except(
                        match_id,
                        user_id,
                        &ChallengeEvent::OpponentJoined {
                            user_id: user_id.to_string(),
                            username,
                        },
                    )
                    .await;
            }

            let already_ran = self.countdowns_run.lock().unwrap().contains(match_id);
            if challenge.status == ChallengeStatus::Active && present == 2 && !already_ran {
                self.countdowns_run
                    .lock()
                    .unwrap()
                    .insert(match_id.to_string());
                self.notifier
                    .to_room(
                        match_id,
                        &ChallengeEvent::MatchStarting {
                            countdown_seconds: START_COUNTDOWN_SECS,
                        },
                    )
                    .await;
                self.arm_start_countdown(match_id);
            }
        }

        Ok(())
    }

    /// A socket dropped. Presence-only cleanup; an active match keeps
    /// running, a disconnect is not a finish.
    pub async fn handle_disconnect(&self, connection_id: &str) {
        if let Some((user_id, match_id)) = self.registry.unregister_connection(connection_id) {
            self.notifier
                .to_room(
                    &match_id,
                    &ChallengeEvent::ParticipantLeft {
                        user_id: user_id.clone(),
                    },
                )
                .await;
            info!("User {} disconnected from match {}", user_id, match_id);
        }
    }

    fn arm_start_countdown(&self, match_id: &str) {
        let weak = self.weak.clone();
        let id = match_id.to_string();
        self.timers.arm(
            match_id,
            TimerKind::StartCountdown,
            Duration::from_secs(START_COUNTDOWN_SECS),
            async move {
                if let Some(service) = weak.upgrade() {
                    service
                        .notifier
                        .to_room(&id, &ChallengeEvent::MatchStarted)
                        .await;
                }
            },
        );
    }

    fn arm_grace_period(&self, match_id: &str) {
        let weak = self.weak.clone();
        let id = match_id.to_string();
        self.timers.arm(
            match_id,
            TimerKind::GracePeriod,
            Duration::from_secs(GRACE_PERIOD_SECS),
            async move {
                if let Some(service) = weak.upgrade() {
                    service.force_complete(&id).await;
                }
            },
        );
    }

    fn arm_max_duration(&self, match_id: &str) {
        let weak = self.weak.clone();
        let id = match_id.to_string();
        self.timers.arm(
            match_id,
            TimerKind::MaxDuration,
            Duration::from_secs(MAX_DURATION_SECS),
            async move {
                if let Some(service) = weak.upgrade() {
                    service.force_complete(&id).await;
                }
            },
        );
    }
}

fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| {
            let index = rng.gen_range(0..ROOM_CODE_CHARSET.len());
            ROOM_CODE_CHARSET[index] as char
        })
        .collect()
}
