use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};
use serde_dynamo::to_attribute_value;

use crate::models::challenge::Challenge;
use crate::models::participant::Participant;
use crate::repositories::errors::match_repository_errors::MatchRepositoryError;

/// Durable record of challenges and their participants.
///
/// Structural writes go through `update_challenge`, which is a compare-and-
/// swap on the stored `version`; score/time accumulation goes through
/// `add_score_and_time`, an atomic per-row increment that never conflicts
/// with increments for other participants of the same match.
#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn create_challenge(
        &self,
        challenge: &Challenge,
        participants: &[Participant],
    ) -> Result<(), MatchRepositoryError>;

    async fn get_challenge(&self, match_id: &str)
        -> Result<Option<Challenge>, MatchRepositoryError>;

    /// Writes `challenge` with `version = expected_version + 1`, on the
    /// condition that the stored row still carries `expected_version`.
    async fn update_challenge(
        &self,
        challenge: &Challenge,
        expected_version: u64,
    ) -> Result<(), MatchRepositoryError>;

    /// Removes the challenge and all of its participant rows, on the
    /// condition that the stored row still carries `expected_version`.
    /// Guards against deleting a match another process just transitioned.
    async fn delete_challenge(
        &self,
        match_id: &str,
        expected_version: u64,
    ) -> Result<(), MatchRepositoryError>;

    /// Resolves a room code to its challenge, considering only rooms in a
    /// non-terminal status (codes are recycled once a room finishes).
    async fn find_by_room_code(
        &self,
        room_code: &str,
    ) -> Result<Option<Challenge>, MatchRepositoryError>;

    async fn put_participant(&self, participant: &Participant)
        -> Result<(), MatchRepositoryError>;

    async fn get_participant(
        &self,
        match_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, MatchRepositoryError>;

    /// Participants in seat (arrival) order.
    async fn get_participants(
        &self,
        match_id: &str,
    ) -> Result<Vec<Participant>, MatchRepositoryError>;

    async fn delete_participant(
        &self,
        match_id: &str,
        user_id: &str,
    ) -> Result<(), MatchRepositoryError>;

    /// Atomic increment of a participant's running score and time.
    async fn add_score_and_time(
        &self,
        match_id: &str,
        user_id: &str,
        points: u32,
        seconds: u32,
    ) -> Result<(), MatchRepositoryError>;

    async fn set_participant_ready(
        &self,
        match_id: &str,
        user_id: &str,
        ready: bool,
    ) -> Result<(), MatchRepositoryError>;

    async fn set_participant_completed(
        &self,
        match_id: &str,
        user_id: &str,
        score: u32,
        total_time_seconds: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<(), MatchRepositoryError>;

    async fn set_participant_rank(
        &self,
        match_id: &str,
        user_id: &str,
        rank: u32,
    ) -> Result<(), MatchRepositoryError>;
}

pub struct DynamoDbMatchRepository {
    pub client: Client,
    pub challenges_table: String,
    pub participants_table: String,
}

impl DynamoDbMatchRepository {
    pub fn new(client: Client) -> Self {
        let challenges_table = std::env::var("CHALLENGES_TABLE")
            .expect("CHALLENGES_TABLE environment variable must be set");
        let participants_table = std::env::var("CHALLENGE_PARTICIPANTS_TABLE")
            .expect("CHALLENGE_PARTICIPANTS_TABLE environment variable must be set");
        Self {
            client,
            challenges_table,
            participants_table,
        }
    }

    fn map_conditional<E>(err: SdkError<E>) -> MatchRepositoryError
    where
        E: aws_sdk_dynamodb::error::ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        if let SdkError::ServiceError(service_err) = &err {
            // Transactional writes surface a failed condition as a
            // cancelled transaction rather than a conditional-check error.
            let code = aws_sdk_dynamodb::error::ProvideErrorMetadata::code(service_err.err());
            if code == Some("ConditionalCheckFailedException")
                || code == Some("TransactionCanceledException")
            {
                return MatchRepositoryError::VersionConflict;
            }
        }
        MatchRepositoryError::DynamoDb(err.to_string())
    }
}

#[async_trait]
impl MatchRepository for DynamoDbMatchRepository {
    async fn create_challenge(
        &self,
        challenge: &Challenge,
        participants: &[Participant],
    ) -> Result<(), MatchRepositoryError> {
        let challenge_item = to_item(challenge)
            .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;

        let mut transaction_items = vec![TransactWriteItem::builder()
            .put(
                Put::builder()
                    .table_name(&self.challenges_table)
                    .set_item(Some(challenge_item))
                    .condition_expression("attribute_not_exists(match_id)")
                    .build()
                    .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?,
            )
            .build()];

        for participant in participants {
            let item = to_item(participant)
                .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;
            transaction_items.push(
                TransactWriteItem::builder()
                    .put(
                        Put::builder()
                            .table_name(&self.participants_table)
                            .set_item(Some(item))
                            .build()
                            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?,
                    )
                    .build(),
            );
        }

        self.client
            .transact_write_items()
            .set_transact_items(Some(transaction_items))
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn get_challenge(
        &self,
        match_id: &str,
    ) -> Result<Option<Challenge>, MatchRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.challenges_table)
            .key("match_id", AttributeValue::S(match_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = output.item {
            let challenge: Challenge = from_item(item)
                .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;
            Ok(Some(challenge))
        } else {
            Ok(None)
        }
    }

    async fn update_challenge(
        &self,
        challenge: &Challenge,
        expected_version: u64,
    ) -> Result<(), MatchRepositoryError> {
        let mut next = challenge.clone();
        next.version = expected_version + 1;

        let item =
            to_item(&next).map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.challenges_table)
            .set_item(Some(item))
            .condition_expression("version = :expected")
            .expression_attribute_values(
                ":expected",
                to_attribute_value(expected_version)
                    .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?,
            )
            .send()
            .await
            .map_err(Self::map_conditional)?;

        Ok(())
    }

    async fn delete_challenge(
        &self,
        match_id: &str,
        expected_version: u64,
    ) -> Result<(), MatchRepositoryError> {
        let participants = self.get_participants(match_id).await?;

        let mut transaction_items = vec![TransactWriteItem::builder()
            .delete(
                Delete::builder()
                    .table_name(&self.challenges_table)
                    .key("match_id", AttributeValue::S(match_id.to_string()))
                    .condition_expression("version = :expected")
                    .expression_attribute_values(
                        ":expected",
                        to_attribute_value(expected_version)
                            .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?,
                    )
                    .build()
                    .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?,
            )
            .build()];

        for participant in &participants {
            transaction_items.push(
                TransactWriteItem::builder()
                    .delete(
                        Delete::builder()
                            .table_name(&self.participants_table)
                            .key("match_id", AttributeValue::S(match_id.to_string()))
                            .key("user_id", AttributeValue::S(participant.user_id.clone()))
                            .build()
                            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?,
                    )
                    .build(),
            );
        }

        self.client
            .transact_write_items()
            .set_transact_items(Some(transaction_items))
            .send()
            .await
            .map_err(Self::map_conditional)?;

        Ok(())
    }

    async fn find_by_room_code(
        &self,
        room_code: &str,
    ) -> Result<Option<Challenge>, MatchRepositoryError> {
        let output = self
            .client
            .query()
            .table_name(&self.challenges_table)
            .index_name("GSI_RoomCode")
            .key_condition_expression("room_code = :code")
            .expression_attribute_values(":code", AttributeValue::S(room_code.to_string()))
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(items) = output.items {
            for item in items {
                let challenge: Challenge = from_item(item)
                    .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;
                if !challenge.status.is_terminal() {
                    return Ok(Some(challenge));
                }
            }
        }

        Ok(None)
    }

    async fn put_participant(
        &self,
        participant: &Participant,
    ) -> Result<(), MatchRepositoryError> {
        let item = to_item(participant)
            .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.participants_table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn get_participant(
        &self,
        match_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, MatchRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.participants_table)
            .key("match_id", AttributeValue::S(match_id.to_string()))
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = output.item {
            let participant: Participant = from_item(item)
                .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;
            Ok(Some(participant))
        } else {
            Ok(None)
        }
    }

    async fn get_participants(
        &self,
        match_id: &str,
    ) -> Result<Vec<Participant>, MatchRepositoryError> {
        let output = self
            .client
            .query()
            .table_name(&self.participants_table)
            .key_condition_expression("match_id = :match_id")
            .expression_attribute_values(":match_id", AttributeValue::S(match_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        let mut participants = Vec::new();
        if let Some(items) = output.items {
            for item in items {
                let participant: Participant = from_item(item)
                    .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;
                participants.push(participant);
            }
        }

        // Query order is key order; seat order is the contract.
        participants.sort_by_key(|p| p.seat);

        Ok(participants)
    }

    async fn delete_participant(
        &self,
        match_id: &str,
        user_id: &str,
    ) -> Result<(), MatchRepositoryError> {
        self.client
            .delete_item()
            .table_name(&self.participants_table)
            .key("match_id", AttributeValue::S(match_id.to_string()))
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn add_score_and_time(
        &self,
        match_id: &str,
        user_id: &str,
        points: u32,
        seconds: u32,
    ) -> Result<(), MatchRepositoryError> {
        self.client
            .update_item()
            .table_name(&self.participants_table)
            .key("match_id", AttributeValue::S(match_id.to_string()))
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .update_expression("ADD score :points, total_time_seconds :seconds")
            .condition_expression("attribute_exists(user_id)")
            .expression_attribute_values(":points", AttributeValue::N(points.to_string()))
            .expression_attribute_values(":seconds", AttributeValue::N(seconds.to_string()))
            .send()
            .await
            .map_err(|e| match Self::map_conditional(e) {
                MatchRepositoryError::VersionConflict => MatchRepositoryError::NotFound,
                other => other,
            })?;

        Ok(())
    }

    async fn set_participant_ready(
        &self,
        match_id: &str,
        user_id: &str,
        ready: bool,
    ) -> Result<(), MatchRepositoryError> {
        self.client
            .update_item()
            .table_name(&self.participants_table)
            .key("match_id", AttributeValue::S(match_id.to_string()))
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .update_expression("SET is_ready = :ready")
            .condition_expression("attribute_exists(user_id)")
            .expression_attribute_values(":ready", AttributeValue::Bool(ready))
            .send()
            .await
            .map_err(|e| match Self::map_conditional(e) {
                MatchRepositoryError::VersionConflict => MatchRepositoryError::NotFound,
                other => other,
            })?;

        Ok(())
    }

    async fn set_participant_completed(
        &self,
        match_id: &str,
        user_id: &str,
        score: u32,
        total_time_seconds: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<(), MatchRepositoryError> {
        self.client
            .update_item()
            .table_name(&self.participants_table)
            .key("match_id", AttributeValue::S(match_id.to_string()))
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .update_expression(
                "SET completed = :completed, completed_at = :at, \
                 score = :score, total_time_seconds = :seconds",
            )
            .condition_expression("attribute_exists(user_id)")
            .expression_attribute_values(":completed", AttributeValue::Bool(true))
            .expression_attribute_values(
                ":at",
                to_attribute_value(completed_at)
                    .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?,
            )
            .expression_attribute_values(":score", AttributeValue::N(score.to_string()))
            .expression_attribute_values(
                ":seconds",
                AttributeValue::N(total_time_seconds.to_string()),
            )
            .send()
            .await
            .map_err(|e| match Self::map_conditional(e) {
                MatchRepositoryError::VersionConflict => MatchRepositoryError::NotFound,
                other => other,
            })?;

        Ok(())
    }

    async fn set_participant_rank(
        &self,
        match_id: &str,
        user_id: &str,
        rank: u32,
    ) -> Result<(), MatchRepositoryError> {
        self.client
            .update_item()
            .table_name(&self.participants_table)
            .key("match_id", AttributeValue::S(match_id.to_string()))
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .update_expression("SET #rank = :rank")
            .condition_expression("attribute_exists(user_id)")
            .expression_attribute_names("#rank", "rank")
            .expression_attribute_values(":rank", AttributeValue::N(rank.to_string()))
            .send()
            .await
            .map_err(|e| match Self::map_conditional(e) {
                MatchRepositoryError::VersionConflict => MatchRepositoryError::NotFound,
                other => other,
            })?;

        Ok(())
    }
}
