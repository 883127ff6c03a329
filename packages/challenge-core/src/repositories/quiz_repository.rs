use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::from_item;

use crate::models::quiz::Quiz;
use crate::repositories::errors::quiz_repository_errors::QuizRepositoryError;

/// Read-only view of quiz content. Authoring and storage of quizzes happen
/// elsewhere; this crate only needs the questions to score answers.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn get_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, QuizRepositoryError>;
}

pub struct DynamoDbQuizRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbQuizRepository {
    pub fn new(client: Client) -> Self {
        let table_name = std::env::var("QUIZZES_TABLE")
            .expect("QUIZZES_TABLE environment variable must be set");
        Self { client, table_name }
    }
}

#[async_trait]
impl QuizRepository for DynamoDbQuizRepository {
    async fn get_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, QuizRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("quiz_id", AttributeValue::S(quiz_id.to_string()))
            .send()
            .await
            .map_err(|e| QuizRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = output.item {
            let quiz: Quiz =
                from_item(item).map_err(|e| QuizRepositoryError::Serialization(e.to_string()))?;
            Ok(Some(quiz))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::models::quiz::Question;
    use std::collections::HashMap;

    /// Fixture repository serving a fixed set of quizzes.
    pub struct FixtureQuizRepository {
        quizzes: HashMap<String, Quiz>,
    }

    impl FixtureQuizRepository {
        pub fn new(quizzes: Vec<Quiz>) -> Self {
            Self {
                quizzes: quizzes.into_iter().map(|q| (q.quiz_id.clone(), q)).collect(),
            }
        }

        pub fn with_questions(quiz_id: &str, count: usize) -> Self {
            let questions = (1..=count)
                .map(|i| Question {
                    question_id: format!("q{}", i),
                    text: format!("Question {}", i),
                    options: vec!["right".to_string(), "wrong".to_string()],
                    correct_answer: "right".to_string(),
                })
                .collect();
            Self::new(vec![Quiz {
                quiz_id: quiz_id.to_string(),
                title: "Fixture quiz".to_string(),
                questions,
            }])
        }
    }

    #[async_trait]
    impl QuizRepository for FixtureQuizRepository {
        async fn get_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, QuizRepositoryError> {
            Ok(self.quizzes.get(quiz_id).cloned())
        }
    }

    #[tokio::test]
    async fn test_fixture_serves_known_quiz() {
        let repository = FixtureQuizRepository::with_questions("quiz-1", 5);

        let quiz = repository.get_quiz("quiz-1").await.unwrap().unwrap();
        assert_eq!(quiz.questions.len(), 5);
        assert!(repository.get_quiz("other").await.unwrap().is_none());
    }
}
