#[derive(Debug)]
pub enum QuizRepositoryError {
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for QuizRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuizRepositoryError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            QuizRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for QuizRepositoryError {}
