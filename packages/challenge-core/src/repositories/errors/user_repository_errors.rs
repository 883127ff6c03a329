#[derive(Debug)]
pub enum UserRepositoryError {
    Serialization(String),
    DynamoDb(String),
    NotFound,
}

impl std::fmt::Display for UserRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRepositoryError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            UserRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
            UserRepositoryError::NotFound => write!(f, "User not found"),
        }
    }
}

impl std::error::Error for UserRepositoryError {}
