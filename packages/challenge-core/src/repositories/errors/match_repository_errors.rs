#[derive(Debug)]
pub enum MatchRepositoryError {
    Serialization(String),
    DynamoDb(String),
    /// The supplied version no longer matches the stored row. The caller
    /// must re-fetch and retry or abort; the write was not applied.
    VersionConflict,
    NotFound,
}

impl std::fmt::Display for MatchRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            MatchRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
            MatchRepositoryError::VersionConflict => {
                write!(f, "Version conflict: stored match was modified concurrently")
            }
            MatchRepositoryError::NotFound => write!(f, "Match not found"),
        }
    }
}

impl std::error::Error for MatchRepositoryError {}
