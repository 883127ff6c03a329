use crate::repositories::errors::match_repository_errors::MatchRepositoryError;
use crate::repositories::errors::quiz_repository_errors::QuizRepositoryError;
use crate::repositories::errors::user_repository_errors::UserRepositoryError;

/// Command failures returned synchronously to the caller. Only
/// `ConcurrencyConflict` means "refresh and retry"; everything else means
/// the command is simply invalid for the current state.
#[derive(Debug)]
pub enum ChallengeServiceError {
    NotFound(String),
    InvalidState(String),
    NotAuthorized(String),
    Capacity(String),
    ConcurrencyConflict,
    ValidationError(String),
    RepositoryError(MatchRepositoryError),
}

impl std::fmt::Display for ChallengeServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChallengeServiceError::NotFound(what) => write!(f, "Not found: {}", what),
            ChallengeServiceError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            ChallengeServiceError::NotAuthorized(msg) => write!(f, "Not authorized: {}", msg),
            ChallengeServiceError::Capacity(msg) => write!(f, "Capacity: {}", msg),
            ChallengeServiceError::ConcurrencyConflict => {
                write!(f, "Concurrency conflict: match was modified, refresh and retry")
            }
            ChallengeServiceError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ChallengeServiceError::RepositoryError(err) => write!(f, "Repository error: {}", err),
        }
    }
}

impl std::error::Error for ChallengeServiceError {}

impl From<MatchRepositoryError> for ChallengeServiceError {
    fn from(err: MatchRepositoryError) -> Self {
        match err {
            MatchRepositoryError::VersionConflict => ChallengeServiceError::ConcurrencyConflict,
            MatchRepositoryError::NotFound => {
                ChallengeServiceError::NotFound("match".to_string())
            }
            other => ChallengeServiceError::RepositoryError(other),
        }
    }
}

impl From<QuizRepositoryError> for ChallengeServiceError {
    fn from(err: QuizRepositoryError) -> Self {
        ChallengeServiceError::RepositoryError(MatchRepositoryError::DynamoDb(err.to_string()))
    }
}

impl From<UserRepositoryError> for ChallengeServiceError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => {
                ChallengeServiceError::NotFound("user".to_string())
            }
            other => {
                ChallengeServiceError::RepositoryError(MatchRepositoryError::DynamoDb(
                    other.to_string(),
                ))
            }
        }
    }
}
