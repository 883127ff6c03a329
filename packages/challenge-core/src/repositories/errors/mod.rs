pub mod match_repository_errors;
pub mod quiz_repository_errors;
pub mod user_repository_errors;
