pub mod connection_repository;
pub mod errors;
pub mod match_repository;
pub mod quiz_repository;
pub mod user_repository;
