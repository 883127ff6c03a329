pub mod challenge_service_errors;
