pub mod challenge_service;
pub mod errors;
pub mod notifier;
pub mod room_registry;
pub mod scoring;
pub mod timer_service;
