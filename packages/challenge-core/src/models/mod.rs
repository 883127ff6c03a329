pub mod challenge;
pub mod events;
pub mod participant;
pub mod quiz;
pub mod user;
