use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::models::events::ChallengeEvent;
use crate::repositories::connection_repository::ConnectionRepository;
use crate::services::room_registry::RoomRegistry;

/// Outbound event fan-out. Implementations deliver best-effort: a
/// recipient that cannot be reached is logged and skipped, never an error
/// that would roll back the state change that produced the event.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn to_user(&self, user_id: &str, event: &ChallengeEvent);
    async fn to_room(&self, match_id: &str, event: &ChallengeEvent);
    async fn to_room_except(&self, match_id: &str, excluded_user_id: &str, event: &ChallengeEvent);
}

pub struct WebSocketNotifier {
    registry: Arc<RoomRegistry>,
    connections: Arc<dyn ConnectionRepository>,
}

impl WebSocketNotifier {
    pub fn new(registry: Arc<RoomRegistry>, connections: Arc<dyn ConnectionRepository>) -> Self {
        Self {
            registry,
            connections,
        }
    }

    async fn push(&self, user_id: &str, event: &ChallengeEvent) {
        let message = match serde_json::to_string(event) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to serialize event for {}: {}", user_id, e);
                return;
            }
        };

        match self.connections.get_connection_id(user_id).await {
            Ok(Some(connection_id)) => {
                if let Err(e) = self.connections.send_message(&connection_id, &message).await {
                    warn!("Failed to deliver event to {}: {}", user_id, e);
                }
            }
            Ok(None) => {
                info!("User {} is not connected, skipping notification", user_id);
            }
            Err(e) => {
                warn!("Connection lookup failed for {}: {}", user_id, e);
            }
        }
    }
}

#[async_trait]
impl Notifier for WebSocketNotifier {
    async fn to_user(&self, user_id: &str, event: &ChallengeEvent) {
        self.push(user_id, event).await;
    }

    async fn to_room(&self, match_id: &str, event: &ChallengeEvent) {
        for user_id in self.registry.present_users(match_id) {
            self.push(&user_id, event).await;
        }
    }

    async fn to_room_except(
        &self,
        match_id: &str,
        excluded_user_id: &str,
        event: &ChallengeEvent,
    ) {
        for user_id in self.registry.present_users(match_id) {
            if user_id != excluded_user_id {
                self.push(&user_id, event).await;
            }
        }
    }
}
