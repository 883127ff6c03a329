use serde::{Deserialize, Serialize};

/// Minimal projection of an account: enough to resolve a duel opponent by
/// username and to denormalize usernames onto participants. Identity and
/// authentication live outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serialization() {
        let user = User {
            user_id: "user-1".to_string(),
            username: "alice".to_string(),
        };

        let serialized = serde_json::to_string(&user).unwrap();
        let deserialized: User = serde_json::from_str(&serialized).unwrap();

        assert_eq!(deserialized.user_id, "user-1");
        assert_eq!(deserialized.username, "alice");
    }
}
