use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::from_item;
use serde_dynamo::to_attribute_value;

use crate::models::user::User;
use crate::repositories::errors::user_repository_errors::UserRepositoryError;

/// Narrow account lookup used to resolve duel opponents. Callers are
/// already authenticated; this never touches credentials.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> Result<User, UserRepositoryError>;
    async fn find_by_username(&self, username: &str) -> Result<User, UserRepositoryError>;
}

pub struct DynamoDbUserRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbUserRepository {
    pub fn new(client: Client) -> Self {
        let table_name = std::env::var("USERS_TABLE")
            .expect("USERS_TABLE environment variable must be set");
        Self { client, table_name }
    }
}

#[async_trait]
impl UserRepository for DynamoDbUserRepository {
    async fn find_by_id(&self, user_id: &str) -> Result<User, UserRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(
                "user_id",
                to_attribute_value(user_id)
                    .map_err(|e| UserRepositoryError::Serialization(e.to_string()))?,
            )
            .send()
            .await
            .map_err(|e| UserRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = output.item {
            let user: User =
                from_item(item).map_err(|e| UserRepositoryError::Serialization(e.to_string()))?;
            Ok(user)
        } else {
            Err(UserRepositoryError::NotFound)
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<User, UserRepositoryError> {
        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name("GSI_UserByUsername")
            .key_condition_expression("username = :username")
            .expression_attribute_values(
                ":username",
                to_attribute_value(username)
                    .map_err(|e| UserRepositoryError::Serialization(e.to_string()))?,
            )
            .send()
            .await
            .map_err(|e| UserRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(items) = output.items {
            if let Some(item) = items.into_iter().next() {
                let user: User = from_item(item)
                    .map_err(|e| UserRepositoryError::Serialization(e.to_string()))?;
                return Ok(user);
            }
        }

        Err(UserRepositoryError::NotFound)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;

    pub struct InMemoryUserRepository {
        by_id: HashMap<String, User>,
    }

    impl InMemoryUserRepository {
        pub fn new(users: Vec<User>) -> Self {
            Self {
                by_id: users.into_iter().map(|u| (u.user_id.clone(), u)).collect(),
            }
        }
    }

    #[async_trait]
    impl UserRepository for InMemoryUserRepository {
        async fn find_by_id(&self, user_id: &str) -> Result<User, UserRepositoryError> {
            self.by_id
                .get(user_id)
                .cloned()
                .ok_or(UserRepositoryError::NotFound)
        }

        async fn find_by_username(&self, username: &str) -> Result<User, UserRepositoryError> {
            self.by_id
                .values()
                .find(|u| u.username == username)
                .cloned()
                .ok_or(UserRepositoryError::NotFound)
        }
    }

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let repository = InMemoryUserRepository::new(vec![User {
            user_id: "user-1".to_string(),
            username: "alice".to_string(),
        }]);

        assert_eq!(
            repository.find_by_username("alice").await.unwrap().user_id,
            "user-1"
        );
        assert!(matches!(
            repository.find_by_username("nobody").await,
            Err(UserRepositoryError::NotFound)
        ));
    }
}
