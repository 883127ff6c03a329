use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::{primitives::Blob, Client as ApiGatewayClient};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::env;

/// Live socket connections, keyed by user. The notifier resolves a user to
/// a connection here and pushes through the API Gateway Management API.
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn store_connection(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn remove_connection_by_id(
        &self,
        connection_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_connection_id(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>;

    async fn send_message(
        &self,
        connection_id: &str,
        message: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub struct DynamoDbConnectionRepository {
    dynamodb_client: DynamoDbClient,
    api_gateway_client: ApiGatewayClient,
    table_name: String,
}

impl DynamoDbConnectionRepository {
    pub fn new(dynamodb_client: DynamoDbClient, api_gateway_client: ApiGatewayClient) -> Self {
        let table_name = env::var("CHALLENGE_CONNECTIONS_TABLE")
            .expect("CHALLENGE_CONNECTIONS_TABLE environment variable must be set");

        Self {
            dynamodb_client,
            api_gateway_client,
            table_name,
        }
    }
}

#[async_trait]
impl ConnectionRepository for DynamoDbConnectionRepository {
    async fn store_connection(
        &self,
        user_id: &str,
        connection_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .item("user_id", AttributeValue::S(user_id.to_string()))
            .item("connection_id", AttributeValue::S(connection_id.to_string()))
            .send()
            .await?;

        Ok(())
    }

    async fn remove_connection_by_id(
        &self,
        connection_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let output = self
            .dynamodb_client
            .scan()
            .table_name(&self.table_name)
            .filter_expression("connection_id = :connection_id")
            .expression_attribute_values(
                ":connection_id",
                AttributeValue::S(connection_id.to_string()),
            )
            .send()
            .await?;

        if let Some(items) = output.items {
            for item in items {
                if let Some(AttributeValue::S(user_id)) = item.get("user_id") {
                    self.dynamodb_client
                        .delete_item()
                        .table_name(&self.table_name)
                        .key("user_id", AttributeValue::S(user_id.clone()))
                        .send()
                        .await?;
                }
            }
        }

        Ok(())
    }

    async fn get_connection_id(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        let output = self
            .dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .send()
            .await?;

        if let Some(item) = output.item {
            if let Some(AttributeValue::S(connection_id)) = item.get("connection_id") {
                return Ok(Some(connection_id.clone()));
            }
        }

        Ok(None)
    }

    async fn send_message(
        &self,
        connection_id: &str,
        message: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.api_gateway_client
            .post_to_connection()
            .connection_id(connection_id)
            .data(Blob::new(message.as_bytes()))
            .send()
            .await?;

        Ok(())
    }
}
