use std::env;
use std::sync::Arc;

use crate::repositories::connection_repository::DynamoDbConnectionRepository;
use crate::repositories::match_repository::DynamoDbMatchRepository;
use crate::repositories::quiz_repository::DynamoDbQuizRepository;
use crate::repositories::user_repository::DynamoDbUserRepository;
use crate::services::challenge_service::ChallengeService;
use crate::services::notifier::WebSocketNotifier;
use crate::services::room_registry::RoomRegistry;
use crate::services::timer_service::TimerService;

/// Builds a fully wired service against DynamoDB and the API Gateway
/// Management API. Table names and the websocket endpoint come from the
/// environment; a missing variable is a deployment error and panics at
/// startup.
pub async fn challenge_service_from_env() -> Arc<ChallengeService> {
    let config = aws_config::load_from_env().await;
    let dynamodb_client = aws_sdk_dynamodb::Client::new(&config);

    let api_gateway_config = aws_sdk_apigatewaymanagement::config::Builder::from(&config)
        .endpoint_url(
            env::var("WEBSOCKET_API_ENDPOINT")
                .expect("WEBSOCKET_API_ENDPOINT environment variable must be set"),
        )
        .build();
    let api_gateway_client = aws_sdk_apigatewaymanagement::Client::from_conf(api_gateway_config);

    let connections = Arc::new(DynamoDbConnectionRepository::new(
        dynamodb_client.clone(),
        api_gateway_client,
    ));
    let registry = Arc::new(RoomRegistry::new());
    let notifier = Arc::new(WebSocketNotifier::new(
        Arc::clone(&registry),
        connections,
    ));

    ChallengeService::new(
        Arc::new(DynamoDbMatchRepository::new(dynamodb_client.clone())),
        Arc::new(DynamoDbQuizRepository::new(dynamodb_client.clone())),
        Arc::new(DynamoDbUserRepository::new(dynamodb_client)),
        notifier,
        registry,
        Arc::new(TimerService::new()),
    )
}
