//! Pointdeck server entry point.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pointdeck::adapters::auth::JwtRoomAccess;
use pointdeck::adapters::events::{RedisRoomBus, RetryPolicy};
use pointdeck::adapters::postgres::PostgresRoundStore;
use pointdeck::adapters::websocket::{room_routes, GatewayState, MessageRouter, RoomRegistry};
use pointdeck::application::VotingService;
use pointdeck::config::AppConfig;
use pointdeck::ports::{RoomAccess, RoomBus, RoundStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pointdeck=info")),
        )
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let registry = Arc::new(RoomRegistry::new(config.websocket.channel_capacity));

    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let bus: Arc<dyn RoomBus> = Arc::new(
        RedisRoomBus::connect(
            &redis_client,
            Arc::clone(&registry),
            RetryPolicy {
                max_attempts: config.redis.publish_attempts,
                ..RetryPolicy::default()
            },
        )
        .await?,
    );

    let store: Arc<dyn RoundStore> = Arc::new(PostgresRoundStore::new(pool));
    let voting = Arc::new(VotingService::new(store, Arc::clone(&bus)));
    let router = Arc::new(MessageRouter::new(voting, Arc::clone(&bus)));
    let access: Arc<dyn RoomAccess> = Arc::new(JwtRoomAccess::new(&config.auth.jwt_secret));

    let state = GatewayState {
        registry,
        bus,
        router,
        access,
        settings: config.websocket.clone(),
    };

    let app = axum::Router::new()
        .merge(room_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.server.socket_addr();
    tracing::info!(addr = %addr, "pointdeck listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
