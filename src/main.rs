use axum::{
    routing::{delete, get, post},
    Router,
};
use marketplace_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware::auth::require_bearer_auth,
    routes, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    let public_routes = Router::new()
        .route("/health", get(routes::health::health))
        .route("/chat/ws/:user_id", get(routes::chat::chat_ws))
        .route("/chat/support/status", get(routes::chat::support_status));

    let chat_api = Router::new()
        .route("/chat/messages", post(routes::chat::send_message))
        .route("/chat/conversations", get(routes::chat::list_conversations))
        .route(
            "/chat/conversations/:partner_id/messages",
            get(routes::chat::get_conversation_messages),
        )
        .route(
            "/chat/conversations/:partner_id/resolve",
            post(routes::chat::resolve_conversation),
        )
        .route(
            "/chat/conversations/:partner_id",
            delete(routes::chat::delete_conversation),
        )
        .route(
            "/chat/orders/:order_id/messages",
            get(routes::chat::get_order_messages),
        )
        .route(
            "/chat/messages/:message_id/read",
            post(routes::chat::mark_message_read),
        )
        .route("/chat/support/connect", post(routes::chat::connect_to_support))
        .route(
            "/chat/support/conversations",
            get(routes::chat::support_conversations),
        )
        .layer(axum::middleware::from_fn(require_bearer_auth));

    let app = public_routes
        .merge(chat_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
