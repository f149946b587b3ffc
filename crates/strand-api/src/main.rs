use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use strand_api::{
    config::Config,
    handlers::chat,
    middleware::{identity, logging, rate_limit},
    routes::{health, messages, threads},
    state::AppState,
};
use strand_llm::OpenRouterClient;
use strand_persist::PersistClientBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config =
        Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting Strand API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    let llm_client: Arc<dyn strand_llm::ChatClient> =
        Arc::new(OpenRouterClient::new(config.openrouter_api_key.clone())?);

    tracing::info!("Connecting to MongoDB");
    let persist_client = PersistClientBuilder::new()
        .mongodb_uri(&config.mongodb_uri)
        .database(&config.mongodb.database)
        .manual_dedup_window_ms(config.dedup.manual_window_ms)
        .upsert_dedup_window_ms(config.dedup.upsert_window_ms)
        .build()
        .await?;
    tracing::info!("MongoDB connected");

    let state = AppState::new(config.clone(), persist_client, llm_client);

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    // Inner layers run first on the response path; identity must wrap the rate
    // limiters because they key on the authenticated caller.
    let chat_routes = Router::new()
        .route("/chat", post(chat::chat))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_chat,
        ));

    let thread_create_routes = Router::new()
        .route("/thread", post(threads::create_thread))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_thread,
        ));

    let general_routes = Router::new()
        .route("/threads", get(threads::list_threads))
        .route(
            "/threads/:thread_id",
            get(threads::get_thread)
                .delete(threads::delete_thread)
                .patch(threads::rename_thread),
        )
        .route("/threads/:thread_id/messages", get(messages::list_messages))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_general,
        ));

    let authed_routes = Router::new()
        .merge(chat_routes)
        .merge(thread_create_routes)
        .merge(general_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity::require_identity,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(authed_routes)
        .layer(middleware::from_fn(logging::log_request))
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(300)))
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors.enabled {
        let mut cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
                axum::http::Method::PATCH,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any);

        if config.cors.origins.iter().any(|o| o == "*") {
            cors = cors.allow_origin(Any);
        } else {
            for origin in &config.cors.origins {
                if let Ok(parsed_origin) = origin.parse::<axum::http::HeaderValue>() {
                    cors = cors.allow_origin(parsed_origin);
                }
            }
        }

        cors
    } else {
        CorsLayer::permissive()
    }
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
