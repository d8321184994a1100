use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use interview_api::config::Config;
use interview_api::evaluation::Evaluator;
use interview_api::interview::questions::QuestionBank;
use interview_api::interview::store::InMemorySessionStore;
use interview_api::llm_client::LlmClient;
use interview_api::routes::build_router;
use interview_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Load the question bank once; it is read-only afterwards
    let questions = QuestionBank::load(&config.questions_path)?;
    info!(
        "Loaded {} questions from {}",
        questions.len(),
        config.questions_path
    );

    // Initialize model gateway
    let llm = LlmClient::new(config.gateway_settings())?;
    info!(
        "Model gateway initialized (model: {}, base url: {})",
        llm.model(),
        config.llm_base_url
    );

    let evaluator = Evaluator::new(Arc::new(llm), config.evaluator_settings());

    // Build app state
    let state = AppState {
        questions: Arc::new(questions),
        sessions: Arc::new(InMemorySessionStore::new()),
        evaluator,
    };

    let origin: HeaderValue = config
        .cors_origin
        .parse()
        .with_context(|| format!("CORS_ORIGIN '{}' is not a valid origin", config.cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
