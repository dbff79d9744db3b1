//! Interview bot - LLM-driven interview chat service
//!
//! Interviews a person through a browser chat, stores the transcript, and
//! mails the transcript together with the generated story when the interview
//! ends.

mod api;
mod config;
mod llm;
mod mail;
mod runtime;
mod state_machine;
mod store;
mod story;
mod system_prompt;

use api::{create_router, AppState};
use config::AppConfig;
use llm::ModelRegistry;
use mail::SmtpMailer;
use runtime::{
    RegistryLlmClient, ReplySettings, SessionManager, SessionServices, IDLE_SESSION_TIMEOUT,
};
use state_machine::InterviewContext;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "interview_bot=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            eprintln!("interview-bot: {e}");
            std::process::exit(1);
        }
    };

    // LLM
    let llm_registry = Arc::new(ModelRegistry::new(&config.llm));
    let model_id = llm_registry.default_model_id().to_string();
    if llm_registry.default().is_none() {
        return Err(format!(
            "Model {model_id:?} is not available; configured models: {:?}",
            llm_registry.available_models()
        )
        .into());
    }
    tracing::info!(
        models = ?llm_registry.available_models(),
        default = %model_id,
        "LLM registry initialized"
    );

    // Interview script
    let context = InterviewContext::default();
    let script = match &config.generation.script_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading interview script");
            Some(system_prompt::read_script(path)?)
        }
        None => None,
    };
    let settings = ReplySettings {
        system_prompt: system_prompt::build_system_prompt(script.as_deref(), &context.markers),
        max_tokens: config.generation.max_tokens,
        temperature: config.generation.temperature,
        stream: config.generation.stream,
    };

    // Transcript store
    tracing::info!(location = ?config.store, "Opening transcript store");
    let store = config.store.open()?;

    // Mail
    let mailer = SmtpMailer::new(&config.smtp)?;
    tracing::info!(
        host = %config.smtp.host,
        port = config.smtp.port,
        recipients = config.smtp.recipients.len(),
        "Mail dispatcher ready"
    );

    let sessions = SessionManager::new(SessionServices {
        llm: Arc::new(RegistryLlmClient::new(llm_registry, model_id)),
        store,
        mailer: Arc::new(mailer),
        context,
        settings,
    });
    let state = AppState::new(sessions);
    state.sessions.spawn_idle_reaper(IDLE_SESSION_TIMEOUT);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Interview bot listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
