use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use relay_domain::config::{Config, ConfigSeverity};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use relay_gateway::api;
use relay_gateway::bootstrap::build_app_state;
use relay_gateway::cli::{load_config, Cli, Command, ConfigCommand};
use relay_gateway::runtime::turn::resolve_turn;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = Arc::new(load_config(&cli.config)?);

    match cli.command {
        None | Some(Command::Serve) => serve(config).await,
        Some(Command::Run { message, conversation }) => run_once(config, message, conversation).await,
        Some(Command::Config(ConfigCommand::Validate)) => validate_config(&config),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn serve(config: Arc<Config>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_app_state(config)?;

    let app = api::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "chatrelay listening");
    axum::serve(listener, app).await.context("server error")
}

async fn run_once(
    config: Arc<Config>,
    message: String,
    conversation: Option<i64>,
) -> anyhow::Result<()> {
    let state = build_app_state(config)?;
    let conversation_id = match conversation {
        Some(id) => id,
        None => state.store.create_conversation().await?,
    };
    let reply = resolve_turn(&state, conversation_id, &message).await?;
    println!("{reply}");
    tracing::info!(conversation_id, "turn complete");
    Ok(())
}

fn validate_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        println!("{issue}");
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!("config has errors");
    }
    println!("config OK ({} warning(s))", issues.len());
    Ok(())
}
