mod builtin;
mod cli;
mod console;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use warden_ai::{
    GeminiClient, GeminiConfig, HandleOutcome, IncomingMessage, Orchestrator, OrchestratorError,
};
use warden_common::{Mode, UserId, WardenError};
use warden_config::WardenConfig;

use crate::console::{ConsoleHost, Input};

/// Filter precedence: `--log-level`, then `RUST_LOG`, then the config file.
fn init_logging(cli_level: Option<&str>, config: &WardenConfig) {
    let fallback = config.logging.level.directive();
    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(fallback)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let args = cli::parse();

    // Logging depends on the config, so load first and report afterwards.
    let loaded = warden_config::load_config_from(args.config.as_deref());
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => WardenConfig::default(),
    };
    init_logging(args.log_level.as_deref(), &config);

    tracing::info!("Warden v{} starting...", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => {
            // The loader's own warning fires before the subscriber exists.
            if let Err(e) = warden_config::validation::validate(&config) {
                tracing::warn!("Config has out-of-range values, clamping where needed: {e}");
            }
        }
        Err(e) => tracing::warn!("Config load failed, using defaults: {e}"),
    }

    if let Err(e) = run(args, config).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
    tracing::info!("Shutdown complete");
}

async fn run(args: cli::Args, config: WardenConfig) -> Result<(), WardenError> {
    let gemini = GeminiConfig::from_backend_config(&config.backend)?;
    let client = GeminiClient::new(gemini).map_err(|e| WardenError::Backend(e.to_string()))?;
    tracing::info!(model = %client.model(), "Backend ready");

    let registry = builtin::registry(args.rules.clone());
    tracing::info!("Tool registry loaded ({} tools)", registry.len());

    let orchestrator = Arc::new(Orchestrator::new(&config, Arc::new(client), registry));
    let _sweepers = orchestrator.spawn_sweepers();

    let reaper = orchestrator.clone();
    let ttl = Duration::from_secs(args.session_ttl);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            let reaped = reaper.sessions().reap_idle(ttl).await;
            let count = reaper.sessions().count().await;
            tracing::debug!(reaped, sessions = count, "Reaper tick");
        }
    });

    let host = ConsoleHost::stdio(args.out_dir.clone());
    let user = UserId::new(args.user.clone());
    let mode = if args.voice { Mode::Voice } else { Mode::Text };
    tracing::info!(user = %user, mode = %mode, "Reading messages from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Input::parse(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Clear => {
                let removed = orchestrator.clear(&user).await;
                host.say(&format!("Cleared {removed} session(s)."))?;
            }
            Input::Confirm(id) => {
                if let Err(e) = orchestrator.confirm(&id, &user, &host).await {
                    report(&host, e)?;
                }
            }
            Input::Cancel(id) => match orchestrator.cancel(&id, &user) {
                Ok(action) => host.say(&format!("Cancelled `{}`.", action.tool))?,
                Err(e) => report(&host, e)?,
            },
            Input::Message(text) => {
                let message = IncomingMessage::new(user.clone(), mode, text);
                match orchestrator.handle_message(message, &host).await {
                    Ok(HandleOutcome::RateLimited) => {
                        host.say("Slow down a little, then try again.")?;
                    }
                    Ok(HandleOutcome::Completed { .. }) => {}
                    Err(e) => report(&host, e)?,
                }
            }
        }
    }

    Ok(())
}

/// Show a per-message failure and keep the loop running.
fn report(host: &ConsoleHost, err: OrchestratorError) -> Result<(), WardenError> {
    tracing::warn!(error = %err, "Request failed");
    let err = WardenError::from(err);
    host.say(&format!("Sorry, that failed: {err}"))?;
    Ok(())
}
