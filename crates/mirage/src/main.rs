mod bot;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{error, info, warn};

use mirage_engine::config::ConfigLoader;
use mirage_engine::driver::BrowserSession;
use mirage_engine::orchestrator::Orchestrator;
use mirage_engine::session::{SessionState, SessionStore};
use mirage_h::HeadlessSession;

use bot::{AppState, Command};

#[derive(Parser)]
#[command(
    name = "mirage",
    version,
    about = "Telegram relay bot for a browser-driven image generator"
)]
struct Args {
    /// Site profile YAML. Defaults to ./mirage.yaml, then
    /// ~/.mirage/config.yaml, then the built-in profile.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session state file (cookie snapshot).
    #[arg(long, default_value = "cookies.json")]
    session: PathBuf,

    /// Launch the browser in visible mode (not headless).
    #[arg(long)]
    visible: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr so stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let profile = match &args.config {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };

    let store = SessionStore::new(&args.session);
    let initial_state: Option<SessionState> = match store.load().await {
        Ok(state) => Some(state),
        Err(e) if profile.require_auth => {
            anyhow::bail!("pre-authentication is required but the session is unusable: {e}");
        }
        Err(e) => {
            warn!("continuing unauthenticated: {e}");
            None
        }
    };

    let mut session = HeadlessSession::new_with_visibility(args.visible);
    session
        .launch()
        .await
        .context("failed to launch the browser session")?;
    if let Some(state) = &initial_state {
        if let Err(e) = session.apply_session_state(state).await {
            warn!("could not apply saved session state: {e}");
        }
    }

    let token = std::env::var("TELEGRAM_TOKEN")
        .or_else(|_| std::env::var("TELOXIDE_TOKEN"))
        .context("TELEGRAM_TOKEN is not set")?;
    let telegram = Bot::new(token);

    let state = Arc::new(AppState {
        session: tokio::sync::Mutex::new(session),
        orchestrator: Orchestrator::new(profile),
        store,
        session_loaded: initial_state.is_some(),
    });

    info!("bot starting");
    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(bot::handle_command),
        )
        .branch(dptree::endpoint(bot::handle_prompt));

    Dispatcher::builder(telegram, handler)
        .dependencies(dptree::deps![state.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    shutdown(&state).await;
    Ok(())
}

/// Capture the (possibly refreshed) cookies back to the store, then close
/// the browser. Runs after the dispatcher has drained.
async fn shutdown(state: &AppState) {
    info!("bot stopping, capturing session state");
    let mut session = state.session.lock().await;

    match session.capture_session_state().await {
        Ok(captured) if !captured.is_empty() => {
            if let Err(e) = state.store.save(&captured).await {
                error!("failed to save session state: {e}");
            }
        }
        Ok(_) => warn!("session produced no cookies to save"),
        Err(e) => error!("failed to capture session state: {e}"),
    }

    if let Err(e) = session.close().await {
        error!("browser close failed: {e}");
    }
}
