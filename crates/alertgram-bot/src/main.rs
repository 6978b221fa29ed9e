//! alertgram relay binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) plus
//! `ALERTGRAM_*` environment variables, opens the SQLite store, serves the
//! Alertmanager webhook over HTTP and talks to Telegram until interrupted.
//!
//! ```sh
//! ALERTGRAM_TELEGRAM_TOKEN=... ALERTGRAM_ADMINS=1234,5678 alertgram --config config.toml
//! ```

use std::path::{Path, PathBuf};

use alertgram_bot::{
  Bot,
  alertmanager::AlertmanagerClient,
  config::{ServerConfig, Settings},
  metrics::Metrics,
  telegram::TelegramClient,
  webhook::{self, WebhookState},
};
use alertgram_store_sqlite::SqliteStore;
use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use tokio::{net::TcpListener, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Webhook batches waiting for fan-out before the receiver applies
/// backpressure.
const WEBHOOK_QUEUE: usize = 64;

#[derive(Parser)]
#[command(author, version, about = "Relay Alertmanager notifications to Telegram")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, env = "ALERTGRAM_CONFIG", default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let start_time = Utc::now();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("ALERTGRAM")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("admins")
        .with_list_parse_key("environments")
        .with_list_parse_key("projects"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let mut bot_settings = Settings::new(&server_cfg, env!("CARGO_PKG_VERSION"), start_time)
    .context("invalid configuration")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let telegram = TelegramClient::new(&server_cfg.telegram_api_url, &server_cfg.telegram_token)
    .context("failed to build Telegram client")?;
  if bot_settings.bot_username.is_none() {
    match telegram.username().await {
      Ok(username) => bot_settings.bot_username = username,
      Err(e) => tracing::warn!(
        error = %e,
        "failed to look up bot username, accepting commands for any @bot"
      ),
    }
  }
  let alertmanager = AlertmanagerClient::new(&server_cfg.alertmanager_url)
    .context("failed to build Alertmanager client")?;

  let metrics = Metrics::new();
  let (sender, webhooks) = mpsc::channel(WEBHOOK_QUEUE);
  let bot = Bot::new(store, telegram, alertmanager, bot_settings, metrics.clone());

  let cancel = CancellationToken::new();
  tokio::spawn(shutdown_signal(cancel.clone()));

  let app = webhook::router(WebhookState { sender, metrics });
  let address = server_cfg.listen_addr.as_str();

  tracing::info!(
    alertmanager = %server_cfg.alertmanager_url,
    bot = bot.settings().bot_username.as_deref().unwrap_or_default(),
    admins = server_cfg.admins.len(),
    "Listening on http://{address}"
  );
  let listener = TcpListener::bind(address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  let server = {
    let cancel = cancel.clone();
    tokio::spawn(async move {
      let served = axum::serve(listener, app)
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await;
      cancel.cancel();
      served
    })
  };

  let ran = bot.run(cancel.clone(), webhooks).await;
  cancel.cancel();
  server
    .await
    .context("server task panicked")?
    .context("server error")?;
  ran.context("relay stopped")?;

  tracing::info!("shut down");
  Ok(())
}

/// Cancel `cancel` on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal(cancel: CancellationToken) {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for ctrl-c");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {}
    _ = terminate => {}
    _ = cancel.cancelled() => return,
  }
  tracing::info!("shutdown requested");
  cancel.cancel();
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
