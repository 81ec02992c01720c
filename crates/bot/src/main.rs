mod config;
mod logging;
mod matrix;
mod registry;
mod store;

use core::time::Duration;
use std::{
    fs,
    io::IsTerminal as _,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context as _, Result, anyhow};
use channel_core::{Channel, ChannelOptions, ChatTransport, DEFAULT_BOT_NAME};
use clap::Parser;
use matrix_sdk::{
    Client, SessionMeta,
    authentication::{SessionTokens, matrix::MatrixSession},
    config::SyncSettings,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::load_config, logging::init_tracing, matrix::MatrixTransport,
    registry::build_defaults, store::FileConfigStore,
};

#[derive(Parser, Debug)]
#[command(
    name = "channel-bot",
    version,
    about = "Matrix command bot with live per-channel configuration"
)]
struct Args {
    /// Homeserver base URL, e.g. `https://matrix-client.matrix.org`.
    #[arg(long, env = "MATRIX_HOMESERVER")]
    homeserver: String,

    /// Username (localpart or full user ID)
    #[arg(long, env = "MATRIX_USERNAME")]
    username: String,

    /// Password (if omitted, will prompt if needed)
    #[arg(long, env = "MATRIX_PASSWORD")]
    password: Option<String>,

    /// Directory for persistent state (encryption keys, sync cache)
    #[arg(long, env = "MATRIX_STORE", default_value = "./bot-store")]
    store: PathBuf,

    /// JSON session file for access token/device info
    #[arg(long, env = "MATRIX_SESSION_FILE", default_value = "./session.json")]
    session_file: PathBuf,

    /// Device display name
    #[arg(long, env = "MATRIX_DEVICE_NAME", default_value = "channel-bot")]
    device_name: String,

    /// Path to YAML config listing channels, prefixes and roles
    #[arg(long, env = "MATRIX_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,

    /// Sync timeout in milliseconds
    #[arg(long, env = "MATRIX_SYNC_TIMEOUT_MS", default_value_t = 30000)]
    sync_timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user_id: String,
    device_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present so clap can pick up env vars.
    let _ = dotenvy::dotenv();
    init_tracing()?;
    let args = Args::parse();
    let config = load_config(&args.config)?;

    fs::create_dir_all(&args.store)
        .with_context(|| format!("creating store directory at {}", args.store.display()))?;

    let client = Client::builder()
        .homeserver_url(&args.homeserver)
        .handle_refresh_tokens()
        .sqlite_store(&args.store, None)
        .build()
        .await
        .context("building matrix client")?;
    authenticate(&client, &args).await?;

    let transport = MatrixTransport::new(client.clone(), config.role_levels.clone());
    transport.install_handlers();
    let shared: Arc<dyn ChatTransport> = Arc::new(transport.clone());

    let bot_name = client
        .user_id()
        .map_or_else(|| DEFAULT_BOT_NAME.to_owned(), |id| id.localpart().to_owned());
    let defaults = build_defaults();
    let store = FileConfigStore::new(
        &config.store.dir,
        Duration::from_millis(config.store.poll_interval_ms),
    );

    for name in &config.channels {
        let options: ChannelOptions = config.channel_options(name, &bot_name);
        let channel = Channel::new(options, Arc::clone(&defaults), Arc::clone(&shared));
        let events = transport.attach(channel.name()).await;
        let feed = channel
            .subscribe(&store)
            .await
            .with_context(|| format!("subscribing {name} to the config store"))?;

        tokio::spawn(channel.clone().run(feed, events));
        tokio::spawn(async move {
            if let Err(e) = channel.join().await {
                warn!(error = %e, channel = %channel.name(), "Failed to join channel");
            }
        });
    }

    info!(
        timeout_ms = args.sync_timeout_ms,
        channels = ?config.channels,
        "Starting sync… Press Ctrl+C to stop."
    );
    let settings = SyncSettings::new().timeout(Duration::from_millis(args.sync_timeout_ms));
    client
        .sync(settings)
        .await
        .map_err(|e| anyhow!("sync terminated: {e}"))
}

/// Restores the saved session if there is one; otherwise logs in and saves it.
async fn authenticate(client: &Client, args: &Args) -> Result<()> {
    if let Some(session) = load_session(&args.session_file)? {
        info!("Restoring session for {}", session.user_id);
        let matrix_session = MatrixSession {
            meta: SessionMeta {
                user_id: session.user_id.parse().context("invalid stored user_id")?,
                device_id: session.device_id.into(),
            },
            tokens: SessionTokens {
                access_token: session.access_token,
                refresh_token: session.refresh_token,
            },
        };
        return client
            .restore_session(matrix_session)
            .await
            .context("restoring session");
    }

    let password = read_password(args)?;
    info!("Logging in as {}", args.username);
    let response = client
        .matrix_auth()
        .login_username(&args.username, &password)
        .initial_device_display_name(&args.device_name)
        .request_refresh_token()
        .send()
        .await
        .context("login failed")?;

    let session = SavedSession {
        access_token: response.access_token.clone(),
        refresh_token: response.refresh_token.clone(),
        user_id: response.user_id.to_string(),
        device_id: response.device_id.to_string(),
    };
    save_session(&args.session_file, &session)?;
    info!(
        "Logged in: user={} device={}",
        session.user_id, session.device_id
    );
    Ok(())
}

/// Treats an empty argument as missing and never prompts without a terminal.
fn read_password(args: &Args) -> Result<String> {
    if let Some(p) = args
        .password
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return Ok(p.to_owned());
    }
    if !std::io::stdin().is_terminal() {
        return Err(anyhow!(
            "No MATRIX_PASSWORD provided and no stored session. In non-interactive mode, set MATRIX_PASSWORD or mount an existing session at {}",
            args.session_file.display()
        ));
    }
    warn!("No password provided via --password or MATRIX_PASSWORD. Prompting...");
    #[cfg(feature = "rpassword")]
    {
        rpassword::prompt_password("Matrix password:")
            .map_err(|e| anyhow!("Failed to read password: {e}"))
    }
    #[cfg(not(feature = "rpassword"))]
    {
        Err(anyhow!(
            "rpassword feature is not enabled. Cannot prompt for password."
        ))
    }
}

fn load_session(path: &Path) -> Result<Option<SavedSession>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading session file at {}", path.display()))?;
    let session: SavedSession = serde_json::from_str(&data).context("parsing session JSON")?;
    Ok(Some(session))
}

fn save_session(path: &Path, session: &SavedSession) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(session)?;
    fs::write(path, data).with_context(|| format!("writing session file at {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/session.json");
        assert!(load_session(&path).unwrap().is_none());

        let saved = SavedSession {
            access_token: "tok".to_owned(),
            refresh_token: None,
            user_id: "@bot:example.org".to_owned(),
            device_id: "DEV".to_owned(),
        };
        save_session(&path, &saved).unwrap();
        let loaded = load_session(&path).unwrap().unwrap();
        assert_eq!(loaded.user_id, "@bot:example.org");
        assert_eq!(loaded.device_id, "DEV");
        assert!(loaded.refresh_token.is_none());
    }

    #[test]
    fn args_read_from_flags() {
        let args = Args::try_parse_from([
            "channel-bot",
            "--homeserver",
            "https://example.org",
            "--username",
            "bot",
            "--password",
            "  secret  ",
        ])
        .unwrap();
        assert_eq!(args.sync_timeout_ms, 30000);
        assert_eq!(read_password(&args).unwrap(), "secret");
    }
}
