//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `session`: Login, logout and status
//! - `catalog`: Search, stream URLs and lyrics
//! - `player`: Headless playback, queue and history

mod catalog;
mod player;
mod session;

use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::api::{AudioQuality, NeteaseClient};
use crate::config::{self, Config};
use crate::error::{Error, Result, ResultExt};
use crate::player::PlayMode;
use crate::session::{SessionOptions, SessionReconciler};
use crate::storage::FileStore;

pub use catalog::{cmd_lyric, cmd_search, cmd_url};
pub use player::{cmd_history, cmd_mode, cmd_play, cmd_queue};
pub use session::{cmd_login, cmd_logout, cmd_official_login, cmd_qr_login, cmd_status};

/// NeteaseMusic player CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// API server base URL (overrides the config file)
    #[arg(long, global = true, env = "NEUMUSIC_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Log in with phone or e-mail and password
    Login {
        /// Cellphone number
        #[arg(long, conflicts_with = "email", required_unless_present = "email")]
        phone: Option<String>,
        /// E-mail address
        #[arg(long)]
        email: Option<String>,
        /// Password (or set NEUMUSIC_PASSWORD env var)
        #[arg(long, env = "NEUMUSIC_PASSWORD", hide_env_values = true)]
        password: String,
        /// Country calling code for phone login
        #[arg(long, default_value = "86")]
        country_code: String,
        /// SMS or e-mail captcha
        #[arg(long)]
        captcha: Option<String>,
    },
    /// Log in by scanning a QR code
    QrLogin,
    /// Adopt a session already active on the official service
    OfficialLogin {
        /// Keep polling until a session appears
        #[arg(long)]
        wait: bool,
    },
    /// Show the login status
    Status {
        /// Force a verification even if the session is recent
        #[arg(long)]
        verify: bool,
    },
    /// Log out and forget the stored session
    Logout,
    /// Search the catalog
    Search {
        /// Search keywords
        keywords: String,
        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: u32,
        /// Result offset
        #[arg(long, default_value = "0")]
        offset: u32,
    },
    /// Resolve the stream URL of a track
    Url {
        /// Track ID
        id: u64,
        /// Stream quality
        #[arg(short, long, value_enum)]
        quality: Option<QualityArg>,
    },
    /// Print the lyric of a track
    Lyric {
        /// Track ID
        id: u64,
        /// Also print the translation
        #[arg(short, long)]
        translated: bool,
    },
    /// Replace the queue with search results and start the first playable one
    Play {
        /// Search keywords
        keywords: String,
        /// Number of results to queue
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },
    /// Show the persisted queue
    Queue,
    /// Show or set the play mode
    Mode {
        /// New mode (cycles to the next one if omitted)
        #[arg(value_enum)]
        mode: Option<ModeArg>,
    },
    /// Show recently played tracks
    History {
        /// Number of entries
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Clear the history instead
        #[arg(long)]
        clear: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

/// Stream quality argument
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum QualityArg {
    Standard,
    High,
    Lossless,
}

impl From<QualityArg> for AudioQuality {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Standard => AudioQuality::Standard,
            QualityArg::High => AudioQuality::High,
            QualityArg::Lossless => AudioQuality::Lossless,
        }
    }
}

/// Play mode argument
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Sequential,
    RepeatOne,
    Shuffle,
}

impl From<ModeArg> for PlayMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Sequential => PlayMode::Sequential,
            ModeArg::RepeatOne => PlayMode::RepeatOne,
            ModeArg::Shuffle => PlayMode::Shuffle,
        }
    }
}

/// Shared services for a command invocation.
pub struct App {
    pub config: Config,
    pub store: Arc<FileStore>,
    pub api: Arc<NeteaseClient>,
}

impl App {
    /// Load config, open the data store and build the API client.
    pub fn open(api_url: Option<&str>) -> Result<Self> {
        let mut config = config::load();
        if let Some(url) = api_url {
            config.api.base_url = url.to_string();
        }

        let store = Arc::new(FileStore::default_location().with_context("opening data store")?);
        let api = Arc::new(
            NeteaseClient::new(&config.api, store.clone()).with_context("creating API client")?,
        );
        tracing::debug!("Using API server {}", config.api.base_url);

        Ok(Self { config, store, api })
    }

    /// Session reconciler using the configured timings.
    pub fn session(&self) -> SessionReconciler {
        SessionReconciler::with_options(
            self.api.clone(),
            self.store.clone(),
            SessionOptions::from(&self.config.session),
        )
    }
}

/// Point the user at `login` when a call failed on an expired session.
fn login_hint(error: Error) -> anyhow::Error {
    if error.is_session_expired() {
        eprintln!("Your session has expired. Run `neumusic login` to sign in again.");
    }
    error.into()
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    let app = App::open(cli.api_url.as_deref())?;

    match &cli.command {
        Commands::Login {
            phone,
            email,
            password,
            country_code,
            captcha,
        } => cmd_login(
            &rt,
            &app,
            phone.as_deref(),
            email.as_deref(),
            password,
            country_code,
            captcha.as_deref(),
        ),
        Commands::QrLogin => cmd_qr_login(&rt, &app),
        Commands::OfficialLogin { wait } => cmd_official_login(&rt, &app, *wait),
        Commands::Status { verify } => cmd_status(&rt, &app, *verify),
        Commands::Logout => cmd_logout(&rt, &app),
        Commands::Search {
            keywords,
            limit,
            offset,
        } => cmd_search(&rt, &app, keywords, *limit, *offset),
        Commands::Url { id, quality } => cmd_url(&rt, &app, *id, quality.map(Into::into)),
        Commands::Lyric { id, translated } => cmd_lyric(&rt, &app, *id, *translated),
        Commands::Play { keywords, limit } => cmd_play(&rt, &app, keywords, *limit),
        Commands::Queue => cmd_queue(&app),
        Commands::Mode { mode } => cmd_mode(&app, mode.map(Into::into)),
        Commands::History { limit, clear } => cmd_history(&app, *limit, *clear),
        Commands::Config { save } => cmd_config(&app.config, *save),
    }
}

fn cmd_config(config: &Config, save: bool) -> anyhow::Result<()> {
    if save {
        config::save(config)?;
        if let Some(path) = config::config_path() {
            println!("Saved to {}", path.display());
        }
        return Ok(());
    }

    if let Some(path) = config::config_path() {
        println!("# {}", path.display());
    }
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
