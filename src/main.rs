use anyhow::{Context, Result};
use background_service::{IngestionConfig, IngestionService};
use clap::{Parser, Subcommand};
use database::Database;
use gui::{App, DashboardFlags};
use iced::{Application, Settings};
use monitor_core::{AppConfig, IdentityStore};
use reddit_client::RedditClient;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "reddit_monitor=info,background_service=info,reddit_client=info,database=info,gui=info";

#[derive(Parser)]
#[command(name = "reddit-monitor", version, about = "Keyword monitor for the Reddit firehose")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "reddit_monitor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and the local client identity
    Init,
    /// Stream new submissions and comments and store keyword matches
    Ingest,
    /// Open the dashboard
    Dashboard,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config).context("failed to load configuration")?;

    match cli.command {
        Commands::Init => init(config),
        Commands::Ingest => ingest(config),
        Commands::Dashboard => dashboard(config),
    }
}

fn init(config: AppConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let db = Database::open(&config.database)
            .await
            .context("cannot open the content store")?;
        db.close().await;
        Ok::<_, anyhow::Error>(())
    })?;

    let identity = IdentityStore::new(&config.identity.path, &config.identity.secret)?
        .load_or_create()?;
    tracing::info!(
        "Initialized {} for client {}",
        config.database.url,
        identity.user_id
    );
    Ok(())
}

fn ingest(config: AppConfig) -> Result<()> {
    let (client_id, client_secret) = config
        .reddit_credentials()
        .context("ingestion needs Reddit API credentials")?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let db = Arc::new(
            Database::open(&config.database)
                .await
                .context("cannot open the content store")?,
        );
        let reddit = Arc::new(RedditClient::new(
            config.reddit.user_agent.clone(),
            client_id,
            client_secret,
        )?);

        let shutdown = CancellationToken::new();
        let ctrl_c = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown requested");
                    ctrl_c.cancel();
                }
                Err(e) => tracing::error!("Cannot listen for Ctrl-C: {}", e),
            }
        });

        let service = IngestionService::new(
            db.clone(),
            db.clone(),
            reddit,
            IngestionConfig::from(&config.ingestion),
        );
        service.run(shutdown).await;
        db.close().await;
        Ok(())
    })
}

fn dashboard(config: AppConfig) -> Result<()> {
    let identity = IdentityStore::new(&config.identity.path, &config.identity.secret)?
        .load_or_create()
        .context("cannot load the client identity")?;

    tracing::info!("Starting Reddit Monitor dashboard");

    let settings = Settings {
        window: iced::window::Settings {
            size: iced::Size::new(1280.0, 820.0),
            min_size: Some(iced::Size::new(900.0, 600.0)),
            ..Default::default()
        },
        ..Settings::with_flags(DashboardFlags { config, identity })
    };

    DashboardApp::run(settings).map_err(|e| {
        tracing::error!("Application error: {}", e);
        anyhow::anyhow!("GUI error: {e}")
    })
}

struct DashboardApp {
    app: App,
}

impl Application for DashboardApp {
    type Message = gui::Message;
    type Theme = iced::Theme;
    type Executor = iced::executor::Default;
    type Flags = DashboardFlags;

    fn new(flags: Self::Flags) -> (Self, iced::Command<Self::Message>) {
        tracing::info!("Initializing application");
        let (app, command) = App::new(flags);
        (Self { app }, command)
    }

    fn title(&self) -> String {
        self.app.title()
    }

    fn update(&mut self, message: Self::Message) -> iced::Command<Self::Message> {
        self.app.update(message)
    }

    fn view(&self) -> iced::Element<Self::Message> {
        self.app.view()
    }

    fn subscription(&self) -> iced::Subscription<Self::Message> {
        self.app.subscription()
    }
}
