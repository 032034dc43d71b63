use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use common::database::{DatabaseConfig, health_check, init_pool};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use blog_api::{
    AppState, accounts,
    config::AppConfig,
    create_router,
    store::{BlogStore, MemoryStore, PgStore},
};

#[derive(Parser)]
#[command(name = "blog-api")]
#[command(about = "Blogging backend API service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Keep all data in process memory instead of PostgreSQL
        #[arg(long)]
        in_memory: bool,
    },

    /// Create a user with the staff and superuser flags set
    CreateSuperuser {
        #[arg(long, env = "SUPERUSER_EMAIL")]
        email: String,

        #[arg(long, env = "SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { in_memory: false }) {
        Commands::Serve { in_memory } => serve(in_memory).await,
        Commands::CreateSuperuser { email, password } => {
            let store = connect_store().await?;
            let user = accounts::create_superuser(&store, &email, &password).await?;
            info!("Superuser {} created", user.email);
            Ok(())
        }
    }
}

/// Connect to PostgreSQL, verify connectivity and apply migrations
async fn connect_store() -> Result<PgStore> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let store = PgStore::new(pool);
    store.migrate().await?;
    info!("Database migrations applied");

    Ok(store)
}

async fn serve(in_memory: bool) -> Result<()> {
    info!("Starting API service");

    let config = AppConfig::from_env()?;

    let store: Arc<dyn BlogStore> = if in_memory {
        warn!("Using the in-memory store; data is lost on shutdown");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(connect_store().await?)
    };

    let app = create_router(AppState::new(store, &config));

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("API service listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
