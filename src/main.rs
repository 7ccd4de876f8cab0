use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use recipebox::app::{build_router, AppState};
use recipebox::auth::models::AuthenticatedUser;
use recipebox::auth::verifier::{ttl_from_hours, CredentialVerifier, JwtVerifier};
use recipebox::config::{AppConfig, Backend};
use recipebox::counters::CounterStore;
use recipebox::db::counter_repository::{CounterRepository, MongoCounterRepository};
use recipebox::db::memory::{InMemoryCounterRepository, InMemoryRecipeRepository};
use recipebox::db::repository::{MongoRecipeRepository, RecipeRepository};
use recipebox::storage::client::{InMemoryStorageClient, S3StorageClient, StorageClient};

#[derive(Debug, Parser)]
#[command(name = "recipebox", version, about = "Recipe service with paginated listings")]
struct Cli {
    /// Configuration file (defaults to ./recipebox.toml when present).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Publish every recipe whose publish date has passed, then exit.
    PublishDue,
    /// Print a bearer token signed with the configured secret.
    MintToken {
        #[arg(long)]
        user: String,
        #[arg(long)]
        email: Option<String>,
        /// Validity in hours.
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
}

struct Backends {
    recipes: Arc<dyn RecipeRepository>,
    counters: Arc<dyn CounterRepository>,
}

async fn connect_backends(config: &AppConfig) -> anyhow::Result<Backends> {
    match config.backend {
        Backend::Mongo => {
            let client = mongodb::Client::with_uri_str(&config.mongodb_uri)
                .await
                .context("Failed to connect to MongoDB")?;
            let db = client.database(&config.mongodb_database);
            tracing::info!("Connected to MongoDB at {}", config.mongodb_uri);

            Ok(Backends {
                recipes: Arc::new(MongoRecipeRepository::new(&db)),
                counters: Arc::new(MongoCounterRepository::new(&db)),
            })
        }
        Backend::Memory => {
            tracing::warn!("Using the in-memory backend; data is lost on exit");
            Ok(Backends {
                recipes: Arc::new(InMemoryRecipeRepository::new()),
                counters: Arc::new(InMemoryCounterRepository::new()),
            })
        }
    }
}

async fn connect_storage(config: &AppConfig) -> Arc<dyn StorageClient> {
    match config.backend {
        Backend::Mongo => {
            let storage =
                S3StorageClient::connect(config.s3_bucket.clone(), config.s3_endpoint.as_deref())
                    .await;
            tracing::info!("S3 storage client initialized for bucket '{}'", config.s3_bucket);
            Arc::new(storage)
        }
        Backend::Memory => Arc::new(InMemoryStorageClient::new()),
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting recipebox server...");

    let backends = connect_backends(&config).await?;
    let storage = connect_storage(&config).await;
    let verifier: Arc<dyn CredentialVerifier> = Arc::new(JwtVerifier::new(&config.jwt_secret));

    let (state, lifecycle_worker) = AppState::with_lifecycle(
        backends.recipes,
        CounterStore::new(backends.counters),
        storage,
        verifier,
    );

    if config.demo_mode {
        recipebox::demo_seeder::seed_demo_data(state.recipes.as_ref()).await?;
    }

    let scheduler =
        recipebox::publisher::spawn_publish_schedule(state.recipes.clone(), config.publish_interval());

    let app = build_router(state);

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    // The router is gone: stop the scheduler so the lifecycle queue can drain.
    scheduler.abort();
    let _ = scheduler.await;
    lifecycle_worker.await.context("Lifecycle worker panicked")?;
    Ok(())
}

async fn publish_due(config: AppConfig) -> anyhow::Result<()> {
    let backends = connect_backends(&config).await?;
    let storage = connect_storage(&config).await;
    let verifier: Arc<dyn CredentialVerifier> = Arc::new(JwtVerifier::new(&config.jwt_secret));

    let (state, lifecycle_worker) = AppState::with_lifecycle(
        backends.recipes,
        CounterStore::new(backends.counters),
        storage,
        verifier,
    );

    let published =
        recipebox::publisher::publish_due_recipes(state.recipes.as_ref(), chrono::Utc::now()).await?;
    drop(state);
    lifecycle_worker.await.context("Lifecycle worker panicked")?;

    println!("Published {published} recipe(s)");
    Ok(())
}

fn mint_token(config: &AppConfig, user: String, email: Option<String>, hours: i64) -> anyhow::Result<()> {
    let ttl = ttl_from_hours(hours)?;
    let verifier = JwtVerifier::new(&config.jwt_secret);
    let token = verifier.issue(
        &AuthenticatedUser {
            user_id: user,
            email,
        },
        ttl,
    )?;
    println!("{token}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recipebox=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::PublishDue => publish_due(config).await,
        Command::MintToken { user, email, hours } => mint_token(&config, user, email, hours),
    }
}
