mod config;
mod course_api;
mod domain;
mod storage;

use std::{path::Path, sync::Arc};

use anyhow::Context;
use config::{Config, MEMORY_STORE};
use domain::session::CourseSession;
use migration::MigratorTrait;
use poem::{Server, listener::TcpListener};
use sea_orm::Database;
use storage::{DatabaseStore, MemoryStore, Persistence};
use tokio::sync::Mutex;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

type CourseResult<T> = anyhow::Result<T>;

#[tokio::main]
async fn main() -> CourseResult<()> {
    // Initialize tracing (logs). Respect RUST_LOG if set, default to info for our
    // crate and warn for deps.
    let default_filter = format!(
        "{}=info,poem=info,sea_orm=warn,sqlx=warn",
        env!("CARGO_PKG_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting course progress service"
    );
    // Load environment variables from .env files
    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let config = Config::load().context("Failed to load configuration")?;
    if let Err(e) = config.validate() {
        return Err(anyhow::anyhow!(e));
    }

    let persistence = Arc::new(open_persistence(&config).await?);
    let (session, outcome) =
        CourseSession::open(config.course(), persistence, config.session_settings()).await;
    tracing::info!(
        lesson = %outcome.record.current_lesson,
        cold_start = outcome.cold_start,
        percentage = session.percentage(),
        "course session ready"
    );

    run_poem(Arc::new(Mutex::new(session)), Arc::new(config)).await?;
    Ok(())
}

/// `memory` keeps everything in process; anything else is a database URL.
async fn open_persistence(config: &Config) -> CourseResult<Persistence> {
    if config.db_connection_string == MEMORY_STORE {
        tracing::warn!("using in-memory storage, progress is lost on restart");
        return Ok(Persistence::new(Arc::new(MemoryStore::default())));
    }

    let db_conn = Database::connect(&config.db_connection_string)
        .await
        .with_context(|| "Failed to connect to database")?;

    migration::Migrator::up(&db_conn, None)
        .await
        .with_context(|| "Failed to run database migrations")?;

    Ok(Persistence::new(Arc::new(DatabaseStore::new(db_conn))))
}

pub async fn run_poem(session: Arc<Mutex<CourseSession>>, config: Arc<Config>) -> CourseResult<()> {
    let route = course_api::app(session, config.public_url.clone());

    let bind_addr = config.bind_addr.as_str();
    tracing::info!(%bind_addr, "starting HTTP server");
    Server::new(TcpListener::bind(bind_addr)).run(route).await?;
    Ok(())
}
