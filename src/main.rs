use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod cache;
mod db;
mod engine;
mod error;
mod instructor;
mod metrics;
mod models;
mod platform;
mod report;
mod student;

use crate::cache::{NoopCache, RedisCache, ReportCache};
use crate::db::PgStore;
use crate::engine::AnalyticsEngine;

#[derive(Parser)]
#[command(name = "learnline-analytics")]
#[command(about = "Analytics aggregation engine for the Learnline platform", long_about = None)]
struct Cli {
    /// Compute without consulting or writing the report cache.
    #[arg(long, global = true)]
    no_cache: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Instructor performance report
    Instructor {
        #[arg(long)]
        id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Per-student learning analytics
    Student {
        #[arg(long)]
        id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Platform-wide overview over a trailing window
    Platform {
        #[arg(long, default_value_t = 30)]
        window_days: u32,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Instructor { id, out } => {
            let engine = build_engine(pool, cli.no_cache).await;
            let data = engine.instructor_performance(&id).await?;
            emit(&data, report::render_instructor(&data), out)?;
        }
        Commands::Student { id, out } => {
            let engine = build_engine(pool, cli.no_cache).await;
            let data = engine.student_analytics(&id).await?;
            emit(&data, report::render_student(&data), out)?;
        }
        Commands::Platform { window_days, out } => {
            let engine = build_engine(pool, cli.no_cache).await;
            let data = engine.platform_overview(window_days).await?;
            emit(&data, report::render_platform(&data), out)?;
        }
    }

    Ok(())
}

/// Cache selection: `REDIS_URL` enables the redis adapter, anything else
/// (unset, `--no-cache`, or a failed connection) degrades to no caching.
async fn build_engine(pool: PgPool, no_cache: bool) -> AnalyticsEngine<PgStore> {
    let cache: Box<dyn ReportCache> = if no_cache {
        Box::new(NoopCache)
    } else {
        match std::env::var("REDIS_URL") {
            Ok(url) => match RedisCache::connect(&url).await {
                Ok(redis) => Box::new(redis),
                Err(err) => {
                    warn!(%err, "redis unavailable, continuing without cache");
                    Box::new(NoopCache)
                }
            },
            Err(_) => Box::new(NoopCache),
        }
    };
    AnalyticsEngine::new(PgStore::new(pool), cache)
}

fn emit<T: Serialize>(data: &T, markdown: String, out: Option<PathBuf>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(&path, markdown)?;
            println!("Report written to {}.", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(data)?),
    }
    Ok(())
}
