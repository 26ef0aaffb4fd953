//! `db` subcommands: connectivity, migrations and catalog seeding.

use std::path::PathBuf;

use anyhow::Context;
use cardmatrix_core::AppConfig;
use sqlx::PgPool;

async fn connect() -> anyhow::Result<(AppConfig, PgPool)> {
    let config = cardmatrix_core::load_app_config()?;
    let pool_config = cardmatrix_db::PoolConfig::from_app_config(&config);
    let pool = cardmatrix_db::connect_pool(&config.database_url, pool_config)
        .await
        .context("failed to connect to database")?;
    Ok((config, pool))
}

pub(crate) async fn run_db_ping() -> anyhow::Result<()> {
    let (_, pool) = connect().await?;
    cardmatrix_db::health_check(&pool).await?;
    println!("database reachable");
    Ok(())
}

pub(crate) async fn run_db_migrate() -> anyhow::Result<()> {
    let (_, pool) = connect().await?;
    let applied = cardmatrix_db::run_migrations(&pool).await?;
    println!("applied {applied} migration(s)");
    Ok(())
}

/// Loads the catalog file and upserts its plans and options. Existing
/// overrides are never touched, so reseeding is safe.
pub(crate) async fn run_db_seed(catalog: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, pool) = connect().await?;
    let path = catalog.unwrap_or(config.catalog_path);
    let seed = cardmatrix_core::load_catalog_seed(&path)
        .with_context(|| format!("failed to load catalog {}", path.display()))?;

    cardmatrix_db::run_migrations(&pool).await?;
    let summary = cardmatrix_db::seed_catalog(&pool, &seed).await?;

    println!(
        "seeded {} plan(s) and {} option(s); {} default override(s) created",
        summary.plans, summary.options, summary.overrides_created
    );
    Ok(())
}
