//! Runs pending migrations against `DATABASE_URL` and exits. Used in CI
//! and local development ahead of `creditcore-api` itself; the main
//! binary also migrates on startup, so this is a convenience, not a
//! requirement.

use creditcore_infra_db::Db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/creditcore".to_string());
    let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(5);

    let db = Db::connect(&database_url, max_connections).await?;
    db.migrate().await?;
    tracing::info!("migrations applied");
    Ok(())
}
