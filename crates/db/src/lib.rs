//! Postgres persistence for generation records and conversation content.
//!
//! Repositories are zero-sized structs taking `&PgPool`; [`PgStatusStore`] and
//! [`PgSourceFetcher`] adapt them to the collaborator traits in
//! `reverie-core`.

pub mod models;
pub mod repositories;
pub mod source_fetcher;
pub mod status_store;

pub use source_fetcher::PgSourceFetcher;
pub use status_store::PgStatusStore;

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Apply pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
