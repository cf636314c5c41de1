use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create hosts table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hosts (
            host VARCHAR(255) PRIMARY KEY,
            max_jobs INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create service registrations table. The serial id doubles as the
    // registration order used for load-ranking ties.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS service_registrations (
            id BIGSERIAL PRIMARY KEY,
            service_type VARCHAR(255) NOT NULL,
            host VARCHAR(255) NOT NULL,
            path VARCHAR(255) NOT NULL,
            job_producer BOOLEAN NOT NULL DEFAULT FALSE,
            maintenance BOOLEAN NOT NULL DEFAULT FALSE,
            UNIQUE (service_type, host)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id BIGSERIAL PRIMARY KEY,
            job_type VARCHAR(255) NOT NULL,
            operation VARCHAR(255) NOT NULL,
            arguments JSONB NOT NULL DEFAULT '[]',
            payload TEXT,
            status VARCHAR(50) NOT NULL,
            host VARCHAR(255),
            date_created TIMESTAMPTZ NOT NULL,
            date_started TIMESTAMPTZ,
            date_completed TIMESTAMPTZ,
            queue_time BIGINT,
            run_time BIGINT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_type_status ON jobs(job_type, status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_host ON jobs(host)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_registrations_type ON service_registrations(service_type)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_registrations_host ON service_registrations(host)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
