// Shared helpers for DB-backed integration tests.
//
// Tests connect using DATABASE_URL and skip with a notice when it is not
// set, so the suite stays green on machines without a Postgres instance:
//   docker-compose up -d postgres
//   DATABASE_URL=postgres://... cargo test
#![allow(dead_code)] // not every test binary uses every helper

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn test_pool() -> Option<PgPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("⚠️  DATABASE_URL not set; skipping DB-backed test");
            return None;
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("⚠️  Failed to connect to {}: {}", url, e);
            return None;
        }
    };

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        eprintln!("⚠️  Failed to run migrations: {}", e);
        return None;
    }

    Some(pool)
}

/// Unique per-run value for columns with global uniqueness constraints
pub fn unique(tag: &str) -> String {
    format!("{}_{}", tag, Uuid::new_v4().simple())
}

/// Insert an account row directly, bypassing starter-profile provisioning
pub async fn create_bare_account(pool: &PgPool) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO accounts (email, handle, display_name, password_hash)
        VALUES ($1, $2, 'Test Account', 'x')
        RETURNING id
        "#,
    )
    .bind(format!("{}@example.com", unique("acct")))
    .bind(unique("handle"))
    .fetch_one(pool)
    .await
    .expect("failed to insert test account")
}
