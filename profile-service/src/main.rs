use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use profile_service::config::Config;
use profile_service::services::{
    AccountService, ContentService, EngagementService, NoopCategoryCounters, ProfileService,
};

async fn readiness(pool: web::Data<PgPool>) -> impl Responder {
    match sqlx::query("SELECT 1").execute(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().body("READY"),
        Err(e) => HttpResponse::ServiceUnavailable().body(format!("database unavailable: {}", e)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("🔧 Starting profile-service");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "✅ Configuration loaded: env={}, http_port={}",
        config.app.env, config.app.http_port
    );

    // Initialize database pool with prepared statement caching disabled for PgBouncer compatibility
    let connect_options = PgConnectOptions::from_str(&config.database.url)
        .context("Failed to parse DATABASE_URL")?
        .statement_cache_capacity(0);

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(connect_options)
        .await
        .context("Failed to connect to database")?;

    // Verify database connection
    sqlx::query("SELECT 1")
        .execute(&pg_pool)
        .await
        .context("Failed to verify database connection")?;
    info!("✅ Database pool created and verified");

    // Run database migrations
    sqlx::migrate!("./migrations")
        .run(&pg_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("✅ Database migrations completed");

    // Wire up services for the request-handling layer
    let profiles = ProfileService::new(pg_pool.clone());
    let engagement = EngagementService::new(pg_pool.clone());
    let content = ContentService::with_category_counters(
        pg_pool.clone(),
        engagement.clone(),
        Arc::new(NoopCategoryCounters),
    );
    let accounts = AccountService::new(pg_pool.clone(), profiles.clone());
    info!("✅ Services initialized");

    let http_addr = format!("{}:{}", config.app.host, config.app.http_port);
    info!("🚀 HTTP server: http://{}", http_addr);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pg_pool.clone()))
            .app_data(web::Data::new(profiles.clone()))
            .app_data(web::Data::new(engagement.clone()))
            .app_data(web::Data::new(content.clone()))
            .app_data(web::Data::new(accounts.clone()))
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/ready", web::get().to(readiness))
    })
    .bind(&http_addr)
    .context("Failed to bind HTTP server")?
    .run();

    info!("🎉 profile-service is running");
    server.await.context("HTTP server error")?;

    info!("🛑 profile-service shutting down");
    Ok(())
}
