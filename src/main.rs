use actix_cors::Cors;
use actix_web::{middleware::Compress, App, HttpServer};
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod error;
mod ledger;
mod lifecycle;
mod models;
mod openapi;
mod ranking;
mod rate_limit;
mod reconcile;
mod repo;
mod routes;
mod security;
mod status;
mod storage;

#[cfg(feature = "inmem-store")]
use repo::inmem::InMemRepo;

use openapi::ApiDoc;
use rate_limit::{InMemoryRateLimiter, RateLimitConfig, RateLimiterFacade};
use routes::{config, AppState};
use security::SecurityHeaders;
use std::sync::Arc;
use storage::build_asset_store;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Environment comes from the shell / systemd / Docker; load .env only in
    // debug builds to reduce local setup friction.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    validate_env_vars();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping votely server");

    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    let repo = InMemRepo::new();
    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    info!("Using in-memory repository backend");

    #[cfg(feature = "postgres-store")]
    let repo = {
        use sqlx::postgres::PgPoolOptions;
        let db_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres-store");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&db_url)
            .expect("Failed to create Pg pool");
        info!("Using Postgres repository backend");
        crate::repo::pg::PgRepo::new(pool)
    };

    let openapi = ApiDoc::openapi();
    let assets = build_asset_store().await;
    info!("OpenAPI spec generated");

    let rate_limiting_enabled = std::env::var("RATE_LIMIT_DISABLED")
        .map(|v| !(v == "1" || v.eq_ignore_ascii_case("true")))
        .unwrap_or(true);
    let rate_limiter = rate_limiting_enabled.then(|| {
        RateLimiterFacade::new(
            InMemoryRateLimiter::new(true),
            RateLimitConfig::from_env(),
        )
    });

    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                // local dev frontends (Vite default + containerized nginx)
                .allowed_origin("http://localhost:5173")
                .allowed_origin("http://127.0.0.1:5173")
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allow_any_header()
                .allowed_methods(["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
                .supports_credentials()
                .max_age(3600);
            if let Ok(front) = std::env::var("FRONTEND_URL") {
                c = c.allowed_origin(&front);
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::from_env())
            .wrap(cors)
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
            .app_data(actix_web::web::Data::new(AppState {
                repo: Arc::new(repo.clone()),
                assets: assets.clone(),
                rate_limiter: rate_limiter.clone(),
            }))
    })
    .bind(("0.0.0.0", 8080))?;

    info!("Listening on http://0.0.0.0:8080 (all interfaces)");

    server.run().await
}

/// Validate that required environment variables are set
fn validate_env_vars() {
    use std::env;

    let required = vec!["JWT_SECRET", "S3_ENDPOINT"];

    let mut missing = Vec::new();
    for var in required {
        if env::var(var).is_err() {
            missing.push(var);
        }
    }

    if !missing.is_empty() {
        eprintln!("Missing required environment variables: {:?}", missing);
        eprintln!("Please copy .env.example to .env and configure it");
        std::process::exit(1);
    }

    if let Ok(secret) = env::var("JWT_SECRET") {
        if secret.len() < 32 {
            eprintln!("JWT_SECRET must be at least 32 characters long for security");
            std::process::exit(1);
        }
    }
}
