mod api;
mod config;
mod database;
mod jobs;
mod middleware;
mod models;
mod services;
mod state;
mod store;
mod sync;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use config::{AppConfig, StoreBackend};
use dotenv::dotenv;
use state::AppState;
use std::sync::Arc;
use store::{DocumentStore, MemoryStore, MongoStore};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    log::info!("🚀 Starting Forum Sync Service...");

    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Mongo => {
            let url = config.database_url.as_deref().unwrap_or_default();
            let db = database::MongoDB::new(url)
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            log::info!("✅ MongoDB connected successfully");
            Arc::new(MongoStore::new(db))
        }
        StoreBackend::Memory => {
            log::warn!("⚠️  Using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(config, store);
    let config = state.config.clone();
    let (host, port) = (config.host.clone(), config.port);

    log::info!("📅 Starting background jobs...");
    jobs::purge_sweeper::start_purge_sweeper(state.cascade.clone(), config.purge_sweep_interval_secs);

    let state_data = web::Data::new(state);

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    HttpServer::new(move || {
        let cors = config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CACHE_CONTROL,
            ])
            .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        let openapi = api::swagger::ApiDoc::openapi();
        let jwt_secret = config.jwt_secret.clone();

        App::new()
            .app_data(state_data.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi)
            )
            .configure(move |cfg| api::configure(cfg, &jwt_secret))
    })
    .bind(format!("{}:{}", host, port))?
    .run()
    .await
}
