use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;

mod aggregator;
mod api;
mod config;
mod db;
mod directory;
mod docs;
mod error;
mod ledger;
mod model;
mod routes;
mod store;

use config::{Config, StoreBackend};
use db::init_db;

use crate::directory::EmployeeDirectory;
use crate::docs::ApiDoc;
use crate::store::{MemoryStore, MySqlStore, Store};
use tracing::{error, info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Time clock API is up"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "timeclock.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(offset = %config.local_offset, "Server starting...");

    let store = match (config.store_backend, config.database_url.as_deref()) {
        (StoreBackend::MySql, Some(url)) => Store::MySql(MySqlStore::new(init_db(url).await?)),
        (StoreBackend::MySql, None) => anyhow::bail!("DATABASE_URL must be set"),
        (StoreBackend::Memory, _) => {
            warn!("Using the in-memory store: records are lost on shutdown");
            Store::Memory(MemoryStore::new())
        }
    };

    let store = Data::new(store);
    let directory = Data::new(EmployeeDirectory::new());

    if matches!(store.get_ref(), Store::MySql(_)) {
        let store_for_warmup = store.clone();
        let directory_for_warmup = directory.clone();
        let days = config.cache_warmup_days;
        let batch_size = config.warmup_batch_size;

        actix_web::rt::spawn(async move {
            let Store::MySql(mysql) = store_for_warmup.get_ref() else {
                return;
            };

            if let Err(e) = directory_for_warmup
                .warmup_filter(mysql.stream_employees(), batch_size)
                .await
            {
                error!(error = ?e, "Failed to warmup employee filter");
            }

            // Warm up employees that clocked in recently
            if let Err(e) = directory_for_warmup
                .warmup_cache(mysql.stream_recent_employees(days), batch_size)
                .await
            {
                error!(error = ?e, "Failed to warmup employee cache");
            }
        });
    }

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(store.clone())
            .app_data(directory.clone())
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await
    .context("Server error")
}
