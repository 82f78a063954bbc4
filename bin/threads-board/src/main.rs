//! # Threads Board Binary
//!
//! The entry point that assembles the application based on compile-time features.

mod settings;

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tb_api::{configure_routes, middleware, AppState, PageCache};
use tb_core::actions::ThreadActions;

use crate::settings::Settings;

// Feature-gated imports: the database plugin is compiled to order
#[cfg(feature = "db-sqlite")]
use tb_db_sqlite::{Connector, SqliteThreadRepo};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::load().context("failed to load settings")?;

    // 1. Initialize Database Implementation
    #[cfg(feature = "db-sqlite")]
    let connector = Arc::new(
        Connector::new(settings.database_url.clone()).with_max_connections(settings.max_connections),
    );
    #[cfg(feature = "db-sqlite")]
    connector.connect().await.context("failed to open database")?;
    #[cfg(feature = "db-sqlite")]
    let repo = Arc::new(SqliteThreadRepo::new(connector.clone()));

    // 2. Wire actions to the page cache they revalidate
    let cache = Arc::new(PageCache::new());
    let actions = ThreadActions::new(repo, cache.clone());
    let state = web::Data::new(AppState::new(actions, cache, settings.page_size));

    let (host, port) = settings.bind_addr();
    log::info!("Threads board starting on http://{}:{}", host, port);

    let static_dir = settings.static_dir.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::standard_middleware())
            .wrap(middleware::cors_policy())
            .wrap(middleware::security_headers())
            .service(actix_files::Files::new("/static", &static_dir))
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    #[cfg(feature = "db-sqlite")]
    connector.close().await;

    Ok(())
}
