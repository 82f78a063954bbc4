//! # tb-api
//!
//! The web routing and orchestration layer for the thread board.

pub mod api;
pub mod cache;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;

pub use cache::PageCache;
pub use error::ApiError;
pub use handlers::AppState;
pub use identity::{CurrentUser, USER_HEADER};

use actix_web::web;

/// Configures the routes for the thread board.
///
/// # Developer Note
/// Pages and form posts live at the root; the JSON API is scoped under
/// `/api` so the binary can mount both in one `App`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(api::health))
        .service(
            web::scope("/api")
                .route("/posts", web::get().to(api::list_posts))
                .route("/threads", web::post().to(api::create_thread))
                .route("/threads/{id}", web::get().to(api::get_thread))
                .route("/threads/{id}/comments", web::post().to(api::add_comment))
                .route("/users/{id}", web::put().to(api::upsert_user))
                .route("/users/{id}", web::get().to(api::get_user)),
        )
        // The feed (e.g., /?page=2)
        .route("/", web::get().to(handlers::feed))
        // The posting endpoint for new threads
        .route("/thread", web::post().to(handlers::create_thread))
        // The thread view (e.g., /thread/0191...)
        .route("/thread/{id}", web::get().to(handlers::view_thread))
        // The reply form
        .route("/thread/{id}/comment", web::post().to(handlers::add_comment));
}
