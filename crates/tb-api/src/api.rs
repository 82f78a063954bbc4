//! JSON endpoints mirroring the page actions, for clients that are not
//! the server-rendered UI.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tb_core::actions::{thread_path, FEED_PATH};
use tb_core::error::AppError;
use tb_core::models::{NewThread, NewUser};
use uuid::Uuid;

use crate::error::ApiError;
use crate::handlers::{AppState, PageQuery};
use crate::identity::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct CreateThreadRequest {
    pub text: String,
    pub community_id: Option<Uuid>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub text: String,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertUserRequest {
    pub name: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    pub database_connection: bool,
    pub version: String,
}

pub async fn list_posts(
    data: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let page_size = query.size.unwrap_or(data.page_size);
    let page = data.actions.fetch_posts(query.page, page_size).await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn create_thread(
    data: web::Data<AppState>,
    user: CurrentUser,
    body: web::Json<CreateThreadRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let thread = data
        .actions
        .create_thread(NewThread {
            text: body.text,
            author: user.0,
            community_id: body.community_id,
            path: body.path.unwrap_or_else(|| FEED_PATH.to_string()),
        })
        .await?;
    Ok(HttpResponse::Created().json(thread))
}

pub async fn get_thread(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let thread = data
        .actions
        .fetch_thread_by_id(id)
        .await?
        .ok_or_else(|| AppError::thread_not_found(id))?;
    Ok(HttpResponse::Ok().json(thread))
}

pub async fn add_comment(
    data: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<Uuid>,
    body: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, ApiError> {
    let thread_id = path.into_inner();
    let body = body.into_inner();
    let page = body.path.unwrap_or_else(|| thread_path(thread_id));

    let comment = data
        .actions
        .add_comment_to_thread(thread_id, &body.text, user.0, &page)
        .await?;
    Ok(HttpResponse::Created().json(comment))
}

/// Syncs a profile from the identity provider. Users may only write their own.
pub async fn upsert_user(
    data: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<Uuid>,
    body: web::Json<UpsertUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    if user.0 != id {
        return Err(AppError::Unauthorized("cannot update another user".into()).into());
    }

    let body = body.into_inner();
    let user = data
        .actions
        .upsert_user(NewUser { id, name: body.name, image: body.image })
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn get_user(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let user = data
        .actions
        .fetch_user(id)
        .await?
        .ok_or_else(|| AppError::user_not_found(id))?;
    Ok(HttpResponse::Ok().json(user))
}

/// Check the health of the API and its database.
pub async fn health(data: web::Data<AppState>) -> HttpResponse {
    let database_connection = match data.actions.health_check().await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("health check failed: {}", e);
            false
        }
    };

    let response = HealthResponse {
        status: if database_connection { "ok" } else { "degraded" }.to_string(),
        database_connection,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    if database_connection {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
