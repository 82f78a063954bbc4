//! # tb-api Handlers
//!
//! This module coordinates the flow between HTTP requests, the thread
//! actions and the rendered pages.

use std::sync::Arc;

use actix_web::{http::header, web, HttpResponse};
use askama::Template;
use serde::Deserialize;
use tb_core::actions::{thread_path, ThreadActions, FEED_PATH, MAX_PAGE_SIZE};
use tb_core::error::AppError;
use tb_core::models::NewThread;
use tb_ui::{flatten_replies, CommentForm, FeedTemplate, PostCard, ThreadTemplate, Viewer};
use uuid::Uuid;

use crate::cache::PageCache;
use crate::error::ApiError;
use crate::identity::CurrentUser;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub actions: ThreadActions,
    pub cache: Arc<PageCache>,
    /// Feed page size when the request does not ask for one
    pub page_size: u32,
}

impl AppState {
    pub fn new(actions: ThreadActions, cache: Arc<PageCache>, page_size: u32) -> Self {
        Self { actions, cache, page_size: page_size.clamp(1, MAX_PAGE_SIZE) }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: u32,
    pub size: Option<u32>,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct ThreadForm {
    pub text: String,
    pub community_id: Option<Uuid>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentFormData {
    pub text: String,
    pub path: Option<String>,
}

/// Renders the feed (e.g., /?page=2)
pub async fn feed(
    data: web::Data<AppState>,
    query: web::Query<PageQuery>,
    user: Option<CurrentUser>,
) -> Result<HttpResponse, ApiError> {
    let page_number = query.page;
    let page_size = query.size.unwrap_or(data.page_size);
    let viewer = load_viewer(&data.actions, user).await?;
    let variant = format!("page={}&size={}|{}", page_number, page_size, viewer_key(viewer.as_ref()));
    if let Some(html) = data.cache.get(FEED_PATH, &variant) {
        return Ok(html_response(html));
    }

    let generation = data.cache.generation();
    let page = data.actions.fetch_posts(page_number, page_size).await?;

    let posts: Vec<PostCard> = page.posts.iter().map(|post| PostCard::from_view(post, 0)).collect();
    let html = FeedTemplate {
        title: "Threads",
        viewer: viewer.as_ref(),
        posts: &posts,
        page: page_number,
        page_size,
        prev_page: (page_number > 1).then(|| page_number - 1),
        next_page: page.is_next.then(|| page_number + 1),
    }
    .render()?;

    data.cache.insert(FEED_PATH, variant, html.clone(), generation);
    Ok(html_response(html))
}

/// Renders a thread with its replies and, for signed-in viewers, the reply form.
pub async fn view_thread(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    user: Option<CurrentUser>,
) -> Result<HttpResponse, ApiError> {
    let thread_id = path.into_inner();
    let route = thread_path(thread_id);
    let viewer = load_viewer(&data.actions, user).await?;
    let variant = viewer_key(viewer.as_ref());
    if let Some(html) = data.cache.get(&route, &variant) {
        return Ok(html_response(html));
    }

    let generation = data.cache.generation();
    let thread = data
        .actions
        .fetch_thread_by_id(thread_id)
        .await?
        .ok_or_else(|| AppError::thread_not_found(thread_id))?;

    let card = PostCard::from_view(&thread, 0);
    let replies = flatten_replies(&thread);
    let comment_form = match &viewer {
        Some(v) => Some(CommentForm::new(thread_id, v.id, v.image.clone()).render(&route)?),
        None => None,
    };
    let title = format!("{} on Threads", card.author_name);

    let html = ThreadTemplate {
        title: &title,
        viewer: viewer.as_ref(),
        thread: &card,
        replies: &replies,
        comment_form,
    }
    .render()?;

    data.cache.insert(&route, variant, html.clone(), generation);
    Ok(html_response(html))
}

/// Handles the "new thread" form on the feed.
pub async fn create_thread(
    data: web::Data<AppState>,
    user: CurrentUser,
    form: web::Form<ThreadForm>,
) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();
    let path = local_path(form.path.as_deref());

    data.actions
        .create_thread(NewThread {
            text: form.text,
            author: user.0,
            community_id: form.community_id,
            path: path.to_string(),
        })
        .await?;

    Ok(see_other(path))
}

/// Handles the reply form under a thread, then sends the browser back to
/// the page it came from with an empty form.
pub async fn add_comment(
    data: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<Uuid>,
    form: web::Form<CommentFormData>,
) -> Result<HttpResponse, ApiError> {
    let thread_id = path.into_inner();
    let form = form.into_inner();
    let fallback = thread_path(thread_id);
    let page = match form.path.as_deref() {
        Some(p) => local_path(Some(p)).to_string(),
        None => fallback,
    };

    let mut comment_form = CommentForm::new(thread_id, user.0, String::new()).with_text(form.text);
    comment_form.submit(&data.actions, &page).await?;

    Ok(see_other(&page))
}

async fn load_viewer(actions: &ThreadActions, user: Option<CurrentUser>) -> Result<Option<Viewer>, ApiError> {
    match user {
        Some(CurrentUser(id)) => Ok(actions.fetch_user(id).await?.as_ref().map(Viewer::from)),
        None => Ok(None),
    }
}

/// Pages differ per signed-in viewer; signed-out visitors share one key.
fn viewer_key(viewer: Option<&Viewer>) -> String {
    viewer.map(|v| v.id.to_string()).unwrap_or_default()
}

/// Keeps redirects on this site.
fn local_path(path: Option<&str>) -> &str {
    match path {
        Some(p) if p.starts_with('/') && !p.starts_with("//") => p,
        _ => FEED_PATH,
    }
}

fn html_response(html: String) -> HttpResponse {
    HttpResponse::Ok().content_type("text/html; charset=utf-8").body(html)
}

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location.to_string()))
        .finish()
}
