//! # Thread Actions
//!
//! The operations pages and API handlers call. Each one delegates the
//! storage work to a [`ThreadRepo`] and then tells the [`PathRevalidator`]
//! which rendered route is now stale.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{FeedPage, NewThread, NewUser, Thread, ThreadView, User};
use crate::traits::{PathRevalidator, ThreadRepo};

/// Reply levels populated under each feed entry.
pub const FEED_REPLY_DEPTH: usize = 1;
/// Reply levels populated on a thread page.
pub const THREAD_REPLY_DEPTH: usize = 2;
/// Largest feed page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Route of the top-level feed.
pub const FEED_PATH: &str = "/";

/// Route of a thread's page.
pub fn thread_path(id: Uuid) -> String {
    format!("/thread/{}", id)
}

#[derive(Clone)]
pub struct ThreadActions {
    repo: Arc<dyn ThreadRepo>,
    revalidator: Arc<dyn PathRevalidator>,
}

impl ThreadActions {
    pub fn new(repo: Arc<dyn ThreadRepo>, revalidator: Arc<dyn PathRevalidator>) -> Self {
        Self { repo, revalidator }
    }

    pub async fn health_check(&self) -> Result<()> {
        self.repo.health_check().await
    }

    pub async fn upsert_user(&self, user: NewUser) -> Result<User> {
        if user.name.trim().is_empty() {
            return Err(AppError::ValidationError("user name must not be empty".into()));
        }
        self.repo.upsert_user(user).await
    }

    pub async fn fetch_user(&self, id: Uuid) -> Result<Option<User>> {
        self.repo.get_user(id).await
    }

    /// Posts a new top-level thread.
    ///
    /// `community_id` is accepted but not stored; every thread is created
    /// with `community = None`.
    pub async fn create_thread(&self, params: NewThread) -> Result<Thread> {
        let NewThread { text, author, community_id, path } = params;
        ensure_text(&text)?;

        if let Some(community) = community_id {
            log::debug!("ignoring community {} for new thread by {}", community, author);
        }

        let thread = self.repo.create_thread(&text, author).await?;
        log::info!("thread {} created by {}", thread.id, author);

        self.revalidate([path, FEED_PATH.to_string()]);
        Ok(thread)
    }

    /// Fetches one page of the top-level feed. `page_number` is 1-indexed.
    pub async fn fetch_posts(&self, page_number: u32, page_size: u32) -> Result<FeedPage> {
        if page_number == 0 {
            return Err(AppError::ValidationError("page number starts at 1".into()));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(AppError::ValidationError(format!(
                "page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let skip = u64::from(page_number - 1) * u64::from(page_size);
        let (posts, total) = self.repo.list_top_level(skip, page_size).await?;
        let is_next = total > skip + posts.len() as u64;

        Ok(FeedPage { posts, is_next })
    }

    /// Fetches a thread with two levels of replies. `None` when it does not exist.
    pub async fn fetch_thread_by_id(&self, id: Uuid) -> Result<Option<ThreadView>> {
        self.repo.get_thread_tree(id, THREAD_REPLY_DEPTH).await
    }

    /// Replies to `thread_id`. Fails with `NotFound` when the parent is missing.
    ///
    /// Besides `path`, the feed and the page of every thread above the new
    /// reply are revalidated, since each of them renders part of the subtree.
    pub async fn add_comment_to_thread(
        &self,
        thread_id: Uuid,
        comment_text: &str,
        user_id: Uuid,
        path: &str,
    ) -> Result<Thread> {
        ensure_text(comment_text)?;

        let comment = self.repo.add_comment(thread_id, comment_text, user_id).await?;
        log::info!("comment {} added to thread {} by {}", comment.id, thread_id, user_id);

        let lineage = match self.repo.thread_lineage(thread_id).await {
            Ok(ids) => ids,
            Err(e) => {
                log::warn!("could not resolve ancestors of {}: {}", thread_id, e);
                vec![thread_id]
            }
        };
        let paths = [path.to_string(), FEED_PATH.to_string()]
            .into_iter()
            .chain(lineage.into_iter().map(thread_path));
        self.revalidate(paths);
        Ok(comment)
    }

    fn revalidate(&self, paths: impl IntoIterator<Item = String>) {
        let mut done: Vec<String> = Vec::new();
        for path in paths {
            if !done.contains(&path) {
                self.revalidator.revalidate_path(&path);
                done.push(path);
            }
        }
    }
}

fn ensure_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AppError::ValidationError("text must not be empty".into()));
    }
    Ok(())
}
