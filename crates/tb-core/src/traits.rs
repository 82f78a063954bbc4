//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{NewUser, Thread, ThreadView, User};

/// Data persistence contract for threads and the users who author them.
///
/// Implementations make every multi-record write atomic: a thread is never
/// stored without its author's `threads` entry, and a comment never without
/// its parent's `children` entry.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ThreadRepo: Send + Sync {
    /// Probes the underlying connection.
    async fn health_check(&self) -> Result<()>;

    // User Operations
    async fn upsert_user(&self, user: NewUser) -> Result<User>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    // Thread Operations
    /// Inserts a top-level thread and appends it to the author's `threads`.
    async fn create_thread(&self, text: &str, author: Uuid) -> Result<Thread>;

    /// Top-level threads newest first, populated one reply level deep,
    /// together with the total number of top-level threads.
    async fn list_top_level(&self, skip: u64, limit: u32) -> Result<(Vec<ThreadView>, u64)>;

    /// A thread with `depth` levels of replies populated.
    async fn get_thread_tree(&self, id: Uuid, depth: usize) -> Result<Option<ThreadView>>;

    /// `id` followed by its parent, grandparent and so on up to the
    /// top-level thread. Empty when `id` does not exist.
    async fn thread_lineage(&self, id: Uuid) -> Result<Vec<Uuid>>;

    // Comment Operations
    /// Inserts a reply under `parent` and appends it to the parent's `children`.
    async fn add_comment(&self, parent: Uuid, text: &str, author: Uuid) -> Result<Thread>;
}

/// Invalidates the cached rendering of a route.
///
/// Fire-and-forget: a failed eviction only means a stale page is served
/// until the next one.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait PathRevalidator: Send + Sync {
    fn revalidate_path(&self, path: &str);
}
