//! # Domain Models
//!
//! These structs represent the core entities of the thread board.
//! We use UUID v7 for time-ordered, globally unique identification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default number of top-level posts on a feed page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A person who authors threads and comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Avatar URL supplied by the identity provider
    pub image: String,
    /// Every thread and comment this user created, in creation order
    pub threads: Vec<Uuid>,
}

/// Identity fields synced from the auth provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub image: String,
}

/// A stored thread. Top-level posts and comments share this shape;
/// a comment is a thread whose `parent_id` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub text: String,
    pub author: Uuid,
    /// Always `None` for now: community assignment is not wired up yet.
    pub community: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    /// Direct replies, append-only, oldest first
    pub children: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Thread {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// The restricted author projection attached to populated threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub name: String,
    pub image: String,
}

/// Replies of a populated thread: resolved views down to the requested
/// depth, raw ids below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Children {
    Resolved(Vec<ThreadView>),
    Ids(Vec<Uuid>),
}

impl Children {
    pub fn len(&self) -> usize {
        match self {
            Children::Resolved(views) => views.len(),
            Children::Ids(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The resolved replies, or an empty slice when this level was not populated.
    pub fn resolved(&self) -> &[ThreadView] {
        match self {
            Children::Resolved(views) => views,
            Children::Ids(_) => &[],
        }
    }
}

/// A thread with its author resolved and its replies populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadView {
    pub id: Uuid,
    pub text: String,
    pub author: AuthorSummary,
    pub community: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub children: Children,
    pub created_at: DateTime<Utc>,
}

/// One page of the top-level feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    pub posts: Vec<ThreadView>,
    /// True when more top-level posts exist beyond this page
    pub is_next: bool,
}

/// Input for creating a top-level thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewThread {
    pub text: String,
    pub author: Uuid,
    pub community_id: Option<Uuid>,
    /// Route whose cached rendering must be refreshed afterwards
    pub path: String,
}
