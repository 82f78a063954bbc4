//! # tb-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `tb-core` domain models.
//!
//! The append-only `children` and `threads` sequences of the domain live in
//! the `thread_children` and `user_threads` link tables, ordered by `position`.

mod connector;
mod populate;

pub use connector::Connector;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::SqliteConnection;
use tb_core::error::{AppError, Result};
use tb_core::models::{NewUser, Thread, ThreadView, User};
use tb_core::traits::ThreadRepo;
use tb_core::FEED_REPLY_DEPTH;
use uuid::Uuid;

use crate::connector::db_err;
use crate::populate::populate;

pub struct SqliteThreadRepo {
    connector: Arc<Connector>,
}

#[derive(sqlx::FromRow)]
struct ThreadRow {
    id: Uuid,
    text: String,
    author_id: Uuid,
    community_id: Option<Uuid>,
    parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    image: String,
}

impl SqliteThreadRepo {
    pub fn new(connector: Arc<Connector>) -> Self {
        Self { connector }
    }

    /// Builds a connector for `database_url` and opens it right away.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let connector = Arc::new(Connector::new(database_url));
        connector.connect().await?;
        Ok(Self::new(connector))
    }

    pub fn connector(&self) -> &Arc<Connector> {
        &self.connector
    }

    /// Retrieves the stored record of a thread, with its reply ids.
    pub async fn get_thread(&self, id: Uuid) -> Result<Option<Thread>> {
        let pool = self.connector.connect().await?;
        let mut conn = pool.acquire().await.map_err(db_err)?;

        let row: Option<ThreadRow> = sqlx::query_as(
            "SELECT id, text, author_id, community_id, parent_id, created_at FROM threads WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => {
                let children = child_ids(&mut conn, row.id).await?;
                Ok(Some(Thread {
                    id: row.id,
                    text: row.text,
                    author: row.author_id,
                    community: row.community_id,
                    parent_id: row.parent_id,
                    children,
                    created_at: row.created_at,
                }))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ThreadRepo for SqliteThreadRepo {
    async fn health_check(&self) -> Result<()> {
        self.connector.health_check().await
    }

    async fn upsert_user(&self, user: NewUser) -> Result<User> {
        let pool = self.connector.connect().await?;
        let mut conn = pool.acquire().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO users (id, name, image) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, image = excluded.image",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.image)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

        let threads = user_thread_ids(&mut conn, user.id).await?;
        Ok(User { id: user.id, name: user.name, image: user.image, threads })
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let pool = self.connector.connect().await?;
        let mut conn = pool.acquire().await.map_err(db_err)?;

        let row: Option<UserRow> = sqlx::query_as("SELECT id, name, image FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => {
                let threads = user_thread_ids(&mut conn, row.id).await?;
                Ok(Some(User { id: row.id, name: row.name, image: row.image, threads }))
            }
            None => Ok(None),
        }
    }

    /// Inserts the thread and records it on its author in one transaction,
    /// so a failure never leaves a thread without its author entry.
    async fn create_thread(&self, text: &str, author: Uuid) -> Result<Thread> {
        let pool = self.connector.connect().await?;
        let mut tx = pool.begin().await.map_err(db_err)?;

        let thread = Thread {
            id: Uuid::now_v7(),
            text: text.to_string(),
            author,
            community: None,
            parent_id: None,
            children: Vec::new(),
            created_at: Utc::now(),
        };
        // The transaction's first statement must be a write, so it takes the
        // write lock up front instead of upgrading a read snapshot.
        insert_thread(&mut tx, &thread)
            .await
            .map_err(|e| missing_on_fk(e, || AppError::user_not_found(author)))?;
        push_user_thread(&mut tx, author, thread.id).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(thread)
    }

    /// Count and page are read inside one transaction so they agree.
    async fn list_top_level(&self, skip: u64, limit: u32) -> Result<(Vec<ThreadView>, u64)> {
        let offset = i64::try_from(skip)
            .map_err(|_| AppError::ValidationError(format!("offset {} out of range", skip)))?;

        let pool = self.connector.connect().await?;
        let mut tx = pool.begin().await.map_err(db_err)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM threads WHERE parent_id IS NULL")
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM threads WHERE parent_id IS NULL \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        let posts = populate(&mut tx, &ids, FEED_REPLY_DEPTH).await?;
        tx.commit().await.map_err(db_err)?;

        Ok((posts, u64::try_from(total).unwrap_or_default()))
    }

    async fn get_thread_tree(&self, id: Uuid, depth: usize) -> Result<Option<ThreadView>> {
        let pool = self.connector.connect().await?;
        let mut conn = pool.acquire().await.map_err(db_err)?;

        let mut views = populate(&mut conn, &[id], depth).await?;
        Ok(views.pop())
    }

    async fn thread_lineage(&self, id: Uuid) -> Result<Vec<Uuid>> {
        let pool = self.connector.connect().await?;

        sqlx::query_scalar(
            "WITH RECURSIVE lineage(id, parent_id, depth) AS ( \
                 SELECT id, parent_id, 0 FROM threads WHERE id = ? \
                 UNION ALL \
                 SELECT t.id, t.parent_id, l.depth + 1 FROM threads t JOIN lineage l ON t.id = l.parent_id \
             ) \
             SELECT id FROM lineage ORDER BY depth",
        )
        .bind(id)
        .fetch_all(pool)
        .await
        .map_err(db_err)
    }

    /// Inserts the comment, appends it to the parent's replies and to the
    /// commenter's threads in one transaction. A missing parent or author
    /// fails before the transaction commits, leaving nothing behind.
    async fn add_comment(&self, parent: Uuid, text: &str, author: Uuid) -> Result<Thread> {
        let pool = self.connector.connect().await?;
        let mut tx = pool.begin().await.map_err(db_err)?;

        let comment = Thread {
            id: Uuid::now_v7(),
            text: text.to_string(),
            author,
            community: None,
            parent_id: Some(parent),
            children: Vec::new(),
            created_at: Utc::now(),
        };
        // Write first; see `create_thread`.
        if let Err(e) = insert_thread(&mut tx, &comment).await {
            if !is_foreign_key_violation(&e) {
                return Err(db_err(e));
            }
            return Err(if thread_exists(&mut tx, parent).await? {
                AppError::user_not_found(author)
            } else {
                AppError::thread_not_found(parent)
            });
        }

        sqlx::query(
            "INSERT INTO thread_children (parent_id, position, child_id) \
             SELECT ?, COALESCE(MAX(position) + 1, 0), ? FROM thread_children WHERE parent_id = ?",
        )
        .bind(parent)
        .bind(comment.id)
        .bind(parent)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        push_user_thread(&mut tx, author, comment.id).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(comment)
    }
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if matches!(db.kind(), ErrorKind::ForeignKeyViolation))
}

/// Maps a foreign-key failure to the `NotFound` built by `missing`.
fn missing_on_fk(e: sqlx::Error, missing: impl FnOnce() -> AppError) -> AppError {
    if is_foreign_key_violation(&e) {
        missing()
    } else {
        db_err(e)
    }
}

async fn thread_exists(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM threads WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(found.is_some())
}

async fn insert_thread(conn: &mut SqliteConnection, thread: &Thread) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO threads (id, text, author_id, community_id, parent_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(thread.id)
    .bind(&thread.text)
    .bind(thread.author)
    .bind(thread.community)
    .bind(thread.parent_id)
    .bind(thread.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn push_user_thread(conn: &mut SqliteConnection, user: Uuid, thread: Uuid) -> Result<()> {
    sqlx::query(
        "INSERT INTO user_threads (user_id, position, thread_id) \
         SELECT ?, COALESCE(MAX(position) + 1, 0), ? FROM user_threads WHERE user_id = ?",
    )
    .bind(user)
    .bind(thread)
    .bind(user)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn child_ids(conn: &mut SqliteConnection, parent: Uuid) -> Result<Vec<Uuid>> {
    sqlx::query_scalar("SELECT child_id FROM thread_children WHERE parent_id = ? ORDER BY position")
        .bind(parent)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)
}

async fn user_thread_ids(conn: &mut SqliteConnection, user: Uuid) -> Result<Vec<Uuid>> {
    sqlx::query_scalar("SELECT thread_id FROM user_threads WHERE user_id = ? ORDER BY position")
        .bind(user)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)
}
