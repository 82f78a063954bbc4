//! Resolves stored thread references into populated [`ThreadView`] trees.
//!
//! Threads are loaded one reply level at a time with `IN (...)` queries,
//! then assembled bottom-up. A level wider than [`MAX_BOUND_IDS`] is split
//! across several queries to stay under SQLite's bound-parameter limit.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tb_core::error::Result;
use tb_core::models::{AuthorSummary, Children, ThreadView};
use uuid::Uuid;

use crate::connector::db_err;

/// Ids bound into a single `IN (...)` list.
pub(crate) const MAX_BOUND_IDS: usize = 500;

#[derive(sqlx::FromRow)]
struct PopulatedRow {
    id: Uuid,
    text: String,
    community_id: Option<Uuid>,
    parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    author_id: Uuid,
    author_name: String,
    author_image: String,
}

impl PopulatedRow {
    fn into_view(self, children: Children) -> ThreadView {
        ThreadView {
            id: self.id,
            text: self.text,
            author: AuthorSummary {
                id: self.author_id,
                name: self.author_name,
                image: self.author_image,
            },
            community: self.community_id,
            parent_id: self.parent_id,
            children,
            created_at: self.created_at,
        }
    }
}

struct Loaded {
    row: PopulatedRow,
    children: Vec<Uuid>,
}

/// Loads `roots` (in the given order) with `depth` levels of replies resolved.
/// Replies below `depth` are returned as raw ids. Ids that no longer exist
/// are skipped.
pub(crate) async fn populate(
    conn: &mut SqliteConnection,
    roots: &[Uuid],
    depth: usize,
) -> Result<Vec<ThreadView>> {
    let mut levels: Vec<HashMap<Uuid, Loaded>> = Vec::with_capacity(depth + 1);
    let mut ids = roots.to_vec();

    for level in 0..=depth {
        if ids.is_empty() {
            break;
        }
        let loaded = load_level(conn, &ids).await?;
        ids = if level < depth {
            ids.iter()
                .filter_map(|id| loaded.get(id))
                .flat_map(|item| item.children.iter().copied())
                .collect()
        } else {
            Vec::new()
        };
        levels.push(loaded);
    }

    let mut below: HashMap<Uuid, ThreadView> = HashMap::new();
    for (level, loaded) in levels.into_iter().enumerate().rev() {
        let mut current = HashMap::with_capacity(loaded.len());
        for (id, Loaded { row, children }) in loaded {
            let children = if level < depth {
                Children::Resolved(children.iter().filter_map(|child| below.remove(child)).collect())
            } else {
                Children::Ids(children)
            };
            current.insert(id, row.into_view(children));
        }
        below = current;
    }

    Ok(roots.iter().filter_map(|id| below.remove(id)).collect())
}

async fn load_level(conn: &mut SqliteConnection, ids: &[Uuid]) -> Result<HashMap<Uuid, Loaded>> {
    let mut rows: Vec<PopulatedRow> = Vec::with_capacity(ids.len());
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();

    for chunk in ids.chunks(MAX_BOUND_IDS) {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT t.id, t.text, t.community_id, t.parent_id, t.created_at, \
             u.id AS author_id, u.name AS author_name, u.image AS author_image \
             FROM threads t JOIN users u ON u.id = t.author_id WHERE t.id IN (",
        );
        push_ids(&mut query, chunk);
        let mut found: Vec<PopulatedRow> = query
            .build_query_as()
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err)?;
        rows.append(&mut found);

        // Each parent sits in exactly one chunk, so its replies stay in order.
        let mut query =
            QueryBuilder::<Sqlite>::new("SELECT parent_id, child_id FROM thread_children WHERE parent_id IN (");
        push_ids(&mut query, chunk);
        query.push(" ORDER BY parent_id, position");
        let links: Vec<(Uuid, Uuid)> = query
            .build_query_as()
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err)?;

        for (parent, child) in links {
            children.entry(parent).or_default().push(child);
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let children = children.remove(&row.id).unwrap_or_default();
            (row.id, Loaded { row, children })
        })
        .collect())
}

fn push_ids(query: &mut QueryBuilder<'_, Sqlite>, ids: &[Uuid]) {
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}
