// Like toggle and threaded comments.
//
// A like is the presence of a (user, post) row, nothing else; toggling is an
// existence check followed by insert or delete. Comments form a flat,
// parent-keyed tree; reads eagerly load exactly one reply level.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::state::DbPool;

#[derive(Debug, Clone, Serialize)]
pub struct CommentReply {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub body: String,
    pub created_at: String,
}

/// A top-level comment with its direct replies. Deeper levels are not
/// loaded here; a reply's own replies are fetched by querying again.
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub body: String,
    pub created_at: String,
    pub replies: Vec<CommentReply>,
}

#[derive(Clone)]
pub struct SocialService {
    db: DbPool,
}

impl SocialService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Toggle the caller's like on a post. Returns the resulting state:
    /// `true` when the like was created, `false` when it was removed.
    pub fn toggle_like(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        let conn = self.db.get()?;
        ensure_post_exists(&conn, post_id)?;

        let existing: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM likes WHERE user_id = ?1 AND post_id = ?2",
            params![user_id, post_id],
            |row| row.get(0),
        )?;

        if existing {
            conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND post_id = ?2",
                params![user_id, post_id],
            )?;
            Ok(false)
        } else {
            conn.execute(
                "INSERT INTO likes (user_id, post_id) VALUES (?1, ?2)",
                params![user_id, post_id],
            )?;
            Ok(true)
        }
    }

    /// Append a comment, optionally as a reply. A parent must exist and
    /// belong to the same post as the new comment.
    pub fn add_comment(
        &self,
        user_id: &str,
        post_id: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> AppResult<String> {
        let body = body.trim();
        if body.is_empty() {
            return Err(AppError::Validation("Comment cannot be empty".into()));
        }

        let conn = self.db.get()?;
        ensure_post_exists(&conn, post_id)?;

        if let Some(parent) = parent_id {
            let parent_post: Option<String> = conn
                .query_row(
                    "SELECT post_id FROM comments WHERE id = ?1",
                    params![parent],
                    |row| row.get(0),
                )
                .optional()?;
            match parent_post {
                None => {
                    return Err(AppError::Validation("Parent comment not found".into()));
                }
                Some(p) if p != post_id => {
                    return Err(AppError::Validation(
                        "Parent comment belongs to a different post".into(),
                    ));
                }
                Some(_) => {}
            }
        }

        let comment_id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO comments (id, post_id, user_id, parent_id, body) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![comment_id, post_id, user_id, parent_id, body],
        )?;

        Ok(comment_id)
    }

    /// Top-level comments for a post, each carrying its direct replies and
    /// the commenters' display names. Grandchildren never appear in a reply
    /// list.
    pub fn list_comments(&self, post_id: &str) -> AppResult<Vec<CommentNode>> {
        let conn = self.db.get()?;
        ensure_post_exists(&conn, post_id)?;

        let mut stmt = conn.prepare(
            "SELECT c.id, c.user_id, u.name, c.parent_id, c.body, c.created_at
             FROM comments c
             JOIN users u ON u.id = c.user_id
             WHERE c.post_id = ?1
             ORDER BY c.created_at ASC, c.id ASC",
        )?;
        let rows: Vec<(String, String, String, Option<String>, String, String)> = stmt
            .query_map(params![post_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut nodes: Vec<CommentNode> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (id, user_id, user_name, parent_id, body, created_at) in &rows {
            if parent_id.is_none() {
                index.insert(id.clone(), nodes.len());
                nodes.push(CommentNode {
                    id: id.clone(),
                    user_id: user_id.clone(),
                    user_name: user_name.clone(),
                    body: body.clone(),
                    created_at: created_at.clone(),
                    replies: Vec::new(),
                });
            }
        }

        for (id, user_id, user_name, parent_id, body, created_at) in rows {
            // Only direct children of top-level comments are attached;
            // replies-to-replies stay out of this view.
            if let Some(parent) = parent_id {
                if let Some(&slot) = index.get(&parent) {
                    nodes[slot].replies.push(CommentReply {
                        id,
                        user_id,
                        user_name,
                        body,
                        created_at,
                    });
                }
            }
        }

        Ok(nodes)
    }
}

fn ensure_post_exists(conn: &Connection, post_id: &str) -> AppResult<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(AppError::NotFound);
    }
    Ok(())
}
