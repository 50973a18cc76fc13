pub mod images;

use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;
use crate::store::DynAssetStore;

pub use images::{ImageStore, NewImage};

/// Fields for a new post. At least one image is required.
pub struct CreatePost {
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub archived: bool,
    pub images: Vec<NewImage>,
}

/// Partial update: `None` fields are retained, supplied images replace the
/// whole existing set.
#[derive(Default)]
pub struct UpdatePost {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub archived: Option<bool>,
    pub images: Vec<NewImage>,
}

// --- View structs ---

#[derive(Debug, Clone, Serialize)]
pub struct OwnerSummary {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageRef {
    pub id: String,
    pub url: String,
}

/// A post with its embedded owner summary, image list and read-time
/// like/comment counts. Counts are computed per read, never denormalized.
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub archived: bool,
    pub created_at: String,
    pub updated_at: String,
    pub owner: OwnerSummary,
    pub images: Vec<ImageRef>,
    pub likes_count: i64,
    pub comments_count: i64,
}

const DETAIL_SELECT: &str = "\
    SELECT p.id, p.title, p.description, p.location, p.latitude, p.longitude, \
           p.archived, p.created_at, p.updated_at, \
           u.id, u.name, u.avatar_url, \
           (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id), \
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) \
    FROM posts p \
    JOIN users u ON u.id = p.user_id";

fn map_detail(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostDetail> {
    Ok(PostDetail {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        archived: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        owner: OwnerSummary {
            id: row.get(9)?,
            name: row.get(10)?,
            avatar_url: row.get(11)?,
        },
        images: Vec::new(),
        likes_count: row.get(12)?,
        comments_count: row.get(13)?,
    })
}

/// Owns the post lifecycle: create/read/update/archive/delete, delegating
/// image-set changes to [`ImageStore`].
#[derive(Clone)]
pub struct PostService {
    db: DbPool,
    images: ImageStore,
}

impl PostService {
    pub fn new(db: DbPool, assets: DynAssetStore) -> Self {
        Self {
            images: ImageStore::new(db.clone(), assets),
            db,
        }
    }

    /// Create a post together with its image set. Assets are staged first;
    /// the post and image rows commit in one transaction, so a post either
    /// exists with its full image set or not at all.
    pub async fn create(&self, user_id: &str, input: CreatePost) -> AppResult<String> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("Title cannot be empty".into()));
        }
        if input.images.is_empty() {
            return Err(AppError::Validation(
                "At least one image must be uploaded".into(),
            ));
        }

        let post_id = uuid::Uuid::now_v7().to_string();
        let locators = self.images.stage(&post_id, input.images).await?;

        let committed: AppResult<()> = (|| {
            let conn = self.db.get()?;
            conn.execute("BEGIN IMMEDIATE", [])?;
            let result = (|| {
                conn.execute(
                    "INSERT INTO posts (id, user_id, title, description, location, latitude, longitude, archived)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        post_id,
                        user_id,
                        title,
                        input.description,
                        input.location,
                        input.latitude,
                        input.longitude,
                        input.archived,
                    ],
                )?;
                ImageStore::insert_rows(&conn, &post_id, &locators)
            })();
            match result {
                Ok(()) => {
                    conn.execute("COMMIT", [])?;
                    Ok(())
                }
                Err(e) => {
                    conn.execute("ROLLBACK", [])?;
                    Err(e.into())
                }
            }
        })();

        if let Err(e) = committed {
            // Row commit failed: the staged bytes are orphans, clean them up
            self.images.discard(&locators).await;
            return Err(e);
        }

        Ok(post_id)
    }

    /// Fetch one post with owner summary, images and aggregates.
    pub fn get(&self, post_id: &str) -> AppResult<PostDetail> {
        let detail = {
            let conn = self.db.get()?;
            let sql = format!("{DETAIL_SELECT} WHERE p.id = ?1");
            conn.query_row(&sql, params![post_id], map_detail)
                .optional()?
                .ok_or(AppError::NotFound)?
        };
        self.with_images(detail)
    }

    /// All non-archived posts, newest first, with the same embedded
    /// aggregates as [`PostService::get`]. Not owner-scoped.
    pub fn list_public(&self) -> AppResult<Vec<PostDetail>> {
        let details = {
            let conn = self.db.get()?;
            let sql = format!(
                "{DETAIL_SELECT} WHERE p.archived = 0 ORDER BY p.created_at DESC, p.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], map_detail)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        details
            .into_iter()
            .map(|d| self.with_images(d))
            .collect()
    }

    /// Exact-match filter on the location label. An empty result is an
    /// error, not an empty list; callers surface it as not-found.
    pub fn list_by_location(&self, location: &str) -> AppResult<Vec<Post>> {
        let conn = self.db.get()?;
        let sql = format!(
            "SELECT {} FROM posts WHERE location = ?1 ORDER BY created_at DESC",
            Post::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let posts = stmt
            .query_map(params![location], Post::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        if posts.is_empty() {
            return Err(AppError::NotFound);
        }
        Ok(posts)
    }

    /// Partial update. Ownership is re-checked against the stored owner; a
    /// supplied image set replaces the existing one wholesale.
    pub async fn update(
        &self,
        post_id: &str,
        user_id: &str,
        input: UpdatePost,
    ) -> AppResult<String> {
        // Same rule as create: a supplied title must survive trimming
        let title = match input.title {
            Some(t) => {
                let t = t.trim().to_string();
                if t.is_empty() {
                    return Err(AppError::Validation("Title cannot be empty".into()));
                }
                Some(t)
            }
            None => None,
        };

        self.check_owner(post_id, user_id)?;

        if !input.images.is_empty() {
            self.images.replace_all(post_id, input.images).await?;
        }

        let conn = self.db.get()?;
        conn.execute(
            "UPDATE posts SET \
                 title = COALESCE(?1, title), \
                 description = COALESCE(?2, description), \
                 location = COALESCE(?3, location), \
                 latitude = COALESCE(?4, latitude), \
                 longitude = COALESCE(?5, longitude), \
                 archived = COALESCE(?6, archived), \
                 updated_at = datetime('now') \
             WHERE id = ?7",
            params![
                title,
                input.description,
                input.location,
                input.latitude,
                input.longitude,
                input.archived,
                post_id,
            ],
        )?;

        Ok(post_id.to_string())
    }

    /// Flip the archived flag. Never cascades to images, likes or comments.
    pub fn set_archived(&self, post_id: &str, user_id: &str, archived: bool) -> AppResult<String> {
        self.check_owner(post_id, user_id)?;

        let conn = self.db.get()?;
        conn.execute(
            "UPDATE posts SET archived = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![archived, post_id],
        )?;

        Ok(post_id.to_string())
    }

    /// Delete a post. Asset bytes are removed best-effort first; the row
    /// delete is authoritative and cascades images, likes and comments
    /// (including reply subtrees) at the storage layer.
    pub async fn delete(&self, post_id: &str, user_id: &str) -> AppResult<()> {
        self.check_owner(post_id, user_id)?;

        let locators: Vec<String> = self
            .images
            .list(post_id)?
            .into_iter()
            .map(|i| i.url)
            .collect();
        self.images.discard(&locators).await;

        let conn = self.db.get()?;
        conn.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;
        Ok(())
    }

    fn check_owner(&self, post_id: &str, user_id: &str) -> AppResult<()> {
        let conn = self.db.get()?;
        let owner: String = conn
            .query_row(
                "SELECT user_id FROM posts WHERE id = ?1",
                params![post_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(AppError::NotFound)?;

        if owner != user_id {
            return Err(AppError::Unauthorized);
        }
        Ok(())
    }

    fn with_images(&self, mut detail: PostDetail) -> AppResult<PostDetail> {
        detail.images = self
            .images
            .list(&detail.id)?
            .into_iter()
            .map(|i| ImageRef { id: i.id, url: i.url })
            .collect();
        Ok(detail)
    }
}
