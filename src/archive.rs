// Archive aggregation - read-only, per-user, year-bucketed views of posts.

use rusqlite::params;
use serde::Serialize;

use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct YearCount {
    pub year: i32,
    pub count: i64,
}

#[derive(Clone)]
pub struct ArchiveService {
    db: DbPool,
}

impl ArchiveService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Per-year post counts for one user, most recent year first. A user
    /// with zero posts is a not-found condition, matching the listing
    /// operations.
    pub fn stats_by_user(&self, user_id: &str) -> AppResult<Vec<YearCount>> {
        let conn = self.db.get()?;
        let mut stmt = conn.prepare(
            "SELECT CAST(strftime('%Y', created_at) AS INTEGER) AS year, COUNT(*)
             FROM posts
             WHERE user_id = ?1
             GROUP BY year
             ORDER BY year DESC",
        )?;
        let stats = stmt
            .query_map(params![user_id], |row| {
                Ok(YearCount {
                    year: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if stats.is_empty() {
            return Err(AppError::NotFound);
        }
        Ok(stats)
    }

    /// The user's posts created within `[year-01-01, (year+1)-01-01)`.
    pub fn by_year(&self, user_id: &str, year: i32) -> AppResult<Vec<Post>> {
        // Saturate at the top of the i32 range; the window collapses to
        // empty instead of overflowing on absurd path input.
        let start = format!("{year:04}-01-01");
        let end = format!("{:04}-01-01", year.saturating_add(1));

        let conn = self.db.get()?;
        let sql = format!(
            "SELECT {} FROM posts
             WHERE user_id = ?1 AND created_at >= ?2 AND created_at < ?3
             ORDER BY created_at DESC",
            Post::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let posts = stmt
            .query_map(params![user_id, start, end], Post::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        if posts.is_empty() {
            return Err(AppError::NotFound);
        }
        Ok(posts)
    }
}
