// Image lifecycle - keeps post_images rows and asset-store bytes in step.
//
// Writes are all-or-nothing per request: every file is staged into the asset
// store first (concurrently), and if any write fails the staged siblings are
// deleted before the error propagates, so no image row ever points at bytes
// that were never written. Byte deletion is advisory everywhere: the row is
// the authoritative record, orphaned bytes are cleanable.

use bytes::Bytes;
use futures::future::join_all;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::params;

use crate::db::models::PostImage;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;
use crate::store::DynAssetStore;

/// An uploaded image that has not been stored yet.
pub struct NewImage {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Clone)]
pub struct ImageStore {
    db: DbPool,
    assets: DynAssetStore,
}

impl ImageStore {
    pub fn new(db: DbPool, assets: DynAssetStore) -> Self {
        Self { db, assets }
    }

    /// Current image rows for a post, insertion order.
    pub fn list(&self, post_id: &str) -> AppResult<Vec<PostImage>> {
        let conn = self.db.get()?;
        let mut stmt =
            conn.prepare("SELECT id, post_id, url FROM post_images WHERE post_id = ?1")?;
        let images = stmt
            .query_map(params![post_id], |row| {
                Ok(PostImage {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    url: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(images)
    }

    /// Write every file to the asset store, fanning the writes out
    /// concurrently. Returns the locators on success. If any write fails,
    /// the writes that did succeed are deleted again and the whole batch
    /// fails; no rows are touched here.
    pub async fn stage(&self, post_id: &str, files: Vec<NewImage>) -> AppResult<Vec<String>> {
        let writes = files.into_iter().map(|file| {
            let assets = self.assets.clone();
            let name = unique_name(post_id, &file.content_type);
            async move { assets.write(&name, file.data).await }
        });

        let mut locators = Vec::new();
        let mut first_error = None;
        for result in join_all(writes).await {
            match result {
                Ok(locator) => locators.push(locator),
                Err(e) => {
                    tracing::error!(post_id, error = %e, "image write failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            self.discard(&locators).await;
            return Err(AppError::Storage(e));
        }

        Ok(locators)
    }

    /// Insert image rows for already-staged locators. Runs on the caller's
    /// connection so it can share a transaction with the post row.
    pub fn insert_rows(
        conn: &rusqlite::Connection,
        post_id: &str,
        locators: &[String],
    ) -> rusqlite::Result<()> {
        for locator in locators {
            conn.execute(
                "INSERT INTO post_images (id, post_id, url) VALUES (?1, ?2, ?3)",
                params![uuid::Uuid::now_v7().to_string(), post_id, locator],
            )?;
        }
        Ok(())
    }

    /// Best-effort deletion of asset bytes. Failures are logged and
    /// swallowed; the enclosing operation carries on.
    pub async fn discard(&self, locators: &[String]) {
        for locator in locators {
            if let Err(e) = self.assets.delete(locator).await {
                tracing::warn!(locator = %locator, error = %e, "failed to delete asset bytes");
            }
        }
    }

    /// Replace the whole image set of a post: advisory-delete the old bytes,
    /// drop the old rows, then stage and insert the new set.
    pub async fn replace_all(&self, post_id: &str, files: Vec<NewImage>) -> AppResult<Vec<String>> {
        let old: Vec<String> = self.list(post_id)?.into_iter().map(|i| i.url).collect();
        self.discard(&old).await;
        {
            let conn = self.db.get()?;
            conn.execute(
                "DELETE FROM post_images WHERE post_id = ?1",
                params![post_id],
            )?;
        }

        let locators = self.stage(post_id, files).await?;
        let insert: AppResult<()> = (|| {
            let conn = self.db.get()?;
            Self::insert_rows(&conn, post_id, &locators)?;
            Ok(())
        })();
        if let Err(e) = insert {
            self.discard(&locators).await;
            return Err(e);
        }
        Ok(locators)
    }
}

/// Derive a storage name that cannot collide across concurrent uploads for
/// the same post: post id, millisecond timestamp, random suffix, extension
/// taken from the content type.
fn unique_name(post_id: &str, content_type: &str) -> String {
    let ext = content_type
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("bin");
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    let millis = chrono::Utc::now().timestamp_millis();
    format!("{post_id}-{millis}-{suffix}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::store::{AssetStore, FsAssetStore};
    use async_trait::async_trait;
    use std::io;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Asset store that refuses to write payloads equal to b"FAIL".
    struct FailingStore {
        inner: FsAssetStore,
    }

    #[async_trait]
    impl AssetStore for FailingStore {
        async fn write(&self, name: &str, data: Bytes) -> io::Result<String> {
            if data.as_ref() == b"FAIL" {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.inner.write(name, data).await
        }

        async fn read(&self, locator: &str) -> io::Result<Bytes> {
            self.inner.read(locator).await
        }

        async fn delete(&self, locator: &str) -> io::Result<()> {
            self.inner.delete(locator).await
        }

        async fn exists(&self, locator: &str) -> bool {
            self.inner.exists(locator).await
        }
    }

    fn test_store(tmp: &TempDir, flaky: bool) -> (ImageStore, DbPool) {
        let pool = db::create_pool(&tmp.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, name, email) VALUES ('u1', 'alice', 'a@example.com');
             INSERT INTO posts (id, user_id, title, description) VALUES ('p1', 'u1', 't', 'd');",
        )
        .unwrap();
        drop(conn);

        let uploads = tmp.path().join("uploads");
        let assets: DynAssetStore = if flaky {
            Arc::new(FailingStore {
                inner: FsAssetStore::new(&uploads),
            })
        } else {
            Arc::new(FsAssetStore::new(&uploads))
        };

        (ImageStore::new(pool.clone(), assets), pool)
    }

    fn image(data: &'static [u8]) -> NewImage {
        NewImage {
            data: Bytes::from_static(data),
            content_type: "image/jpeg".to_string(),
        }
    }

    fn upload_count(tmp: &TempDir) -> usize {
        match std::fs::read_dir(tmp.path().join("uploads")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    #[test]
    fn unique_name_embeds_post_id_and_extension() {
        let name = unique_name("p1", "image/png");
        assert!(name.starts_with("p1-"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn unique_name_does_not_collide() {
        let a = unique_name("p1", "image/jpeg");
        let b = unique_name("p1", "image/jpeg");
        assert_ne!(a, b);
    }

    #[test]
    fn unique_name_falls_back_on_odd_content_type() {
        let name = unique_name("p1", "garbage");
        assert!(name.ends_with(".garbage"));
        let name = unique_name("p1", "image/");
        assert!(name.ends_with(".bin"));
    }

    #[tokio::test]
    async fn stage_writes_all_files() {
        let tmp = TempDir::new().unwrap();
        let (store, _pool) = test_store(&tmp, false);

        let locators = store
            .stage("p1", vec![image(b"one"), image(b"two")])
            .await
            .unwrap();

        assert_eq!(locators.len(), 2);
        assert_eq!(upload_count(&tmp), 2);
        for locator in &locators {
            assert!(locator.starts_with("/media/p1-"));
        }
    }

    #[tokio::test]
    async fn stage_cleans_up_siblings_when_one_write_fails() {
        let tmp = TempDir::new().unwrap();
        let (store, pool) = test_store(&tmp, true);

        let result = store
            .stage("p1", vec![image(b"good"), image(b"FAIL"), image(b"also good")])
            .await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        // The sibling writes that succeeded were deleted again
        assert_eq!(upload_count(&tmp), 0);
        // And nothing touched the rows
        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM post_images", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn replace_all_swaps_rows_and_bytes() {
        let tmp = TempDir::new().unwrap();
        let (store, pool) = test_store(&tmp, false);

        let old = store.stage("p1", vec![image(b"old")]).await.unwrap();
        {
            let conn = pool.get().unwrap();
            ImageStore::insert_rows(&conn, "p1", &old).unwrap();
        }

        let new = store
            .replace_all("p1", vec![image(b"new a"), image(b"new b")])
            .await
            .unwrap();

        let rows = store.list("p1").unwrap();
        assert_eq!(rows.len(), 2);
        let urls: Vec<&str> = rows.iter().map(|i| i.url.as_str()).collect();
        for locator in &new {
            assert!(urls.contains(&locator.as_str()));
        }
        assert!(!urls.contains(&old[0].as_str()));
        // Old bytes are gone, two new files remain
        assert_eq!(upload_count(&tmp), 2);
    }

    #[tokio::test]
    async fn discard_swallows_missing_assets() {
        let tmp = TempDir::new().unwrap();
        let (store, _pool) = test_store(&tmp, false);

        // Deleting something that never existed must not panic or error
        store.discard(&["/media/nope.jpg".to_string()]).await;
    }
}
