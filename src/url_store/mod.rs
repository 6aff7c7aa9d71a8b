// The URL content store: sqlite-backed persistence for scraped page
// content, keyed by URL. Grounded on the teacher's sqlite usage in
// `indexes::caching` for pool setup style; queries here are written against
// the runtime `sqlx::query` API rather than the compile-time-checked
// `query!` macro since this workspace carries no `.sqlx` offline cache for
// the macro to validate against (see DESIGN.md).
//
// The scraper and HTML->markdown conversion that produce a `UrlContent`'s
// `markdown_content` are an external collaborator; this module owns
// storage, lookup and the conditional-refetch decision only.

use std::path::Path;

use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::error::{Error, Result};
use crate::model::UrlContent;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS url_content (
    url TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    markdown_content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    etag TEXT,
    last_modified TEXT,
    last_indexed_unix_secs INTEGER NOT NULL,
    backend_id TEXT NOT NULL
)
"#;

pub struct UrlStore {
    pool: SqlitePool,
}

impl UrlStore {
    pub async fn connect(path: &Path) -> Result<Self> {
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| Error::Internal(e.into()))?;
        sqlx::query(CREATE_TABLE_SQL).execute(&pool).await.map_err(|e| Error::Internal(e.into()))?;
        Ok(Self { pool })
    }

    /// Creates or replaces the record for `content.url`.
    pub async fn save(&self, content: &UrlContent) -> Result<()> {
        sqlx::query(
            "INSERT INTO url_content (url, display_name, markdown_content, content_hash, etag, last_modified, last_indexed_unix_secs, backend_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(url) DO UPDATE SET
                display_name = excluded.display_name,
                markdown_content = excluded.markdown_content,
                content_hash = excluded.content_hash,
                etag = excluded.etag,
                last_modified = excluded.last_modified,
                last_indexed_unix_secs = excluded.last_indexed_unix_secs,
                backend_id = excluded.backend_id",
        )
        .bind(&content.url)
        .bind(&content.display_name)
        .bind(&content.markdown_content)
        .bind(&content.content_hash)
        .bind(&content.etag)
        .bind(&content.last_modified)
        .bind(content.last_indexed_unix_secs as i64)
        .bind(&content.backend_id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Internal(e.into()))?;
        Ok(())
    }

    pub async fn get(&self, url: &str) -> Result<Option<UrlContent>> {
        let row = sqlx::query("SELECT * FROM url_content WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Internal(e.into()))?;
        Ok(row.map(|row| row_to_content(&row)))
    }

    /// Substring search over `display_name` and `markdown_content`, most
    /// recently indexed first.
    pub async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<UrlContent>> {
        let pattern = format!("%{keyword}%");
        let rows = sqlx::query(
            "SELECT * FROM url_content WHERE display_name LIKE ? OR markdown_content LIKE ?
             ORDER BY last_indexed_unix_secs DESC LIMIT ?",
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Internal(e.into()))?;
        Ok(rows.iter().map(row_to_content).collect())
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<UrlContent>> {
        let rows = sqlx::query("SELECT * FROM url_content ORDER BY last_indexed_unix_secs DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Internal(e.into()))?;
        Ok(rows.iter().map(row_to_content).collect())
    }

    /// Returns `true` if a row was deleted.
    pub async fn delete(&self, url: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM url_content WHERE url = ?")
            .bind(url)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Internal(e.into()))?;
        Ok(result.rows_affected() > 0)
    }
}

/// The conditional-fetch decision the `/v1/saved_url` handler makes before
/// handing off to the (external) scraper: a fresh fetch is only needed when
/// neither cache validator matches what the server returned.
pub fn needs_refetch(existing: Option<&UrlContent>, fresh_etag: Option<&str>, fresh_last_modified: Option<&str>) -> bool {
    let Some(existing) = existing else {
        return true;
    };
    match (fresh_etag, existing.etag.as_deref()) {
        (Some(fresh), Some(cached)) => fresh != cached,
        _ => match (fresh_last_modified, existing.last_modified.as_deref()) {
            (Some(fresh), Some(cached)) => fresh != cached,
            _ => true,
        },
    }
}

fn row_to_content(row: &SqliteRow) -> UrlContent {
    UrlContent {
        url: row.get("url"),
        display_name: row.get("display_name"),
        markdown_content: row.get("markdown_content"),
        content_hash: row.get("content_hash"),
        etag: row.get("etag"),
        last_modified: row.get("last_modified"),
        last_indexed_unix_secs: row.get::<i64, _>("last_indexed_unix_secs") as u64,
        backend_id: row.get("backend_id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(url: &str) -> UrlContent {
        UrlContent {
            url: url.to_owned(),
            display_name: "Example".to_owned(),
            markdown_content: "# hello".to_owned(),
            content_hash: blake3::hash(b"# hello").to_hex().to_string(),
            etag: Some("v1".to_owned()),
            last_modified: None,
            last_indexed_unix_secs: 1,
            backend_id: "scraper".to_owned(),
        }
    }

    #[tokio::test]
    async fn saves_and_reads_back_a_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = UrlStore::connect(&dir.path().join("urls.db")).await.unwrap();

        store.save(&sample("https://example.com")).await.unwrap();
        let fetched = store.get("https://example.com").await.unwrap().unwrap();
        assert_eq!(fetched.display_name, "Example");
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_existed() {
        let dir = tempfile::tempdir().unwrap();
        let store = UrlStore::connect(&dir.path().join("urls.db")).await.unwrap();

        store.save(&sample("https://example.com")).await.unwrap();
        assert!(store.delete("https://example.com").await.unwrap());
        assert!(!store.delete("https://example.com").await.unwrap());
    }

    #[test]
    fn refetch_is_needed_when_nothing_is_cached_yet() {
        assert!(needs_refetch(None, Some("v1"), None));
    }

    #[test]
    fn refetch_is_skipped_when_the_etag_matches() {
        let cached = sample("https://example.com");
        assert!(!needs_refetch(Some(&cached), Some("v1"), None));
        assert!(needs_refetch(Some(&cached), Some("v2"), None));
    }
}
