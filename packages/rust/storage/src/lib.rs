//! Persistence gateway for canonical content records.
//!
//! Pipelines only see the [`ContentStore`] trait. Two implementations ship:
//! - [`Storage`]: libSQL (embedded, offline) database with schema migrations
//! - [`MemoryStore`]: process-local store for dry runs and tests
//!
//! Upserts are idempotent by `(type, slug)`. The record `id` and `fetched_at`
//! of the first insert are preserved across later updates.

mod memory;
mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use feedmill_shared::{ContentRecord, ContentType, FeedmillError, Result, UpsertStatus};
use libsql::{Connection, Database, Row, params};

pub use memory::MemoryStore;

/// Query and upsert contract consumed by every branch pipeline.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert or update `record`, keyed by `(content_type, slug)`.
    async fn upsert_article(&self, record: &ContentRecord) -> Result<UpsertStatus>;

    /// Most recently published records of one type, newest first.
    async fn latest_by_type(
        &self,
        content_type: ContentType,
        limit: usize,
    ) -> Result<Vec<ContentRecord>>;

    /// Most recently published records of any type, newest first.
    async fn latest_articles(&self, limit: usize) -> Result<Vec<ContentRecord>>;

    /// Catalog items whose `related_entities` contain `entity`, newest first.
    async fn find_by_entity(&self, entity: &str, limit: usize) -> Result<Vec<ContentRecord>>;
}

const COLUMNS: &str = "id, type, slug, title, summary, body, images, source_url, affiliate_url, \
                       related_works, related_entities, published_at, fetched_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| FeedmillError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        FeedmillError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 before the first migration.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    async fn existing_id(&self, content_type: ContentType, slug: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM articles WHERE type = ?1 AND slug = ?2",
                params![content_type.as_str(), slug],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row.get::<String>(0).map_err(db_err)?)),
            None => Ok(None),
        }
    }

    async fn query_records(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<ContentRecord>> {
        let mut rows = self.conn.query(sql, params).await.map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_record(&row)?);
        }
        Ok(results)
    }
}

#[async_trait]
impl ContentStore for Storage {
    async fn upsert_article(&self, record: &ContentRecord) -> Result<UpsertStatus> {
        let existing = self.existing_id(record.content_type, &record.slug).await?;

        let images = to_json(&record.images)?;
        let related_works = to_json(&record.related_works)?;
        let related_entities = to_json(&record.related_entities)?;
        let now = timestamp(&Utc::now());

        self.conn
            .execute(
                "INSERT INTO articles (id, type, slug, title, summary, body, images, source_url,
                                       affiliate_url, related_works, related_entities,
                                       published_at, fetched_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(type, slug) DO UPDATE SET
                   title = excluded.title,
                   summary = excluded.summary,
                   body = excluded.body,
                   images = excluded.images,
                   source_url = excluded.source_url,
                   affiliate_url = excluded.affiliate_url,
                   related_works = excluded.related_works,
                   related_entities = excluded.related_entities,
                   published_at = excluded.published_at,
                   updated_at = excluded.updated_at",
                params![
                    record.id.to_string(),
                    record.content_type.as_str(),
                    record.slug.as_str(),
                    record.title.as_str(),
                    record.summary.as_str(),
                    record.body.as_str(),
                    images,
                    record.source_url.as_str(),
                    record.affiliate_url.as_deref(),
                    related_works,
                    related_entities,
                    timestamp(&record.published_at),
                    timestamp(&record.fetched_at),
                    now,
                ],
            )
            .await
            .map_err(db_err)?;

        Ok(if existing.is_some() {
            UpsertStatus::Updated
        } else {
            UpsertStatus::Inserted
        })
    }

    async fn latest_by_type(
        &self,
        content_type: ContentType,
        limit: usize,
    ) -> Result<Vec<ContentRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM articles WHERE type = ?1
             ORDER BY published_at DESC, rowid DESC LIMIT ?2"
        );
        self.query_records(&sql, params![content_type.as_str(), limit as i64])
            .await
    }

    async fn latest_articles(&self, limit: usize) -> Result<Vec<ContentRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM articles ORDER BY published_at DESC, rowid DESC LIMIT ?1"
        );
        self.query_records(&sql, params![limit as i64]).await
    }

    async fn find_by_entity(&self, entity: &str, limit: usize) -> Result<Vec<ContentRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM articles
             WHERE type = ?1
               AND EXISTS (SELECT 1 FROM json_each(articles.related_entities) AS e WHERE e.value = ?2)
             ORDER BY published_at DESC, rowid DESC LIMIT ?3"
        );
        self.query_records(
            &sql,
            params![ContentType::CatalogItem.as_str(), entity, limit as i64],
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn db_err(e: libsql::Error) -> FeedmillError {
    FeedmillError::Storage(e.to_string())
}

/// Fixed-width UTC timestamps so lexical order matches chronological order.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| FeedmillError::Storage(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| FeedmillError::Storage(format!("invalid JSON in column {column}: {e}")))
}

fn parse_time(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| FeedmillError::Storage(format!("invalid date in column {column}: {e}")))
}

fn row_to_record(row: &Row) -> Result<ContentRecord> {
    let text = |idx: i32| row.get::<String>(idx).map_err(db_err);

    Ok(ContentRecord {
        id: text(0)?
            .parse()
            .map_err(|e| FeedmillError::Storage(format!("invalid record id: {e}")))?,
        content_type: text(1)?.parse().map_err(FeedmillError::Storage)?,
        slug: text(2)?,
        title: text(3)?,
        summary: text(4)?,
        body: text(5)?,
        images: from_json("images", &text(6)?)?,
        source_url: text(7)?,
        affiliate_url: row.get::<String>(8).ok(),
        related_works: from_json("related_works", &text(9)?)?,
        related_entities: from_json("related_entities", &text(10)?)?,
        published_at: parse_time("published_at", &text(11)?)?,
        fetched_at: parse_time("fetched_at", &text(12)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use feedmill_shared::{ImageRef, RecordId};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("feedmill_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn record(content_type: ContentType, slug: &str, minutes: i64) -> ContentRecord {
        let base = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
        ContentRecord {
            id: RecordId::new(),
            content_type,
            slug: slug.into(),
            title: format!("Title {slug}"),
            summary: "summary".into(),
            body: "body".into(),
            images: vec![],
            source_url: format!("https://catalog.example.com/{slug}"),
            affiliate_url: None,
            related_works: vec![],
            related_entities: vec![],
            published_at: base + Duration::minutes(minutes),
            fetched_at: base,
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("feedmill_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn upsert_inserts_then_updates() {
        let storage = test_storage().await;

        let mut first = record(ContentType::CatalogItem, "abc-001-harbor-lights", 0);
        first.affiliate_url = Some("https://shop.example.com/abc-001".into());
        first.images = vec![ImageRef {
            url: "https://img.example.com/abc-001.jpg".into(),
            alt: "Harbor Lights".into(),
        }];
        let status = storage.upsert_article(&first).await.expect("insert");
        assert_eq!(status, UpsertStatus::Inserted);

        let mut second = first.clone();
        second.id = RecordId::new();
        second.title = "Harbor Lights (Remastered)".into();
        second.fetched_at = first.fetched_at + Duration::days(1);
        let status = storage.upsert_article(&second).await.expect("update");
        assert_eq!(status, UpsertStatus::Updated);

        let stored = storage
            .latest_by_type(ContentType::CatalogItem, 10)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, first.id);
        assert_eq!(stored[0].fetched_at, first.fetched_at);
        assert_eq!(stored[0].title, "Harbor Lights (Remastered)");
        assert_eq!(stored[0].images, first.images);
        assert_eq!(stored[0].affiliate_url, first.affiliate_url);
    }

    #[tokio::test]
    async fn slug_is_unique_per_type_only() {
        let storage = test_storage().await;
        storage
            .upsert_article(&record(ContentType::CatalogItem, "shared-slug", 0))
            .await
            .unwrap();
        let status = storage
            .upsert_article(&record(ContentType::TopicalArticle, "shared-slug", 0))
            .await
            .unwrap();
        assert_eq!(status, UpsertStatus::Inserted);
        assert_eq!(storage.latest_articles(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn latest_queries_are_newest_first_and_limited() {
        let storage = test_storage().await;
        for (slug, minutes) in [("a", 10), ("b", 30), ("c", 20)] {
            storage
                .upsert_article(&record(ContentType::CatalogItem, slug, minutes))
                .await
                .unwrap();
        }
        storage
            .upsert_article(&record(ContentType::TopicalArticle, "topic", 40))
            .await
            .unwrap();

        let catalog = storage
            .latest_by_type(ContentType::CatalogItem, 2)
            .await
            .unwrap();
        let slugs: Vec<_> = catalog.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, ["b", "c"]);

        let all = storage.latest_articles(10).await.unwrap();
        assert_eq!(all[0].slug, "topic");
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn find_by_entity_matches_catalog_items() {
        let storage = test_storage().await;

        let mut a = record(ContentType::CatalogItem, "a", 0);
        a.related_entities = vec!["mika-sato".into(), "ren-aoki".into()];
        let mut b = record(ContentType::CatalogItem, "b", 5);
        b.related_entities = vec!["mika-sato".into()];
        let mut c = record(ContentType::CatalogItem, "c", 10);
        c.related_entities = vec!["ren-aoki".into()];
        let mut topic = record(ContentType::TopicalArticle, "t", 15);
        topic.related_entities = vec!["mika-sato".into()];

        for r in [&a, &b, &c, &topic] {
            storage.upsert_article(r).await.unwrap();
        }

        let found = storage.find_by_entity("mika-sato", 4).await.unwrap();
        let slugs: Vec<_> = found.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, ["b", "a"]);

        let limited = storage.find_by_entity("mika-sato", 1).await.unwrap();
        assert_eq!(limited.len(), 1);

        assert!(storage.find_by_entity("nobody", 4).await.unwrap().is_empty());
    }
}
