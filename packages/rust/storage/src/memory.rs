use std::sync::Mutex;

use async_trait::async_trait;
use feedmill_shared::{ContentRecord, ContentType, FeedmillError, Result, UpsertStatus};

use crate::ContentStore;

/// In-process [`ContentStore`] with the same upsert and ordering rules as
/// [`crate::Storage`]. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ContentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `records`, inserted in order.
    pub fn with_records(records: impl IntoIterator<Item = ContentRecord>) -> Self {
        Self {
            records: Mutex::new(records.into_iter().collect()),
        }
    }

    /// Snapshot of every stored record in insertion order.
    pub fn records(&self) -> Vec<ContentRecord> {
        self.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<ContentRecord>>> {
        self.records
            .lock()
            .map_err(|_| FeedmillError::Storage("memory store lock poisoned".into()))
    }

    /// Newest first by `published_at`; later inserts win ties.
    fn newest<F>(&self, limit: usize, keep: F) -> Result<Vec<ContentRecord>>
    where
        F: Fn(&ContentRecord) -> bool,
    {
        let records = self.lock()?;
        let mut matched: Vec<(usize, &ContentRecord)> =
            records.iter().enumerate().filter(|(_, r)| keep(r)).collect();
        matched.sort_by(|(ia, a), (ib, b)| {
            b.published_at.cmp(&a.published_at).then(ib.cmp(ia))
        });
        Ok(matched
            .into_iter()
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn upsert_article(&self, record: &ContentRecord) -> Result<UpsertStatus> {
        let mut records = self.lock()?;
        let existing = records
            .iter_mut()
            .find(|r| r.content_type == record.content_type && r.slug == record.slug);

        match existing {
            Some(current) => {
                let id = current.id.clone();
                let fetched_at = current.fetched_at;
                *current = ContentRecord {
                    id,
                    fetched_at,
                    ..record.clone()
                };
                Ok(UpsertStatus::Updated)
            }
            None => {
                records.push(record.clone());
                Ok(UpsertStatus::Inserted)
            }
        }
    }

    async fn latest_by_type(
        &self,
        content_type: ContentType,
        limit: usize,
    ) -> Result<Vec<ContentRecord>> {
        self.newest(limit, |r| r.content_type == content_type)
    }

    async fn latest_articles(&self, limit: usize) -> Result<Vec<ContentRecord>> {
        self.newest(limit, |_| true)
    }

    async fn find_by_entity(&self, entity: &str, limit: usize) -> Result<Vec<ContentRecord>> {
        self.newest(limit, |r| {
            r.content_type == ContentType::CatalogItem
                && r.related_entities.iter().any(|e| e == entity)
        })
    }
}
