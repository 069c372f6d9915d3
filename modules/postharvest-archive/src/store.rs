// Upsert contract for acquired posts. Persistence failures never reach the
// caller of `process_url`; the gateway turns them into an outcome to log.

use std::sync::Arc;

use async_trait::async_trait;
use postharvest_common::PostRecord;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Uniqueness or conflict-spec error involving `original_url`.
    #[error("original_url conflict: {0}")]
    OriginalUrlConflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictTarget {
    PrimaryKey,
    OriginalUrl,
}

impl ConflictTarget {
    fn column(&self) -> &'static str {
        match self {
            ConflictTarget::PrimaryKey => "id",
            ConflictTarget::OriginalUrl => "original_url",
        }
    }
}

/// The underlying write. Implementations do no validation; the gateway does.
#[async_trait]
pub trait PostWriter: Send + Sync {
    async fn write(
        &self,
        record: &PostRecord,
        target: ConflictTarget,
    ) -> std::result::Result<Uuid, StoreError>;
}

pub struct PgPostWriter {
    pool: PgPool,
}

impl PgPostWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        let code = db.code();
        let on_url = db.constraint().is_some_and(|c| c.contains("original_url"))
            || db.message().contains("original_url");
        match code.as_deref() {
            // invalid_column_reference: no unique index matches ON CONFLICT
            Some("42P10") => return StoreError::OriginalUrlConflict(db.message().to_string()),
            // unique_violation
            Some("23505") if on_url => {
                return StoreError::OriginalUrlConflict(db.message().to_string())
            }
            _ => {}
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl PostWriter for PgPostWriter {
    async fn write(
        &self,
        record: &PostRecord,
        target: ConflictTarget,
    ) -> std::result::Result<Uuid, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO posts
                (id, user_id, platform, original_url, title, content,
                 posted_at, is_archived, full_json, content_hash)
            VALUES (COALESCE($1, gen_random_uuid()), $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT ({})
            DO UPDATE SET user_id = EXCLUDED.user_id,
                          platform = EXCLUDED.platform,
                          original_url = EXCLUDED.original_url,
                          title = EXCLUDED.title,
                          content = EXCLUDED.content,
                          posted_at = EXCLUDED.posted_at,
                          is_archived = EXCLUDED.is_archived,
                          full_json = EXCLUDED.full_json,
                          content_hash = EXCLUDED.content_hash,
                          updated_at = now()
            RETURNING id
            "#,
            target.column()
        );

        sqlx::query_scalar::<_, Uuid>(&sql)
            .bind(record.id)
            .bind(&record.user_id)
            .bind(record.platform.as_str())
            .bind(&record.original_url)
            .bind(&record.title)
            .bind(&record.content)
            .bind(record.posted_at)
            .bind(record.is_archived)
            .bind(&record.full_json)
            .bind(&record.content_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoStore,
    MissingUserId,
    MissingOriginalUrl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Stored(Uuid),
    Skipped(SkipReason),
    Failed(String),
}

/// Validates records and applies the conflict-key policy before writing.
#[derive(Clone, Default)]
pub struct PersistenceGateway {
    writer: Option<Arc<dyn PostWriter>>,
}

impl PersistenceGateway {
    pub fn new(writer: Arc<dyn PostWriter>) -> Self {
        Self {
            writer: Some(writer),
        }
    }

    /// A gateway that skips every write.
    pub fn disabled() -> Self {
        Self { writer: None }
    }

    /// Keyed on `id` when present, else `original_url`. An `original_url`
    /// conflict error is retried once against the primary key.
    pub async fn upsert(&self, record: &PostRecord) -> UpsertOutcome {
        let Some(writer) = &self.writer else {
            debug!("No post store configured, skipping upsert");
            return UpsertOutcome::Skipped(SkipReason::NoStore);
        };
        if record.user_id.is_none() {
            warn!(url = %record.original_url, "Skipping upsert: missing user_id");
            return UpsertOutcome::Skipped(SkipReason::MissingUserId);
        }
        if record.original_url.trim().is_empty() {
            warn!("Skipping upsert: missing original_url");
            return UpsertOutcome::Skipped(SkipReason::MissingOriginalUrl);
        }

        let target = if record.id.is_some() {
            ConflictTarget::PrimaryKey
        } else {
            ConflictTarget::OriginalUrl
        };

        let result = match writer.write(record, target).await {
            Err(StoreError::OriginalUrlConflict(msg)) if target == ConflictTarget::OriginalUrl => {
                warn!(url = %record.original_url, error = %msg, "original_url conflict, retrying on primary key");
                writer.write(record, ConflictTarget::PrimaryKey).await
            }
            other => other,
        };

        match result {
            Ok(id) => {
                info!(url = %record.original_url, %id, "Post upserted");
                UpsertOutcome::Stored(id)
            }
            Err(e) => UpsertOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryPostWriter;
    use postharvest_common::{NormalizedPost, Platform};

    fn record(user: Option<&str>) -> PostRecord {
        let mut post = NormalizedPost::new(Platform::Threads, "https://www.threads.net/@a/post/1");
        post.content = "hello".into();
        PostRecord::from_post(&post.finalize(), user, None)
    }

    #[tokio::test]
    async fn missing_user_id_never_writes() {
        let writer = Arc::new(MemoryPostWriter::new());
        let gateway = PersistenceGateway::new(writer.clone());

        let outcome = gateway.upsert(&record(None)).await;

        assert_eq!(outcome, UpsertOutcome::Skipped(SkipReason::MissingUserId));
        assert_eq!(writer.write_count(), 0);
    }

    #[tokio::test]
    async fn missing_original_url_never_writes() {
        let writer = Arc::new(MemoryPostWriter::new());
        let gateway = PersistenceGateway::new(writer.clone());
        let mut rec = record(Some("u1"));
        rec.original_url = " ".into();

        let outcome = gateway.upsert(&rec).await;

        assert_eq!(outcome, UpsertOutcome::Skipped(SkipReason::MissingOriginalUrl));
        assert_eq!(writer.write_count(), 0);
    }

    #[tokio::test]
    async fn conflict_key_follows_id_presence() {
        let writer = Arc::new(MemoryPostWriter::new());
        let gateway = PersistenceGateway::new(writer.clone());

        gateway.upsert(&record(Some("u1"))).await;
        let mut with_id = record(Some("u1"));
        with_id.id = Some(Uuid::new_v4());
        gateway.upsert(&with_id).await;

        assert_eq!(
            writer.targets(),
            [ConflictTarget::OriginalUrl, ConflictTarget::PrimaryKey]
        );
    }

    #[tokio::test]
    async fn original_url_conflict_retries_once() {
        let writer = Arc::new(MemoryPostWriter::new().with_original_url_conflict());
        let gateway = PersistenceGateway::new(writer.clone());

        let outcome = gateway.upsert(&record(Some("u1"))).await;

        assert!(matches!(outcome, UpsertOutcome::Stored(_)));
        assert_eq!(
            writer.targets(),
            [ConflictTarget::OriginalUrl, ConflictTarget::PrimaryKey]
        );
        assert_eq!(writer.stored().len(), 1);
    }

    #[tokio::test]
    async fn disabled_gateway_skips() {
        let outcome = PersistenceGateway::disabled().upsert(&record(Some("u1"))).await;
        assert_eq!(outcome, UpsertOutcome::Skipped(SkipReason::NoStore));
    }
}
