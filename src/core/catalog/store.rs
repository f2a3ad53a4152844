//! SQLite-backed catalog of accepted mod artifacts.
//!
//! One row per `(tag, logical_id, variant)`. The store owns the
//! [`ViewCache`] and invalidates it after every committed write.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::cache::ViewCache;
use super::model::{
    AllVersions, Canary, LatestVersions, ModVariantRecord, PublishedMod, TagLatest, TagVersions,
    VariantKind,
};
use crate::core::error::CatalogResult;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS mods (
    tag                 TEXT NOT NULL,
    logical_id          TEXT NOT NULL,
    variant             TEXT NOT NULL,
    version             TEXT,
    content_hash        TEXT NOT NULL,
    filename            TEXT NOT NULL,
    storage_url         TEXT NOT NULL,
    inserted_at         TEXT NOT NULL,
    canary_published_at TEXT,
    canary_percent      REAL,
    PRIMARY KEY (tag, logical_id, variant)
)";

const SELECT_COLUMNS: &str = "SELECT tag, logical_id, variant, version, content_hash, filename, \
     storage_url, inserted_at, canary_published_at, canary_percent FROM mods";

type RecordRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<f64>,
);

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(raw = %raw, error = %e, "failed to parse stored timestamp; using now");
            Utc::now()
        })
}

fn record_from_row(row: RecordRow) -> Option<ModVariantRecord> {
    let (
        tag,
        logical_id,
        variant,
        version,
        content_hash,
        filename,
        storage_url,
        inserted_at,
        canary_published_at,
        canary_percent,
    ) = row;

    let variant = match VariantKind::from_str(&variant) {
        Ok(kind) => kind,
        Err(e) => {
            warn!(tag = %tag, error = %e, "skipping row with unknown variant");
            return None;
        }
    };

    let canary = match (canary_published_at, canary_percent) {
        (Some(published_at), Some(percent)) if percent > 0.0 => Some(Canary {
            published_at: parse_timestamp(&published_at),
            percent,
        }),
        _ => None,
    };

    Some(ModVariantRecord {
        tag,
        logical_id,
        variant,
        version,
        content_hash,
        filename,
        storage_url,
        inserted_at: parse_timestamp(&inserted_at),
        canary,
    })
}

pub struct CatalogStore {
    pool: SqlitePool,
    cache: ViewCache,
    public_base_url: String,
}

impl CatalogStore {
    /// Open (or create) the SQLite database at `url` and apply the schema.
    ///
    /// `url` is a sqlx SQLite URL, e.g. `"sqlite://store/mods.sqlite"` or
    /// `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str, public_base_url: &str) -> CatalogResult<Self> {
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Single connection: one writer at a time, and in-memory databases
        // live exactly as long as this connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;

        Ok(Self {
            pool,
            cache: ViewCache::new(),
            public_base_url: public_base_url.to_string(),
        })
    }

    pub async fn find(
        &self,
        tag: &str,
        logical_id: &str,
        variant: VariantKind,
    ) -> CatalogResult<Option<ModVariantRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE tag = ?1 AND logical_id = ?2 AND variant = ?3"
        ))
        .bind(tag)
        .bind(logical_id)
        .bind(variant.extension())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(record_from_row))
    }

    /// Insert or replace the row for the record's key, replacing every field.
    ///
    /// The replaced row moves to the end of insertion order.
    pub async fn upsert(&self, record: &ModVariantRecord) -> CatalogResult<()> {
        let (canary_published_at, canary_percent) = match &record.canary {
            Some(c) => (Some(c.published_at.to_rfc3339()), Some(c.percent)),
            None => (None, None),
        };

        sqlx::query(
            "INSERT OR REPLACE INTO mods (tag, logical_id, variant, version, content_hash, \
             filename, storage_url, inserted_at, canary_published_at, canary_percent) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&record.tag)
        .bind(&record.logical_id)
        .bind(record.variant.extension())
        .bind(&record.version)
        .bind(&record.content_hash)
        .bind(&record.filename)
        .bind(&record.storage_url)
        .bind(record.inserted_at.to_rfc3339())
        .bind(canary_published_at)
        .bind(canary_percent)
        .execute(&self.pool)
        .await?;

        self.cache.invalidate().await;
        Ok(())
    }

    /// Change only the canary fields of an existing row.
    pub async fn update_canary(
        &self,
        tag: &str,
        logical_id: &str,
        variant: VariantKind,
        canary: Option<Canary>,
    ) -> CatalogResult<()> {
        let (published_at, percent) = match canary {
            Some(c) => (Some(c.published_at.to_rfc3339()), Some(c.percent)),
            None => (None, None),
        };

        sqlx::query(
            "UPDATE mods SET canary_published_at = ?1, canary_percent = ?2 \
             WHERE tag = ?3 AND logical_id = ?4 AND variant = ?5",
        )
        .bind(published_at)
        .bind(percent)
        .bind(tag)
        .bind(logical_id)
        .bind(variant.extension())
        .execute(&self.pool)
        .await?;

        self.cache.invalidate().await;
        Ok(())
    }

    /// Every record, in insertion order.
    pub async fn list_records(&self) -> CatalogResult<Vec<ModVariantRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY rowid"))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().filter_map(record_from_row).collect())
    }

    pub async fn stored_tags(&self) -> CatalogResult<BTreeSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT tag FROM mods")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(tag,)| tag).collect())
    }

    /// Remove every record of `tag`. Returns the number of rows deleted.
    pub async fn delete_tag(&self, tag: &str) -> CatalogResult<u64> {
        let result = sqlx::query("DELETE FROM mods WHERE tag = ?1")
            .bind(tag)
            .execute(&self.pool)
            .await?;

        self.cache.invalidate().await;
        info!("Deleted {} catalog records for tag {}", result.rows_affected(), tag);
        Ok(result.rows_affected())
    }

    async fn build_all_versions(&self) -> CatalogResult<AllVersions> {
        let mut all = AllVersions::new();
        for record in self.list_records().await? {
            all.entry(record.tag.clone())
                .or_default()
                .push(record.variant, PublishedMod::from_record(&record, &self.public_base_url));
        }
        Ok(all)
    }

    /// Every stored record grouped by tag and variant kind.
    pub async fn all_versions(&self) -> CatalogResult<Arc<AllVersions>> {
        self.cache.all_versions(move || self.build_all_versions()).await
    }

    /// Most recent record per tag and variant kind.
    pub async fn latest_versions(&self) -> CatalogResult<Arc<LatestVersions>> {
        self.cache.latest_versions(move || self.build_all_versions()).await
    }

    pub async fn all_versions_for(&self, tag: &str) -> CatalogResult<Option<TagVersions>> {
        Ok(self.all_versions().await?.get(tag).cloned())
    }

    pub async fn latest_versions_for(&self, tag: &str) -> CatalogResult<Option<TagLatest>> {
        Ok(self.latest_versions().await?.get(tag).cloned())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) async fn memory_store() -> CatalogStore {
        CatalogStore::connect("sqlite::memory:", "").await.unwrap()
    }

    pub(crate) fn record(tag: &str, id: &str, variant: VariantKind, hash: &str) -> ModVariantRecord {
        ModVariantRecord {
            tag: tag.into(),
            logical_id: id.into(),
            variant,
            version: Some("1.0".into()),
            content_hash: hash.into(),
            filename: format!("{id}_1.0.{variant}"),
            storage_url: format!("mods/{tag}/{hash}/{id}_1.0.{variant}"),
            inserted_at: Utc::now(),
            canary: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_row_for_same_key() {
        let store = memory_store().await;
        store.upsert(&record("t", "id", VariantKind::Wotmod, "h1")).await.unwrap();
        store.upsert(&record("t", "id", VariantKind::Wotmod, "h2")).await.unwrap();

        let rows = store.list_records().await.unwrap();
        assert_eq!(rows.len(), 1, "no history beyond the current row");
        assert_eq!(rows[0].content_hash, "h2");
    }

    #[tokio::test]
    async fn canary_round_trips_and_clears() {
        let store = memory_store().await;
        store.upsert(&record("t", "id", VariantKind::Mtmod, "h")).await.unwrap();

        let published_at = Utc::now() - Duration::hours(3);
        let canary = Canary {
            published_at,
            percent: 12.5,
        };
        store
            .update_canary("t", "id", VariantKind::Mtmod, Some(canary))
            .await
            .unwrap();
        let found = store.find("t", "id", VariantKind::Mtmod).await.unwrap().unwrap();
        let stored = found.canary.unwrap();
        assert_eq!(stored.percent, 12.5);
        assert_eq!(stored.published_at.timestamp(), published_at.timestamp());

        store.update_canary("t", "id", VariantKind::Mtmod, None).await.unwrap();
        let found = store.find("t", "id", VariantKind::Mtmod).await.unwrap().unwrap();
        assert_eq!(found.canary, None);
    }

    #[tokio::test]
    async fn views_group_by_tag_and_kind() {
        let store = memory_store().await;
        store.upsert(&record("a", "a.one", VariantKind::Mtmod, "h1")).await.unwrap();
        store.upsert(&record("a", "a.two", VariantKind::Mtmod, "h2")).await.unwrap();
        store.upsert(&record("a", "a.one", VariantKind::Wotmod, "h1")).await.unwrap();
        store.upsert(&record("b", "b", VariantKind::Wotmod, "h3")).await.unwrap();

        let all = store.all_versions().await.unwrap();
        assert_eq!(all["a"].mtmod.len(), 2);
        assert_eq!(all["a"].wotmod.len(), 1);
        assert!(all["b"].mtmod.is_empty());

        let latest = store.latest_versions().await.unwrap();
        assert_eq!(latest["a"].mtmod.as_ref().unwrap().id, "a.two");
        assert_eq!(latest["b"].mtmod, None);
        assert_eq!(latest["b"].wotmod.as_ref().unwrap().content_hash, "h3");

        assert!(store.latest_versions_for("missing").await.unwrap().is_none());
        assert!(store.all_versions_for("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn reads_are_stable_until_a_write() {
        let store = memory_store().await;
        store.upsert(&record("a", "a", VariantKind::Mtmod, "h1")).await.unwrap();

        let first = store.latest_versions().await.unwrap();
        let again = store.latest_versions().await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        store.upsert(&record("a", "a", VariantKind::Mtmod, "h2")).await.unwrap();
        let after = store.latest_versions().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &after));
        assert_eq!(after["a"].mtmod.as_ref().unwrap().content_hash, "h2");
    }

    #[tokio::test]
    async fn delete_tag_removes_only_that_tag() {
        let store = memory_store().await;
        store.upsert(&record("keep", "k", VariantKind::Mtmod, "h1")).await.unwrap();
        store.upsert(&record("drop", "d", VariantKind::Mtmod, "h2")).await.unwrap();
        store.upsert(&record("drop", "d", VariantKind::Wotmod, "h2")).await.unwrap();

        assert_eq!(store.delete_tag("drop").await.unwrap(), 2);
        let tags = store.stored_tags().await.unwrap();
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["keep".to_string()]);
        assert!(store.latest_versions_for("drop").await.unwrap().is_none());
    }
}
