//! Record Store Module
//!
//! SQLite-backed CRUD over inventory records. Every mutation runs in its own
//! transaction and `records-changed` is only broadcast after commit.

use std::time::Duration;

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{InventoryError, Result};
use crate::events::Notifier;
use crate::inventory::{matches_filter, Record, RecordFields, SCHEMA_VERSION};

const CREATE_ITEMS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        price REAL NOT NULL,
        image TEXT
    )
"#;

// == Record Store ==
/// Handle to the record store. Cheap to clone; clones share one connection.
#[derive(Debug, Clone)]
pub struct RecordStore {
    pool: SqlitePool,
    notifier: Notifier,
}

impl RecordStore {
    // == Open ==
    /// Opens (creating if needed) the store at `url` and applies the schema.
    ///
    /// A single connection is kept so there is exactly one writer and
    /// transactions are serialized.
    pub async fn open(url: &str, notifier: Notifier) -> Result<Self> {
        let in_memory = url.contains(":memory:");

        if !in_memory && !Sqlite::database_exists(url).await? {
            info!("Creating record store at {}", url);
            Sqlite::create_database(url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            // An in-memory database lives only as long as its connection
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect(url)
            .await?;

        let store = Self { pool, notifier };
        store.migrate().await?;
        Ok(store)
    }

    /// Opens a private in-memory store.
    pub async fn in_memory(notifier: Notifier) -> Result<Self> {
        Self::open("sqlite::memory:", notifier).await
    }

    async fn migrate(&self) -> Result<()> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;

        if version >= SCHEMA_VERSION {
            debug!("Record store schema at version {}", version);
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query(CREATE_ITEMS_TABLE).execute(&mut *tx).await?;
        sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            "Upgraded record store schema from version {} to {}",
            version, SCHEMA_VERSION
        );
        Ok(())
    }

    /// Notification channel this store reports commits on.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    // == Create ==
    /// Inserts a new record and returns its assigned id.
    pub async fn create(&self, fields: RecordFields) -> Result<i64> {
        fields.validate()?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("INSERT INTO items (name, price, image) VALUES (?, ?, ?)")
            .bind(&fields.name)
            .bind(fields.price)
            .bind(fields.image.as_deref())
            .execute(&mut *tx)
            .await?;
        let id = result.last_insert_rowid();
        tx.commit().await?;

        debug!("Created record {} ({})", id, fields.name);
        self.notifier.records_changed();
        Ok(id)
    }

    // == Update ==
    /// Replaces name and price of record `id`, and its image when one is
    /// supplied.
    ///
    /// The existing record is read inside the same transaction as the
    /// write. Fails with `NotFound` when `id` does not exist.
    pub async fn update(&self, id: i64, fields: RecordFields) -> Result<Record> {
        fields.validate()?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id, name, price, image FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let mut record = match existing {
            Some(row) => record_from_row(&row)?,
            None => {
                tx.rollback().await?;
                return Err(InventoryError::NotFound(id));
            }
        };

        record.name = fields.name;
        record.price = fields.price;
        if let Some(image) = fields.image {
            record.image = Some(image);
        }

        sqlx::query("UPDATE items SET name = ?, price = ?, image = ? WHERE id = ?")
            .bind(&record.name)
            .bind(record.price)
            .bind(record.image.as_deref())
            .bind(record.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("Updated record {}", id);
        self.notifier.records_changed();
        Ok(record)
    }

    // == Delete ==
    /// Removes record `id`. Deleting a missing id is a no-op.
    ///
    /// Returns whether a record was actually removed.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let removed = result.rows_affected() > 0;
        debug!("Delete record {}: removed={}", id, removed);
        self.notifier.records_changed();
        Ok(removed)
    }

    // == Get ==
    pub async fn get(&self, id: i64) -> Result<Option<Record>> {
        let row = sqlx::query("SELECT id, name, price, image FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    // == List ==
    /// Returns records whose name contains `filter` in any case, in
    /// insertion order. An empty filter returns everything.
    pub async fn list(&self, filter: &str) -> Result<Vec<Record>> {
        let rows = sqlx::query("SELECT id, name, price, image FROM items ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = record_from_row(row)?;
            if matches_filter(&record.name, filter) {
                records.push(record);
            }
        }
        Ok(records)
    }

    // == Count ==
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn record_from_row(row: &SqliteRow) -> Result<Record> {
    Ok(Record {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        price: row.try_get("price")?,
        image: row.try_get("image")?,
    })
}

// == Store Connector ==
/// Connect-once accessor for the process-wide store.
///
/// The first call to [`StoreConnector::handle`] opens the store; every
/// other caller awaits that same initialization and receives a clone of the
/// ready handle.
#[derive(Debug)]
pub struct StoreConnector {
    url: String,
    notifier: Notifier,
    store: OnceCell<RecordStore>,
}

impl StoreConnector {
    pub fn new(url: impl Into<String>, notifier: Notifier) -> Self {
        Self {
            url: url.into(),
            notifier,
            store: OnceCell::new(),
        }
    }

    pub async fn handle(&self) -> Result<RecordStore> {
        self.store
            .get_or_try_init(|| RecordStore::open(&self.url, self.notifier.clone()))
            .await
            .cloned()
    }

    /// True once the store has been opened.
    pub fn is_ready(&self) -> bool {
        self.store.initialized()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Notification;

    async fn test_store() -> RecordStore {
        RecordStore::in_memory(Notifier::new()).await.unwrap()
    }

    fn widget() -> RecordFields {
        RecordFields::new("Widget", 9.99, None)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = test_store().await;

        let fields = RecordFields::new("Lamp", 20.0, Some("data:image/jpeg;base64,AAAA".into()));
        let id = store.create(fields.clone()).await.unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(RecordFields::from(record), fields);
    }

    #[tokio::test]
    async fn test_ids_increase() {
        let store = test_store().await;

        let first = store.create(widget()).await.unwrap();
        let second = store.create(widget()).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let store = test_store().await;

        let first = store.create(widget()).await.unwrap();
        store.delete(first).await.unwrap();
        let second = store.create(widget()).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = test_store().await;
        assert!(store.get(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_image_when_omitted() {
        let store = test_store().await;
        let image = Some("data:image/jpeg;base64,AAAA".to_string());
        let id = store
            .create(RecordFields::new("Lamp", 20.0, image.clone()))
            .await
            .unwrap();

        let updated = store
            .update(id, RecordFields::new("Desk lamp", 25.0, None))
            .await
            .unwrap();

        assert_eq!(updated.id, id);
        assert_eq!(updated.name, "Desk lamp");
        assert_eq!(updated.image, image);
        assert_eq!(store.get(id).await.unwrap().unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_replaces_image_when_supplied() {
        let store = test_store().await;
        let id = store
            .create(RecordFields::new("Lamp", 20.0, Some("data:old".into())))
            .await
            .unwrap();

        store
            .update(id, RecordFields::new("Lamp", 20.0, Some("data:new".into())))
            .await
            .unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.image.as_deref(), Some("data:new"));
    }

    #[tokio::test]
    async fn test_update_missing_id() {
        let store = test_store().await;
        store.create(widget()).await.unwrap();
        let before = store.list("").await.unwrap();

        let result = store.update(12345, widget()).await;

        assert!(matches!(result, Err(InventoryError::NotFound(12345))));
        assert_eq!(store.list("").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_rejects_negative_price() {
        let store = test_store().await;
        let id = store.create(widget()).await.unwrap();

        let result = store.update(id, RecordFields::new("Widget", -3.0, None)).await;
        assert!(matches!(result, Err(InventoryError::InvalidRequest(_))));
        assert_eq!(store.get(id).await.unwrap().unwrap().price, 9.99);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = test_store().await;
        let id = store.create(widget()).await.unwrap();
        store.create(RecordFields::new("Gadget", 1.0, None)).await.unwrap();

        assert!(store.delete(id).await.unwrap());
        let after_first = store.list("").await.unwrap();

        assert!(!store.delete(id).await.unwrap());
        assert_eq!(store.list("").await.unwrap(), after_first);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_filter_case_insensitive() {
        let store = test_store().await;
        store.create(RecordFields::new("abc box", 1.0, None)).await.unwrap();
        store.create(RecordFields::new("xABCx", 2.0, None)).await.unwrap();
        store.create(RecordFields::new("other", 3.0, None)).await.unwrap();

        let names: Vec<String> = store
            .list("ABC")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();

        assert_eq!(names, vec!["abc box", "xABCx"]);
    }

    #[tokio::test]
    async fn test_list_insertion_order() {
        let store = test_store().await;
        for name in ["zeta", "alpha", "mid"] {
            store.create(RecordFields::new(name, 1.0, None)).await.unwrap();
        }

        let names: Vec<String> = store
            .list("")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn test_widget_scenario() {
        let store = test_store().await;

        let id = store.create(widget()).await.unwrap();
        let records = store.list("").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Widget");
        assert_eq!(records[0].price, 9.99);

        store
            .update(id, RecordFields::new("Widget", 12.50, None))
            .await
            .unwrap();
        let records = store.list("").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Widget");
        assert_eq!(records[0].price, 12.50);
    }

    #[tokio::test]
    async fn test_commit_emits_records_changed() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let store = RecordStore::in_memory(notifier).await.unwrap();

        let id = store.create(widget()).await.unwrap();
        store.delete(id).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), Notification::RecordsChanged);
        assert_eq!(rx.recv().await.unwrap(), Notification::RecordsChanged);
    }

    #[tokio::test]
    async fn test_failed_update_emits_nothing() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let store = RecordStore::in_memory(notifier).await.unwrap();

        assert!(store.update(1, widget()).await.is_err());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connector_opens_once() {
        let connector = StoreConnector::new("sqlite::memory:", Notifier::new());
        assert!(!connector.is_ready());

        let (a, b) = tokio::join!(connector.handle(), connector.handle());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(connector.is_ready());

        // Both handles see the same database
        let id = a.create(widget()).await.unwrap();
        assert!(b.get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("inventoryDB.sqlite").display());

        let id = {
            let store = RecordStore::open(&url, Notifier::new()).await.unwrap();
            store.create(widget()).await.unwrap()
        };

        let reopened = RecordStore::open(&url, Notifier::new()).await.unwrap();
        let record = reopened.get(id).await.unwrap().unwrap();
        assert_eq!(record.name, "Widget");
    }
}
