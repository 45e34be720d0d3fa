// src/storage/mod.rs

//! SQLite persistence for imported fiscal notes.
//!
//! Monetary and quantity columns are TEXT: decimals round-trip through
//! `BigDecimal` string form, so the value read back is exactly the value
//! extracted. Uniqueness of non-empty access keys is enforced by a partial
//! unique index at the storage level, not by a lookup, so concurrent imports
//! of the same document cannot both win.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};

use crate::error::{AppError, Result};
use crate::models::{ParsedDocument, SourceKind, StoredFiscalItem, StoredFiscalNote};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS fiscal_notes (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    access_key   TEXT NOT NULL,
    issuer_name  TEXT NOT NULL,
    emitted_at   TEXT NOT NULL,
    total_amount TEXT NOT NULL,
    source_kind  TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS ux_fiscal_notes_access_key
    ON fiscal_notes(access_key) WHERE access_key <> '';

CREATE TABLE IF NOT EXISTS fiscal_items (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    note_id      INTEGER NOT NULL REFERENCES fiscal_notes(id) ON DELETE CASCADE,
    product_name TEXT NOT NULL,
    quantity     TEXT NOT NULL,
    unit_price   TEXT NOT NULL,
    total_price  TEXT NOT NULL,
    unit         TEXT
)
"#;

const EMITTED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The persistence gate every import flows through.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        for statement in SCHEMA.split(';') {
            let statement = statement.trim();
            if !statement.is_empty() {
                sqlx::query(statement).execute(&pool).await?;
            }
        }
        Ok(Self { pool })
    }

    /// Insert a parsed document and its items in one transaction.
    ///
    /// A non-empty access key that is already stored yields
    /// `DuplicateDocument` and leaves the database untouched; notes without a
    /// key always insert.
    pub async fn persist(&self, document: &ParsedDocument) -> Result<StoredFiscalNote> {
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO fiscal_notes \
             (access_key, issuer_name, emitted_at, total_amount, source_kind, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&document.access_key)
        .bind(&document.issuer_name)
        .bind(document.emitted_at.format(EMITTED_AT_FORMAT).to_string())
        .bind(document.total_amount.to_string())
        .bind(document.source.as_str())
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        let note_id = match inserted {
            Ok(done) => done.last_insert_rowid(),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(AppError::duplicate(&document.access_key));
            }
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::with_capacity(document.items.len());
        for item in &document.items {
            let done = sqlx::query(
                "INSERT INTO fiscal_items \
                 (note_id, product_name, quantity, unit_price, total_price, unit) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(note_id)
            .bind(&item.product_name)
            .bind(item.quantity.to_string())
            .bind(item.unit_price.to_string())
            .bind(item.total_price.to_string())
            .bind(item.unit.as_deref())
            .execute(&mut *tx)
            .await?;
            items.push(StoredFiscalItem {
                id: done.last_insert_rowid(),
                note_id,
                product_name: item.product_name.clone(),
                quantity: item.quantity.clone(),
                unit_price: item.unit_price.clone(),
                total_price: item.total_price.clone(),
                unit: item.unit.clone(),
            });
        }

        tx.commit().await?;
        log::info!(
            "stored note {note_id} (key '{}', {} items)",
            document.access_key,
            items.len()
        );

        Ok(StoredFiscalNote {
            id: note_id,
            access_key: document.access_key.clone(),
            issuer_name: document.issuer_name.clone(),
            emitted_at: document.emitted_at,
            total_amount: document.total_amount.clone(),
            source: document.source,
            created_at,
            items,
        })
    }

    /// Fetch one note with its items.
    pub async fn get_note(&self, id: i64) -> Result<Option<StoredFiscalNote>> {
        let row = sqlx::query("SELECT * FROM fiscal_notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_note(&row).await?)),
            None => Ok(None),
        }
    }

    /// Fetch one note by its canonical access key.
    pub async fn find_by_access_key(&self, access_key: &str) -> Result<Option<StoredFiscalNote>> {
        let row = sqlx::query("SELECT * FROM fiscal_notes WHERE access_key = ? AND access_key <> ''")
            .bind(access_key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_note(&row).await?)),
            None => Ok(None),
        }
    }

    async fn hydrate_note(&self, row: &SqliteRow) -> Result<StoredFiscalNote> {
        let id: i64 = row.try_get("id")?;
        let items = self.items_of(id).await?;
        Ok(StoredFiscalNote {
            id,
            access_key: row.try_get("access_key")?,
            issuer_name: row.try_get("issuer_name")?,
            emitted_at: decode_datetime(row.try_get("emitted_at")?, "emitted_at")?,
            total_amount: decode_decimal(row.try_get("total_amount")?, "total_amount")?,
            source: decode_source(row.try_get("source_kind")?)?,
            created_at: decode_timestamp(row.try_get("created_at")?, "created_at")?,
            items,
        })
    }

    async fn items_of(&self, note_id: i64) -> Result<Vec<StoredFiscalItem>> {
        let rows = sqlx::query("SELECT * FROM fiscal_items WHERE note_id = ? ORDER BY id")
            .bind(note_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(StoredFiscalItem {
                    id: row.try_get("id")?,
                    note_id: row.try_get("note_id")?,
                    product_name: row.try_get("product_name")?,
                    quantity: decode_decimal(row.try_get("quantity")?, "quantity")?,
                    unit_price: decode_decimal(row.try_get("unit_price")?, "unit_price")?,
                    total_price: decode_decimal(row.try_get("total_price")?, "total_price")?,
                    unit: row.try_get("unit")?,
                })
            })
            .collect()
    }
}

fn decode_decimal(text: String, column: &str) -> Result<BigDecimal> {
    BigDecimal::from_str(&text).map_err(|e| decode_error(column, e))
}

fn decode_datetime(text: String, column: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&text, EMITTED_AT_FORMAT).map_err(|e| decode_error(column, e))
}

fn decode_timestamp(text: String, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_error(column, e))
}

fn decode_source(text: String) -> Result<SourceKind> {
    SourceKind::parse(&text).ok_or_else(|| {
        AppError::Database(sqlx::Error::ColumnDecode {
            index: "source_kind".into(),
            source: format!("unknown source kind '{text}'").into(),
        })
    })
}

fn decode_error(
    column: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> AppError {
    AppError::Database(sqlx::Error::ColumnDecode {
        index: column.into(),
        source: Box::new(source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParsedItem;
    use std::sync::Arc;

    async fn temp_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let store = SqliteStore::connect(&url).await.unwrap();
        (store, dir)
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn sample_document(access_key: &str) -> ParsedDocument {
        ParsedDocument {
            access_key: access_key.to_string(),
            issuer_name: "MERCADO MODELO LTDA".to_string(),
            emitted_at: NaiveDateTime::parse_from_str("2026-02-11T07:35:22", EMITTED_AT_FORMAT)
                .unwrap(),
            total_amount: dec("24.99"),
            source: SourceKind::Xml,
            items: vec![
                ParsedItem {
                    product_name: "ARROZ TIPO 1".to_string(),
                    quantity: dec("2"),
                    unit_price: dec("10.00"),
                    total_price: dec("19.99"),
                    unit: Some("UN".to_string()),
                },
                ParsedItem {
                    product_name: "TOMATE ITALIANO".to_string(),
                    quantity: dec("1.5"),
                    unit_price: dec("3.33"),
                    total_price: dec("5.00"),
                    unit: None,
                },
            ],
        }
    }

    const KEY: &str = "33260210697697000660651070003680661266494182";

    #[tokio::test]
    async fn round_trip_preserves_values_exactly() {
        let (store, _dir) = temp_store().await;
        let stored = store.persist(&sample_document(KEY)).await.unwrap();

        let loaded = store.get_note(stored.id).await.unwrap().unwrap();
        assert_eq!(loaded, stored);
        // Decimal text survives bit for bit, trailing zeros included.
        assert_eq!(loaded.items[0].unit_price.to_string(), "10.00");
        assert_eq!(loaded.items[0].total_price.to_string(), "19.99");
        assert_eq!(loaded.items[1].quantity.to_string(), "1.5");
        assert_eq!(loaded.emitted_at.to_string(), "2026-02-11 07:35:22");
    }

    #[tokio::test]
    async fn duplicate_access_key_is_rejected() {
        let (store, _dir) = temp_store().await;
        store.persist(&sample_document(KEY)).await.unwrap();

        let err = store.persist(&sample_document(KEY)).await.unwrap_err();
        assert!(err.is_duplicate());

        // The rejected import must not leave orphan item rows behind.
        let note = store.find_by_access_key(KEY).await.unwrap().unwrap();
        assert_eq!(note.items.len(), 2);
    }

    #[tokio::test]
    async fn keyless_notes_are_always_inserted() {
        let (store, _dir) = temp_store().await;
        let first = store.persist(&sample_document("")).await.unwrap();
        let second = store.persist(&sample_document("")).await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(store.find_by_access_key("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_imports_of_same_key_race_to_one_winner() {
        let (store, _dir) = temp_store().await;
        let store = Arc::new(store);
        let document = sample_document(KEY);

        let a = {
            let store = store.clone();
            let document = document.clone();
            tokio::spawn(async move { store.persist(&document).await })
        };
        let b = {
            let store = store.clone();
            let document = document.clone();
            tokio::spawn(async move { store.persist(&document).await })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        let loser = if a.is_ok() { b } else { a };
        assert!(loser.unwrap_err().is_duplicate());
    }

    #[tokio::test]
    async fn missing_note_is_none() {
        let (store, _dir) = temp_store().await;
        assert!(store.get_note(999).await.unwrap().is_none());
        assert!(store.find_by_access_key(KEY).await.unwrap().is_none());
    }
}
