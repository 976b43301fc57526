#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! SQLite-backed relational store for image and object records.

use std::path::Path;

use async_trait::async_trait;
use recall_core::traits::RecordStore;
use recall_core::types::{BBox, ImageRecord, ObjectRecord};
use recall_core::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

pub struct SqliteRecordStore { pool: SqlitePool }

fn db_err(e: sqlx::Error) -> Error {
    match e.as_database_error() {
        Some(d) if d.is_foreign_key_violation() => Error::Validation(d.message().to_string()),
        _ => Error::store(e),
    }
}

fn json_err(e: serde_json::Error) -> Error { Error::Store(format!("record column is not valid JSON: {e}")) }

impl SqliteRecordStore {
    pub async fn open(filename: impl AsRef<Path>) -> Result<Self> {
        let filename = filename.as_ref();
        tracing::info!(path = %filename.display(), "opening record store");
        if let Some(parent) = filename.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .filename(filename)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await.map_err(db_err)?;
        sqlx::migrate!().run(&pool).await.map_err(Error::store)?;
        Ok(Self { pool })
    }

    pub async fn get_image(&self, id: &str) -> Result<Option<ImageRecord>> {
        let row = sqlx::query("SELECT id, url, description, metadata, metrics FROM image WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| image_from_row(&r)).transpose()
    }

    pub async fn objects_for_image(&self, image_id: &str) -> Result<Vec<ObjectRecord>> {
        let rows = sqlx::query("SELECT id, image_id, class_name, x1, y1, x2, y2 FROM object WHERE image_id = ? ORDER BY rowid")
            .bind(image_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(object_from_row).collect()
    }

    pub async fn count_images(&self) -> Result<i64> { self.count("SELECT COUNT(*) FROM image").await }

    pub async fn count_objects(&self) -> Result<i64> { self.count("SELECT COUNT(*) FROM object").await }

    async fn count(&self, sql: &str) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(sql).fetch_one(&self.pool).await.map_err(db_err)
    }
}

fn image_from_row(r: &SqliteRow) -> Result<ImageRecord> {
    let metadata: String = r.try_get("metadata").map_err(db_err)?;
    let metrics: String = r.try_get("metrics").map_err(db_err)?;
    Ok(ImageRecord {
        id: r.try_get("id").map_err(db_err)?,
        url: r.try_get("url").map_err(db_err)?,
        description: r.try_get("description").map_err(db_err)?,
        metadata: serde_json::from_str(&metadata).map_err(json_err)?,
        metrics: serde_json::from_str(&metrics).map_err(json_err)?,
    })
}

fn object_from_row(r: &SqliteRow) -> Result<ObjectRecord> {
    let coord = |c: &str| r.try_get::<f64, _>(c).map(|v| v as f32).map_err(db_err);
    Ok(ObjectRecord {
        id: r.try_get("id").map_err(db_err)?,
        image_id: r.try_get("image_id").map_err(db_err)?,
        class_name: r.try_get("class_name").map_err(db_err)?,
        bbox: BBox::new(coord("x1")?, coord("y1")?, coord("x2")?, coord("y2")?),
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert_image(&self, record: &ImageRecord) -> Result<()> {
        let metadata = serde_json::to_string(&record.metadata).map_err(json_err)?;
        let metrics = serde_json::to_string(&record.metrics).map_err(json_err)?;
        // a retried insert rewrites the same row
        sqlx::query(
            r#"
            INSERT INTO image (id, url, description, metadata, metrics)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                url = excluded.url,
                description = excluded.description,
                metadata = excluded.metadata,
                metrics = excluded.metrics
            "#,
        )
        .bind(&record.id)
        .bind(&record.url)
        .bind(&record.description)
        .bind(metadata)
        .bind(metrics)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn insert_objects(&self, batch: &[ObjectRecord]) -> Result<()> {
        if batch.is_empty() { return Ok(()); }
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for o in batch {
            sqlx::query(
                r#"
                INSERT INTO object (id, image_id, class_name, x1, y1, x2, y2)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    image_id = excluded.image_id,
                    class_name = excluded.class_name,
                    x1 = excluded.x1, y1 = excluded.y1, x2 = excluded.x2, y2 = excluded.y2
                "#,
            )
            .bind(&o.id)
            .bind(&o.image_id)
            .bind(&o.class_name)
            .bind(f64::from(o.bbox.x1))
            .bind(f64::from(o.bbox.y1))
            .bind(f64::from(o.bbox.x2))
            .bind(f64::from(o.bbox.y2))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        tracing::debug!(count = batch.len(), "committed object records");
        Ok(())
    }
}
