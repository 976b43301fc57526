use anyhow::{anyhow, bail, Result};
use arrow_array::types::Float32Type;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use std::fmt;
use std::sync::Arc;

use recall_core::traits::VectorStore;
use recall_core::types::{PointPayload, VectorPoint};

use crate::schema::{build_collections_schema, build_point_schema, vector_dim};
use crate::table::{ensure_table, open_db, table_exists};

const COLLECTIONS_TABLE: &str = "recall_collections";

/// One search hit; `distance` is cosine distance (0 = same direction).
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor { pub id: String, pub payload: PointPayload, pub distance: f32 }

/// Vector store backed by a LanceDB directory; one table per collection.
pub struct LanceVectorStore { db: Connection }

/// How a collection compares its vectors. Every collection uses cosine
/// distance, so only the width varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionMetric { pub dim: usize }

impl CollectionMetric {
    pub const DISTANCE: &'static str = "cosine";
}

impl fmt::Display for CollectionMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}:{}", Self::DISTANCE, self.dim) }
}

impl LanceVectorStore {
    pub async fn open(uri: &str) -> Result<Self> {
        tracing::info!(uri, "opening vector store");
        Ok(Self { db: open_db(uri).await? })
    }

    async fn create_collection(&self, name: &str, dim: usize) -> Result<()> {
        let dim_i32 = i32::try_from(dim).map_err(|_| anyhow!("dimension {dim} too large"))?;
        if ensure_table(&self.db, name, build_point_schema(dim_i32)).await? {
            tracing::info!(collection = name, dim, "created collection");
        }
        self.record_metric(name, CollectionMetric { dim }).await
    }

    async fn record_metric(&self, collection: &str, metric: CollectionMetric) -> Result<()> {
        let schema = build_collections_schema();
        ensure_table(&self.db, COLLECTIONS_TABLE, schema.clone()).await?;
        let rb = RecordBatch::try_new(schema, vec![
            Arc::new(StringArray::from(vec![collection.to_string()])),
            Arc::new(StringArray::from(vec![CollectionMetric::DISTANCE])),
            Arc::new(Int64Array::from(vec![i64::try_from(metric.dim)?])),
            Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
        ])?;
        self.merge_on(COLLECTIONS_TABLE, "collection", rb).await
    }

    /// Inserts `rb`, replacing rows whose `key` column matches.
    async fn merge_on(&self, table: &str, key: &str, rb: RecordBatch) -> Result<()> {
        let schema = rb.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), schema));
        let t = self.db.open_table(table).execute().await?;
        let mut mi = t.merge_insert(&[key]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        let _ = mi.execute(reader).await?;
        Ok(())
    }

    async fn dim_of(&self, collection: &str) -> Result<usize> {
        let t = self.db.open_table(collection).execute().await?;
        let schema = t.schema().await?;
        vector_dim(&schema).ok_or_else(|| anyhow!("collection '{collection}' has no vector column"))
    }

    /// Metric recorded when the collection was created; `None` for an
    /// unknown collection.
    pub async fn collection_metric(&self, collection: &str) -> Result<Option<CollectionMetric>> {
        if !table_exists(&self.db, COLLECTIONS_TABLE).await? { return Ok(None); }
        let t = self.db.open_table(COLLECTIONS_TABLE).execute().await?;
        let filter = format!("collection = '{}'", collection.replace('\'', "''"));
        let mut stream = t.query().only_if(filter).limit(1).execute().await?;
        while let Some(batch) = stream.try_next().await? {
            if batch.num_rows() == 0 { continue; }
            let distance = string_column(&batch, "metric")?.value(0);
            if distance != CollectionMetric::DISTANCE {
                bail!("collection '{collection}' uses unsupported metric '{distance}'");
            }
            let dims = batch.column_by_name("dim").and_then(|c| c.as_any().downcast_ref::<Int64Array>()).ok_or_else(|| anyhow!("dim column missing"))?;
            return Ok(Some(CollectionMetric { dim: usize::try_from(dims.value(0))? }));
        }
        Ok(None)
    }

    pub async fn count(&self, collection: &str) -> Result<usize> {
        if !table_exists(&self.db, collection).await? { return Ok(0); }
        Ok(self.db.open_table(collection).execute().await?.count_rows(None).await?)
    }

    /// The `k` stored points closest to `vector` by cosine distance.
    pub async fn nearest(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let t = self.db.open_table(collection).execute().await?;
        let mut stream = t.vector_search(vector.to_vec())?.distance_type(DistanceType::Cosine).limit(k).execute().await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = string_column(&batch, "id")?;
            let image_ids = string_column(&batch, "image_id")?;
            let object_ids = string_column(&batch, "object_id")?;
            let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
            for i in 0..batch.num_rows() {
                let object_id = (!object_ids.is_null(i)).then(|| object_ids.value(i).to_string());
                hits.push(Neighbor {
                    id: ids.value(i).to_string(),
                    payload: PointPayload { image_id: image_ids.value(i).to_string(), object_id },
                    distance: distances.map(|d| d.value(i)).unwrap_or(f32::NAN),
                });
            }
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(hits)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("{name} column missing"))
}

fn point_batch(point: &VectorPoint, dim: usize) -> Result<RecordBatch> {
    let schema = build_point_schema(i32::try_from(dim)?);
    let vectors = vec![Some(point.vector.iter().map(|&x| Some(x)).collect::<Vec<_>>())];
    Ok(RecordBatch::try_new(schema, vec![
        Arc::new(StringArray::from(vec![point.id.clone()])),
        Arc::new(StringArray::from(vec![point.payload.image_id.clone()])),
        Arc::new(StringArray::from(vec![point.payload.object_id.clone()])),
        Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), i32::try_from(dim)?)),
    ])?)
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn ensure_collection(&self, name: &str, dim: usize) -> recall_core::Result<()> {
        let expected = CollectionMetric { dim };
        if let Some(existing) = self.collection_metric(name).await.map_err(|e| recall_core::Error::store_chain(&e))? {
            if existing != expected {
                return Err(recall_core::Error::InvalidConfig(format!("collection '{name}' exists as {existing}, requested {expected}")));
            }
        }
        self.create_collection(name, dim).await.map_err(|e| recall_core::Error::store_chain(&e))
    }

    async fn upsert(&self, collection: &str, point: &VectorPoint) -> recall_core::Result<()> {
        let dim = self.dim_of(collection).await.map_err(|e| recall_core::Error::store_chain(&e))?;
        if point.vector.len() != dim {
            return Err(recall_core::Error::Validation(format!(
                "vector length {} does not match collection '{collection}' dimension {dim}",
                point.vector.len()
            )));
        }
        let rb = point_batch(point, dim).map_err(|e| recall_core::Error::store_chain(&e))?;
        // point id is unique per collection
        self.merge_on(collection, "id", rb).await.map_err(|e| recall_core::Error::store_chain(&e))
    }
}
