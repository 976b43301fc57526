//! Arrow schemas for vector collections and the collection registry.
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

/// One row per [`recall_core::types::VectorPoint`]; `object_id` is null for
/// whole-image vectors.
pub fn build_point_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("image_id", DataType::Utf8, false),
        Field::new("object_id", DataType::Utf8, true),
        Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}

/// One row per collection: the distance metric and vector width it was
/// created with.
pub fn build_collections_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("collection", DataType::Utf8, false),
        Field::new("metric", DataType::Utf8, false),
        Field::new("dim", DataType::Int64, false),
        Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
    ]))
}

/// Fixed vector width of a point table, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
    match schema.field_with_name("vector").ok()?.data_type() {
        DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
        _ => None,
    }
}
