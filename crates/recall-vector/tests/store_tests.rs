use recall_core::traits::VectorStore;
use recall_core::types::{PointPayload, VectorPoint};
use recall_vector::{CollectionMetric, LanceVectorStore};

fn unit(dim: usize, hot: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dim];
    v[hot] = 1.0;
    v
}

fn point(id: &str, image_id: &str, object_id: Option<&str>, vector: Vec<f32>) -> VectorPoint {
    VectorPoint { id: id.into(), vector, payload: PointPayload { image_id: image_id.into(), object_id: object_id.map(Into::into) } }
}

#[tokio::test]
async fn ensure_collection_is_idempotent_and_records_metric() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LanceVectorStore::open(tmp.path().to_str().unwrap()).await.unwrap();
    store.ensure_collection("image", 8).await.unwrap();
    store.ensure_collection("image", 8).await.unwrap();
    let metric = store.collection_metric("image").await.unwrap();
    assert_eq!(metric, Some(CollectionMetric { dim: 8 }));
    assert_eq!(metric.unwrap().to_string(), "cosine:8");
    assert_eq!(store.collection_metric("object").await.unwrap(), None);
    assert_eq!(store.count("image").await.unwrap(), 0);
}

#[tokio::test]
async fn ensure_collection_rejects_dimension_change() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LanceVectorStore::open(tmp.path().to_str().unwrap()).await.unwrap();
    store.ensure_collection("object", 8).await.unwrap();
    let err = store.ensure_collection("object", 16).await.unwrap_err();
    assert!(matches!(err, recall_core::Error::InvalidConfig(_)), "{err}");
}

#[tokio::test]
async fn recorded_metric_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let uri = tmp.path().to_str().unwrap();
    {
        let store = LanceVectorStore::open(uri).await.unwrap();
        store.ensure_collection("image", 8).await.unwrap();
        store.ensure_collection("object", 8).await.unwrap();
    }
    let store = LanceVectorStore::open(uri).await.unwrap();
    assert_eq!(store.collection_metric("object").await.unwrap(), Some(CollectionMetric { dim: 8 }));
    let err = store.ensure_collection("image", 4).await.unwrap_err();
    assert!(matches!(err, recall_core::Error::InvalidConfig(_)), "{err}");
}

#[tokio::test]
async fn upsert_replaces_point_with_same_id() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LanceVectorStore::open(tmp.path().to_str().unwrap()).await.unwrap();
    store.ensure_collection("object", 4).await.unwrap();
    store.upsert("object", &point("p1", "img", Some("obj"), unit(4, 0))).await.unwrap();
    store.upsert("object", &point("p1", "img", Some("obj"), unit(4, 1))).await.unwrap();
    assert_eq!(store.count("object").await.unwrap(), 1);
    let hits = store.nearest("object", &unit(4, 1), 1).await.unwrap();
    assert_eq!(hits[0].id, "p1");
    assert!(hits[0].distance.abs() < 1e-5);
}

#[tokio::test]
async fn upsert_rejects_wrong_length() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LanceVectorStore::open(tmp.path().to_str().unwrap()).await.unwrap();
    store.ensure_collection("image", 4).await.unwrap();
    let err = store.upsert("image", &point("p", "img", None, vec![1.0; 3])).await.unwrap_err();
    assert!(matches!(err, recall_core::Error::Validation(_)), "{err}");
    assert_eq!(store.count("image").await.unwrap(), 0);
}

#[tokio::test]
async fn nearest_orders_by_cosine_distance_and_keeps_payload() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LanceVectorStore::open(tmp.path().to_str().unwrap()).await.unwrap();
    store.ensure_collection("image", 4).await.unwrap();
    store.upsert("image", &point("a", "a", None, unit(4, 0))).await.unwrap();
    store.upsert("image", &point("b", "b", None, vec![0.6, 0.8, 0.0, 0.0])).await.unwrap();
    store.upsert("image", &point("c", "c", None, unit(4, 2))).await.unwrap();
    let hits = store.nearest("image", &[1.0, 0.1, 0.0, 0.0], 2).await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(hits[0].payload, PointPayload { image_id: "a".into(), object_id: None });
}
