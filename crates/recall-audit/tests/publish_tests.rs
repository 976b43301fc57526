use recall_audit::{publish_candidates, JsonlPublisher};
use recall_core::types::ReviewCandidate;

fn candidate(image: &str) -> ReviewCandidate {
    ReviewCandidate { image_path: image.into(), label_path: format!("{image}.txt"), predict_path: format!("{image}.pred.txt") }
}

#[tokio::test]
async fn publishes_once_per_image_path() {
    let tmp = tempfile::tempdir().unwrap();
    let publisher = JsonlPublisher::new(tmp.path());
    let batch = vec![candidate("a.png"), candidate("b.png"), candidate("a.png")];
    assert_eq!(publish_candidates(&publisher, "file_differences", &batch).await, 2);

    let text = std::fs::read_to_string(publisher.topic_path("file_differences")).unwrap();
    let lines: Vec<ReviewCandidate> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines, vec![candidate("a.png"), candidate("b.png")]);
    let raw: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(raw["predict_path"], "a.png.pred.txt");
}
