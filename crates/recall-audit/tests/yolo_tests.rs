use recall_audit::scorer::{iou, AnnotatedBox, LabelQualityScorer, MatchingScorer};
use recall_audit::yolo::{parse_label_line, parse_prediction_line, YoloBox};
use recall_core::types::BBox;
use rstest::rstest;

#[test]
fn normalized_box_converts_to_pixels() {
    let b = parse_label_line("3 0.5 0.25 0.2 0.1").unwrap();
    assert_eq!(b.class_id, 3);
    let abs = b.to_absolute(200, 100);
    for (got, want) in [abs.x1, abs.y1, abs.x2, abs.y2].into_iter().zip([80.0, 20.0, 120.0, 30.0]) {
        assert!((got - want).abs() < 1e-4, "got {got} want {want}");
    }
    let back = YoloBox::from_absolute(3, &BBox::new(80.0, 20.0, 120.0, 30.0), 200, 100);
    assert!((back.cx - 0.5).abs() < 1e-6 && (back.w - 0.2).abs() < 1e-6);
    assert_eq!(back.to_line(), "3 0.500000 0.250000 0.200000 0.100000");
}

#[rstest]
#[case("0 0 0 0 0", None)]
#[case("1 0.5 0.5 0.1 0.1 0.7", Some(0.7))]
fn prediction_lines_need_a_confidence(#[case] line: &str, #[case] confidence: Option<f32>) {
    assert_eq!(parse_prediction_line(line).unwrap().and_then(|b| b.confidence), confidence);
}

#[rstest]
#[case("0 0.5 0.5")]
#[case("x 0.5 0.5 0.1 0.1")]
#[case("1.5 0.5 0.5 0.1 0.1")]
fn malformed_label_lines_are_rejected(#[case] line: &str) {
    assert!(parse_label_line(line).is_err());
}

fn gt(class_id: usize, b: [f32; 4]) -> AnnotatedBox { AnnotatedBox { class_id, bbox: b.into(), confidence: 1.0 } }

#[test]
fn matching_scorer_rewards_agreement_and_penalizes_extras() {
    let s = MatchingScorer::default();
    let labels = [gt(0, [0., 0., 10., 10.]), gt(1, [20., 20., 30., 30.])];
    assert!((s.score(&labels, &labels) - 1.0).abs() < 1e-6);
    // wrong class never matches
    assert_eq!(s.score(&labels[..1], &[gt(1, [0., 0., 10., 10.])]), 0.0);
    // one extra spurious prediction: 2 * 2 / (2 + 3)
    let mut preds = labels.to_vec();
    preds.push(gt(0, [60., 60., 70., 70.]));
    assert!((s.score(&labels, &preds) - 0.8).abs() < 1e-6);
    assert_eq!(s.score(&labels, &[]), 0.0);
    assert_eq!(s.score(&[], &[]), 1.0);
}

#[test]
fn standard_iou_is_exclusive() {
    assert!((iou(&BBox::new(0., 0., 10., 10.), &BBox::new(5., 0., 15., 10.)) - 1.0 / 3.0).abs() < 1e-6);
    assert_eq!(iou(&BBox::new(0., 0., 10., 10.), &BBox::new(10., 0., 20., 10.)), 0.0);
}
