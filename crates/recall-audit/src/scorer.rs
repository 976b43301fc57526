use recall_core::types::BBox;

/// A label or prediction box in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotatedBox {
    pub class_id: usize,
    pub bbox: BBox,
    /// 1.0 for ground truth.
    pub confidence: f32,
}

impl AnnotatedBox {
    fn is_placeholder(&self) -> bool { self.bbox.width() <= 0.0 || self.bbox.height() <= 0.0 }
}

/// Scores how well the predictions for one image agree with its ground
/// truth; 1.0 is perfect agreement, 0.0 none.
pub trait LabelQualityScorer: Send + Sync {
    fn score(&self, labels: &[AnnotatedBox], predictions: &[AnnotatedBox]) -> f32;
}

/// Greedy same-class IoU matching.
///
/// Each ground-truth box, in file order, takes the unmatched prediction of
/// its class with the highest IoU. The score is `2 * sum(matched IoU) /
/// (labels + predictions)`, so every missed or spurious box lowers it.
/// Placeholder (zero-area) boxes are ignored; two empty sides score 1.
#[derive(Debug, Clone, Copy)]
pub struct MatchingScorer {
    /// Matches below this IoU count as misses.
    pub min_iou: f32,
    /// Predictions below this confidence are ignored.
    pub min_confidence: f32,
}

impl Default for MatchingScorer {
    fn default() -> Self { Self { min_iou: 0.1, min_confidence: 0.0 } }
}

/// Standard IoU on continuous coordinates.
pub fn iou(a: &BBox, b: &BBox) -> f32 {
    let iw = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let ih = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = iw * ih;
    let union = a.width().max(0.0) * a.height().max(0.0) + b.width().max(0.0) * b.height().max(0.0) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

impl LabelQualityScorer for MatchingScorer {
    fn score(&self, labels: &[AnnotatedBox], predictions: &[AnnotatedBox]) -> f32 {
        let labels: Vec<&AnnotatedBox> = labels.iter().filter(|b| !b.is_placeholder()).collect();
        let preds: Vec<&AnnotatedBox> =
            predictions.iter().filter(|b| !b.is_placeholder() && b.confidence >= self.min_confidence).collect();
        match (labels.is_empty(), preds.is_empty()) {
            (true, true) => return 1.0,
            (true, false) | (false, true) => return 0.0,
            _ => {}
        }
        let mut taken = vec![false; preds.len()];
        let mut matched = 0.0f32;
        for l in &labels {
            let best = preds
                .iter()
                .enumerate()
                .filter(|(i, p)| !taken[*i] && p.class_id == l.class_id)
                .map(|(i, p)| (i, iou(&l.bbox, &p.bbox)))
                .filter(|(_, v)| *v >= self.min_iou)
                .max_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((i, v)) = best {
                taken[i] = true;
                matched += v;
            }
        }
        (2.0 * matched / (labels.len() + preds.len()) as f32).clamp(0.0, 1.0)
    }
}
