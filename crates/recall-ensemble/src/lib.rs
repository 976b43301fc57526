//! Ensemble deduplication of detections coming from independent labelers.
//!
//! Detections are grouped by exact (case-sensitive) label. Inside a group,
//! members are visited in insertion order and every later member whose
//! inclusive-pixel IoU with a surviving earlier member exceeds the threshold
//! is dropped, so the first labeler to report a region wins.

use std::collections::HashMap;

use recall_core::types::{BBox, CanonicalObject, Detection};

/// Threshold for repeated passes of the same model (keyword pass vs. open-vocabulary pass).
pub const SAME_MODEL_THRESHOLD: f32 = 0.5;
/// Threshold for fusing the outputs of different models.
pub const CROSS_MODEL_THRESHOLD: f32 = 0.7;

/// IoU with `+1` on each box side, counting boundary pixels as covered.
pub fn iou_inclusive(a: &BBox, b: &BBox) -> f32 {
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1) + 1.0).max(0.0);
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1) + 1.0).max(0.0);
    let intersection = inter_w * inter_h;
    let union = a.inclusive_area() + b.inclusive_area() - intersection;
    if union <= 0.0 { return 0.0; }
    intersection / union
}

/// Greedy suppression inside one label group. Returns survivors in input order.
pub fn dedup_group(group: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    let mut removed = vec![false; group.len()];
    for i in 0..group.len() {
        if removed[i] { continue; }
        for j in (i + 1)..group.len() {
            if removed[j] { continue; }
            if iou_inclusive(&group[i].bbox, &group[j].bbox) > threshold { removed[j] = true; }
        }
    }
    group.into_iter().zip(removed).filter(|(_, r)| !r).map(|(d, _)| d).collect()
}

#[derive(Debug, Clone, Copy)]
pub struct EnsembleMerger {
    threshold: f32,
}

impl EnsembleMerger {
    pub fn new(threshold: f32) -> Self { Self { threshold } }

    /// Merger for passes of one model.
    pub fn same_model() -> Self { Self::new(SAME_MODEL_THRESHOLD) }

    /// Merger for several independent models.
    pub fn cross_model() -> Self { Self::new(CROSS_MODEL_THRESHOLD) }

    /// Picks the regime from the number of labelers feeding the merge.
    pub fn for_labeler_count(count: usize) -> Self {
        if count > 1 { Self::cross_model() } else { Self::same_model() }
    }

    pub fn threshold(&self) -> f32 { self.threshold }

    /// Merges label sets in the order given. Labels keep the order of their
    /// first appearance; members keep insertion order within their label.
    pub fn merge(&self, label_sets: Vec<Vec<Detection>>) -> Vec<CanonicalObject> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Detection>> = HashMap::new();
        for det in label_sets.into_iter().flatten() {
            if !groups.contains_key(&det.label) { order.push(det.label.clone()); }
            groups.entry(det.label.clone()).or_default().push(det);
        }
        let mut out = Vec::new();
        for label in order {
            let Some(group) = groups.remove(&label) else { continue };
            let before = group.len();
            let survivors = dedup_group(group, self.threshold);
            tracing::debug!(label = %label, before, after = survivors.len(), "deduplicated label group");
            out.extend(survivors.into_iter().map(CanonicalObject::from));
        }
        out
    }
}

/// How a detection label is tested against requested keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordMatch {
    /// Label equals a keyword, ignoring case (phrase-grounding pass).
    Exact,
    /// Label contains a keyword, ignoring case (open-vocabulary pass).
    Contains,
}

/// Keeps detections whose label matches one of `keywords`. Runs before
/// deduplication and is the only place labels are compared case-insensitively.
pub fn filter_by_keywords(detections: Vec<Detection>, keywords: &[String], mode: KeywordMatch) -> Vec<Detection> {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    detections
        .into_iter()
        .filter(|d| {
            let label = d.label.to_lowercase();
            keywords.iter().any(|k| match mode {
                KeywordMatch::Exact => label == *k,
                KeywordMatch::Contains => label.contains(k.as_str()),
            })
        })
        .collect()
}
