//! Offline comparison of ground-truth label files against model predictions.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use recall_core::folder::{file_stem, list_files_with_extensions, IMAGE_EXTENSIONS};
use recall_core::types::ReviewCandidate;
use recall_core::{Error, Result};

use crate::scorer::{AnnotatedBox, LabelQualityScorer, MatchingScorer};
use crate::yolo::{is_empty_label_file, read_labels, read_predictions, write_placeholder, YoloBox};

const LABEL_EXTENSIONS: [&str; 1] = ["txt"];

#[derive(Debug, Clone)]
pub struct AuditDirs {
    pub labels: PathBuf,
    pub predictions: PathBuf,
    pub images: PathBuf,
}

/// Flagged images as three parallel lists, plus every image's score.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditReport {
    pub image_paths: Vec<PathBuf>,
    pub label_paths: Vec<PathBuf>,
    pub predict_paths: Vec<PathBuf>,
    pub scores: Vec<(PathBuf, f32)>,
}

impl AuditReport {
    pub fn flagged(&self) -> usize { self.image_paths.len() }

    pub fn candidates(&self) -> Vec<ReviewCandidate> {
        self.image_paths
            .iter()
            .zip(&self.label_paths)
            .zip(&self.predict_paths)
            .map(|((i, l), p)| ReviewCandidate {
                image_path: i.display().to_string(),
                label_path: l.display().to_string(),
                predict_path: p.display().to_string(),
            })
            .collect()
    }
}

pub struct LabelQualityAuditor<S = MatchingScorer> {
    scorer: S,
    threshold: f32,
}

impl LabelQualityAuditor<MatchingScorer> {
    pub fn new(threshold: f32) -> Self { Self { scorer: MatchingScorer::default(), threshold } }
}

impl<S: LabelQualityScorer> LabelQualityAuditor<S> {
    pub fn with_scorer(scorer: S, threshold: f32) -> Self { Self { scorer, threshold } }

    pub fn threshold(&self) -> f32 { self.threshold }

    /// Validates the three directories, normalizes empty and missing files,
    /// scores each image and flags those scoring below the threshold.
    ///
    /// Count mismatches fail before any file is touched.
    pub fn run(&self, dirs: &AuditDirs) -> Result<AuditReport> {
        let labels = list_files_with_extensions(&dirs.labels, &LABEL_EXTENSIONS)?;
        let predictions = list_files_with_extensions(&dirs.predictions, &LABEL_EXTENSIONS)?;
        let images = list_files_with_extensions(&dirs.images, &IMAGE_EXTENSIONS)?;

        if labels.len() != images.len() {
            return Err(Error::Validation(format!(
                "the number of labels ({}) and images ({}) are not equal",
                labels.len(),
                images.len()
            )));
        }
        let images_by_stem: HashMap<String, PathBuf> = images.into_iter().map(|p| (file_stem(&p), p)).collect();
        // stem-ordered so flagged output is deterministic
        let mut triples: BTreeMap<String, (PathBuf, PathBuf)> = BTreeMap::new();
        for label in &labels {
            let stem = file_stem(label);
            let image = images_by_stem
                .get(&stem)
                .ok_or_else(|| Error::Validation(format!("no image for label file {}", label.display())))?;
            triples.insert(stem, (label.clone(), image.clone()));
        }
        if let Some(extra) = predictions.iter().find(|p| !triples.contains_key(&file_stem(p))) {
            return Err(Error::Validation(format!(
                "the number of labels ({}) and predictions ({}) are not equal: {} has no label file",
                labels.len(),
                predictions.len(),
                extra.display()
            )));
        }

        for path in labels.iter().chain(&predictions) {
            if is_empty_label_file(path)? {
                tracing::debug!(path = %path.display(), "rewriting empty label file with placeholder");
                write_placeholder(path)?;
            }
        }

        let mut report = AuditReport::default();
        for (stem, (label_path, image_path)) in &triples {
            let predict_path = dirs.predictions.join(format!("{stem}.txt"));
            if !predict_path.exists() {
                tracing::debug!(path = %predict_path.display(), "creating dummy prediction file");
                write_placeholder(&predict_path)?;
            }
            let score = self.score_image(label_path, &predict_path, image_path)?;
            tracing::debug!(image = %image_path.display(), score, "scored image");
            if score < self.threshold {
                report.image_paths.push(image_path.clone());
                report.label_paths.push(label_path.clone());
                report.predict_paths.push(predict_path);
            }
            report.scores.push((image_path.clone(), score));
        }
        tracing::info!(images = report.scores.len(), flagged = report.flagged(), threshold = self.threshold, "label audit finished");
        Ok(report)
    }

    fn score_image(&self, label_path: &Path, predict_path: &Path, image_path: &Path) -> Result<f32> {
        let (width, height) = image::image_dimensions(image_path)
            .map_err(|e| Error::Decode { path: image_path.to_path_buf(), reason: e.to_string() })?;
        let absolute = |b: &YoloBox, confidence: f32| AnnotatedBox { class_id: b.class_id, bbox: b.to_absolute(width, height), confidence };
        let labels: Vec<AnnotatedBox> = read_labels(label_path)?.iter().map(|b| absolute(b, 1.0)).collect();
        let preds: Vec<AnnotatedBox> =
            read_predictions(predict_path)?.iter().map(|b| absolute(b, b.confidence.unwrap_or(0.0))).collect();
        Ok(self.scorer.score(&labels, &preds))
    }
}
