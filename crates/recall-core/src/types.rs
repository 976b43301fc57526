//! Domain types shared by the labelers, the merger, the stores and the auditor.

use serde::{Deserialize, Serialize};

/// Dimensionality of every vector collection.
pub const EMBEDDING_DIM: usize = 512;

pub type ImageId = String;
pub type ObjectId = String;

/// Axis-aligned box in pixel coordinates, `(x1, y1)` top-left, `(x2, y2)` bottom-right.
///
/// Serialized as `[x1, y1, x2, y2]`, the layout labelers emit and the record
/// store persists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self { Self { x1, y1, x2, y2 } }

    pub fn width(&self) -> f32 { self.x2 - self.x1 }
    pub fn height(&self) -> f32 { self.y2 - self.y1 }

    /// Area counting boundary pixels on both sides: `(x2 - x1 + 1) * (y2 - y1 + 1)`.
    pub fn inclusive_area(&self) -> f32 { (self.x2 - self.x1 + 1.0) * (self.y2 - self.y1 + 1.0) }

    /// Integer crop rectangle inside a `width` x `height` image, or `None`
    /// when nothing of the box is left after clamping.
    pub fn crop_rect(&self, width: u32, height: u32) -> Option<CropRect> {
        let clamp = |v: f32, max: u32| v.max(0.0).min(max as f32);
        let x1 = clamp(self.x1.min(self.x2), width).floor() as u32;
        let y1 = clamp(self.y1.min(self.y2), height).floor() as u32;
        let x2 = clamp(self.x1.max(self.x2), width).ceil() as u32;
        let y2 = clamp(self.y1.max(self.y2), height).ceil() as u32;
        if x2 <= x1 || y2 <= y1 { return None; }
        Some(CropRect { x: x1, y: y1, width: x2 - x1, height: y2 - y1 })
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self { Self::new(v[0], v[1], v[2], v[3]) }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self { [b.x1, b.y1, b.x2, b.y2] }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One labeler's claim about a region. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub bbox: BBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Detection {
    pub fn new(label: impl Into<String>, bbox: impl Into<BBox>) -> Self {
        Self { label: label.into(), bbox: bbox.into(), confidence: None }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// A detection that survived ensemble deduplication. Carries no score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalObject {
    pub label: String,
    pub bbox: BBox,
}

impl CanonicalObject {
    /// Region of the source image this object is cropped from.
    pub fn source_crop(&self, width: u32, height: u32) -> Option<CropRect> { self.bbox.crop_rect(width, height) }
}

impl From<Detection> for CanonicalObject {
    fn from(d: Detection) -> Self { Self { label: d.label, bbox: d.bbox } }
}

/// Bounded quality scores for one image; every field lies in `[0, 1]`.
///
/// `dark_score` is the 95th brightness percentile and `light_score` is one
/// minus the 5th percentile. The names are kept for compatibility with
/// records already written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub dark_score: f32,
    pub light_score: f32,
    pub blur_score: f32,
    pub low_information_score: f32,
    pub aspect_ratio_score: f32,
}

impl QualityReport {
    pub fn scores(&self) -> [f32; 5] {
        [self.dark_score, self.light_score, self.blur_score, self.low_information_score, self.aspect_ratio_score]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub date_time: String,
    pub local_path: String,
    pub task: String,
    /// `"{width}x{height}"`
    pub size: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,
    /// Path-only URL in the object store; `None` when the upload was dropped.
    pub url: Option<String>,
    pub description: String,
    pub metadata: ImageMetadata,
    pub metrics: QualityReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: ObjectId,
    pub image_id: ImageId,
    pub class_name: String,
    pub bbox: BBox,
}

/// The fixed set of vector collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Object,
    Image,
    ObjectDescription,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Object, Collection::Image, Collection::ObjectDescription];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Object => "object",
            Collection::Image => "image",
            Collection::ObjectDescription => "object_description",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.name()) }
}

/// Back-references stored next to a vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointPayload {
    pub image_id: ImageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// An image the auditor wants a human to look at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewCandidate {
    pub image_path: String,
    pub label_path: String,
    pub predict_path: String,
}
