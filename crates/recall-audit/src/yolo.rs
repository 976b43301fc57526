//! YOLO text label files: one `class cx cy w h [confidence]` line per box,
//! coordinates normalized to the image size.

use std::path::Path;

use recall_core::types::BBox;
use recall_core::{Error, Result};

/// Written into empty label files so every image has at least one line.
pub const PLACEHOLDER_LINE: &str = "0 0 0 0 0";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloBox {
    pub class_id: usize,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub confidence: Option<f32>,
}

impl YoloBox {
    pub fn to_absolute(&self, width: u32, height: u32) -> BBox {
        let (iw, ih) = (width as f32, height as f32);
        BBox::new((self.cx - self.w / 2.0) * iw, (self.cy - self.h / 2.0) * ih, (self.cx + self.w / 2.0) * iw, (self.cy + self.h / 2.0) * ih)
    }

    pub fn from_absolute(class_id: usize, bbox: &BBox, width: u32, height: u32) -> Self {
        let (iw, ih) = (width.max(1) as f32, height.max(1) as f32);
        Self {
            class_id,
            cx: (bbox.x1 + bbox.x2) / 2.0 / iw,
            cy: (bbox.y1 + bbox.y2) / 2.0 / ih,
            w: bbox.width() / iw,
            h: bbox.height() / ih,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn is_placeholder(&self) -> bool { self.w <= 0.0 || self.h <= 0.0 }

    pub fn to_line(&self) -> String {
        let base = format!("{} {:.6} {:.6} {:.6} {:.6}", self.class_id, self.cx, self.cy, self.w, self.h);
        match self.confidence {
            Some(c) => format!("{base} {c:.6}"),
            None => base,
        }
    }
}

fn parse_fields(line: &str) -> std::result::Result<Vec<f32>, String> {
    line.split_whitespace().map(|t| t.parse::<f32>().map_err(|_| format!("'{t}' is not a number"))).collect()
}

fn class_of(v: f32) -> std::result::Result<usize, String> {
    if v >= 0.0 && v.fract() == 0.0 { Ok(v as usize) } else { Err(format!("class id {v} is not a non-negative integer")) }
}

/// Ground-truth line: at least five fields; extras are ignored.
pub fn parse_label_line(line: &str) -> std::result::Result<YoloBox, String> {
    let f = parse_fields(line)?;
    if f.len() < 5 { return Err(format!("expected 5 fields, got {}", f.len())); }
    Ok(YoloBox { class_id: class_of(f[0])?, cx: f[1], cy: f[2], w: f[3], h: f[4], confidence: None })
}

/// Prediction line: needs six fields (the sixth is confidence). Shorter
/// lines, including the placeholder, carry no prediction and yield `None`.
pub fn parse_prediction_line(line: &str) -> std::result::Result<Option<YoloBox>, String> {
    let f = parse_fields(line)?;
    if f.len() < 6 { return Ok(None); }
    Ok(Some(YoloBox { class_id: class_of(f[0])?, cx: f[1], cy: f[2], w: f[3], h: f[4], confidence: Some(f[5]) }))
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect())
}

fn line_error(path: &Path, n: usize, reason: String) -> Error {
    Error::Validation(format!("{}:{}: {reason}", path.display(), n + 1))
}

pub fn read_labels(path: &Path) -> Result<Vec<YoloBox>> {
    read_lines(path)?.iter().enumerate().map(|(n, l)| parse_label_line(l).map_err(|r| line_error(path, n, r))).collect()
}

pub fn read_predictions(path: &Path) -> Result<Vec<YoloBox>> {
    let mut out = Vec::new();
    for (n, l) in read_lines(path)?.iter().enumerate() {
        if let Some(b) = parse_prediction_line(l).map_err(|r| line_error(path, n, r))? { out.push(b); }
    }
    Ok(out)
}

/// True when the file has no non-blank line.
pub fn is_empty_label_file(path: &Path) -> Result<bool> { Ok(read_lines(path)?.is_empty()) }

pub fn write_placeholder(path: &Path) -> Result<()> {
    std::fs::write(path, format!("{PLACEHOLDER_LINE}\n"))?;
    Ok(())
}
