//! Normalizes heterogeneous perception payloads into [`Detection`]s.
//!
//! Two payload shapes arrive from the inference service: plain detection
//! lists (boxes) and annotated objects that may carry pose landmarks.
//! The interpreter is pure: same payload, same answer.

use serde::Deserialize;

use fixate_types::{BBox, Detection};

/// Labels that denote a human target.
const HUMAN_LABELS: [&str; 5] = ["person", "human", "face", "man", "woman"];

/// Detections at or below this confidence are ignored.
const CONFIDENCE_FLOOR: f64 = 0.25;

/// Fraction of the box height kept when biasing a human box toward the
/// head. The tracker aims at the box center, so keeping the top 40%
/// moves the fixation point up to face height.
const SOCIAL_BIAS_KEEP: f64 = 0.4;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawDetection {
    pub class: String,
    pub confidence: f64,
    /// [xmin, ymin, xmax, ymax] pixels
    pub bbox: [f64; 4],
}

/// One pose landmark in 0..=1 normalized image coordinates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub visibility: f64,
}

/// The `data` field of a perception reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PerceptionData {
    /// Bare list of box detections.
    Detections(Vec<RawDetection>),
    /// Object form, optionally with skeletal landmarks.
    Annotated {
        #[serde(default)]
        detections: Vec<RawDetection>,
        #[serde(default)]
        pose_landmarks: Vec<Landmark>,
    },
}

fn is_human_label(label: &str) -> bool {
    let lower = label.to_ascii_lowercase();
    HUMAN_LABELS.iter().any(|h| *h == lower)
}

/// Select the best matching observation for `target` from a reply.
///
/// Landmarks take primacy for human targets: landmark 0 is the nose and
/// becomes a point detection. Otherwise the highest-confidence box of
/// the right class wins, with human boxes biased toward the head.
pub fn interpret(
    data: &PerceptionData,
    target: &str,
    frame_width: u32,
    frame_height: u32,
    timestamp: f64,
    source_angles: Option<(f64, f64)>,
) -> Option<Detection> {
    if target.is_empty() {
        return None;
    }

    if is_human_label(target) {
        if let PerceptionData::Annotated { pose_landmarks, .. } = data {
            if let Some(nose) = pose_landmarks.first() {
                let nx = nose.x * frame_width as f64;
                let ny = nose.y * frame_height as f64;
                return Some(Detection {
                    label: target.to_string(),
                    confidence: 1.0,
                    bbox: BBox::new(nx, ny, nx, ny),
                    timestamp,
                    source_angles,
                });
            }
        }
    }

    let detections = match data {
        PerceptionData::Detections(list) => list,
        PerceptionData::Annotated { detections, .. } => detections,
    };

    let best = detections
        .iter()
        .filter(|d| d.class == target && d.confidence > CONFIDENCE_FLOOR)
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))?;

    let [xmin, ymin, xmax, mut ymax] = best.bbox;
    if is_human_label(&best.class) {
        ymax = ymin + SOCIAL_BIAS_KEEP * (ymax - ymin);
    }

    Some(Detection {
        label: target.to_string(),
        confidence: best.confidence,
        bbox: BBox::new(xmin, ymin, xmax, ymax),
        timestamp,
        source_angles,
    })
}
