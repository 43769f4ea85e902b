use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates.
///
/// A point target (e.g. a pose landmark) is represented as a degenerate
/// box with `xmin == xmax` and `ymin == ymax`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BBox {
    /// Invariant: `xmax >= xmin` and `ymax >= ymin`.
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        debug_assert!(xmax >= xmin);
        debug_assert!(ymax >= ymin);
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// A single accepted target observation.
///
/// Created by the interpreter once per accepted perception reply and
/// consumed at most once by the control thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label the observation was matched against.
    pub label: String,
    /// Detector confidence in `0..=1`.
    pub confidence: f64,
    pub bbox: BBox,
    /// Frame capture time (unix seconds, publisher clock).
    pub timestamp: f64,
    /// Head (yaw, pitch) radians at the moment of capture, when the
    /// joint-state buffer covered the capture timestamp.
    pub source_angles: Option<(f64, f64)>,
}
