//! Detection geometry: ellipse blobs, points and size classification.
use serde::{Deserialize, Serialize};

use crate::error::BlobError;

/// A point in frame coordinates (pixels).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[inline]
    pub fn distance_sq(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One ellipse-shaped detection candidate in one frame.
///
/// Blobs are produced by an external detector and live only for the frame
/// they were detected in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    /// Ellipse centroid
    pub center: Point,
    /// Full length of the major axis
    pub major_axis: f64,
    /// Full length of the minor axis
    pub minor_axis: f64,
    /// Contour area in square pixels
    pub area: f64,
    /// Frame the blob was detected in
    pub frame_index: u64,
}

impl Blob {
    /// Create a blob with an explicitly measured area.
    #[inline]
    pub fn new(
        x: f64,
        y: f64,
        major_axis: f64,
        minor_axis: f64,
        area: f64,
        frame_index: u64,
    ) -> Self {
        Self {
            center: Point::new(x, y),
            major_axis,
            minor_axis,
            area,
            frame_index,
        }
    }

    /// Create a blob whose area is the area of the fitted ellipse.
    #[inline]
    pub fn from_ellipse(x: f64, y: f64, major_axis: f64, minor_axis: f64, frame_index: u64) -> Self {
        let area = std::f64::consts::FRAC_PI_4 * major_axis * minor_axis;
        Self::new(x, y, major_axis, minor_axis, area, frame_index)
    }

    /// Reject geometry a sane detector can never produce.
    pub fn validate(&self) -> Result<(), BlobError> {
        let fields = [
            ("x", self.center.x),
            ("y", self.center.y),
            ("major_axis", self.major_axis),
            ("minor_axis", self.minor_axis),
            ("area", self.area),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(BlobError::NonFinite { field, value });
            }
        }
        for &(field, value) in &fields[2..] {
            if value < 0.0 {
                return Err(BlobError::Negative { field, value });
            }
        }
        Ok(())
    }
}

/// What a blob of a given area is taken to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeClass {
    /// A single bee
    Single,
    /// Several bees merged into one contour, tracked as one entity
    Group,
}

/// Inclusive area range in square pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaRange {
    pub min: f64,
    pub max: f64,
}

impl AreaRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, area: f64) -> bool {
        area >= self.min && area <= self.max
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min >= 0.0 && self.min <= self.max
    }

    pub(crate) fn overlaps(&self, other: &AreaRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// Classify a blob area. Areas between or outside both ranges are ambiguous
/// or noise and yield `None`.
pub fn classify_area(area: f64, single: &AreaRange, group: &AreaRange) -> Option<SizeClass> {
    if single.contains(area) {
        Some(SizeClass::Single)
    } else if group.contains(area) {
        Some(SizeClass::Group)
    } else {
        None
    }
}
