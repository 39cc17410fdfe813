//! Builder for creating Blob objects from various ellipse representations.

use crate::tracker::Blob;

/// Builder for creating [`Blob`] objects.
///
/// Without an explicit [`area`](BlobBuilder::area) the area of the ellipse
/// is used.
#[derive(Debug, Clone, Default)]
pub struct BlobBuilder {
    x: f64,
    y: f64,
    major_axis: f64,
    minor_axis: f64,
    area: Option<f64>,
    frame_index: u64,
}

impl BlobBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the centroid.
    pub fn center(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set full axis lengths, as returned by ellipse fitting.
    pub fn axes(mut self, major: f64, minor: f64) -> Self {
        self.major_axis = major;
        self.minor_axis = minor;
        self
    }

    /// Set the ellipse from an axis-aligned bounding box (x, y, width, height).
    pub fn bbox(mut self, x: f64, y: f64, w: f64, h: f64) -> Self {
        self.x = x + w / 2.0;
        self.y = y + h / 2.0;
        self.major_axis = w.max(h);
        self.minor_axis = w.min(h);
        self
    }

    /// Set the measured contour area.
    pub fn area(mut self, area: f64) -> Self {
        self.area = Some(area);
        self
    }

    pub fn frame(mut self, frame_index: u64) -> Self {
        self.frame_index = frame_index;
        self
    }

    pub fn build(self) -> Blob {
        match self.area {
            Some(area) => Blob::new(
                self.x,
                self.y,
                self.major_axis,
                self.minor_axis,
                area,
                self.frame_index,
            ),
            None => Blob::from_ellipse(
                self.x,
                self.y,
                self.major_axis,
                self.minor_axis,
                self.frame_index,
            ),
        }
    }
}
