//! Mapping of detection boxes onto an image drawn with "contain" fit.
//!
//! The image is scaled uniformly to fit the container, centred, and the
//! leftover space on one axis is left as letterbox margin.

use dimscope_types::{BoundingBox, DetectionResult};
use serde::{Deserialize, Serialize};

/// Pixel size of an image or container
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// Negative or NaN extents collapse to zero
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Parse a `"WxH"` string such as `"400x300"`
    pub fn parse(value: &str) -> Option<Self> {
        let (w, h) = value.trim().split_once(['x', 'X'])?;
        let width: f64 = w.trim().parse().ok()?;
        let height: f64 = h.trim().parse().ok()?;
        Some(Self::new(width, height))
    }
}

/// Rectangle in container (screen) coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Whether `self` lies inside `outer`, allowing for float rounding
    pub fn is_within(&self, outer: &ScreenRect) -> bool {
        const EPS: f64 = 1e-9;
        self.x >= outer.x - EPS
            && self.y >= outer.y - EPS
            && self.right() <= outer.right() + EPS
            && self.bottom() <= outer.bottom() + EPS
    }
}

/// Precomputed contain-fit transform for one image/container pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainFit {
    pub image: Size,
    pub container: Size,
    pub scale: f64,
    pub display_width: f64,
    pub display_height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl ContainFit {
    pub fn new(image: Size, container: Size) -> Self {
        let image = Size::new(image.width, image.height);
        let container = Size::new(container.width, container.height);

        // zero-sized image: everything maps to a degenerate rect
        let scale = if image.width > 0.0 && image.height > 0.0 {
            (container.width / image.width).min(container.height / image.height)
        } else {
            0.0
        };

        let display_width = image.width * scale;
        let display_height = image.height * scale;

        Self {
            image,
            container,
            scale,
            display_width,
            display_height,
            offset_x: (container.width - display_width) / 2.0,
            offset_y: (container.height - display_height) / 2.0,
        }
    }

    /// Region of the container actually covered by the image
    pub fn displayed_region(&self) -> ScreenRect {
        ScreenRect {
            x: self.offset_x,
            y: self.offset_y,
            width: self.display_width,
            height: self.display_height,
        }
    }

    /// Map a source-pixel box to screen space.
    ///
    /// Coordinates are clamped to the image bounds first, so the result never
    /// leaves the displayed region.
    pub fn map_box(&self, bbox: &BoundingBox) -> ScreenRect {
        let x1 = bbox.x1.max(0.0).min(self.image.width);
        let y1 = bbox.y1.max(0.0).min(self.image.height);
        let x2 = bbox.x2.max(0.0).min(self.image.width);
        let y2 = bbox.y2.max(0.0).min(self.image.height);

        ScreenRect {
            x: x1 * self.scale + self.offset_x,
            y: y1 * self.scale + self.offset_y,
            width: (x2 - x1) * self.scale,
            height: (y2 - y1) * self.scale,
        }
    }

    /// Map every detection independently; results may overlap
    pub fn map_all(&self, detections: &[DetectionResult]) -> Vec<ScreenRect> {
        detections
            .iter()
            .map(|d| self.map_box(&d.bounding_box))
            .collect()
    }
}

/// Top-left corner for a label drawn just above `rect`, never negative
pub fn label_anchor(rect: &ScreenRect, label_height: f64) -> (f64, f64) {
    (rect.x.max(0.0), (rect.y - label_height).max(0.0))
}
