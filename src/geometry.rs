//! Axis-aligned box geometry used to match secondary detections to vehicles.
//!
//! Boxes are in frame-pixel coordinates with the origin at the top-left
//! corner. Negative extents can arrive from a misbehaving detector; every
//! area computation clamps them to zero instead of rejecting the box.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Area with negative extents clamped to zero.
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// True when the box encloses no area (zero, negative or NaN extent).
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// Copy of the box with every NaN or infinite coordinate set to zero.
    pub fn sanitized(&self) -> Self {
        Self::new(
            finite_or_zero(self.left),
            finite_or_zero(self.top),
            finite_or_zero(self.width),
            finite_or_zero(self.height),
        )
    }
}

/// `value`, or `0.0` when it is NaN or infinite. JSON has no encoding for
/// non-finite numbers.
pub fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Intersection-over-union of two boxes, in `[0, 1]`.
///
/// Returns `0.0` whenever the boxes do not overlap, which also covers
/// degenerate boxes and keeps the division well defined.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.left.max(b.left);
    let y1 = a.top.max(b.top);
    let x2 = a.right().min(b.right());
    let y2 = a.bottom().min(b.bottom());

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if intersection <= 0.0 {
        return 0.0;
    }

    let union = a.area() + b.area() - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    (intersection / union).clamp(0.0, 1.0)
}

/// Whether the center of `inner` lies inside `outer`, edges included.
pub fn contains_center(outer: &BoundingBox, inner: &BoundingBox) -> bool {
    let (cx, cy) = inner.center();
    outer.left <= cx && cx <= outer.right() && outer.top <= cy && cy <= outer.bottom()
}
