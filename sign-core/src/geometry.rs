//! Basic geometry shared by the coordinate engine, overlays and layouts.

use serde::{Deserialize, Serialize};

/// A 2D point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Offset by a delta.
    #[must_use]
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// An axis-aligned rectangle.
///
/// The meaning of `y` depends on the space the rectangle lives in: in
/// document space it is measured from the page bottom, in screen space from
/// the top.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// X of the left edge.
    pub x: f64,
    /// Y of the origin edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Far edge along Y.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Origin corner.
    #[must_use]
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Area; zero for degenerate rectangles.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Check if a point is within this rectangle (edges inclusive).
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }

    /// Move by a delta.
    #[must_use]
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Overlap between two rectangles, if any.
    #[must_use]
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right > left && bottom > top).then(|| Rect::new(left, top, right - left, bottom - top))
    }

    /// Distance from a point to the closest point of this rectangle.
    ///
    /// Zero when the point is inside.
    #[must_use]
    pub fn distance_to_point(&self, point: Point) -> f64 {
        let clamped = Point::new(
            point.x.clamp(self.x, self.right().max(self.x)),
            point.y.clamp(self.y, self.bottom().max(self.y)),
        );
        point.distance_to(clamped)
    }

    /// Compare with tolerance.
    #[must_use]
    pub fn approx_eq(&self, other: &Rect, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.width - other.width).abs() <= epsilon
            && (self.height - other.height).abs() <= epsilon
    }
}

/// Unscaled page dimensions in document points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    /// Width in points.
    pub width: f64,
    /// Height in points.
    pub height: f64,
}

impl PageSize {
    /// Create a new page size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Size scaled to screen pixels.
    #[must_use]
    pub fn scaled(&self, scale: f64) -> Self {
        Self::new(self.width * scale, self.height * scale)
    }

    /// The full page as a rectangle at the origin.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// Index of the rectangle closest to `point`.
///
/// Distance is measured to the clamped rectangle, not its center. Ties go to
/// the first rectangle in iteration order.
#[must_use]
pub fn nearest_rect<I>(point: Point, rects: I) -> Option<usize>
where
    I: IntoIterator<Item = Rect>,
{
    let mut best: Option<(usize, f64)> = None;
    for (index, rect) in rects.into_iter().enumerate() {
        let distance = rect.distance_to_point(point);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}
