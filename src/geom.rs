//! Primitive geometry shared across the pipeline: affine transforms,
//! sizes, rectangles and viewBox-to-viewport mapping.

use svgtypes::{Align, AspectRatio};

/// A 2D affine transform, laid out like the SVG `matrix(a b c d e f)`.
///
/// A point maps as `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self::from_row(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn from_row(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn from_translate(tx: f64, ty: f64) -> Self {
        Self::from_row(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn from_scale(sx: f64, sy: f64) -> Self {
        Self::from_row(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn from_rotate(degrees: f64) -> Self {
        let r = degrees.to_radians();
        Self::from_row(r.cos(), r.sin(), -r.sin(), r.cos(), 0.0, 0.0)
    }

    pub fn from_skew_x(degrees: f64) -> Self {
        Self::from_row(1.0, 0.0, degrees.to_radians().tan(), 1.0, 0.0, 0.0)
    }

    pub fn from_skew_y(degrees: f64) -> Self {
        Self::from_row(1.0, degrees.to_radians().tan(), 0.0, 1.0, 0.0, 0.0)
    }

    /// Maps the unit square onto `rect`. Used for `objectBoundingBox`
    /// coordinate spaces.
    pub fn from_bbox(rect: Rect) -> Self {
        Self::from_row(rect.width, 0.0, 0.0, rect.height, rect.x, rect.y)
    }

    /// `self * other`: `other` is applied to points first.
    pub fn pre_concat(&self, other: Transform) -> Transform {
        Transform {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn post_concat(&self, other: Transform) -> Transform {
        other.pre_concat(*self)
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// A transform with a non-finite coefficient or a zero determinant
    /// collapses geometry and is rejected where SVG says to ignore it.
    pub fn is_valid(&self) -> bool {
        let finite = self.a.is_finite()
            && self.b.is_finite()
            && self.c.is_finite()
            && self.d.is_finite()
            && self.e.is_finite()
            && self.f.is_finite();
        finite && self.determinant() != 0.0
    }

    /// True when the transform mirrors orientation (negative determinant).
    /// Arc sweep flags flip under such transforms.
    pub fn flips_handedness(&self) -> bool {
        self.determinant() < 0.0
    }

    pub fn to_affine(&self) -> kurbo::Affine {
        kurbo::Affine::new([self.a, self.b, self.c, self.d, self.e, self.f])
    }

    /// Maps a rectangle and returns the axis-aligned bounds of the result.
    pub fn map_rect(&self, rect: Rect) -> Rect {
        let corners = [
            self.apply(rect.x, rect.y),
            self.apply(rect.right(), rect.y),
            self.apply(rect.right(), rect.bottom()),
            self.apply(rect.x, rect.bottom()),
        ];
        let mut min_x = corners[0].0;
        let mut min_y = corners[0].1;
        let mut max_x = min_x;
        let mut max_y = min_y;
        for &(x, y) in &corners[1..] {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

impl From<svgtypes::Transform> for Transform {
    fn from(ts: svgtypes::Transform) -> Self {
        Self::from_row(ts.a, ts.b, ts.c, ts.d, ts.e, ts.f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn expand_to_include(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }
}

/// A `viewBox` paired with its `preserveAspectRatio`.
#[derive(Clone, Copy, Debug)]
pub struct ViewBox {
    pub rect: Rect,
    pub aspect: AspectRatio,
}

/// Computes the transform from viewBox space into a viewport of the given
/// size, honoring alignment and meet/slice.
pub fn view_box_to_transform(view_box: Rect, aspect: AspectRatio, viewport: Size) -> Transform {
    let mut sx = viewport.width / view_box.width;
    let mut sy = viewport.height / view_box.height;

    if aspect.align != Align::None {
        let s = if aspect.slice { sx.max(sy) } else { sx.min(sy) };
        sx = s;
        sy = s;
    }

    let dx = viewport.width - view_box.width * sx;
    let dy = viewport.height - view_box.height * sy;

    let ax = match aspect.align {
        Align::None | Align::XMinYMin | Align::XMinYMid | Align::XMinYMax => 0.0,
        Align::XMidYMin | Align::XMidYMid | Align::XMidYMax => dx / 2.0,
        Align::XMaxYMin | Align::XMaxYMid | Align::XMaxYMax => dx,
    };
    let ay = match aspect.align {
        Align::None | Align::XMinYMin | Align::XMidYMin | Align::XMaxYMin => 0.0,
        Align::XMinYMid | Align::XMidYMid | Align::XMaxYMid => dy / 2.0,
        Align::XMinYMax | Align::XMidYMax | Align::XMaxYMax => dy,
    };

    Transform::from_translate(ax - view_box.x * sx, ay - view_box.y * sy)
        .pre_concat(Transform::from_scale(sx, sy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_order_applies_child_first() {
        let parent = Transform::from_translate(10.0, 0.0);
        let child = Transform::from_scale(2.0, 2.0);
        let abs = parent.pre_concat(child);
        // (1, 1) scales to (2, 2), then translates to (12, 2).
        assert_eq!(abs.apply(1.0, 1.0), (12.0, 2.0));
    }

    #[test]
    fn rotate_ninety_degrees() {
        let ts = Transform::from_rotate(90.0);
        let (x, y) = ts.apply(1.0, 0.0);
        assert!(x.abs() < 1e-9);
        assert!((y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mirror_flips_handedness() {
        assert!(Transform::from_scale(-1.0, 1.0).flips_handedness());
        assert!(!Transform::from_scale(2.0, 3.0).flips_handedness());
        assert!(!Transform::from_rotate(45.0).flips_handedness());
    }

    #[test]
    fn view_box_meet_centers_the_short_axis() {
        let vb = Rect::new(0.0, 0.0, 100.0, 50.0);
        let ts = view_box_to_transform(vb, AspectRatio::default(), Size::new(200.0, 200.0));
        // Uniform scale 2.0, centered vertically: (200 - 50*2) / 2 = 50.
        assert_eq!(ts.a, 2.0);
        assert_eq!(ts.d, 2.0);
        assert_eq!(ts.e, 0.0);
        assert_eq!(ts.f, 50.0);
    }

    #[test]
    fn view_box_none_stretches() {
        let vb = Rect::new(0.0, 0.0, 100.0, 50.0);
        let aspect = AspectRatio {
            defer: false,
            align: Align::None,
            slice: false,
        };
        let ts = view_box_to_transform(vb, aspect, Size::new(200.0, 200.0));
        assert_eq!(ts.a, 2.0);
        assert_eq!(ts.d, 4.0);
    }

    #[test]
    fn view_box_offset_translates_origin() {
        let vb = Rect::new(10.0, 20.0, 100.0, 100.0);
        let ts = view_box_to_transform(vb, AspectRatio::default(), Size::new(100.0, 100.0));
        assert_eq!(ts.apply(10.0, 20.0), (0.0, 0.0));
    }
}
