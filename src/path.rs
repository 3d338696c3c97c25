//! Canonical path geometry.
//!
//! Every shape and path in the simplified tree lowers to a [`PathData`]: a
//! flat list of absolute segments. Quadratic and shorthand commands are
//! promoted to cubics during parsing. Elliptical arcs either survive as
//! [`PathSegment::ArcTo`] (when arc preservation is on) or are approximated
//! with cubic runs whose deviation stays under [`ARC_TOLERANCE`].

use std::ops::{Deref, DerefMut};

use kurbo::{CubicBez, Line, ParamCurve, ParamCurveArclen, ParamCurveDeriv, Point, Vec2};

use crate::geom::{Rect, Transform};

/// Maximum deviation, in canonical units, of a cubic run approximating an
/// elliptical arc.
pub const ARC_TOLERANCE: f64 = 0.1;

/// An absolute path segment.
///
/// `x_axis_rotation` is stored in degrees, matching the SVG path syntax it
/// came from and will be written back as.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathSegment {
    MoveTo {
        x: f64,
        y: f64,
    },
    LineTo {
        x: f64,
        y: f64,
    },
    CurveTo {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        x: f64,
        y: f64,
    },
    ArcTo {
        rx: f64,
        ry: f64,
        x_axis_rotation: f64,
        large_arc: bool,
        sweep: bool,
        x: f64,
        y: f64,
    },
    ClosePath,
}

/// A list of absolute path segments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathData(pub Vec<PathSegment>);

impl Deref for PathData {
    type Target = Vec<PathSegment>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for PathData {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl PathData {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Parses SVG path data. Consumes segments until the first syntax error
    /// and keeps what was valid, which is how broken paths degrade.
    pub fn from_svg(text: &str, keep_arcs: bool) -> Self {
        let mut path = PathData::new();
        let mut current = (0.0, 0.0);
        let mut subpath_start = (0.0, 0.0);
        let mut last_cubic_ctrl: Option<(f64, f64)> = None;
        let mut last_quad_ctrl: Option<(f64, f64)> = None;

        for token in svgtypes::PathParser::from(text) {
            let seg = match token {
                Ok(seg) => seg,
                Err(_) => break,
            };

            match seg {
                svgtypes::PathSegment::MoveTo { abs, x, y } => {
                    let (x, y) = resolve(abs, current, x, y);
                    path.push_move_to(x, y);
                    current = (x, y);
                    subpath_start = current;
                    last_cubic_ctrl = None;
                    last_quad_ctrl = None;
                }
                svgtypes::PathSegment::LineTo { abs, x, y } => {
                    let (x, y) = resolve(abs, current, x, y);
                    path.push_line_to(x, y);
                    current = (x, y);
                    last_cubic_ctrl = None;
                    last_quad_ctrl = None;
                }
                svgtypes::PathSegment::HorizontalLineTo { abs, x } => {
                    let x = if abs { x } else { current.0 + x };
                    path.push_line_to(x, current.1);
                    current.0 = x;
                    last_cubic_ctrl = None;
                    last_quad_ctrl = None;
                }
                svgtypes::PathSegment::VerticalLineTo { abs, y } => {
                    let y = if abs { y } else { current.1 + y };
                    path.push_line_to(current.0, y);
                    current.1 = y;
                    last_cubic_ctrl = None;
                    last_quad_ctrl = None;
                }
                svgtypes::PathSegment::CurveTo {
                    abs,
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => {
                    let (x1, y1) = resolve(abs, current, x1, y1);
                    let (x2, y2) = resolve(abs, current, x2, y2);
                    let (x, y) = resolve(abs, current, x, y);
                    path.push_curve_to(x1, y1, x2, y2, x, y);
                    current = (x, y);
                    last_cubic_ctrl = Some((x2, y2));
                    last_quad_ctrl = None;
                }
                svgtypes::PathSegment::SmoothCurveTo { abs, x2, y2, x, y } => {
                    // The first control point reflects the previous cubic's
                    // second control point, or collapses onto the current
                    // point when the previous segment was not a cubic.
                    let (x1, y1) = match last_cubic_ctrl {
                        Some((px, py)) => (2.0 * current.0 - px, 2.0 * current.1 - py),
                        None => current,
                    };
                    let (x2, y2) = resolve(abs, current, x2, y2);
                    let (x, y) = resolve(abs, current, x, y);
                    path.push_curve_to(x1, y1, x2, y2, x, y);
                    current = (x, y);
                    last_cubic_ctrl = Some((x2, y2));
                    last_quad_ctrl = None;
                }
                svgtypes::PathSegment::Quadratic { abs, x1, y1, x, y } => {
                    let (x1, y1) = resolve(abs, current, x1, y1);
                    let (x, y) = resolve(abs, current, x, y);
                    path.push_quad_to(current, x1, y1, x, y);
                    current = (x, y);
                    last_quad_ctrl = Some((x1, y1));
                    last_cubic_ctrl = None;
                }
                svgtypes::PathSegment::SmoothQuadratic { abs, x, y } => {
                    let (x1, y1) = match last_quad_ctrl {
                        Some((px, py)) => (2.0 * current.0 - px, 2.0 * current.1 - py),
                        None => current,
                    };
                    let (x, y) = resolve(abs, current, x, y);
                    path.push_quad_to(current, x1, y1, x, y);
                    current = (x, y);
                    last_quad_ctrl = Some((x1, y1));
                    last_cubic_ctrl = None;
                }
                svgtypes::PathSegment::EllipticalArc {
                    abs,
                    rx,
                    ry,
                    x_axis_rotation,
                    large_arc,
                    sweep,
                    x,
                    y,
                } => {
                    let (x, y) = resolve(abs, current, x, y);
                    path.push_arc_to(
                        current,
                        rx,
                        ry,
                        x_axis_rotation,
                        large_arc,
                        sweep,
                        x,
                        y,
                        keep_arcs,
                    );
                    current = (x, y);
                    last_cubic_ctrl = None;
                    last_quad_ctrl = None;
                }
                svgtypes::PathSegment::ClosePath { .. } => {
                    path.push_close_path();
                    current = subpath_start;
                    last_cubic_ctrl = None;
                    last_quad_ctrl = None;
                }
            }
        }

        path
    }

    pub fn push_move_to(&mut self, x: f64, y: f64) {
        self.0.push(PathSegment::MoveTo { x, y });
    }

    pub fn push_line_to(&mut self, x: f64, y: f64) {
        self.0.push(PathSegment::LineTo { x, y });
    }

    pub fn push_curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x: f64, y: f64) {
        self.0.push(PathSegment::CurveTo {
            x1,
            y1,
            x2,
            y2,
            x,
            y,
        });
    }

    /// Promotes a quadratic curve to the equivalent cubic.
    pub fn push_quad_to(&mut self, from: (f64, f64), x1: f64, y1: f64, x: f64, y: f64) {
        fn calc(n1: f64, n2: f64) -> f64 {
            (n1 + n2 * 2.0) / 3.0
        }

        self.push_curve_to(
            calc(from.0, x1),
            calc(from.1, y1),
            calc(x, x1),
            calc(y, y1),
            x,
            y,
        );
    }

    /// Pushes an elliptical arc, either verbatim or lowered to cubics.
    ///
    /// Degenerate arcs (zero radius, coincident endpoints) become a straight
    /// line per SVG arc rules.
    #[allow(clippy::too_many_arguments)]
    pub fn push_arc_to(
        &mut self,
        from: (f64, f64),
        rx: f64,
        ry: f64,
        x_axis_rotation: f64,
        large_arc: bool,
        sweep: bool,
        x: f64,
        y: f64,
        keep_arcs: bool,
    ) {
        match centerpoint_arc(from.0, from.1, rx, ry, x_axis_rotation, large_arc, sweep, x, y) {
            Some(arc) => {
                if keep_arcs {
                    self.0.push(PathSegment::ArcTo {
                        rx: rx.abs(),
                        ry: ry.abs(),
                        x_axis_rotation,
                        large_arc,
                        sweep,
                        x,
                        y,
                    });
                } else {
                    arc.to_cubic_beziers(ARC_TOLERANCE, |p1, p2, p| {
                        self.push_curve_to(p1.x, p1.y, p2.x, p2.y, p.x, p.y);
                    });
                }
            }
            None => self.push_line_to(x, y),
        }
    }

    pub fn push_close_path(&mut self) {
        self.0.push(PathSegment::ClosePath);
    }

    pub fn push_rect(&mut self, rect: Rect) {
        self.0.extend_from_slice(&[
            PathSegment::MoveTo {
                x: rect.x,
                y: rect.y,
            },
            PathSegment::LineTo {
                x: rect.right(),
                y: rect.y,
            },
            PathSegment::LineTo {
                x: rect.right(),
                y: rect.bottom(),
            },
            PathSegment::LineTo {
                x: rect.x,
                y: rect.bottom(),
            },
            PathSegment::ClosePath,
        ]);
    }

    /// A path that cannot produce geometry: fewer than two segments or no
    /// leading MoveTo.
    pub fn is_drawable(&self) -> bool {
        self.0.len() >= 2 && matches!(self.0.first(), Some(PathSegment::MoveTo { .. }))
    }

    /// Applies `ts` to every segment in place.
    ///
    /// Preserved arcs go through the centerpoint parameterization so radii
    /// and x-axis rotation stay exact under any affine; an arc the transform
    /// collapses becomes a line to the mapped endpoint.
    pub fn transform(&mut self, ts: Transform) {
        let mut prev = (0.0, 0.0);
        let mut subpath_start = (0.0, 0.0);

        for seg in self.0.iter_mut() {
            match seg {
                PathSegment::MoveTo { x, y } => {
                    prev = (*x, *y);
                    subpath_start = prev;
                    let (tx, ty) = ts.apply(*x, *y);
                    *x = tx;
                    *y = ty;
                }
                PathSegment::LineTo { x, y } => {
                    prev = (*x, *y);
                    let (tx, ty) = ts.apply(*x, *y);
                    *x = tx;
                    *y = ty;
                }
                PathSegment::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => {
                    prev = (*x, *y);
                    let (t1x, t1y) = ts.apply(*x1, *y1);
                    let (t2x, t2y) = ts.apply(*x2, *y2);
                    let (tx, ty) = ts.apply(*x, *y);
                    *x1 = t1x;
                    *y1 = t1y;
                    *x2 = t2x;
                    *y2 = t2y;
                    *x = tx;
                    *y = ty;
                }
                PathSegment::ArcTo {
                    rx,
                    ry,
                    x_axis_rotation,
                    large_arc,
                    sweep,
                    x,
                    y,
                } => {
                    let end = (*x, *y);
                    match transform_arc(
                        prev,
                        *rx,
                        *ry,
                        *x_axis_rotation,
                        *large_arc,
                        *sweep,
                        end,
                        ts,
                    ) {
                        Some(t) => {
                            *rx = t.rx;
                            *ry = t.ry;
                            *x_axis_rotation = t.x_axis_rotation;
                            *large_arc = t.large_arc;
                            *sweep = t.sweep;
                            *x = t.x;
                            *y = t.y;
                        }
                        None => {
                            let (tx, ty) = ts.apply(end.0, end.1);
                            *seg = PathSegment::LineTo { x: tx, y: ty };
                        }
                    }
                    prev = end;
                }
                PathSegment::ClosePath => {
                    prev = subpath_start;
                }
            }
        }
    }

    /// Tight geometric bounding box. Curve extrema are exact; preserved arcs
    /// are measured through a transient cubic approximation.
    pub fn bounding_box(&self) -> Option<Rect> {
        let mut bbox: Option<Rect> = None;
        let mut include = |r: Rect| {
            bbox = Some(match bbox {
                Some(acc) => acc.expand_to_include(&r),
                None => r,
            });
        };

        let mut prev = (0.0, 0.0);
        let mut subpath_start = (0.0, 0.0);
        for seg in self.0.iter() {
            match *seg {
                PathSegment::MoveTo { x, y } => {
                    include(Rect::new(x, y, 0.0, 0.0));
                    prev = (x, y);
                    subpath_start = prev;
                }
                PathSegment::LineTo { x, y } => {
                    include(Rect::new(x, y, 0.0, 0.0));
                    include(Rect::new(prev.0, prev.1, 0.0, 0.0));
                    prev = (x, y);
                }
                PathSegment::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => {
                    let curve = CubicBez::new(
                        Point::new(prev.0, prev.1),
                        Point::new(x1, y1),
                        Point::new(x2, y2),
                        Point::new(x, y),
                    );
                    include(from_kurbo_rect(kurbo::Shape::bounding_box(&curve)));
                    prev = (x, y);
                }
                PathSegment::ArcTo {
                    rx,
                    ry,
                    x_axis_rotation,
                    large_arc,
                    sweep,
                    x,
                    y,
                } => {
                    if let Some(arc) = centerpoint_arc(
                        prev.0,
                        prev.1,
                        rx,
                        ry,
                        x_axis_rotation,
                        large_arc,
                        sweep,
                        x,
                        y,
                    ) {
                        let mut p0 = Point::new(prev.0, prev.1);
                        arc.to_cubic_beziers(ARC_TOLERANCE, |p1, p2, p| {
                            let curve = CubicBez::new(p0, p1, p2, p);
                            include(from_kurbo_rect(kurbo::Shape::bounding_box(&curve)));
                            p0 = p;
                        });
                    } else {
                        include(Rect::new(x, y, 0.0, 0.0));
                    }
                    prev = (x, y);
                }
                PathSegment::ClosePath => {
                    prev = subpath_start;
                }
            }
        }

        bbox
    }
}

fn resolve(abs: bool, current: (f64, f64), x: f64, y: f64) -> (f64, f64) {
    if abs {
        (x, y)
    } else {
        (current.0 + x, current.1 + y)
    }
}

fn from_kurbo_rect(r: kurbo::Rect) -> Rect {
    Rect::new(r.x0, r.y0, r.x1 - r.x0, r.y1 - r.y0)
}

/// Converts an endpoint-parameterized SVG arc into kurbo's centerpoint form.
/// Returns `None` for degenerate arcs (zero radii or coincident endpoints).
#[allow(clippy::too_many_arguments)]
pub fn centerpoint_arc(
    prev_x: f64,
    prev_y: f64,
    rx: f64,
    ry: f64,
    x_axis_rotation: f64,
    large_arc: bool,
    sweep: bool,
    x: f64,
    y: f64,
) -> Option<kurbo::Arc> {
    let svg_arc = kurbo::SvgArc {
        from: Point::new(prev_x, prev_y),
        to: Point::new(x, y),
        radii: Vec2::new(rx, ry),
        x_rotation: x_axis_rotation.to_radians(),
        large_arc,
        sweep,
    };

    kurbo::Arc::from_svg_arc(&svg_arc)
}

/// Endpoint parameterization of a transformed arc, angles back in degrees.
#[derive(Clone, Copy, Debug)]
pub struct ArcParams {
    pub rx: f64,
    pub ry: f64,
    pub x_axis_rotation: f64,
    pub large_arc: bool,
    pub sweep: bool,
    pub x: f64,
    pub y: f64,
}

/// Maps an arc through an affine transform.
///
/// The arc is converted to centerpoint form, the center and radius vectors
/// are mapped through the transform, and the result converts back to
/// endpoint form. A handedness-flipping transform reverses the sweep
/// direction.
#[allow(clippy::too_many_arguments)]
pub fn transform_arc(
    from: (f64, f64),
    rx: f64,
    ry: f64,
    x_axis_rotation: f64,
    large_arc: bool,
    sweep: bool,
    to: (f64, f64),
    ts: Transform,
) -> Option<ArcParams> {
    let mut arc = centerpoint_arc(
        from.0,
        from.1,
        rx,
        ry,
        x_axis_rotation,
        large_arc,
        sweep,
        to.0,
        to.1,
    )?;

    let (cx, cy) = ts.apply(arc.center.x, arc.center.y);
    let center_t = Vec2::new(cx, cy);

    let xr = arc.x_rotation % (2.0 * std::f64::consts::PI);
    let (sin, cos) = xr.sin_cos();

    // Radius vectors rotated into place, then mapped through the transform.
    let rx_tip = Vec2::new(arc.radii.x * cos, arc.radii.x * sin) + arc.center.to_vec2();
    let ry_tip = Vec2::new(-arc.radii.y * sin, arc.radii.y * cos) + arc.center.to_vec2();

    let (px, py) = ts.apply(rx_tip.x, rx_tip.y);
    let rx_t = Vec2::new(px, py) - center_t;
    let (px, py) = ts.apply(ry_tip.x, ry_tip.y);
    let ry_t = Vec2::new(px, py) - center_t;

    let radii_t = Vec2::new(rx_t.hypot(), ry_t.hypot());
    if radii_t.x == 0.0 || radii_t.y == 0.0 {
        return None;
    }

    let flip = if ts.flips_handedness() { -1.0 } else { 1.0 };

    arc = kurbo::Arc {
        center: center_t.to_point(),
        radii: radii_t,
        start_angle: flip * arc.start_angle,
        sweep_angle: flip * arc.sweep_angle,
        x_rotation: rx_t.atan2(),
    };

    Some(endpoint_params(&arc))
}

/// Converts a centerpoint arc back to SVG endpoint parameterization.
fn endpoint_params(arc: &kurbo::Arc) -> ArcParams {
    let eval = |angle: f64| -> Point {
        let (sin_r, cos_r) = arc.x_rotation.sin_cos();
        let (sin_a, cos_a) = angle.sin_cos();
        let dx = arc.radii.x * cos_a;
        let dy = arc.radii.y * sin_a;
        Point::new(
            arc.center.x + dx * cos_r - dy * sin_r,
            arc.center.y + dx * sin_r + dy * cos_r,
        )
    };

    let end = eval(arc.start_angle + arc.sweep_angle);

    ArcParams {
        rx: arc.radii.x,
        ry: arc.radii.y,
        x_axis_rotation: arc.x_rotation.to_degrees(),
        large_arc: arc.sweep_angle.abs() > std::f64::consts::PI,
        sweep: arc.sweep_angle > 0.0,
        x: end.x,
        y: end.y,
    }
}

enum FlatSegment {
    Line(Line),
    Cubic(CubicBez),
}

impl FlatSegment {
    fn arclen(&self) -> f64 {
        match self {
            FlatSegment::Line(line) => line.arclen(0.1),
            FlatSegment::Cubic(curve) => curve.arclen(0.1),
        }
    }

    fn eval(&self, t: f64) -> Point {
        match self {
            FlatSegment::Line(line) => line.eval(t),
            FlatSegment::Cubic(curve) => curve.eval(t),
        }
    }

    fn tangent(&self, t: f64) -> Vec2 {
        match self {
            FlatSegment::Line(line) => line.p1 - line.p0,
            FlatSegment::Cubic(curve) => curve.deriv().eval(t).to_vec2(),
        }
    }

    fn sub_arclen(&self, t: f64) -> f64 {
        match self {
            FlatSegment::Line(line) => line.subsegment(0.0..t).arclen(0.1),
            FlatSegment::Cubic(curve) => curve.subsegment(0.0..t).arclen(0.1),
        }
    }
}

/// Arc-length addressable view of a path, used for text-on-path placement.
pub struct PathSampler {
    segments: Vec<FlatSegment>,
    cumulative: Vec<f64>,
    total: f64,
}

impl PathSampler {
    pub fn new(path: &PathData) -> Self {
        let mut segments = Vec::new();
        let mut prev = Point::ZERO;
        let mut subpath_start = Point::ZERO;

        for seg in path.iter() {
            match *seg {
                PathSegment::MoveTo { x, y } => {
                    prev = Point::new(x, y);
                    subpath_start = prev;
                }
                PathSegment::LineTo { x, y } => {
                    let p = Point::new(x, y);
                    segments.push(FlatSegment::Line(Line::new(prev, p)));
                    prev = p;
                }
                PathSegment::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => {
                    let p = Point::new(x, y);
                    segments.push(FlatSegment::Cubic(CubicBez::new(
                        prev,
                        Point::new(x1, y1),
                        Point::new(x2, y2),
                        p,
                    )));
                    prev = p;
                }
                PathSegment::ArcTo {
                    rx,
                    ry,
                    x_axis_rotation,
                    large_arc,
                    sweep,
                    x,
                    y,
                } => {
                    if let Some(arc) = centerpoint_arc(
                        prev.x,
                        prev.y,
                        rx,
                        ry,
                        x_axis_rotation,
                        large_arc,
                        sweep,
                        x,
                        y,
                    ) {
                        let mut p0 = prev;
                        arc.to_cubic_beziers(ARC_TOLERANCE, |p1, p2, p| {
                            segments.push(FlatSegment::Cubic(CubicBez::new(p0, p1, p2, p)));
                            p0 = p;
                        });
                        prev = Point::new(x, y);
                    } else {
                        let p = Point::new(x, y);
                        segments.push(FlatSegment::Line(Line::new(prev, p)));
                        prev = p;
                    }
                }
                PathSegment::ClosePath => {
                    if prev != subpath_start {
                        segments.push(FlatSegment::Line(Line::new(prev, subpath_start)));
                    }
                    prev = subpath_start;
                }
            }
        }

        let mut cumulative = Vec::with_capacity(segments.len());
        let mut total = 0.0;
        for seg in &segments {
            total += seg.arclen();
            cumulative.push(total);
        }

        PathSampler {
            segments,
            cumulative,
            total,
        }
    }

    pub fn length(&self) -> f64 {
        self.total
    }

    /// Point and tangent angle (radians) at the given distance from the path
    /// start. `None` when the distance falls outside the path.
    pub fn sample(&self, distance: f64) -> Option<(Point, f64)> {
        if distance < 0.0 || distance > self.total || self.segments.is_empty() {
            return None;
        }

        let idx = self
            .cumulative
            .iter()
            .position(|&end| distance <= end)
            .unwrap_or(self.segments.len() - 1);
        let seg_start = if idx == 0 {
            0.0
        } else {
            self.cumulative[idx - 1]
        };
        let seg = &self.segments[idx];
        let local = distance - seg_start;

        let t = solve_arclen(seg, local);
        let point = seg.eval(t);
        let tangent = seg.tangent(t);
        Some((point, tangent.y.atan2(tangent.x)))
    }
}

/// Bisects for the curve parameter whose prefix arc length matches `target`.
fn solve_arclen(seg: &FlatSegment, target: f64) -> f64 {
    let total = seg.arclen();
    if total <= 0.0 {
        return 0.0;
    }
    if target >= total {
        return 1.0;
    }

    let mut lo = 0.0;
    let mut hi = 1.0;
    for _ in 0..32 {
        let mid = (lo + hi) / 2.0;
        if seg.sub_arclen(mid) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}
