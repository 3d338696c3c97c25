//! Basic shape lowering: every shape element becomes canonical path data.
//!
//! Coordinates resolve through the length context (units, percentages, DPI)
//! before geometry is built, so the emitted segments are plain numbers.
//! Circles, ellipses and rounded rect corners go through the arc machinery
//! and honor the arc preservation policy.

use crate::document::{AId, EId, Node};
use crate::path::PathData;
use crate::style::ResolvedStyle;

use super::units::{Axis, LengthContext};
use super::{Cache, State};

/// Lowers one shape element. `None` means the shape produces no geometry,
/// which is not an error.
pub(crate) fn convert(
    node: Node,
    tag: EId,
    style: &ResolvedStyle,
    state: &State,
    cache: &mut Cache,
) -> Option<PathData> {
    let ctx = state.lengths(style.font_size);
    match tag {
        EId::Rect => convert_rect(node, ctx, state.config.keep_arcs, cache),
        EId::Circle => convert_circle(node, ctx, state.config.keep_arcs, cache),
        EId::Ellipse => convert_ellipse(node, ctx, state.config.keep_arcs, cache),
        EId::Line => convert_line(node, ctx, cache),
        EId::Polyline => convert_poly(node, false, cache),
        EId::Polygon => convert_poly(node, true, cache),
        EId::Path => {
            let text = node.attribute(AId::D)?;
            let data = PathData::from_svg(text, state.config.keep_arcs);
            data.is_drawable().then_some(data)
        }
        _ => None,
    }
}

/// Attribute as a resolved length, with the SVG default when absent and a
/// diagnostic plus the default when malformed.
pub(crate) fn length_attr(
    node: Node,
    aid: AId,
    axis: Axis,
    default: f64,
    ctx: LengthContext,
    cache: &mut Cache,
) -> f64 {
    match node.attribute(aid) {
        Some(text) => match super::units::parse_length(text) {
            Some(length) => ctx.resolve(length, axis),
            None => {
                cache.invalid_value(node, aid, text);
                default
            }
        },
        None => default,
    }
}

fn convert_rect(
    node: Node,
    ctx: LengthContext,
    keep_arcs: bool,
    cache: &mut Cache,
) -> Option<PathData> {
    let x = length_attr(node, AId::X, Axis::X, 0.0, ctx, cache);
    let y = length_attr(node, AId::Y, Axis::Y, 0.0, ctx, cache);
    let width = length_attr(node, AId::Width, Axis::X, 0.0, ctx, cache);
    let height = length_attr(node, AId::Height, Axis::Y, 0.0, ctx, cache);

    if width < 0.0 || height < 0.0 {
        let aid = if width < 0.0 { AId::Width } else { AId::Height };
        cache.invalid_value(node, aid, node.attribute(aid).unwrap_or_default());
        return None;
    }
    if width == 0.0 || height == 0.0 {
        return None;
    }

    // Corner radii: a missing axis borrows the other, negatives are
    // ignored, then both clamp to half the side.
    let rx = length_attr(node, AId::Rx, Axis::X, f64::NAN, ctx, cache);
    let ry = length_attr(node, AId::Ry, Axis::Y, f64::NAN, ctx, cache);
    let (rx, ry) = match (rx.is_nan() || rx < 0.0, ry.is_nan() || ry < 0.0) {
        (true, true) => (0.0, 0.0),
        (true, false) => (ry, ry),
        (false, true) => (rx, rx),
        (false, false) => (rx, ry),
    };
    let rx = rx.min(width / 2.0);
    let ry = ry.min(height / 2.0);

    let mut data = PathData::new();
    if rx == 0.0 || ry == 0.0 {
        data.push_rect(crate::geom::Rect::new(x, y, width, height));
        return Some(data);
    }

    let right = x + width;
    let bottom = y + height;
    data.push_move_to(x + rx, y);
    data.push_line_to(right - rx, y);
    data.push_arc_to(
        (right - rx, y),
        rx,
        ry,
        0.0,
        false,
        true,
        right,
        y + ry,
        keep_arcs,
    );
    data.push_line_to(right, bottom - ry);
    data.push_arc_to(
        (right, bottom - ry),
        rx,
        ry,
        0.0,
        false,
        true,
        right - rx,
        bottom,
        keep_arcs,
    );
    data.push_line_to(x + rx, bottom);
    data.push_arc_to(
        (x + rx, bottom),
        rx,
        ry,
        0.0,
        false,
        true,
        x,
        bottom - ry,
        keep_arcs,
    );
    data.push_line_to(x, y + ry);
    data.push_arc_to((x, y + ry), rx, ry, 0.0, false, true, x + rx, y, keep_arcs);
    data.push_close_path();
    Some(data)
}

fn convert_circle(
    node: Node,
    ctx: LengthContext,
    keep_arcs: bool,
    cache: &mut Cache,
) -> Option<PathData> {
    let cx = length_attr(node, AId::Cx, Axis::X, 0.0, ctx, cache);
    let cy = length_attr(node, AId::Cy, Axis::Y, 0.0, ctx, cache);
    let r = length_attr(node, AId::R, Axis::Diagonal, 0.0, ctx, cache);

    if r < 0.0 {
        cache.invalid_value(node, AId::R, node.attribute(AId::R).unwrap_or_default());
        return None;
    }
    if r == 0.0 {
        return None;
    }

    Some(ellipse_path(cx, cy, r, r, keep_arcs))
}

fn convert_ellipse(
    node: Node,
    ctx: LengthContext,
    keep_arcs: bool,
    cache: &mut Cache,
) -> Option<PathData> {
    let cx = length_attr(node, AId::Cx, Axis::X, 0.0, ctx, cache);
    let cy = length_attr(node, AId::Cy, Axis::Y, 0.0, ctx, cache);
    let rx = length_attr(node, AId::Rx, Axis::X, f64::NAN, ctx, cache);
    let ry = length_attr(node, AId::Ry, Axis::Y, f64::NAN, ctx, cache);

    // `auto` borrows the other radius, like rect corners.
    let (rx, ry) = match (rx.is_nan(), ry.is_nan()) {
        (true, true) => return None,
        (true, false) => (ry, ry),
        (false, true) => (rx, rx),
        (false, false) => (rx, ry),
    };
    if rx < 0.0 || ry < 0.0 {
        let aid = if rx < 0.0 { AId::Rx } else { AId::Ry };
        cache.invalid_value(node, aid, node.attribute(aid).unwrap_or_default());
        return None;
    }
    if rx == 0.0 || ry == 0.0 {
        return None;
    }

    Some(ellipse_path(cx, cy, rx, ry, keep_arcs))
}

/// Two half-turn arcs, positive sweep.
fn ellipse_path(cx: f64, cy: f64, rx: f64, ry: f64, keep_arcs: bool) -> PathData {
    let mut data = PathData::new();
    data.push_move_to(cx + rx, cy);
    data.push_arc_to((cx + rx, cy), rx, ry, 0.0, false, true, cx - rx, cy, keep_arcs);
    data.push_arc_to((cx - rx, cy), rx, ry, 0.0, false, true, cx + rx, cy, keep_arcs);
    data.push_close_path();
    data
}

fn convert_line(node: Node, ctx: LengthContext, cache: &mut Cache) -> Option<PathData> {
    let x1 = length_attr(node, AId::X1, Axis::X, 0.0, ctx, cache);
    let y1 = length_attr(node, AId::Y1, Axis::Y, 0.0, ctx, cache);
    let x2 = length_attr(node, AId::X2, Axis::X, 0.0, ctx, cache);
    let y2 = length_attr(node, AId::Y2, Axis::Y, 0.0, ctx, cache);

    let mut data = PathData::new();
    data.push_move_to(x1, y1);
    data.push_line_to(x2, y2);
    Some(data)
}

/// Shared by polyline and polygon. A broken list keeps its parsed prefix;
/// a trailing odd coordinate is dropped by the parser.
fn convert_poly(node: Node, close: bool, cache: &mut Cache) -> Option<PathData> {
    let text = node.attribute(AId::Points)?;

    let mut points = Vec::new();
    for pair in svgtypes::PointsParser::from(text) {
        points.push(pair);
    }
    if points.len() < 2 {
        cache.invalid_value(node, AId::Points, text);
        return None;
    }

    let mut data = PathData::new();
    let mut iter = points.into_iter();
    if let Some((x, y)) = iter.next() {
        data.push_move_to(x, y);
    }
    for (x, y) in iter {
        data.push_line_to(x, y);
    }
    if close {
        data.push_close_path();
    }
    Some(data)
}
