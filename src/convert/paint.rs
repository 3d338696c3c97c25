//! Paint resolution: symbolic style paints into concrete, self-contained
//! tree paints.
//!
//! Gradients and patterns inherit through their `href` chain: the stop
//! list comes whole from the nearest owner (all-or-nothing), geometry and
//! unit attributes fall back individually. `objectBoundingBox` spaces are
//! baked into the paint transform so nothing in the output depends on the
//! referencing shape anymore.

use std::collections::HashSet;

use crate::document::{AId, EId, Node};
use crate::error::Diagnostic;
use crate::geom::{Rect, Size, Transform, view_box_to_transform};
use crate::style::{ResolvedStyle, StylePaint};
use crate::tree::{
    self, Color, Fill, Group, LinearGradient, Paint, Pattern, RadialGradient, SpreadMethod, Stop,
    Stroke,
};

use super::units::{Axis, LengthContext};
use super::{Cache, State, convert_children, parse_view_box, resolved_style_for};

#[derive(Clone, Copy, PartialEq, Eq)]
enum UnitSpace {
    UserSpace,
    ObjectBoundingBox,
}

pub(crate) fn resolve_fill(
    node: Node,
    style: &ResolvedStyle,
    bbox: Option<Rect>,
    state: &State,
    cache: &mut Cache,
) -> Option<Fill> {
    let (paint, alpha) = resolve_style_paint(&style.fill, node, bbox, state, cache)?;
    Some(Fill {
        paint,
        opacity: (style.fill_opacity * alpha).clamp(0.0, 1.0),
        rule: style.fill_rule,
    })
}

pub(crate) fn resolve_stroke(
    node: Node,
    style: &ResolvedStyle,
    bbox: Option<Rect>,
    state: &State,
    cache: &mut Cache,
) -> Option<Stroke> {
    // A zero width stroke paints nothing, whatever its paint says.
    if style.stroke_width <= 0.0 {
        return None;
    }
    let (paint, alpha) = resolve_style_paint(&style.stroke, node, bbox, state, cache)?;
    Some(Stroke {
        paint,
        opacity: (style.stroke_opacity * alpha).clamp(0.0, 1.0),
        width: style.stroke_width,
        linecap: style.stroke_linecap,
        linejoin: style.stroke_linejoin,
        miterlimit: style.stroke_miterlimit,
        dasharray: style.stroke_dasharray.clone(),
        dashoffset: style.stroke_dashoffset,
    })
}

/// The extra `f64` is an alpha factor a collapsed paint server carries
/// (a degenerate gradient resolving to its last stop, for instance).
fn resolve_style_paint(
    paint: &StylePaint,
    node: Node,
    bbox: Option<Rect>,
    state: &State,
    cache: &mut Cache,
) -> Option<(Paint, f64)> {
    match paint {
        StylePaint::None => None,
        StylePaint::Color { color, alpha } => Some((Paint::Color(*color), *alpha)),
        StylePaint::Link { id, fallback } => {
            match resolve_paint_server(id, node, bbox, state, cache) {
                Some(resolved) => Some(resolved),
                None => match fallback {
                    Some(Some(color)) => Some((Paint::Color(*color), 1.0)),
                    // Explicit `none` fallback, or no fallback at all:
                    // nothing is painted.
                    _ => None,
                },
            }
        }
    }
}

fn resolve_paint_server(
    id: &str,
    node: Node,
    bbox: Option<Rect>,
    state: &State,
    cache: &mut Cache,
) -> Option<(Paint, f64)> {
    if cache.resolving.contains(id) {
        cache.report(Diagnostic::CyclicReference { id: id.to_string() });
        return None;
    }
    let Some(server) = node.document().element_by_id(id) else {
        cache.report(Diagnostic::DanglingReference { id: id.to_string() });
        return None;
    };
    match server.tag() {
        Some(EId::LinearGradient) => convert_linear(server, bbox, state, cache),
        Some(EId::RadialGradient) => convert_radial(server, bbox, state, cache),
        Some(EId::Pattern) => convert_pattern(server, bbox, state, cache),
        _ => {
            cache.report(Diagnostic::DanglingReference { id: id.to_string() });
            None
        }
    }
}

fn convert_linear(
    server: Node,
    bbox: Option<Rect>,
    state: &State,
    cache: &mut Cache,
) -> Option<(Paint, f64)> {
    let chain = collect_chain(server, is_gradient, cache)?;
    let stops = collect_stops(&chain, cache);
    if stops.len() < 2 {
        return None;
    }

    let units = units_of(&chain, AId::GradientUnits, UnitSpace::ObjectBoundingBox);
    let bbox = check_bbox(units, bbox)?;
    let ctx = paint_lengths(state);

    let x1 = paint_length(&chain, AId::X1, Axis::X, percent(0.0), units, ctx, cache);
    let y1 = paint_length(&chain, AId::Y1, Axis::Y, percent(0.0), units, ctx, cache);
    let x2 = paint_length(&chain, AId::X2, Axis::X, percent(100.0), units, ctx, cache);
    let y2 = paint_length(&chain, AId::Y2, Axis::Y, percent(0.0), units, ctx, cache);

    if x1 == x2 && y1 == y2 {
        // Coincident endpoints paint the last stop, flat.
        let last = stops[stops.len() - 1];
        return Some((Paint::Color(last.color), last.opacity));
    }

    let transform = paint_transform(&chain, AId::GradientTransform, units, bbox, cache);
    Some((
        Paint::LinearGradient(Box::new(LinearGradient {
            x1,
            y1,
            x2,
            y2,
            transform,
            spread_method: spread_of(&chain),
            stops,
        })),
        1.0,
    ))
}

fn convert_radial(
    server: Node,
    bbox: Option<Rect>,
    state: &State,
    cache: &mut Cache,
) -> Option<(Paint, f64)> {
    let chain = collect_chain(server, is_gradient, cache)?;
    let stops = collect_stops(&chain, cache);
    if stops.len() < 2 {
        return None;
    }

    let units = units_of(&chain, AId::GradientUnits, UnitSpace::ObjectBoundingBox);
    let bbox = check_bbox(units, bbox)?;
    let ctx = paint_lengths(state);

    let cx = paint_length(&chain, AId::Cx, Axis::X, percent(50.0), units, ctx, cache);
    let cy = paint_length(&chain, AId::Cy, Axis::Y, percent(50.0), units, ctx, cache);
    let r = paint_length(&chain, AId::R, Axis::Diagonal, percent(50.0), units, ctx, cache);
    if r < 0.0 {
        if let Some((value, owner)) = chain_attr(&chain, AId::R) {
            cache.invalid_value(owner, AId::R, value);
        }
        return None;
    }
    if r == 0.0 {
        // Per SVG, a zero radius paints the last stop, flat.
        let last = stops[stops.len() - 1];
        return Some((Paint::Color(last.color), last.opacity));
    }

    // Focal point defaults to the resolved center, not to 50%.
    let fx = match chain_attr(&chain, AId::Fx) {
        Some(_) => paint_length(&chain, AId::Fx, Axis::X, percent(50.0), units, ctx, cache),
        None => cx,
    };
    let fy = match chain_attr(&chain, AId::Fy) {
        Some(_) => paint_length(&chain, AId::Fy, Axis::Y, percent(50.0), units, ctx, cache),
        None => cy,
    };

    let transform = paint_transform(&chain, AId::GradientTransform, units, bbox, cache);
    Some((
        Paint::RadialGradient(Box::new(RadialGradient {
            cx,
            cy,
            r,
            fx,
            fy,
            transform,
            spread_method: spread_of(&chain),
            stops,
        })),
        1.0,
    ))
}

fn convert_pattern(
    server: Node,
    bbox: Option<Rect>,
    state: &State,
    cache: &mut Cache,
) -> Option<(Paint, f64)> {
    let chain = collect_chain(server, |tag| tag == EId::Pattern, cache)?;

    let units = units_of(&chain, AId::PatternUnits, UnitSpace::ObjectBoundingBox);
    let content_units = units_of(&chain, AId::PatternContentUnits, UnitSpace::UserSpace);
    let bbox = check_bbox(units, bbox)?;
    let ctx = paint_lengths(state);

    let x = paint_length(&chain, AId::X, Axis::X, percent(0.0), units, ctx, cache);
    let y = paint_length(&chain, AId::Y, Axis::Y, percent(0.0), units, ctx, cache);
    let width = paint_length(&chain, AId::Width, Axis::X, percent(0.0), units, ctx, cache);
    let height = paint_length(&chain, AId::Height, Axis::Y, percent(0.0), units, ctx, cache);

    let rect = match units {
        UnitSpace::UserSpace => Rect::new(x, y, width, height),
        // Fractions of the bounding box, including the origin.
        UnitSpace::ObjectBoundingBox => Rect::new(
            bbox.x + x * bbox.width,
            bbox.y + y * bbox.height,
            width * bbox.width,
            height * bbox.height,
        ),
    };
    if !rect.is_valid() {
        return None;
    }

    let content = chain
        .iter()
        .copied()
        .find(|n| n.children().any(|c| c.is_element()))?;

    if state.depth >= state.config.max_nesting {
        cache.report(Diagnostic::ResourceLimit {
            tag: server.tag_name().to_string(),
            limit: state.config.max_nesting,
        });
        return None;
    }

    // Tile content space: a viewBox wins over patternContentUnits.
    let view_box = chain_attr(&chain, AId::ViewBox)
        .and_then(|(text, owner)| match parse_view_box(text) {
            Some(rect) => Some(rect),
            None => {
                cache.invalid_value(owner, AId::ViewBox, text);
                None
            }
        })
        .filter(|vb| vb.width > 0.0 && vb.height > 0.0);
    let content_ts = if let Some(vb) = view_box {
        let aspect = chain_attr(&chain, AId::PreserveAspectRatio)
            .and_then(|(text, _)| text.parse::<svgtypes::AspectRatio>().ok())
            .unwrap_or_default();
        view_box_to_transform(vb, aspect, Size::new(rect.width, rect.height))
    } else {
        match content_units {
            UnitSpace::UserSpace => Transform::identity(),
            UnitSpace::ObjectBoundingBox => Transform::from_scale(bbox.width, bbox.height),
        }
    };

    let content_state = State {
        viewport: view_box
            .map(|vb| Size::new(vb.width, vb.height))
            .unwrap_or(state.viewport),
        ..state.descend()
    };
    let content_style = resolved_style_for(content, state, cache);

    let id = server.element_id().unwrap_or_default().to_string();
    cache.resolving.insert(id.clone());
    let mut root = Group::default();
    if content_ts.is_identity() {
        convert_children(content, &content_style, &content_state, cache, &mut root);
    } else {
        let mut inner = Group {
            transform: content_ts,
            abs_transform: content_ts,
            ..Group::default()
        };
        convert_children(content, &content_style, &content_state, cache, &mut inner);
        if !inner.children.is_empty() {
            root.children.push(tree::Node::Group(inner));
        }
    }
    cache.resolving.remove(&id);

    if root.children.is_empty() {
        return None;
    }

    let transform = match chain_attr(&chain, AId::PatternTransform) {
        Some((text, owner)) => parse_transform(text, owner, AId::PatternTransform, cache),
        None => Transform::identity(),
    };

    Some((
        Paint::Pattern(Box::new(Pattern {
            rect,
            transform,
            root,
        })),
        1.0,
    ))
}

fn is_gradient(tag: EId) -> bool {
    matches!(tag, EId::LinearGradient | EId::RadialGradient)
}

/// Walks the `href` chain, most-derived first. `None` means the chain
/// reaches itself; the whole paint fails with a diagnostic.
fn collect_chain<'a>(
    start: Node<'a>,
    accepts: impl Fn(EId) -> bool,
    cache: &mut Cache,
) -> Option<Vec<Node<'a>>> {
    let mut chain = vec![start];
    let mut visited: HashSet<&str> = HashSet::new();
    if let Some(id) = start.element_id() {
        visited.insert(id);
    }

    let mut current = start;
    loop {
        let Some(value) = current.attribute(AId::Href) else {
            break;
        };
        let Some(id) = super::refs::parse_local_iri(value) else {
            cache.invalid_value(current, AId::Href, value);
            break;
        };
        if visited.contains(id) {
            cache.report(Diagnostic::CyclicReference { id: id.to_string() });
            return None;
        }
        let Some(next) = current.document().element_by_id(id) else {
            cache.report(Diagnostic::DanglingReference { id: id.to_string() });
            break;
        };
        if !next.tag().is_some_and(&accepts) {
            cache.report(Diagnostic::DanglingReference { id: id.to_string() });
            break;
        }
        visited.insert(id);
        chain.push(next);
        current = next;
    }
    Some(chain)
}

/// The full stop list of the nearest chain node that has stops at all.
/// Offsets clamp to [0, 1] and never decrease.
fn collect_stops(chain: &[Node], cache: &mut Cache) -> Vec<Stop> {
    let source = chain
        .iter()
        .find(|n| n.children().any(|c| c.tag() == Some(EId::Stop)));
    let Some(source) = source else {
        return Vec::new();
    };

    let mut stops: Vec<Stop> = Vec::new();
    for child in source.children() {
        if child.tag() != Some(EId::Stop) {
            continue;
        }

        let mut offset = match child.attribute(AId::Offset) {
            Some(text) => match super::units::parse_length(text) {
                Some(length) => {
                    if length.unit == svgtypes::LengthUnit::Percent {
                        length.number / 100.0
                    } else {
                        length.number
                    }
                }
                None => {
                    cache.invalid_value(child, AId::Offset, text);
                    0.0
                }
            },
            None => 0.0,
        };
        offset = offset.clamp(0.0, 1.0);
        if let Some(prev) = stops.last() {
            offset = offset.max(prev.offset);
        }

        let (color, alpha) = stop_color(child, cache);
        let opacity = match child.attribute(AId::StopOpacity) {
            Some(text) => match crate::style::parse_opacity(text) {
                Some(n) => n,
                None => {
                    cache.invalid_value(child, AId::StopOpacity, text);
                    1.0
                }
            },
            None => 1.0,
        };

        stops.push(Stop {
            offset,
            color,
            opacity: (opacity * alpha).clamp(0.0, 1.0),
        });
    }
    stops
}

fn stop_color(stop: Node, cache: &mut Cache) -> (Color, f64) {
    let Some(text) = stop.attribute(AId::StopColor) else {
        return (Color::black(), 1.0);
    };
    if text.trim() == "currentColor" {
        let inherited = stop
            .find_attribute(AId::Color)
            .and_then(crate::style::parse_color);
        return inherited.unwrap_or((Color::black(), 1.0));
    }
    match crate::style::parse_color(text) {
        Some(parsed) => parsed,
        None => {
            cache.invalid_value(stop, AId::StopColor, text);
            (Color::black(), 1.0)
        }
    }
}

fn chain_attr<'a>(chain: &[Node<'a>], aid: AId) -> Option<(&'a str, Node<'a>)> {
    chain.iter().find_map(|n| n.attribute(aid).map(|v| (v, *n)))
}

fn units_of(chain: &[Node], aid: AId, default: UnitSpace) -> UnitSpace {
    match chain_attr(chain, aid).map(|(v, _)| v.trim()) {
        Some("userSpaceOnUse") => UnitSpace::UserSpace,
        Some("objectBoundingBox") => UnitSpace::ObjectBoundingBox,
        _ => default,
    }
}

fn spread_of(chain: &[Node]) -> SpreadMethod {
    match chain_attr(chain, AId::SpreadMethod).map(|(v, _)| v.trim()) {
        Some("reflect") => SpreadMethod::Reflect,
        Some("repeat") => SpreadMethod::Repeat,
        _ => SpreadMethod::Pad,
    }
}

/// `objectBoundingBox` paints need a usable box; a shape with no geometry
/// cannot anchor one.
fn check_bbox(units: UnitSpace, bbox: Option<Rect>) -> Option<Rect> {
    match units {
        UnitSpace::UserSpace => Some(bbox.unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0))),
        UnitSpace::ObjectBoundingBox => bbox.filter(|b| b.is_valid()),
    }
}

/// Gradient and pattern lengths resolve against the viewport, with the
/// configured base font size for the rare em-sized stop geometry.
fn paint_lengths(state: &State) -> LengthContext {
    state.lengths(state.config.font_size)
}

fn percent(number: f64) -> svgtypes::Length {
    svgtypes::Length::new(number, svgtypes::LengthUnit::Percent)
}

/// In `objectBoundingBox` space values are fractions (percent divides by
/// 100); in user space they are ordinary lengths.
fn paint_length(
    chain: &[Node],
    aid: AId,
    axis: Axis,
    default: svgtypes::Length,
    units: UnitSpace,
    ctx: LengthContext,
    cache: &mut Cache,
) -> f64 {
    let length = match chain_attr(chain, aid) {
        Some((text, owner)) => match super::units::parse_length(text) {
            Some(length) => length,
            None => {
                cache.invalid_value(owner, aid, text);
                default
            }
        },
        None => default,
    };
    match units {
        UnitSpace::UserSpace => ctx.resolve(length, axis),
        UnitSpace::ObjectBoundingBox => {
            if length.unit == svgtypes::LengthUnit::Percent {
                length.number / 100.0
            } else {
                length.number
            }
        }
    }
}

/// The paint transform with `objectBoundingBox` baked in front, so the
/// coordinates above stay valid without any bbox knowledge downstream.
fn paint_transform(
    chain: &[Node],
    aid: AId,
    units: UnitSpace,
    bbox: Rect,
    cache: &mut Cache,
) -> Transform {
    let own = match chain_attr(chain, aid) {
        Some((text, owner)) => parse_transform(text, owner, aid, cache),
        None => Transform::identity(),
    };
    match units {
        UnitSpace::UserSpace => own,
        UnitSpace::ObjectBoundingBox => Transform::from_bbox(bbox).pre_concat(own),
    }
}

fn parse_transform(text: &str, owner: Node, aid: AId, cache: &mut Cache) -> Transform {
    match text.trim().parse::<svgtypes::Transform>() {
        Ok(parsed) => {
            let ts = Transform::from(parsed);
            if ts.is_identity() || ts.is_valid() {
                ts
            } else {
                cache.invalid_value(owner, aid, text);
                Transform::identity()
            }
        }
        Err(_) => {
            cache.invalid_value(owner, aid, text);
            Transform::identity()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fonts::FontDatabase;
    use crate::tree::{Node as TreeNode, Tree};

    fn convert(text: &str) -> Tree {
        let config = Config::default();
        let fonts = FontDatabase::new();
        Tree::from_str(text, &config, &fonts).unwrap()
    }

    fn first_path(tree: &Tree) -> &crate::tree::Path {
        match &tree.root.children[0] {
            TreeNode::Path(path) => path,
            other => panic!("expected a path, got {other:?}"),
        }
    }

    #[test]
    fn user_space_gradient_resolves_coordinates() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><linearGradient id='g' gradientUnits='userSpaceOnUse' \
             x1='0' y1='0' x2='50%' y2='0'>\
             <stop offset='0' stop-color='red'/>\
             <stop offset='1' stop-color='blue'/>\
             </linearGradient></defs>\
             <rect width='10' height='10' fill='url(#g)'/></svg>",
        );
        let fill = first_path(&tree).fill.as_ref().unwrap();
        match &fill.paint {
            Paint::LinearGradient(gradient) => {
                assert_eq!(gradient.x2, 50.0);
                assert_eq!(gradient.stops.len(), 2);
                assert_eq!(gradient.stops[0].color, Color::new(255, 0, 0));
                assert_eq!(gradient.stops[1].color, Color::new(0, 0, 255));
                assert!(gradient.transform.is_identity());
            }
            other => panic!("expected linear gradient, got {other:?}"),
        }
    }

    #[test]
    fn object_bounding_box_bakes_into_the_transform() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><linearGradient id='g'>\
             <stop offset='0' stop-color='red'/>\
             <stop offset='1' stop-color='blue'/>\
             </linearGradient></defs>\
             <rect x='5' y='10' width='20' height='40' fill='url(#g)'/></svg>",
        );
        let fill = first_path(&tree).fill.as_ref().unwrap();
        match &fill.paint {
            Paint::LinearGradient(gradient) => {
                // Default 0%..100% as fractions, bbox in the transform.
                assert_eq!(gradient.x1, 0.0);
                assert_eq!(gradient.x2, 1.0);
                assert_eq!(
                    gradient.transform,
                    Transform::from_row(20.0, 0.0, 0.0, 40.0, 5.0, 10.0)
                );
            }
            other => panic!("expected linear gradient, got {other:?}"),
        }
    }

    #[test]
    fn stops_inherit_whole_from_the_href_chain() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs>\
             <linearGradient id='base'>\
             <stop offset='0' stop-color='red'/>\
             <stop offset='1' stop-color='blue'/>\
             </linearGradient>\
             <linearGradient id='derived' href='#base' x1='10%' x2='90%'/>\
             </defs>\
             <rect width='10' height='10' fill='url(#derived)'/></svg>",
        );
        let fill = first_path(&tree).fill.as_ref().unwrap();
        match &fill.paint {
            Paint::LinearGradient(gradient) => {
                assert_eq!(gradient.stops.len(), 2);
                assert_eq!(gradient.stops[0].offset, 0.0);
                assert_eq!(gradient.stops[0].color, Color::new(255, 0, 0));
                assert_eq!(gradient.stops[1].offset, 1.0);
                assert_eq!(gradient.stops[1].color, Color::new(0, 0, 255));
                // Own geometry still wins.
                assert!((gradient.x1 - 0.1).abs() < 1e-9);
                assert!((gradient.x2 - 0.9).abs() < 1e-9);
            }
            other => panic!("expected linear gradient, got {other:?}"),
        }
    }

    #[test]
    fn cyclic_gradient_href_fails_the_paint() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs>\
             <linearGradient id='a' href='#b'>\
             <stop offset='0' stop-color='red'/>\
             <stop offset='1' stop-color='blue'/>\
             </linearGradient>\
             <linearGradient id='b' href='#a'/>\
             </defs>\
             <rect width='10' height='10' fill='url(#a)'/></svg>",
        );
        let path = first_path(&tree);
        assert!(path.fill.is_none());
        assert!(tree
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::CyclicReference { .. })));
    }

    #[test]
    fn dangling_paint_reference_uses_the_fallback_color() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <rect width='10' height='10' fill='url(#missing) green'/></svg>",
        );
        let fill = first_path(&tree).fill.as_ref().unwrap();
        assert_eq!(fill.paint, Paint::Color(Color::new(0, 128, 0)));
        assert!(tree
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::DanglingReference { id } if id == "missing")));
    }

    #[test]
    fn single_stop_gradient_paints_nothing() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><linearGradient id='g'>\
             <stop offset='0' stop-color='red'/>\
             </linearGradient></defs>\
             <rect width='10' height='10' fill='url(#g)'/></svg>",
        );
        assert!(first_path(&tree).fill.is_none());
    }

    #[test]
    fn stop_offsets_clamp_and_never_decrease() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><linearGradient id='g' gradientUnits='userSpaceOnUse' x2='10'>\
             <stop offset='0.8' stop-color='red'/>\
             <stop offset='0.2' stop-color='lime'/>\
             <stop offset='180%' stop-color='blue'/>\
             </linearGradient></defs>\
             <rect width='10' height='10' fill='url(#g)'/></svg>",
        );
        let fill = first_path(&tree).fill.as_ref().unwrap();
        match &fill.paint {
            Paint::LinearGradient(gradient) => {
                let offsets: Vec<f64> = gradient.stops.iter().map(|s| s.offset).collect();
                assert_eq!(offsets, vec![0.8, 0.8, 1.0]);
            }
            other => panic!("expected linear gradient, got {other:?}"),
        }
    }

    #[test]
    fn zero_radius_radial_collapses_to_the_last_stop() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><radialGradient id='g' gradientUnits='userSpaceOnUse' r='0'>\
             <stop offset='0' stop-color='red'/>\
             <stop offset='1' stop-color='blue' stop-opacity='0.5'/>\
             </radialGradient></defs>\
             <rect width='10' height='10' fill='url(#g)'/></svg>",
        );
        let fill = first_path(&tree).fill.as_ref().unwrap();
        assert_eq!(fill.paint, Paint::Color(Color::new(0, 0, 255)));
        assert_eq!(fill.opacity, 0.5);
    }

    #[test]
    fn radial_focus_defaults_to_the_center() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><radialGradient id='g' gradientUnits='userSpaceOnUse' \
             cx='30' cy='40' r='10'>\
             <stop offset='0' stop-color='red'/>\
             <stop offset='1' stop-color='blue'/>\
             </radialGradient></defs>\
             <rect width='10' height='10' fill='url(#g)'/></svg>",
        );
        let fill = first_path(&tree).fill.as_ref().unwrap();
        match &fill.paint {
            Paint::RadialGradient(gradient) => {
                assert_eq!(gradient.fx, 30.0);
                assert_eq!(gradient.fy, 40.0);
            }
            other => panic!("expected radial gradient, got {other:?}"),
        }
    }

    #[test]
    fn pattern_resolves_tile_and_content() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><pattern id='p' patternUnits='userSpaceOnUse' \
             width='20' height='20'>\
             <rect width='10' height='10' fill='lime'/>\
             </pattern></defs>\
             <rect width='100' height='100' fill='url(#p)'/></svg>",
        );
        let fill = first_path(&tree).fill.as_ref().unwrap();
        match &fill.paint {
            Paint::Pattern(pattern) => {
                assert_eq!(pattern.rect, Rect::new(0.0, 0.0, 20.0, 20.0));
                assert_eq!(pattern.root.children.len(), 1);
                assert!(matches!(pattern.root.children[0], TreeNode::Path(_)));
            }
            other => panic!("expected pattern, got {other:?}"),
        }
    }

    #[test]
    fn pattern_referencing_itself_is_cut() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><pattern id='p' patternUnits='userSpaceOnUse' \
             width='20' height='20'>\
             <rect width='10' height='10' fill='url(#p)'/>\
             </pattern></defs>\
             <rect width='100' height='100' fill='url(#p)'/></svg>",
        );
        assert!(tree
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::CyclicReference { id } if id == "p")));
    }

    #[test]
    fn gradient_on_stroke_resolves_too() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><linearGradient id='g' gradientUnits='userSpaceOnUse' x2='10'>\
             <stop offset='0' stop-color='red'/>\
             <stop offset='1' stop-color='blue'/>\
             </linearGradient></defs>\
             <rect width='10' height='10' fill='none' stroke='url(#g)' stroke-width='2'/></svg>",
        );
        let path = first_path(&tree);
        assert!(path.fill.is_none());
        let stroke = path.stroke.as_ref().unwrap();
        assert!(matches!(stroke.paint, Paint::LinearGradient(_)));
        assert_eq!(stroke.width, 2.0);
    }
}
