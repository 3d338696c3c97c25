//! Clip, mask and filter resolution.
//!
//! The effect attributes of an element flatten into an ordered chain of
//! self-contained descriptors: clip geometry lowered to paths, mask content
//! converted like any subtree, filter primitives with their `result` wiring
//! turned into indices. `objectBoundingBox` spaces resolve against the
//! referencing element's own bounds and are baked in, so the chain carries
//! no leftover references or relative units.

use std::collections::HashMap;

use crate::document::{AId, AttrName, EId, Node};
use crate::error::Diagnostic;
use crate::geom::{Rect, Transform};
use crate::tree::{
    self, BlendMode, Clip, Color, ColorMatrixKind, CompositeOperator, Effect, Filter, FilterInput,
    FilterPrimitive, Group, Mask, MaskType,
};

use super::units::{Axis, LengthContext};
use super::{Cache, State, convert_children, resolve_transform, resolved_style_for};

/// Resolves the element's effect attributes into a chain, in declaration
/// order. `None` hides the element: a clip or mask that exists but selects
/// nothing keeps everything it is attached to from rendering.
pub(crate) fn resolve(
    node: Node,
    bbox: Option<Rect>,
    state: &State,
    cache: &mut Cache,
) -> Option<Vec<Effect>> {
    let mut effects = Vec::new();
    for attr in node.attributes() {
        let AttrName::Known(aid) = attr.name else {
            continue;
        };
        match aid {
            AId::ClipPath => {
                if let Some(clip) = resolve_clip(node, &attr.value, bbox, state, cache)? {
                    effects.push(Effect::Clip(clip));
                }
            }
            AId::Mask => {
                if let Some(mask) = resolve_mask(node, &attr.value, bbox, state, cache)? {
                    effects.push(Effect::Mask(mask));
                }
            }
            AId::Filter => {
                if let Some(filter) = resolve_filter(node, &attr.value, bbox, state, cache)? {
                    effects.push(Effect::Filter(filter));
                }
            }
            _ => {}
        }
    }
    Some(effects)
}

/// Parses a `url(#id)` value. Quotes around the fragment are tolerated.
fn parse_func_iri(value: &str) -> Option<&str> {
    let inner = value.trim().strip_prefix("url(")?.strip_suffix(')')?;
    let inner = inner.trim().trim_matches(|c| c == '"' || c == '\'');
    let id = inner.strip_prefix('#')?;
    (!id.is_empty()).then_some(id)
}

// Effect resolvers share one shape: the outer `Option` is the hide signal,
// the inner one distinguishes "effect" from "no effect" (none keyword,
// dangling reference, cycle).

fn resolve_clip(
    node: Node,
    value: &str,
    bbox: Option<Rect>,
    state: &State,
    cache: &mut Cache,
) -> Option<Option<Clip>> {
    let value = value.trim();
    if value == "none" {
        return Some(None);
    }
    let Some(id) = parse_func_iri(value) else {
        cache.invalid_value(node, AId::ClipPath, value);
        return Some(None);
    };
    if cache.resolving.contains(id) {
        cache.report(Diagnostic::CyclicReference { id: id.to_string() });
        return Some(None);
    }
    let Some(target) = node.document().element_by_id(id) else {
        cache.report(Diagnostic::DanglingReference { id: id.to_string() });
        return Some(None);
    };
    if target.tag() != Some(EId::ClipPath) {
        cache.report(Diagnostic::DanglingReference { id: id.to_string() });
        return Some(None);
    }

    let id = id.to_string();
    cache.resolving.insert(id.clone());
    let clip = convert_clip(target, bbox, state, cache);
    cache.resolving.remove(&id);

    // An empty clip selects nothing; the referencing element disappears.
    match clip {
        Some(clip) => Some(Some(clip)),
        None => None,
    }
}

fn convert_clip(clip_node: Node, bbox: Option<Rect>, state: &State, cache: &mut Cache) -> Option<Clip> {
    let ctx = state.lengths(state.config.font_size);

    let units_ts = if clip_node.attribute(AId::ClipPathUnits).map(str::trim)
        == Some("objectBoundingBox")
    {
        Transform::from_bbox(bbox?)
    } else {
        Transform::identity()
    };
    // A collapsing transform leaves no visible region.
    let own_ts = resolve_transform(clip_node, ctx, cache)?;
    let transform = units_ts.pre_concat(own_ts);

    // The clip path's own `clip-path` intersects; it stays a chain.
    let nested = match clip_node.attribute(AId::ClipPath) {
        Some(value) => match resolve_clip(clip_node, value, bbox, state, cache) {
            Some(Some(clip)) => Some(Box::new(clip)),
            Some(None) => None,
            None => return None,
        },
        None => None,
    };

    let mut paths = Vec::new();
    for child in clip_node.children() {
        append_clip_shape(child, state, cache, &mut paths);
    }
    if paths.is_empty() {
        return None;
    }

    Some(Clip {
        transform,
        clip: nested,
        paths,
    })
}

/// Lowers one clip child to a path. Child transforms bake into the data;
/// the `clip-rule` rides in the fill record.
fn append_clip_shape(child: Node, state: &State, cache: &mut Cache, paths: &mut Vec<tree::Path>) {
    if !child.is_element() {
        return;
    }
    let Some(tag) = child.tag() else {
        cache.report_unsupported(child.tag_name());
        return;
    };
    if child.attribute(AId::Display).map(str::trim) == Some("none") {
        return;
    }

    let style = resolved_style_for(child, state, cache);
    if !style.visible {
        return;
    }
    let ctx = state.lengths(style.font_size);
    let Some(child_ts) = resolve_transform(child, ctx, cache) else {
        return;
    };

    let (data, ts) = match tag {
        EId::Use => {
            let Some((target, _)) = super::refs::resolve_href(child, cache) else {
                return;
            };
            let Some(target_tag) = target.tag().filter(|t| is_clip_shape(*t)) else {
                if let Some(id) = target.element_id() {
                    cache.report(Diagnostic::DanglingReference { id: id.to_string() });
                }
                return;
            };
            let Some(data) = super::shapes::convert(target, target_tag, &style, state, cache)
            else {
                return;
            };
            let x = super::shapes::length_attr(child, AId::X, Axis::X, 0.0, ctx, cache);
            let y = super::shapes::length_attr(child, AId::Y, Axis::Y, 0.0, ctx, cache);
            let Some(target_ts) = resolve_transform(target, ctx, cache) else {
                return;
            };
            let ts = child_ts
                .pre_concat(Transform::from_translate(x, y))
                .pre_concat(target_ts);
            (data, ts)
        }
        _ if is_clip_shape(tag) => {
            let Some(data) = super::shapes::convert(child, tag, &style, state, cache) else {
                return;
            };
            (data, child_ts)
        }
        // Anything else carries no usable clip geometry.
        _ => return,
    };

    let mut data = data;
    if !ts.is_identity() {
        data.transform(ts);
    }
    if !data.is_drawable() {
        return;
    }

    paths.push(tree::Path {
        abs_transform: Transform::identity(),
        data,
        fill: Some(tree::Fill {
            rule: style.clip_rule,
            ..tree::Fill::default()
        }),
        stroke: None,
    });
}

fn is_clip_shape(tag: EId) -> bool {
    matches!(
        tag,
        EId::Rect
            | EId::Circle
            | EId::Ellipse
            | EId::Line
            | EId::Polyline
            | EId::Polygon
            | EId::Path
    )
}

fn resolve_mask(
    node: Node,
    value: &str,
    bbox: Option<Rect>,
    state: &State,
    cache: &mut Cache,
) -> Option<Option<Mask>> {
    let value = value.trim();
    if value == "none" {
        return Some(None);
    }
    let Some(id) = parse_func_iri(value) else {
        cache.invalid_value(node, AId::Mask, value);
        return Some(None);
    };
    if cache.resolving.contains(id) {
        cache.report(Diagnostic::CyclicReference { id: id.to_string() });
        return Some(None);
    }
    let Some(target) = node.document().element_by_id(id) else {
        cache.report(Diagnostic::DanglingReference { id: id.to_string() });
        return Some(None);
    };
    if target.tag() != Some(EId::Mask) {
        cache.report(Diagnostic::DanglingReference { id: id.to_string() });
        return Some(None);
    }

    let id = id.to_string();
    cache.resolving.insert(id.clone());
    let mask = convert_mask(target, bbox, state, cache);
    cache.resolving.remove(&id);

    // An empty mask is transparent black everywhere.
    match mask {
        Some(mask) => Some(Some(mask)),
        None => None,
    }
}

fn convert_mask(mask_node: Node, bbox: Option<Rect>, state: &State, cache: &mut Cache) -> Option<Mask> {
    let ctx = state.lengths(state.config.font_size);

    let region_obb =
        mask_node.attribute(AId::MaskUnits).map(str::trim) != Some("userSpaceOnUse");
    let region = region_rect(mask_node, region_obb, bbox, ctx, cache)?;
    if !region.is_valid() {
        return None;
    }

    let kind = match mask_node.attribute(AId::MaskType).map(str::trim) {
        Some("alpha") => MaskType::Alpha,
        _ => MaskType::Luminance,
    };

    let nested = match mask_node.attribute(AId::Mask) {
        Some(value) => match resolve_mask(mask_node, value, bbox, state, cache) {
            Some(Some(mask)) => Some(Box::new(mask)),
            Some(None) => None,
            None => return None,
        },
        None => None,
    };

    let content_obb = mask_node.attribute(AId::MaskContentUnits).map(str::trim)
        == Some("objectBoundingBox");
    let content_ts = if content_obb {
        Transform::from_bbox(bbox?)
    } else {
        Transform::identity()
    };

    let style = resolved_style_for(mask_node, state, cache);
    let content_state = state.descend();
    let mut root = Group::default();
    if content_ts.is_identity() {
        convert_children(mask_node, &style, &content_state, cache, &mut root);
    } else {
        let mut inner = Group {
            transform: content_ts,
            abs_transform: content_ts,
            ..Group::default()
        };
        convert_children(mask_node, &style, &content_state, cache, &mut inner);
        if !inner.children.is_empty() {
            root.children.push(tree::Node::Group(inner));
        }
    }
    if root.children.is_empty() {
        return None;
    }

    Some(Mask {
        region,
        kind,
        mask: nested,
        root,
    })
}

fn resolve_filter(
    node: Node,
    value: &str,
    bbox: Option<Rect>,
    state: &State,
    cache: &mut Cache,
) -> Option<Option<Filter>> {
    let value = value.trim();
    if value == "none" {
        return Some(None);
    }
    let Some(id) = parse_func_iri(value) else {
        cache.invalid_value(node, AId::Filter, value);
        return Some(None);
    };
    let Some(target) = node.document().element_by_id(id) else {
        cache.report(Diagnostic::DanglingReference { id: id.to_string() });
        return Some(None);
    };
    if target.tag() != Some(EId::Filter) {
        cache.report(Diagnostic::DanglingReference { id: id.to_string() });
        return Some(None);
    }

    // A filter that resolves but cannot produce output (degenerate region,
    // no primitives) turns its element transparent.
    match convert_filter(target, bbox, state, cache) {
        Some(filter) => Some(Some(filter)),
        None => None,
    }
}

fn convert_filter(
    filter_node: Node,
    bbox: Option<Rect>,
    state: &State,
    cache: &mut Cache,
) -> Option<Filter> {
    let ctx = state.lengths(state.config.font_size);

    let region_obb =
        filter_node.attribute(AId::FilterUnits).map(str::trim) != Some("userSpaceOnUse");
    let region = region_rect(filter_node, region_obb, bbox, ctx, cache)?;
    if !region.is_valid() {
        return None;
    }

    let primitive_obb = filter_node.attribute(AId::PrimitiveUnits).map(str::trim)
        == Some("objectBoundingBox");
    let primitive_scale = if primitive_obb {
        let bbox = bbox.filter(|b| b.is_valid())?;
        (bbox.width, bbox.height)
    } else {
        (1.0, 1.0)
    };

    let mut primitives: Vec<FilterPrimitive> = Vec::new();
    let mut results: HashMap<&str, usize> = HashMap::new();

    for child in filter_node.children() {
        if !child.is_element() {
            continue;
        }

        let primitive = match child.tag() {
            Some(EId::FeGaussianBlur) => {
                let (sx, sy) = std_deviation(child, cache);
                FilterPrimitive::GaussianBlur {
                    input: input_of(child, AId::In, &results, &primitives, cache),
                    std_dev_x: sx * primitive_scale.0,
                    std_dev_y: sy * primitive_scale.1,
                }
            }
            Some(EId::FeOffset) => FilterPrimitive::Offset {
                input: input_of(child, AId::In, &results, &primitives, cache),
                dx: number_attr(child, AId::Dx, 0.0, cache) * primitive_scale.0,
                dy: number_attr(child, AId::Dy, 0.0, cache) * primitive_scale.1,
            },
            Some(EId::FeFlood) => {
                let (color, opacity) = flood(child, cache);
                FilterPrimitive::Flood { color, opacity }
            }
            Some(EId::FeBlend) => FilterPrimitive::Blend {
                input: input_of(child, AId::In, &results, &primitives, cache),
                input2: input_of(child, AId::In2, &results, &primitives, cache),
                mode: blend_mode(child, cache),
            },
            Some(EId::FeMerge) => {
                let inputs = child
                    .children()
                    .filter(|n| n.tag() == Some(EId::FeMergeNode))
                    .map(|n| input_of(n, AId::In, &results, &primitives, cache))
                    .collect();
                FilterPrimitive::Merge { inputs }
            }
            Some(EId::FeComposite) => FilterPrimitive::Composite {
                input: input_of(child, AId::In, &results, &primitives, cache),
                input2: input_of(child, AId::In2, &results, &primitives, cache),
                operator: composite_operator(child, cache),
            },
            Some(EId::FeColorMatrix) => FilterPrimitive::ColorMatrix {
                input: input_of(child, AId::In, &results, &primitives, cache),
                kind: color_matrix_kind(child, cache),
            },
            // A primitive this pipeline does not evaluate keeps its place
            // in the chain as a pass-through.
            _ if child.tag_name().starts_with("fe") => {
                cache.report_unsupported(child.tag_name());
                FilterPrimitive::PassThrough {
                    input: input_of(child, AId::In, &results, &primitives, cache),
                }
            }
            _ => continue,
        };

        if let Some(name) = child.attribute(AId::Result) {
            results.insert(name, primitives.len());
        }
        primitives.push(primitive);
    }

    if primitives.is_empty() {
        return None;
    }

    Some(Filter { region, primitives })
}

/// Mask and filter regions share their defaults: -10% to 120% of the
/// basis. `None` only when an `objectBoundingBox` region has no box.
fn region_rect(
    node: Node,
    obb: bool,
    bbox: Option<Rect>,
    ctx: LengthContext,
    cache: &mut Cache,
) -> Option<Rect> {
    let sides = [
        (AId::X, Axis::X, -10.0),
        (AId::Y, Axis::Y, -10.0),
        (AId::Width, Axis::X, 120.0),
        (AId::Height, Axis::Y, 120.0),
    ];
    let mut numbers = [0.0f64; 4];
    for (slot, (aid, axis, default)) in numbers.iter_mut().zip(sides) {
        let length = match node.attribute(aid) {
            Some(text) => match super::units::parse_length(text) {
                Some(length) => length,
                None => {
                    cache.invalid_value(node, aid, text);
                    percent(default)
                }
            },
            None => percent(default),
        };
        *slot = if obb {
            if length.unit == svgtypes::LengthUnit::Percent {
                length.number / 100.0
            } else {
                length.number
            }
        } else {
            ctx.resolve(length, axis)
        };
    }

    if obb {
        let bbox = bbox.filter(|b| b.is_valid())?;
        Some(Rect::new(
            bbox.x + numbers[0] * bbox.width,
            bbox.y + numbers[1] * bbox.height,
            numbers[2] * bbox.width,
            numbers[3] * bbox.height,
        ))
    } else {
        Some(Rect::new(numbers[0], numbers[1], numbers[2], numbers[3]))
    }
}

fn percent(number: f64) -> svgtypes::Length {
    svgtypes::Length::new(number, svgtypes::LengthUnit::Percent)
}

/// Resolves a primitive input. Absent means the previous primitive's
/// output, or the source graphic for the first.
fn input_of(
    node: Node,
    aid: AId,
    results: &HashMap<&str, usize>,
    primitives: &[FilterPrimitive],
    cache: &mut Cache,
) -> FilterInput {
    let fallback = || match primitives.len() {
        0 => FilterInput::SourceGraphic,
        n => FilterInput::Result(n - 1),
    };
    match node.attribute(aid).map(str::trim) {
        None | Some("") => fallback(),
        Some("SourceGraphic") => FilterInput::SourceGraphic,
        Some("SourceAlpha") => FilterInput::SourceAlpha,
        Some(name) => match results.get(name) {
            Some(&index) => FilterInput::Result(index),
            None => {
                cache.invalid_value(node, aid, name);
                fallback()
            }
        },
    }
}

/// `stdDeviation`: one number for both axes or two. Negative or malformed
/// values degrade to zero, which blurs nothing.
fn std_deviation(node: Node, cache: &mut Cache) -> (f64, f64) {
    let Some(text) = node.attribute(AId::StdDeviation) else {
        return (0.0, 0.0);
    };
    let numbers: Vec<f64> = svgtypes::NumberListParser::from(text)
        .filter_map(|n| n.ok())
        .collect();
    let pair = match numbers.as_slice() {
        [x] => (*x, *x),
        [x, y] => (*x, *y),
        _ => {
            cache.invalid_value(node, AId::StdDeviation, text);
            return (0.0, 0.0);
        }
    };
    if pair.0 < 0.0 || pair.1 < 0.0 || !pair.0.is_finite() || !pair.1.is_finite() {
        cache.invalid_value(node, AId::StdDeviation, text);
        return (0.0, 0.0);
    }
    pair
}

fn number_attr(node: Node, aid: AId, default: f64, cache: &mut Cache) -> f64 {
    match node.attribute(aid) {
        Some(text) => match text.trim().parse::<f64>().ok().filter(|n| n.is_finite()) {
            Some(n) => n,
            None => {
                cache.invalid_value(node, aid, text);
                default
            }
        },
        None => default,
    }
}

fn flood(node: Node, cache: &mut Cache) -> (Color, f64) {
    let (color, alpha) = match node.attribute(AId::FloodColor) {
        Some(text) if text.trim() == "currentColor" => node
            .find_attribute(AId::Color)
            .and_then(crate::style::parse_color)
            .unwrap_or((Color::black(), 1.0)),
        Some(text) => match crate::style::parse_color(text) {
            Some(parsed) => parsed,
            None => {
                cache.invalid_value(node, AId::FloodColor, text);
                (Color::black(), 1.0)
            }
        },
        None => (Color::black(), 1.0),
    };
    let opacity = match node.attribute(AId::FloodOpacity) {
        Some(text) => match crate::style::parse_opacity(text) {
            Some(n) => n,
            None => {
                cache.invalid_value(node, AId::FloodOpacity, text);
                1.0
            }
        },
        None => 1.0,
    };
    (color, (opacity * alpha).clamp(0.0, 1.0))
}

fn blend_mode(node: Node, cache: &mut Cache) -> BlendMode {
    match node.attribute(AId::Mode).map(str::trim) {
        None | Some("normal") => BlendMode::Normal,
        Some("multiply") => BlendMode::Multiply,
        Some("screen") => BlendMode::Screen,
        Some("darken") => BlendMode::Darken,
        Some("lighten") => BlendMode::Lighten,
        Some(other) => {
            cache.invalid_value(node, AId::Mode, other);
            BlendMode::Normal
        }
    }
}

fn composite_operator(node: Node, cache: &mut Cache) -> CompositeOperator {
    match node.attribute(AId::Operator).map(str::trim) {
        None | Some("over") => CompositeOperator::Over,
        Some("in") => CompositeOperator::In,
        Some("out") => CompositeOperator::Out,
        Some("atop") => CompositeOperator::Atop,
        Some("xor") => CompositeOperator::Xor,
        Some("arithmetic") => CompositeOperator::Arithmetic {
            k1: number_attr(node, AId::K1, 0.0, cache),
            k2: number_attr(node, AId::K2, 0.0, cache),
            k3: number_attr(node, AId::K3, 0.0, cache),
            k4: number_attr(node, AId::K4, 0.0, cache),
        },
        Some(other) => {
            cache.invalid_value(node, AId::Operator, other);
            CompositeOperator::Over
        }
    }
}

fn color_matrix_kind(node: Node, cache: &mut Cache) -> ColorMatrixKind {
    let values = node.attribute(AId::Values);
    match node.attribute(AId::Type).map(str::trim) {
        None | Some("matrix") => {
            let numbers: Vec<f64> = values
                .map(|text| {
                    svgtypes::NumberListParser::from(text)
                        .filter_map(|n| n.ok())
                        .collect()
                })
                .unwrap_or_default();
            if numbers.is_empty() && values.is_none() {
                return ColorMatrixKind::Matrix(identity_matrix());
            }
            if numbers.len() == 20 {
                ColorMatrixKind::Matrix(numbers)
            } else {
                cache.invalid_value(node, AId::Values, values.unwrap_or_default());
                ColorMatrixKind::Matrix(identity_matrix())
            }
        }
        Some("saturate") => {
            let amount = values
                .and_then(|text| text.trim().parse::<f64>().ok())
                .unwrap_or(1.0);
            ColorMatrixKind::Saturate(amount.clamp(0.0, 1.0))
        }
        Some("hueRotate") => {
            let degrees = values
                .and_then(|text| text.trim().parse::<f64>().ok())
                .unwrap_or(0.0);
            ColorMatrixKind::HueRotate(degrees)
        }
        Some("luminanceToAlpha") => ColorMatrixKind::LuminanceToAlpha,
        Some(other) => {
            cache.invalid_value(node, AId::Type, other);
            ColorMatrixKind::Matrix(identity_matrix())
        }
    }
}

fn identity_matrix() -> Vec<f64> {
    vec![
        1.0, 0.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0, 0.0,
    ]
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

    fn first_group(tree: &Tree) -> &Group {
        match &tree.root.children[0] {
            TreeNode::Group(group) => group,
            other => panic!("expected a group, got {other:?}"),
        }
    }

    #[test]
    fn clip_lowers_shapes_to_paths() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><clipPath id='c'><circle cx='10' cy='10' r='5'/></clipPath></defs>\
             <rect width='40' height='40' clip-path='url(#c)'/></svg>",
        );
        let group = first_group(&tree);
        assert_eq!(group.effects.len(), 1);
        match &group.effects[0] {
            Effect::Clip(clip) => {
                assert!(clip.transform.is_identity());
                assert!(clip.clip.is_none());
                assert_eq!(clip.paths.len(), 1);
                assert!(clip.paths[0].stroke.is_none());
            }
            other => panic!("expected a clip, got {other:?}"),
        }
        // The rect itself sits inside the effect group.
        assert!(matches!(group.children[0], TreeNode::Path(_)));
    }

    #[test]
    fn clip_with_bounding_box_units_bakes_the_box() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><clipPath id='c' clipPathUnits='objectBoundingBox'>\
             <rect width='0.5' height='0.5'/></clipPath></defs>\
             <rect x='10' y='20' width='40' height='80' clip-path='url(#c)'/></svg>",
        );
        let group = first_group(&tree);
        match &group.effects[0] {
            Effect::Clip(clip) => {
                assert_eq!(
                    clip.transform,
                    Transform::from_row(40.0, 0.0, 0.0, 80.0, 10.0, 20.0)
                );
            }
            other => panic!("expected a clip, got {other:?}"),
        }
    }

    #[test]
    fn empty_clip_hides_the_element() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><clipPath id='c'/></defs>\
             <rect width='40' height='40' clip-path='url(#c)'/></svg>",
        );
        assert!(tree.root.children.is_empty());
    }

    #[test]
    fn dangling_clip_reference_renders_unclipped() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <rect width='40' height='40' clip-path='url(#missing)'/></svg>",
        );
        assert!(matches!(tree.root.children[0], TreeNode::Path(_)));
        assert!(tree
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::DanglingReference { id } if id == "missing")));
    }

    #[test]
    fn self_referencing_clip_keeps_its_own_shapes() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><clipPath id='c' clip-path='url(#c)'>\
             <rect width='10' height='10'/></clipPath></defs>\
             <rect width='40' height='40' clip-path='url(#c)'/></svg>",
        );
        let group = first_group(&tree);
        match &group.effects[0] {
            Effect::Clip(clip) => {
                assert!(clip.clip.is_none());
                assert_eq!(clip.paths.len(), 1);
            }
            other => panic!("expected a clip, got {other:?}"),
        }
        assert!(tree
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::CyclicReference { id } if id == "c")));
    }

    #[test]
    fn nested_clips_stay_chained() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs>\
             <clipPath id='outer'><rect width='30' height='30'/></clipPath>\
             <clipPath id='inner' clip-path='url(#outer)'>\
             <circle cx='10' cy='10' r='8'/></clipPath>\
             </defs>\
             <rect width='40' height='40' clip-path='url(#inner)'/></svg>",
        );
        let group = first_group(&tree);
        match &group.effects[0] {
            Effect::Clip(clip) => {
                let nested = clip.clip.as_ref().expect("chained clip");
                assert_eq!(nested.paths.len(), 1);
                assert!(nested.clip.is_none());
            }
            other => panic!("expected a clip, got {other:?}"),
        }
    }

    #[test]
    fn clip_rule_rides_in_the_path_fill() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><clipPath id='c'>\
             <rect width='10' height='10' clip-rule='evenodd'/></clipPath></defs>\
             <rect width='40' height='40' clip-path='url(#c)'/></svg>",
        );
        let group = first_group(&tree);
        match &group.effects[0] {
            Effect::Clip(clip) => {
                let fill = clip.paths[0].fill.as_ref().unwrap();
                assert_eq!(fill.rule, crate::tree::FillRule::EvenOdd);
            }
            other => panic!("expected a clip, got {other:?}"),
        }
    }

    #[test]
    fn mask_region_defaults_around_the_bounding_box() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><mask id='m'><rect width='40' height='40' fill='white'/></mask></defs>\
             <rect x='10' y='10' width='20' height='20' mask='url(#m)'/></svg>",
        );
        let group = first_group(&tree);
        match &group.effects[0] {
            Effect::Mask(mask) => {
                assert_eq!(mask.region, Rect::new(8.0, 8.0, 24.0, 24.0));
                assert_eq!(mask.kind, MaskType::Luminance);
                assert!(mask.mask.is_none());
                assert_eq!(mask.root.children.len(), 1);
            }
            other => panic!("expected a mask, got {other:?}"),
        }
    }

    #[test]
    fn mask_content_units_scale_through_a_wrapper_group() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><mask id='m' maskContentUnits='objectBoundingBox'>\
             <rect width='1' height='1' fill='white'/></mask></defs>\
             <rect x='10' y='10' width='20' height='20' mask='url(#m)'/></svg>",
        );
        let group = first_group(&tree);
        match &group.effects[0] {
            Effect::Mask(mask) => match &mask.root.children[0] {
                TreeNode::Group(inner) => {
                    assert_eq!(
                        inner.transform,
                        Transform::from_row(20.0, 0.0, 0.0, 20.0, 10.0, 10.0)
                    );
                }
                other => panic!("expected a wrapper group, got {other:?}"),
            },
            other => panic!("expected a mask, got {other:?}"),
        }
    }

    #[test]
    fn empty_mask_hides_the_element() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><mask id='m'/></defs>\
             <rect width='40' height='40' mask='url(#m)'/></svg>",
        );
        assert!(tree.root.children.is_empty());
    }

    #[test]
    fn filter_chain_wires_results_to_indices() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><filter id='f' filterUnits='userSpaceOnUse' \
             x='0' y='0' width='100' height='100'>\
             <feGaussianBlur in='SourceAlpha' stdDeviation='2 3' result='blur'/>\
             <feOffset in='blur' dx='4' dy='5'/>\
             <feMerge><feMergeNode in='blur'/><feMergeNode/></feMerge>\
             </filter></defs>\
             <rect width='40' height='40' filter='url(#f)'/></svg>",
        );
        let group = first_group(&tree);
        match &group.effects[0] {
            Effect::Filter(filter) => {
                assert_eq!(filter.region, Rect::new(0.0, 0.0, 100.0, 100.0));
                assert_eq!(filter.primitives.len(), 3);
                assert_eq!(
                    filter.primitives[0],
                    FilterPrimitive::GaussianBlur {
                        input: FilterInput::SourceAlpha,
                        std_dev_x: 2.0,
                        std_dev_y: 3.0,
                    }
                );
                assert_eq!(
                    filter.primitives[1],
                    FilterPrimitive::Offset {
                        input: FilterInput::Result(0),
                        dx: 4.0,
                        dy: 5.0,
                    }
                );
                // The second merge node has no `in`: previous primitive.
                assert_eq!(
                    filter.primitives[2],
                    FilterPrimitive::Merge {
                        inputs: vec![FilterInput::Result(0), FilterInput::Result(1)],
                    }
                );
            }
            other => panic!("expected a filter, got {other:?}"),
        }
    }

    #[test]
    fn unknown_filter_primitive_degrades_to_pass_through() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><filter id='f' filterUnits='userSpaceOnUse' \
             x='0' y='0' width='100' height='100'>\
             <feTurbulence baseFrequency='0.05'/>\
             </filter></defs>\
             <rect width='40' height='40' filter='url(#f)'/></svg>",
        );
        let group = first_group(&tree);
        match &group.effects[0] {
            Effect::Filter(filter) => {
                assert_eq!(
                    filter.primitives[0],
                    FilterPrimitive::PassThrough {
                        input: FilterInput::SourceGraphic,
                    }
                );
            }
            other => panic!("expected a filter, got {other:?}"),
        }
        assert!(tree
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::UnsupportedElement { tag } if tag == "feTurbulence")));
    }

    #[test]
    fn filter_without_primitives_hides_the_element() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><filter id='f'/></defs>\
             <rect width='40' height='40' filter='url(#f)'/></svg>",
        );
        assert!(tree.root.children.is_empty());
    }

    #[test]
    fn flood_and_color_matrix_parse_their_payloads() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><filter id='f' filterUnits='userSpaceOnUse' \
             x='0' y='0' width='100' height='100'>\
             <feFlood flood-color='lime' flood-opacity='0.25'/>\
             <feColorMatrix type='saturate' values='0.4'/>\
             <feComposite operator='arithmetic' k1='1' k2='0.5' k3='0' k4='0.1'/>\
             </filter></defs>\
             <rect width='40' height='40' filter='url(#f)'/></svg>",
        );
        let group = first_group(&tree);
        match &group.effects[0] {
            Effect::Filter(filter) => {
                assert_eq!(
                    filter.primitives[0],
                    FilterPrimitive::Flood {
                        color: Color::new(0, 255, 0),
                        opacity: 0.25,
                    }
                );
                assert_eq!(
                    filter.primitives[1],
                    FilterPrimitive::ColorMatrix {
                        input: FilterInput::Result(0),
                        kind: ColorMatrixKind::Saturate(0.4),
                    }
                );
                assert_eq!(
                    filter.primitives[2],
                    FilterPrimitive::Composite {
                        input: FilterInput::Result(1),
                        input2: FilterInput::Result(1),
                        operator: CompositeOperator::Arithmetic {
                            k1: 1.0,
                            k2: 0.5,
                            k3: 0.0,
                            k4: 0.1,
                        },
                    }
                );
            }
            other => panic!("expected a filter, got {other:?}"),
        }
    }

    #[test]
    fn effects_keep_attribute_declaration_order() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs>\
             <filter id='f' filterUnits='userSpaceOnUse' x='0' y='0' \
             width='100' height='100'><feGaussianBlur stdDeviation='1'/></filter>\
             <clipPath id='c'><rect width='30' height='30'/></clipPath>\
             <mask id='m'><rect width='40' height='40' fill='white'/></mask>\
             </defs>\
             <rect width='40' height='40' filter='url(#f)' mask='url(#m)' \
             clip-path='url(#c)'/></svg>",
        );
        let group = first_group(&tree);
        let kinds: Vec<&str> = group
            .effects
            .iter()
            .map(|e| match e {
                Effect::Clip(_) => "clip",
                Effect::Mask(_) => "mask",
                Effect::Filter(_) => "filter",
            })
            .collect();
        assert_eq!(kinds, vec!["filter", "mask", "clip"]);
    }
}
