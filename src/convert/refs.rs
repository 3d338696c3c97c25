//! Reference expansion: `use`, `symbol`, nested `svg` and `switch`.
//!
//! Every expansion materializes a per-use copy under the referencing node.
//! The id of the element being expanded sits in `Cache::resolving` for the
//! duration, so a chain that reaches itself is cut with a diagnostic
//! instead of recursing. Depth stays bounded by the group nesting limit
//! even for non-cyclic chains.

use crate::document::{AId, EId, Node};
use crate::error::Diagnostic;
use crate::geom::{Rect, Size, Transform, view_box_to_transform};
use crate::path::PathData;
use crate::style::ResolvedStyle;
use crate::tree::{self, Clip, Fill, Group};

use super::units::{Axis, LengthContext};
use super::{Cache, State, convert_children, convert_element, parse_view_box, shapes};

pub(crate) fn convert_use(
    node: Node,
    style: &ResolvedStyle,
    local_ts: Transform,
    state: &State,
    cache: &mut Cache,
    parent: &mut Group,
) {
    let Some((target, id)) = resolve_href(node, cache) else {
        return;
    };
    if cache.resolving.contains(id) {
        cache.report(Diagnostic::CyclicReference { id: id.to_string() });
        return;
    }

    let ctx = state.lengths(style.font_size);
    let x = shapes::length_attr(node, AId::X, Axis::X, 0.0, ctx, cache);
    let y = shapes::length_attr(node, AId::Y, Axis::Y, 0.0, ctx, cache);
    let ts = local_ts.pre_concat(Transform::from_translate(x, y));

    let id = id.to_string();
    cache.resolving.insert(id.clone());
    convert_use_target(node, target, style, ts, state, cache, parent);
    cache.resolving.remove(&id);
}

fn convert_use_target(
    use_node: Node,
    target: Node,
    style: &ResolvedStyle,
    ts: Transform,
    state: &State,
    cache: &mut Cache,
    parent: &mut Group,
) {
    match target.tag() {
        Some(EId::Symbol) | Some(EId::Svg) => {
            let ctx = state.lengths(style.font_size);
            let Some(viewport) = use_viewport(use_node, target, ctx, cache) else {
                return;
            };
            let content_style =
                style.derive(target, ctx, &mut cache.diagnostics);
            materialize_viewport(
                use_node,
                target,
                &content_style,
                ts,
                viewport,
                state,
                cache,
                parent,
            );
        }
        _ => {
            super::convert_group(use_node, ts, state, cache, parent, &mut |st, cache, g| {
                convert_element(target, style, st, cache, g);
            });
        }
    }
}

/// A nested `svg` met during the ordinary walk (not through `use`).
pub(crate) fn convert_nested_svg(
    node: Node,
    style: &ResolvedStyle,
    local_ts: Transform,
    state: &State,
    cache: &mut Cache,
    parent: &mut Group,
) {
    let ctx = state.lengths(style.font_size);
    let x = shapes::length_attr(node, AId::X, Axis::X, 0.0, ctx, cache);
    let y = shapes::length_attr(node, AId::Y, Axis::Y, 0.0, ctx, cache);
    let Some(viewport) = own_viewport(node, ctx, cache) else {
        return;
    };

    let ts = local_ts.pre_concat(Transform::from_translate(x, y));
    materialize_viewport(node, node, style, ts, viewport, state, cache, parent);
}

/// The first child whose conditional attributes pass. `requiredFeatures`
/// and `requiredExtensions` never pass when present; `systemLanguage`
/// matches against the configured language list.
pub(crate) fn convert_switch(
    node: Node,
    style: &ResolvedStyle,
    local_ts: Transform,
    state: &State,
    cache: &mut Cache,
    parent: &mut Group,
) {
    let chosen = node
        .children()
        .filter(|child| child.is_element())
        .find(|child| condition_passed(*child, state));
    let Some(chosen) = chosen else {
        return;
    };

    super::convert_group(node, local_ts, state, cache, parent, &mut |st, cache, g| {
        convert_element(chosen, style, st, cache, g);
    });
}

fn condition_passed(node: Node, state: &State) -> bool {
    if node.has_attribute(AId::RequiredFeatures) || node.has_attribute(AId::RequiredExtensions) {
        return false;
    }
    if let Some(languages) = node.attribute(AId::SystemLanguage) {
        return languages
            .split(',')
            .map(str::trim)
            .any(|entry| {
                state
                    .config
                    .languages
                    .iter()
                    .any(|accepted| language_matches(entry, accepted))
            });
    }
    true
}

/// `en` accepts `en` and `en-GB`, never `eng`.
fn language_matches(entry: &str, accepted: &str) -> bool {
    if entry.eq_ignore_ascii_case(accepted) {
        return true;
    }
    entry.len() > accepted.len()
        && entry[..accepted.len()].eq_ignore_ascii_case(accepted)
        && entry.as_bytes()[accepted.len()] == b'-'
}

/// Resolves a plain `#id` reference from `href`, preferring the unprefixed
/// attribute. Absent means the element references nothing; dangling gets a
/// diagnostic.
pub(crate) fn resolve_href<'a>(node: Node<'a>, cache: &mut Cache) -> Option<(Node<'a>, &'a str)> {
    let value = node.attribute(AId::Href)?;
    let Some(id) = parse_local_iri(value) else {
        cache.invalid_value(node, AId::Href, value);
        return None;
    };
    match node.document().element_by_id(id) {
        Some(target) => Some((target, id)),
        None => {
            cache.report(Diagnostic::DanglingReference { id: id.to_string() });
            None
        }
    }
}

pub(crate) fn parse_local_iri(value: &str) -> Option<&str> {
    let id = value.trim().strip_prefix('#')?;
    (!id.is_empty()).then_some(id)
}

/// Viewport size for a `use` pointing at a `symbol` or `svg`: values on the
/// `use` win, then the target's own, then 100%.
fn use_viewport(
    use_node: Node,
    target: Node,
    ctx: LengthContext,
    cache: &mut Cache,
) -> Option<Size> {
    let width = dimension(&[use_node, target], AId::Width, Axis::X, ctx, cache)?;
    let height = dimension(&[use_node, target], AId::Height, Axis::Y, ctx, cache)?;
    let viewport = Size::new(width, height);
    viewport.is_valid().then_some(viewport)
}

fn own_viewport(node: Node, ctx: LengthContext, cache: &mut Cache) -> Option<Size> {
    let width = dimension(&[node], AId::Width, Axis::X, ctx, cache)?;
    let height = dimension(&[node], AId::Height, Axis::Y, ctx, cache)?;
    let viewport = Size::new(width, height);
    viewport.is_valid().then_some(viewport)
}

/// First node in `candidates` carrying the attribute decides. A negative
/// value is an authoring error that disables the viewport.
fn dimension(
    candidates: &[Node],
    aid: AId,
    axis: Axis,
    ctx: LengthContext,
    cache: &mut Cache,
) -> Option<f64> {
    for &node in candidates {
        let Some(text) = node.attribute(aid) else {
            continue;
        };
        let Some(length) = super::units::parse_length(text) else {
            cache.invalid_value(node, aid, text);
            continue;
        };
        let value = ctx.resolve(length, axis);
        if value < 0.0 {
            cache.invalid_value(node, aid, text);
            return None;
        }
        return Some(value);
    }
    let full = svgtypes::Length::new(100.0, svgtypes::LengthUnit::Percent);
    Some(ctx.resolve(full, axis))
}

/// Builds the group structure for a new viewport: an outer group carrying
/// the placement transform, the referencing element's effects and the
/// viewport clip, and, when a viewBox applies, an inner group carrying its
/// mapping. The inner split keeps the clip rectangle in viewport space.
fn materialize_viewport(
    effects_node: Node,
    content_node: Node,
    content_style: &ResolvedStyle,
    ts: Transform,
    viewport: Size,
    state: &State,
    cache: &mut Cache,
    parent: &mut Group,
) {
    if state.depth >= state.config.max_nesting {
        cache.report(Diagnostic::ResourceLimit {
            tag: effects_node.tag_name().to_string(),
            limit: state.config.max_nesting,
        });
        return;
    }

    let view_box = match content_node.attribute(AId::ViewBox) {
        Some(text) => match parse_view_box(text) {
            Some(rect) => Some(rect),
            None => {
                cache.invalid_value(content_node, AId::ViewBox, text);
                None
            }
        },
        None => None,
    };
    if let Some(rect) = view_box {
        if rect.width <= 0.0 || rect.height <= 0.0 {
            // A degenerate viewBox disables the subtree, silently.
            return;
        }
    }
    let aspect = content_node
        .attribute(AId::PreserveAspectRatio)
        .and_then(|text| text.parse::<svgtypes::AspectRatio>().ok())
        .unwrap_or_default();

    let mut group = Group {
        transform: ts,
        abs_transform: parent.abs_transform.pre_concat(ts),
        opacity: super::resolve_opacity(effects_node, cache),
        ..Group::default()
    };

    let child_state = State {
        viewport: view_box
            .map(|rect| Size::new(rect.width, rect.height))
            .unwrap_or(viewport),
        ..state.descend()
    };

    let view_box_ts = view_box
        .map(|rect| view_box_to_transform(rect, aspect, viewport))
        .unwrap_or_default();
    if view_box_ts.is_identity() {
        convert_children(content_node, content_style, &child_state, cache, &mut group);
    } else {
        let mut inner = Group {
            transform: view_box_ts,
            abs_transform: group.abs_transform.pre_concat(view_box_ts),
            ..Group::default()
        };
        convert_children(content_node, content_style, &child_state, cache, &mut inner);
        if !inner.children.is_empty() {
            group.children.push(tree::Node::Group(inner));
        }
    }

    let bbox = group.bounding_box();
    let Some(mut effects) = super::effects::resolve(effects_node, bbox, state, cache) else {
        return;
    };
    // New viewports clip to their bounds.
    effects.push(tree::Effect::Clip(viewport_clip(viewport)));
    group.effects = effects;

    if group.children.is_empty() {
        return;
    }
    parent.children.push(tree::Node::Group(group));
}

fn viewport_clip(viewport: Size) -> Clip {
    let mut data = PathData::new();
    data.push_rect(Rect::new(0.0, 0.0, viewport.width, viewport.height));
    Clip {
        transform: Transform::identity(),
        clip: None,
        paths: vec![tree::Path {
            abs_transform: Transform::identity(),
            data,
            fill: Some(Fill::default()),
            stroke: None,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fonts::FontDatabase;
    use crate::tree::{Effect, Node as TreeNode, Tree};

    fn convert(text: &str) -> Tree {
        let config = Config::default();
        let fonts = FontDatabase::new();
        Tree::from_str(text, &config, &fonts).unwrap()
    }

    #[test]
    fn use_expands_the_target_in_place() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><rect id='box' width='10' height='10'/></defs>\
             <use href='#box' x='5' y='7'/></svg>",
        );
        match &tree.root.children[0] {
            TreeNode::Group(group) => {
                assert_eq!(group.transform, Transform::from_translate(5.0, 7.0));
                assert!(matches!(group.children[0], TreeNode::Path(_)));
            }
            other => panic!("expected a group, got {other:?}"),
        }
    }

    #[test]
    fn use_without_offset_splices_the_target() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><rect id='box' width='10' height='10'/></defs>\
             <use href='#box'/></svg>",
        );
        assert!(matches!(tree.root.children[0], TreeNode::Path(_)));
    }

    #[test]
    fn self_referencing_use_is_cut_with_a_diagnostic() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <g id='loop'><use href='#loop'/></g></svg>",
        );
        assert!(tree
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::CyclicReference { id } if id == "loop")));
    }

    #[test]
    fn mutually_recursive_uses_are_cut() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <g id='a'><use href='#b'/></g>\
             <g id='b'><use href='#a'/></g></svg>",
        );
        assert!(tree
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::CyclicReference { .. })));
    }

    #[test]
    fn dangling_use_reports_and_renders_nothing() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <use href='#missing'/></svg>",
        );
        assert!(tree.root.children.is_empty());
        assert!(tree
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::DanglingReference { id } if id == "missing")));
    }

    #[test]
    fn symbol_establishes_a_clipped_viewport() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <symbol id='sym' viewBox='0 0 10 10'>\
             <rect width='10' height='10'/></symbol>\
             <use href='#sym' width='50' height='50'/></svg>",
        );
        match &tree.root.children[0] {
            TreeNode::Group(group) => {
                assert!(group
                    .effects
                    .iter()
                    .any(|e| matches!(e, Effect::Clip(_))));
                // viewBox 10x10 into a 50x50 viewport.
                match &group.children[0] {
                    TreeNode::Group(inner) => {
                        assert_eq!(inner.transform, Transform::from_scale(5.0, 5.0));
                    }
                    other => panic!("expected inner group, got {other:?}"),
                }
            }
            other => panic!("expected a group, got {other:?}"),
        }
    }

    #[test]
    fn switch_picks_the_first_passing_child() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <switch>\
             <rect requiredFeatures='urn:nope' width='1' height='1'/>\
             <rect systemLanguage='fr' width='2' height='2'/>\
             <rect systemLanguage='en-GB, de' width='3' height='3'/>\
             <rect width='4' height='4'/>\
             </switch></svg>",
        );
        match &tree.root.children[0] {
            TreeNode::Path(path) => {
                let bbox = path.data.bounding_box().unwrap();
                assert_eq!(bbox.width, 3.0);
            }
            other => panic!("expected a path, got {other:?}"),
        }
    }

    #[test]
    fn language_prefix_matching() {
        assert!(language_matches("en", "en"));
        assert!(language_matches("en-GB", "en"));
        assert!(!language_matches("eng", "en"));
        assert!(!language_matches("fr", "en"));
    }

    #[test]
    fn nested_svg_translates_and_clips() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <svg x='10' y='20' width='30' height='30'>\
             <rect width='10' height='10'/></svg></svg>",
        );
        match &tree.root.children[0] {
            TreeNode::Group(group) => {
                assert_eq!(group.transform, Transform::from_translate(10.0, 20.0));
                assert!(group
                    .effects
                    .iter()
                    .any(|e| matches!(e, Effect::Clip(_))));
            }
            other => panic!("expected a group, got {other:?}"),
        }
    }

    #[test]
    fn zero_sized_nested_viewport_renders_nothing() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <svg width='0' height='30'><rect width='10' height='10'/></svg></svg>",
        );
        assert!(tree.root.children.is_empty());
    }
}
