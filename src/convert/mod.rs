//! The conversion driver: a depth-first walk over the parsed arena that
//! builds the resolved output tree.
//!
//! Each element passes through the same funnel: style derivation, transform
//! resolution, then a tag-specific lowering. Containers go through
//! [`convert_group`], which collects children first so `objectBoundingBox`
//! effects can resolve against real geometry, then either keeps the group
//! or splices the children into the parent when the group changes nothing.

pub mod units;

pub(crate) mod effects;
pub(crate) mod paint;
pub(crate) mod refs;
pub(crate) mod shapes;
pub(crate) mod text;

use std::collections::HashSet;

use crate::config::Config;
use crate::document::{AId, Document, EId, Node};
use crate::error::Diagnostic;
use crate::fonts::FontDatabase;
use crate::geom::{Rect, Size, Transform, ViewBox, view_box_to_transform};
use crate::style::{self, ResolvedStyle};
use crate::tree::{self, Group, Tree};
use units::{Axis, LengthContext};

/// Read-only knobs threaded through the walk. Cheap to copy; `descend`
/// produces the state for one nesting level further down.
#[derive(Clone, Copy)]
pub(crate) struct State<'a> {
    pub config: &'a Config,
    pub fonts: &'a FontDatabase,
    /// Nearest established viewport, the percent basis.
    pub viewport: Size,
    /// Nesting depth across groups, `use` expansion and nested viewports.
    pub depth: u32,
}

impl<'a> State<'a> {
    pub fn lengths(&self, font_size: f64) -> LengthContext {
        LengthContext {
            dpi_render: self.config.dpi_render,
            dpi_units: self.config.dpi_units,
            viewport: self.viewport,
            font_size,
        }
    }

    fn descend(&self) -> State<'a> {
        State {
            depth: self.depth + 1,
            ..*self
        }
    }
}

/// Mutable companion to [`State`]: the diagnostics sink, the id set guarding
/// reference cycles and the per-conversion font face cache.
pub(crate) struct Cache {
    /// Ids on the current resolution path. An id met twice is a cycle.
    pub resolving: HashSet<String>,
    pub diagnostics: Vec<Diagnostic>,
    unsupported: HashSet<String>,
    pub faces: text::FaceCache,
}

impl Cache {
    fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Cache {
            resolving: HashSet::new(),
            diagnostics,
            unsupported: HashSet::new(),
            faces: text::FaceCache::default(),
        }
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Records an unsupported element once per tag name.
    pub fn report_unsupported(&mut self, tag: &str) {
        if self.unsupported.insert(tag.to_string()) {
            self.report(Diagnostic::UnsupportedElement {
                tag: tag.to_string(),
            });
        }
    }

    pub fn invalid_value(&mut self, node: Node, aid: AId, value: &str) {
        self.report(Diagnostic::InvalidDimension {
            tag: node.tag_name().to_string(),
            attribute: aid.as_str().to_string(),
            value: value.to_string(),
        });
    }
}

impl Tree {
    /// Parses and fully resolves a document.
    ///
    /// Only broken XML is an error. Every structural or semantic anomaly
    /// degrades into a [`Diagnostic`] on the returned tree.
    pub fn from_str(
        text: &str,
        config: &Config,
        fonts: &FontDatabase,
    ) -> Result<Tree, crate::error::Error> {
        let (doc, diagnostics) = Document::parse(text, config.max_parse_depth())?;
        Ok(convert_document(&doc, config, fonts, diagnostics))
    }
}

fn convert_document(
    doc: &Document,
    config: &Config,
    fonts: &FontDatabase,
    diagnostics: Vec<Diagnostic>,
) -> Tree {
    let mut cache = Cache::new(diagnostics);

    let svg = match doc.svg_element() {
        Some(node) => node,
        None => {
            if let Some(stray) = doc.root().children().find(|n| n.is_element()) {
                cache.report_unsupported(stray.tag_name());
            }
            let mut tree = Tree::empty(config.default_size);
            tree.diagnostics = cache.diagnostics;
            return tree;
        }
    };

    let (size, view_box) = resolve_svg_size(svg, config, &mut cache);

    let degenerate_view_box = view_box
        .map(|vb| vb.rect.width <= 0.0 || vb.rect.height <= 0.0)
        .unwrap_or(false);
    let hidden = svg.attribute(AId::Display).map(str::trim) == Some("none");
    if !size.is_valid() || degenerate_view_box || hidden {
        let mut tree = Tree::empty(Size::new(size.width.max(0.0), size.height.max(0.0)));
        tree.diagnostics = cache.diagnostics;
        return tree;
    }

    let state = State {
        config,
        fonts,
        viewport: view_box
            .map(|vb| Size::new(vb.rect.width, vb.rect.height))
            .unwrap_or(size),
        depth: 0,
    };

    let initial = ResolvedStyle::initial(&config.font_family, config.font_size);
    let svg_style = initial.derive(svg, state.lengths(initial.font_size), &mut cache.diagnostics);

    let view_box_ts = view_box
        .map(|vb| view_box_to_transform(vb.rect, vb.aspect, size))
        .unwrap_or_default();
    let root_opacity = resolve_opacity(svg, &mut cache);

    let mut root = Group::default();
    if view_box_ts.is_identity() && root_opacity == 1.0 {
        convert_children(svg, &svg_style, &state, &mut cache, &mut root);
    } else {
        // The viewBox mapping becomes an explicit child group so the root
        // itself stays a plain container.
        let mut wrapper = Group {
            transform: view_box_ts,
            abs_transform: view_box_ts,
            opacity: root_opacity,
            ..Group::default()
        };
        convert_children(svg, &svg_style, &state, &mut cache, &mut wrapper);
        if !wrapper.children.is_empty() {
            root.children.push(tree::Node::Group(wrapper));
        }
    }

    Tree {
        size,
        root,
        diagnostics: cache.diagnostics,
    }
}

/// Resolves the root viewport per SVG sizing rules: explicit lengths win,
/// percentages fall back to the viewBox, then to the configured default.
fn resolve_svg_size(svg: Node, config: &Config, cache: &mut Cache) -> (Size, Option<ViewBox>) {
    let view_box_rect = match svg.attribute(AId::ViewBox) {
        Some(text) => match parse_view_box(text) {
            Some(rect) => Some(rect),
            None => {
                cache.invalid_value(svg, AId::ViewBox, text);
                None
            }
        },
        None => None,
    };

    let aspect = match svg.attribute(AId::PreserveAspectRatio) {
        Some(text) => match text.parse::<svgtypes::AspectRatio>() {
            Ok(aspect) => aspect,
            Err(_) => {
                cache.invalid_value(svg, AId::PreserveAspectRatio, text);
                svgtypes::AspectRatio::default()
            }
        },
        None => svgtypes::AspectRatio::default(),
    };

    let ctx = LengthContext {
        dpi_render: config.dpi_render,
        dpi_units: config.dpi_units,
        viewport: config.default_size,
        font_size: config.font_size,
    };

    let mut resolve_dimension = |aid: AId, basis: f64| -> f64 {
        let length = match svg.attribute(aid) {
            Some(text) => match units::parse_length(text) {
                Some(length) => length,
                None => {
                    cache.invalid_value(svg, aid, text);
                    svgtypes::Length::new(100.0, svgtypes::LengthUnit::Percent)
                }
            },
            None => svgtypes::Length::new(100.0, svgtypes::LengthUnit::Percent),
        };
        if length.unit == svgtypes::LengthUnit::Percent {
            basis * length.number / 100.0
        } else {
            let axis = if aid == AId::Width { Axis::X } else { Axis::Y };
            ctx.resolve(length, axis)
        }
    };

    let width_basis = view_box_rect
        .map(|r| r.width)
        .unwrap_or(config.default_size.width);
    let height_basis = view_box_rect
        .map(|r| r.height)
        .unwrap_or(config.default_size.height);
    let width = resolve_dimension(AId::Width, width_basis);
    let height = resolve_dimension(AId::Height, height_basis);

    let view_box = view_box_rect.map(|rect| ViewBox { rect, aspect });
    (Size::new(width, height), view_box)
}

/// Four finite numbers. Unlike the strict svgtypes parser this accepts a
/// zero-sized box, which disables rendering instead of being ignored.
pub(crate) fn parse_view_box(text: &str) -> Option<Rect> {
    let mut numbers = [0.0f64; 4];
    let mut count = 0;
    for token in svgtypes::NumberListParser::from(text) {
        let n = token.ok()?;
        if count == 4 {
            return None;
        }
        numbers[count] = n;
        count += 1;
    }
    if count != 4 || numbers.iter().any(|n| !n.is_finite()) {
        return None;
    }
    Some(Rect::new(numbers[0], numbers[1], numbers[2], numbers[3]))
}

pub(crate) fn convert_children(
    parent: Node,
    inherited: &ResolvedStyle,
    state: &State,
    cache: &mut Cache,
    out: &mut Group,
) {
    for child in parent.children() {
        convert_element(child, inherited, state, cache, out);
    }
}

pub(crate) fn convert_element(
    node: Node,
    inherited: &ResolvedStyle,
    state: &State,
    cache: &mut Cache,
    parent: &mut Group,
) {
    if !node.is_element() {
        return;
    }

    let tag = match node.tag() {
        Some(tag) => tag,
        None => {
            cache.report_unsupported(node.tag_name());
            return;
        }
    };

    if is_definition(tag) {
        return;
    }

    if node.attribute(AId::Display).map(str::trim) == Some("none") {
        return;
    }

    let ctx = state.lengths(inherited.font_size);
    let Some(local_ts) = resolve_transform(node, ctx, cache) else {
        return;
    };

    let style = inherited.derive(node, ctx, &mut cache.diagnostics);

    match tag {
        EId::G => {
            convert_group(node, local_ts, state, cache, parent, &mut |st, cache, g| {
                convert_children(node, &style, st, cache, g);
            });
        }
        EId::Svg => refs::convert_nested_svg(node, &style, local_ts, state, cache, parent),
        EId::Use => refs::convert_use(node, &style, local_ts, state, cache, parent),
        EId::Switch => refs::convert_switch(node, &style, local_ts, state, cache, parent),
        EId::Text => {
            convert_group(node, local_ts, state, cache, parent, &mut |st, cache, g| {
                text::convert(node, &style, st, cache, g);
            });
        }
        _ if is_shape(tag) => {
            let Some(data) = shapes::convert(node, tag, &style, state, cache) else {
                return;
            };
            let mut data = Some(data);
            convert_group(node, local_ts, state, cache, parent, &mut |st, cache, g| {
                if let Some(data) = data.take() {
                    append_shape(node, tag, data, &style, st, cache, g);
                }
            });
        }
        // tspan/textPath only mean something inside a text element.
        _ => {}
    }
}

fn is_shape(tag: EId) -> bool {
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

/// Elements that only render when referenced.
fn is_definition(tag: EId) -> bool {
    matches!(
        tag,
        EId::Defs
            | EId::Symbol
            | EId::LinearGradient
            | EId::RadialGradient
            | EId::Stop
            | EId::Pattern
            | EId::ClipPath
            | EId::Mask
            | EId::Filter
            | EId::FeGaussianBlur
            | EId::FeOffset
            | EId::FeFlood
            | EId::FeBlend
            | EId::FeMerge
            | EId::FeMergeNode
            | EId::FeComposite
            | EId::FeColorMatrix
    )
}

/// Runs `collect` into a fresh group, resolves the group-level properties,
/// then keeps the group only when it changes how the children render.
pub(crate) fn convert_group(
    node: Node,
    local_ts: Transform,
    state: &State,
    cache: &mut Cache,
    parent: &mut Group,
    collect: &mut dyn FnMut(&State, &mut Cache, &mut Group),
) {
    if state.depth >= state.config.max_nesting {
        cache.report(Diagnostic::ResourceLimit {
            tag: node.tag_name().to_string(),
            limit: state.config.max_nesting,
        });
        return;
    }

    let mut group = Group {
        transform: local_ts,
        abs_transform: parent.abs_transform.pre_concat(local_ts),
        opacity: resolve_opacity(node, cache),
        ..Group::default()
    };

    let child_state = state.descend();
    collect(&child_state, cache, &mut group);

    let bbox = group.bounding_box();
    let Some(effects) = effects::resolve(node, bbox, state, cache) else {
        // A clip or mask that resolves to nothing renderable hides the node.
        return;
    };
    group.effects = effects;

    if group.children.is_empty() {
        // A filter can still paint an empty group (feFlood); anything else
        // renders nothing.
        let paints = group
            .effects
            .iter()
            .any(|e| matches!(e, tree::Effect::Filter(_)));
        if !paints {
            return;
        }
    }

    if group.is_passthrough() {
        parent.children.append(&mut group.children);
    } else {
        parent.children.push(tree::Node::Group(group));
    }
}

fn append_shape(
    node: Node,
    tag: EId,
    data: crate::path::PathData,
    style: &ResolvedStyle,
    state: &State,
    cache: &mut Cache,
    parent: &mut Group,
) {
    if !style.visible || !data.is_drawable() {
        return;
    }

    let bbox = data.bounding_box();
    // A line has no interior; its fill never paints.
    let fill = if tag == EId::Line {
        None
    } else {
        paint::resolve_fill(node, style, bbox, state, cache)
    };
    let stroke = paint::resolve_stroke(node, style, bbox, state, cache);

    parent.children.push(tree::Node::Path(tree::Path {
        abs_transform: parent.abs_transform,
        data,
        fill,
        stroke,
    }));
}

/// The element's `transform`, with `transform-origin` folded in. `None`
/// means the element must not render (collapsing matrix).
pub(crate) fn resolve_transform(
    node: Node,
    ctx: LengthContext,
    cache: &mut Cache,
) -> Option<Transform> {
    let mut ts = match node.attribute(AId::Transform) {
        Some(text) => match text.trim().parse::<svgtypes::Transform>() {
            Ok(parsed) => Transform::from(parsed),
            Err(_) => {
                cache.invalid_value(node, AId::Transform, text);
                Transform::identity()
            }
        },
        None => Transform::identity(),
    };

    if let Some(text) = node.attribute(AId::TransformOrigin) {
        match text.trim().parse::<svgtypes::TransformOrigin>() {
            Ok(origin) => {
                let x = ctx.resolve(origin.x_offset, Axis::X);
                let y = ctx.resolve(origin.y_offset, Axis::Y);
                ts = Transform::from_translate(x, y)
                    .pre_concat(ts)
                    .pre_concat(Transform::from_translate(-x, -y));
            }
            Err(_) => cache.invalid_value(node, AId::TransformOrigin, text),
        }
    }

    if ts.is_identity() {
        return Some(ts);
    }
    ts.is_valid().then_some(ts)
}

pub(crate) fn resolve_opacity(node: Node, cache: &mut Cache) -> f64 {
    match style::attribute_with_inherit(node, AId::Opacity) {
        Some(value) => match style::parse_opacity(value) {
            Some(n) => n,
            None => {
                cache.invalid_value(node, AId::Opacity, value);
                1.0
            }
        },
        None => 1.0,
    }
}

/// Style for an element reached by reference rather than traversal (mask
/// and pattern content, clip shapes, gradient stops). Inheritance runs down
/// the element's own ancestor chain, starting from the initial record.
pub(crate) fn resolved_style_for(
    node: Node,
    state: &State,
    cache: &mut Cache,
) -> ResolvedStyle {
    let chain: Vec<Node> = node.ancestors().collect();
    let mut style = ResolvedStyle::initial(&state.config.font_family, state.config.font_size);
    for ancestor in chain.into_iter().rev() {
        style = style.derive(ancestor, state.lengths(style.font_size), &mut cache.diagnostics);
    }
    style.derive(node, state.lengths(style.font_size), &mut cache.diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Color, Node as TreeNode, Paint};

    fn convert(text: &str) -> Tree {
        let config = Config::default();
        let fonts = FontDatabase::new();
        Tree::from_str(text, &config, &fonts).unwrap()
    }

    #[test]
    fn physical_root_size_resolves_to_canonical_pixels() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='10in' height='5in'>\
             <rect width='960' height='480' fill='red'/></svg>",
        );
        assert_eq!(tree.size, Size::new(960.0, 480.0));
        assert_eq!(tree.root.children.len(), 1);
        match &tree.root.children[0] {
            TreeNode::Path(path) => {
                assert!(path.abs_transform.is_identity());
                let fill = path.fill.as_ref().unwrap();
                assert_eq!(fill.paint, Paint::Color(Color::new(255, 0, 0)));
            }
            other => panic!("expected a path, got {other:?}"),
        }
    }

    #[test]
    fn degenerate_view_box_disables_rendering() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 0 100'>\
             <rect width='10' height='10'/></svg>",
        );
        assert!(tree.root.children.is_empty());
        assert_eq!(tree.size.width, 0.0);
    }

    #[test]
    fn missing_size_falls_back_to_view_box() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 30 40'/>",
        );
        assert_eq!(tree.size, Size::new(30.0, 40.0));
    }

    #[test]
    fn missing_size_without_view_box_uses_the_default() {
        let tree = convert("<svg xmlns='http://www.w3.org/2000/svg'/>");
        assert_eq!(tree.size, Size::new(100.0, 100.0));
    }

    #[test]
    fn malformed_dimension_records_a_diagnostic() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='banana' height='10'/>",
        );
        assert!(tree.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::InvalidDimension { attribute, .. } if attribute == "width"
        )));
    }

    #[test]
    fn passthrough_groups_are_spliced_away() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <g><g><rect width='10' height='10'/></g></g></svg>",
        );
        assert_eq!(tree.root.children.len(), 1);
        assert!(matches!(tree.root.children[0], TreeNode::Path(_)));
    }

    #[test]
    fn group_with_opacity_survives() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <g opacity='0.5'><rect width='10' height='10'/></g></svg>",
        );
        match &tree.root.children[0] {
            TreeNode::Group(group) => assert_eq!(group.opacity, 0.5),
            other => panic!("expected a group, got {other:?}"),
        }
    }

    #[test]
    fn element_transform_rides_on_a_group() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <rect width='10' height='10' transform='translate(5 6)'/></svg>",
        );
        match &tree.root.children[0] {
            TreeNode::Group(group) => {
                assert_eq!(group.transform, Transform::from_translate(5.0, 6.0));
                assert_eq!(group.abs_transform, Transform::from_translate(5.0, 6.0));
                assert!(matches!(group.children[0], TreeNode::Path(_)));
            }
            other => panic!("expected a group, got {other:?}"),
        }
    }

    #[test]
    fn view_box_mapping_becomes_an_explicit_group() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='200' height='200' \
             viewBox='0 0 100 100'><rect width='10' height='10'/></svg>",
        );
        match &tree.root.children[0] {
            TreeNode::Group(group) => {
                assert_eq!(group.transform, Transform::from_scale(2.0, 2.0));
            }
            other => panic!("expected a group, got {other:?}"),
        }
    }

    #[test]
    fn unknown_elements_are_reported_once() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='10' height='10'>\
             <widget/><widget/></svg>",
        );
        let count = tree
            .diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::UnsupportedElement { tag } if tag == "widget"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn nesting_past_the_limit_truncates_with_a_diagnostic() {
        let mut text = String::from(
            "<svg xmlns='http://www.w3.org/2000/svg' width='10' height='10'>",
        );
        for _ in 0..30 {
            text.push_str("<g opacity='0.9'>");
        }
        text.push_str("<rect width='1' height='1'/>");
        for _ in 0..30 {
            text.push_str("</g>");
        }
        text.push_str("</svg>");

        let tree = convert(&text);
        assert!(tree
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::ResourceLimit { .. })));
    }

    #[test]
    fn display_none_skips_the_subtree() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <g display='none'><rect width='10' height='10'/></g></svg>",
        );
        assert!(tree.root.children.is_empty());
    }

    #[test]
    fn collapsing_transform_drops_the_element() {
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <rect width='10' height='10' transform='scale(0)'/></svg>",
        );
        assert!(tree.root.children.is_empty());
    }
}
