//! The simplified output tree.
//!
//! Every field is fully resolved: absolute transforms, concrete paints,
//! flattened effect chains, absolutely positioned glyphs. No node holds a
//! reference id, a relative unit, or an inherited-but-pending property.
//! Rendering the tree is a plain walk.

use crate::error::Diagnostic;
use crate::geom::{Rect, Size, Transform};
use crate::path::PathData;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Color { red, green, blue }
    }

    pub const fn black() -> Self {
        Color::new(0, 0, 0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SpreadMethod {
    #[default]
    Pad,
    Reflect,
    Repeat,
}

impl SpreadMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpreadMethod::Pad => "pad",
            SpreadMethod::Reflect => "reflect",
            SpreadMethod::Repeat => "repeat",
        }
    }
}

/// A gradient stop with a clamped offset.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Stop {
    pub offset: f64,
    pub color: Color,
    pub opacity: f64,
}

/// A linear gradient with its stop list merged and its coordinates in user
/// space. `objectBoundingBox` units are baked into `transform` during
/// resolution.
#[derive(Clone, PartialEq, Debug)]
pub struct LinearGradient {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub transform: Transform,
    pub spread_method: SpreadMethod,
    pub stops: Vec<Stop>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct RadialGradient {
    pub cx: f64,
    pub cy: f64,
    pub r: f64,
    pub fx: f64,
    pub fy: f64,
    pub transform: Transform,
    pub spread_method: SpreadMethod,
    pub stops: Vec<Stop>,
}

/// A pattern tile: resolved region, tile transform and a fully converted
/// content subtree.
#[derive(Clone, PartialEq, Debug)]
pub struct Pattern {
    pub rect: Rect,
    pub transform: Transform,
    pub root: Group,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub enum Paint {
    #[default]
    None,
    Color(Color),
    LinearGradient(Box<LinearGradient>),
    RadialGradient(Box<RadialGradient>),
    Pattern(Box<Pattern>),
}

impl Paint {
    pub fn is_none(&self) -> bool {
        matches!(self, Paint::None)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

impl FillRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillRule::NonZero => "nonzero",
            FillRule::EvenOdd => "evenodd",
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Fill {
    pub paint: Paint,
    pub opacity: f64,
    pub rule: FillRule,
}

impl Default for Fill {
    fn default() -> Self {
        Fill {
            paint: Paint::Color(Color::black()),
            opacity: 1.0,
            rule: FillRule::NonZero,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineCap::Butt => "butt",
            LineCap::Round => "round",
            LineCap::Square => "square",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineJoin::Miter => "miter",
            LineJoin::Round => "round",
            LineJoin::Bevel => "bevel",
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Stroke {
    pub paint: Paint,
    pub opacity: f64,
    pub width: f64,
    pub linecap: LineCap,
    pub linejoin: LineJoin,
    pub miterlimit: f64,
    pub dasharray: Option<Vec<f64>>,
    pub dashoffset: f64,
}

impl Default for Stroke {
    fn default() -> Self {
        Stroke {
            paint: Paint::Color(Color::black()),
            opacity: 1.0,
            width: 1.0,
            linecap: LineCap::Butt,
            linejoin: LineJoin::Miter,
            miterlimit: 4.0,
            dasharray: None,
            dashoffset: 0.0,
        }
    }
}

/// A resolved clip. Nested clips chain instead of flattening so the
/// intersection semantics of `clip-path` on a `clipPath` element survive.
/// Each clip shape's `clip-rule` rides in its fill.
#[derive(Clone, PartialEq, Debug)]
pub struct Clip {
    pub transform: Transform,
    pub clip: Option<Box<Clip>>,
    pub paths: Vec<Path>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum MaskType {
    #[default]
    Luminance,
    Alpha,
}

impl MaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaskType::Luminance => "luminance",
            MaskType::Alpha => "alpha",
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Mask {
    pub region: Rect,
    pub kind: MaskType,
    pub mask: Option<Box<Mask>>,
    pub root: Group,
}

/// Input to a filter primitive, resolved to a concrete source. Named
/// `result` wiring becomes an index into the filter's primitive list.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FilterInput {
    SourceGraphic,
    SourceAlpha,
    Result(usize),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Darken,
    Lighten,
}

impl BlendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum CompositeOperator {
    Over,
    In,
    Out,
    Atop,
    Xor,
    Arithmetic { k1: f64, k2: f64, k3: f64, k4: f64 },
}

#[derive(Clone, PartialEq, Debug)]
pub enum ColorMatrixKind {
    Matrix(Vec<f64>),
    Saturate(f64),
    HueRotate(f64),
    LuminanceToAlpha,
}

#[derive(Clone, PartialEq, Debug)]
pub enum FilterPrimitive {
    GaussianBlur {
        input: FilterInput,
        std_dev_x: f64,
        std_dev_y: f64,
    },
    Offset {
        input: FilterInput,
        dx: f64,
        dy: f64,
    },
    Flood {
        color: Color,
        opacity: f64,
    },
    Blend {
        input: FilterInput,
        input2: FilterInput,
        mode: BlendMode,
    },
    Merge {
        inputs: Vec<FilterInput>,
    },
    Composite {
        input: FilterInput,
        input2: FilterInput,
        operator: CompositeOperator,
    },
    ColorMatrix {
        input: FilterInput,
        kind: ColorMatrixKind,
    },
    /// Stand-in for a primitive this pipeline does not evaluate. Keeps the
    /// chain length and wiring intact.
    PassThrough {
        input: FilterInput,
    },
}

/// A filter with its region resolved to user space.
#[derive(Clone, PartialEq, Debug)]
pub struct Filter {
    pub region: Rect,
    pub primitives: Vec<FilterPrimitive>,
}

/// One entry of a node's effect chain, kept in attribute declaration order.
#[derive(Clone, PartialEq, Debug)]
pub enum Effect {
    Clip(Clip),
    Mask(Mask),
    Filter(Filter),
}

/// A container node.
///
/// `transform` is relative to the parent and is what serialization emits;
/// `abs_transform` is the fully composed matrix mapping this group's local
/// space to the output space.
#[derive(Clone, PartialEq, Debug)]
pub struct Group {
    pub transform: Transform,
    pub abs_transform: Transform,
    pub opacity: f64,
    pub effects: Vec<Effect>,
    pub children: Vec<Node>,
}

impl Default for Group {
    fn default() -> Self {
        Group {
            transform: Transform::identity(),
            abs_transform: Transform::identity(),
            opacity: 1.0,
            effects: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl Group {
    /// True when the group changes nothing about how its children render.
    pub fn is_passthrough(&self) -> bool {
        self.transform.is_identity() && self.opacity == 1.0 && self.effects.is_empty()
    }

    /// Union of the children's bounds in this group's coordinate space.
    /// The `objectBoundingBox` basis for effects attached to the group.
    pub fn bounding_box(&self) -> Option<Rect> {
        let mut bounds: Option<Rect> = None;
        for child in &self.children {
            let child_bounds = match child {
                Node::Group(group) => group
                    .bounding_box()
                    .map(|rect| group.transform.map_rect(rect)),
                Node::Path(path) => path.bounding_box(),
                Node::Text(text) => text.bounding_box(),
            };
            if let Some(rect) = child_bounds {
                bounds = Some(match bounds {
                    Some(acc) => acc.expand_to_include(&rect),
                    None => rect,
                });
            }
        }
        bounds
    }
}

/// A shape lowered to canonical path form. The geometry lives in the parent
/// group's coordinate space; an element's own transform rides on the
/// enclosing group.
#[derive(Clone, PartialEq, Debug)]
pub struct Path {
    pub abs_transform: Transform,
    pub data: PathData,
    pub fill: Option<Fill>,
    pub stroke: Option<Stroke>,
}

impl Path {
    pub fn new(data: PathData) -> Self {
        Path {
            abs_transform: Transform::identity(),
            data,
            fill: None,
            stroke: None,
        }
    }

    /// Untransformed geometric bounds, the `objectBoundingBox` basis.
    pub fn bounding_box(&self) -> Option<Rect> {
        self.data.bounding_box()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

impl FontStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontStyle::Normal => "normal",
            FontStyle::Italic => "italic",
            FontStyle::Oblique => "oblique",
        }
    }
}

/// The face a run resolved to, identified by concrete family name rather
/// than the requested fallback list.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FontFace {
    pub family: String,
    pub weight: u16,
    pub style: FontStyle,
}

/// One shaped glyph with its absolute position.
#[derive(Clone, PartialEq, Debug)]
pub struct Glyph {
    pub glyph_id: u16,
    pub text: String,
    pub x: f64,
    pub y: f64,
    /// Rotation around the glyph origin in degrees. Non-zero for glyphs
    /// laid out along a path.
    pub rotate: f64,
    /// Horizontal advance in canonical units.
    pub advance: f64,
}

/// A run of glyphs sharing one face, size and paint.
#[derive(Clone, PartialEq, Debug)]
pub struct GlyphRun {
    pub face: FontFace,
    pub font_size: f64,
    pub fill: Option<Fill>,
    pub stroke: Option<Stroke>,
    pub glyphs: Vec<Glyph>,
}

impl GlyphRun {
    pub fn text(&self) -> String {
        self.glyphs.iter().map(|g| g.text.as_str()).collect()
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Text {
    pub abs_transform: Transform,
    pub runs: Vec<GlyphRun>,
}

impl Text {
    /// Advance-box bounds: each glyph contributes its advance width and an
    /// em of height above the baseline plus a quarter em below. Good enough
    /// for the `objectBoundingBox` basis without loading outlines.
    pub fn bounding_box(&self) -> Option<Rect> {
        let mut bounds: Option<Rect> = None;
        for run in &self.runs {
            for glyph in &run.glyphs {
                let rect = Rect::new(
                    glyph.x,
                    glyph.y - run.font_size,
                    glyph.advance.max(0.0),
                    run.font_size * 1.25,
                );
                bounds = Some(match bounds {
                    Some(acc) => acc.expand_to_include(&rect),
                    None => rect,
                });
            }
        }
        bounds
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Node {
    Group(Group),
    Path(Path),
    Text(Text),
}

/// The resolved document.
#[derive(Clone, Debug)]
pub struct Tree {
    /// Viewport size in canonical units.
    pub size: Size,
    pub root: Group,
    /// Non-fatal anomalies collected while resolving.
    pub diagnostics: Vec<Diagnostic>,
}

impl Tree {
    /// An empty tree of the given size. Degenerate documents resolve to
    /// this rather than an error.
    pub fn empty(size: Size) -> Self {
        Tree {
            size,
            root: Group::default(),
            diagnostics: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fill_is_opaque_black() {
        let fill = Fill::default();
        assert_eq!(fill.paint, Paint::Color(Color::black()));
        assert_eq!(fill.opacity, 1.0);
        assert_eq!(fill.rule, FillRule::NonZero);
    }

    #[test]
    fn default_stroke_matches_user_agent_values() {
        let stroke = Stroke::default();
        assert_eq!(stroke.width, 1.0);
        assert_eq!(stroke.miterlimit, 4.0);
        assert_eq!(stroke.linecap, LineCap::Butt);
    }

    #[test]
    fn passthrough_group_detection() {
        let mut group = Group::default();
        assert!(group.is_passthrough());
        group.opacity = 0.5;
        assert!(!group.is_passthrough());
    }
}
