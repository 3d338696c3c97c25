//! Style resolution.
//!
//! The document arena already merged stylesheet rules, presentation
//! attributes and inline `style` into one value per attribute. This stage
//! turns those strings into typed, definite values: a [`ResolvedStyle`] is
//! derived per element from its parent's record, so inheritable properties
//! propagate and absent ones land on their user-agent defaults. Malformed
//! values behave as if absent and leave a diagnostic.

use crate::convert::units::{Axis, LengthContext};
use crate::document::{AId, Node};
use crate::error::Diagnostic;
use crate::tree::{Color, FillRule, LineCap, LineJoin};
pub use crate::tree::FontStyle;

/// A paint value before reference resolution. Links stay symbolic until
/// the owning shape's bounding box is known.
#[derive(Clone, PartialEq, Debug)]
pub enum StylePaint {
    None,
    Color {
        color: Color,
        /// Alpha folded out of the color syntax, multiplied into the
        /// paint opacity later.
        alpha: f64,
    },
    Link {
        id: String,
        /// Outer `None`: no fallback given. `Some(None)`: explicit `none`.
        fallback: Option<Option<Color>>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum FontStretch {
    UltraCondensed,
    ExtraCondensed,
    Condensed,
    SemiCondensed,
    #[default]
    Normal,
    SemiExpanded,
    Expanded,
    ExtraExpanded,
    UltraExpanded,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TextAnchor {
    #[default]
    Start,
    Middle,
    End,
}

/// Flattened property set with every value definite.
#[derive(Clone, PartialEq, Debug)]
pub struct ResolvedStyle {
    pub fill: StylePaint,
    pub fill_opacity: f64,
    pub fill_rule: FillRule,
    pub stroke: StylePaint,
    pub stroke_opacity: f64,
    pub stroke_width: f64,
    pub stroke_linecap: LineCap,
    pub stroke_linejoin: LineJoin,
    pub stroke_miterlimit: f64,
    pub stroke_dasharray: Option<Vec<f64>>,
    pub stroke_dashoffset: f64,
    pub visible: bool,
    pub color: Color,
    pub clip_rule: FillRule,
    pub font_families: Vec<String>,
    pub font_size: f64,
    pub font_style: FontStyle,
    pub font_weight: u16,
    pub font_stretch: FontStretch,
    pub text_anchor: TextAnchor,
    pub letter_spacing: f64,
    pub word_spacing: f64,
}

impl ResolvedStyle {
    /// User-agent defaults, seeded with the configured fallback font.
    pub fn initial(default_family: &str, font_size: f64) -> Self {
        ResolvedStyle {
            fill: StylePaint::Color {
                color: Color::black(),
                alpha: 1.0,
            },
            fill_opacity: 1.0,
            fill_rule: FillRule::NonZero,
            stroke: StylePaint::None,
            stroke_opacity: 1.0,
            stroke_width: 1.0,
            stroke_linecap: LineCap::Butt,
            stroke_linejoin: LineJoin::Miter,
            stroke_miterlimit: 4.0,
            stroke_dasharray: None,
            stroke_dashoffset: 0.0,
            visible: true,
            color: Color::black(),
            clip_rule: FillRule::NonZero,
            font_families: vec![default_family.to_string()],
            font_size,
            font_style: FontStyle::Normal,
            font_weight: 400,
            font_stretch: FontStretch::Normal,
            text_anchor: TextAnchor::Start,
            letter_spacing: 0.0,
            word_spacing: 0.0,
        }
    }

    /// Derives the style record for `node` from this (parent) record.
    /// `ctx.font_size` is ignored; the parent record supplies it.
    pub fn derive(
        &self,
        node: Node<'_>,
        ctx: LengthContext,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> ResolvedStyle {
        let mut style = self.clone();

        // Font size first: em/ex lengths below resolve against it.
        if let Some(size) = self.take(node, AId::FontSize, diagnostics, |value| {
            parse_font_size(value, self.font_size, ctx)
        }) {
            style.font_size = size;
        }
        let ctx = LengthContext {
            font_size: style.font_size,
            ..ctx
        };

        // `color` next: currentColor in paints resolves against it.
        if let Some((color, _)) = self.take(node, AId::Color, diagnostics, parse_color) {
            style.color = color;
        }

        if let Some(paint) = self.take(node, AId::Fill, diagnostics, |value| {
            parse_paint(value, style.color)
        }) {
            style.fill = paint;
        }
        if let Some(paint) = self.take(node, AId::Stroke, diagnostics, |value| {
            parse_paint(value, style.color)
        }) {
            style.stroke = paint;
        }

        if let Some(value) = self.take(node, AId::FillOpacity, diagnostics, parse_opacity) {
            style.fill_opacity = value;
        }
        if let Some(value) = self.take(node, AId::StrokeOpacity, diagnostics, parse_opacity) {
            style.stroke_opacity = value;
        }
        if let Some(value) = self.take(node, AId::StrokeWidth, diagnostics, |value| {
            resolve_positive_length(value, ctx)
        }) {
            style.stroke_width = value;
        }
        if let Some(value) = self.take(node, AId::StrokeMiterlimit, diagnostics, |value| {
            value.trim().parse::<f64>().ok().filter(|n| *n >= 1.0)
        }) {
            style.stroke_miterlimit = value;
        }
        if let Some(value) = self.take(node, AId::StrokeDashoffset, diagnostics, |value| {
            crate::convert::units::parse_length(value).map(|l| ctx.resolve(l, Axis::Diagonal))
        }) {
            style.stroke_dashoffset = value;
        }
        if let Some(value) = self.take(node, AId::StrokeDasharray, diagnostics, |value| {
            parse_dasharray(value, ctx)
        }) {
            style.stroke_dasharray = value;
        }
        if let Some(value) = self.take(node, AId::StrokeLinecap, diagnostics, |value| {
            match value.trim() {
                "butt" => Some(LineCap::Butt),
                "round" => Some(LineCap::Round),
                "square" => Some(LineCap::Square),
                _ => None,
            }
        }) {
            style.stroke_linecap = value;
        }
        if let Some(value) = self.take(node, AId::StrokeLinejoin, diagnostics, |value| {
            match value.trim() {
                "miter" => Some(LineJoin::Miter),
                "round" => Some(LineJoin::Round),
                "bevel" => Some(LineJoin::Bevel),
                _ => None,
            }
        }) {
            style.stroke_linejoin = value;
        }

        if let Some(value) = self.take(node, AId::FillRule, diagnostics, parse_fill_rule) {
            style.fill_rule = value;
        }
        if let Some(value) = self.take(node, AId::ClipRule, diagnostics, parse_fill_rule) {
            style.clip_rule = value;
        }

        if let Some(value) = self.take(node, AId::Visibility, diagnostics, |value| {
            match value.trim() {
                "visible" => Some(true),
                "hidden" | "collapse" => Some(false),
                _ => None,
            }
        }) {
            style.visible = value;
        }

        if let Some(families) = self.take(node, AId::FontFamily, diagnostics, parse_font_families) {
            style.font_families = families;
        }
        if let Some(value) = self.take(node, AId::FontStyle, diagnostics, |value| {
            match value.trim() {
                "normal" => Some(FontStyle::Normal),
                "italic" => Some(FontStyle::Italic),
                "oblique" => Some(FontStyle::Oblique),
                _ => None,
            }
        }) {
            style.font_style = value;
        }
        if let Some(value) = self.take(node, AId::FontWeight, diagnostics, |value| {
            parse_font_weight(value, self.font_weight)
        }) {
            style.font_weight = value;
        }
        if let Some(value) = self.take(node, AId::FontStretch, diagnostics, parse_font_stretch) {
            style.font_stretch = value;
        }
        if let Some(value) = self.take(node, AId::TextAnchor, diagnostics, |value| {
            match value.trim() {
                "start" => Some(TextAnchor::Start),
                "middle" => Some(TextAnchor::Middle),
                "end" => Some(TextAnchor::End),
                _ => None,
            }
        }) {
            style.text_anchor = value;
        }
        if let Some(value) = self.take(node, AId::LetterSpacing, diagnostics, |value| {
            parse_spacing(value, ctx)
        }) {
            style.letter_spacing = value;
        }
        if let Some(value) = self.take(node, AId::WordSpacing, diagnostics, |value| {
            parse_spacing(value, ctx)
        }) {
            style.word_spacing = value;
        }

        style
    }

    /// Reads one attribute through `parse`. `inherit` and absence keep the
    /// parent's value; a failed parse does too, but leaves a diagnostic.
    fn take<T>(
        &self,
        node: Node<'_>,
        aid: AId,
        diagnostics: &mut Vec<Diagnostic>,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> Option<T> {
        let value = node.attribute(aid)?;
        if value.trim() == "inherit" {
            return None;
        }
        match parse(value) {
            Some(parsed) => Some(parsed),
            None => {
                diagnostics.push(Diagnostic::InvalidDimension {
                    tag: node.tag_name().to_string(),
                    attribute: aid.as_str().to_string(),
                    value: value.to_string(),
                });
                None
            }
        }
    }
}

/// Reads an attribute resolving the `inherit` keyword through ancestors.
/// For non-inheritable properties, which live outside [`ResolvedStyle`].
pub fn attribute_with_inherit<'a>(node: Node<'a>, aid: AId) -> Option<&'a str> {
    match node.attribute(aid) {
        Some("inherit") => node.parent().and_then(|p| attribute_with_inherit(p, aid)),
        other => other,
    }
}

/// Parses an opacity value, accepting the percentage form, clamped to
/// `[0, 1]`.
pub fn parse_opacity(text: &str) -> Option<f64> {
    let text = text.trim();
    let value = if let Some(percent) = text.strip_suffix('%') {
        percent.trim().parse::<f64>().ok()? / 100.0
    } else {
        text.parse::<f64>().ok()?
    };
    if value.is_finite() {
        Some(value.clamp(0.0, 1.0))
    } else {
        None
    }
}

pub fn parse_color(text: &str) -> Option<(Color, f64)> {
    let color = text.trim().parse::<svgtypes::Color>().ok()?;
    Some((
        Color::new(color.red, color.green, color.blue),
        f64::from(color.alpha) / 255.0,
    ))
}

fn parse_paint(text: &str, current_color: Color) -> Option<StylePaint> {
    let paint = svgtypes::Paint::from_str(text.trim()).ok()?;
    let converted = match paint {
        svgtypes::Paint::None => StylePaint::None,
        // Resolved by `derive` ordering; `inherit` never reaches here.
        svgtypes::Paint::Inherit => return None,
        // No paint context exists in a flattened tree; treated like any
        // other unrecognized paint value.
        svgtypes::Paint::ContextFill | svgtypes::Paint::ContextStroke => return None,
        svgtypes::Paint::CurrentColor => StylePaint::Color {
            color: current_color,
            alpha: 1.0,
        },
        svgtypes::Paint::Color(color) => StylePaint::Color {
            color: Color::new(color.red, color.green, color.blue),
            alpha: f64::from(color.alpha) / 255.0,
        },
        svgtypes::Paint::FuncIRI(link, fallback) => StylePaint::Link {
            id: link.to_string(),
            fallback: fallback.map(|fb| match fb {
                svgtypes::PaintFallback::None => None,
                svgtypes::PaintFallback::CurrentColor => Some(current_color),
                svgtypes::PaintFallback::Color(color) => {
                    Some(Color::new(color.red, color.green, color.blue))
                }
            }),
        },
    };
    Some(converted)
}

fn parse_fill_rule(text: &str) -> Option<FillRule> {
    match text.trim() {
        "nonzero" => Some(FillRule::NonZero),
        "evenodd" => Some(FillRule::EvenOdd),
        _ => None,
    }
}

fn parse_font_size(text: &str, parent_size: f64, ctx: LengthContext) -> Option<f64> {
    const MEDIUM: f64 = 16.0;
    let size = match text.trim() {
        "xx-small" => MEDIUM * 3.0 / 5.0,
        "x-small" => MEDIUM * 3.0 / 4.0,
        "small" => MEDIUM * 8.0 / 9.0,
        "medium" => MEDIUM,
        "large" => MEDIUM * 6.0 / 5.0,
        "x-large" => MEDIUM * 3.0 / 2.0,
        "xx-large" => MEDIUM * 2.0,
        "larger" => parent_size * 1.25,
        "smaller" => parent_size * 0.8,
        other => {
            let length = crate::convert::units::parse_length(other)?;
            match length.unit {
                svgtypes::LengthUnit::Percent => parent_size * length.number / 100.0,
                svgtypes::LengthUnit::Em => parent_size * length.number,
                svgtypes::LengthUnit::Ex => parent_size * 0.5 * length.number,
                _ => ctx.resolve(length, Axis::Diagonal),
            }
        }
    };
    if size.is_finite() && size >= 0.0 { Some(size) } else { None }
}

fn parse_font_families(text: &str) -> Option<Vec<String>> {
    let families: Vec<String> = text
        .split(',')
        .map(|family| {
            family
                .trim()
                .trim_matches(|c| c == '\'' || c == '"')
                .trim()
                .to_string()
        })
        .filter(|family| !family.is_empty())
        .collect();
    if families.is_empty() { None } else { Some(families) }
}

fn parse_font_weight(text: &str, parent_weight: u16) -> Option<u16> {
    match text.trim() {
        "normal" => Some(400),
        "bold" => Some(700),
        "bolder" => Some(match parent_weight {
            0..=349 => 400,
            350..=549 => 700,
            _ => 900,
        }),
        "lighter" => Some(match parent_weight {
            0..=549 => 100,
            550..=749 => 400,
            _ => 700,
        }),
        number => number
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite() && *n >= 1.0 && *n <= 1000.0)
            .map(|n| n.round() as u16),
    }
}

fn parse_font_stretch(text: &str) -> Option<FontStretch> {
    match text.trim() {
        "ultra-condensed" => Some(FontStretch::UltraCondensed),
        "extra-condensed" => Some(FontStretch::ExtraCondensed),
        "condensed" => Some(FontStretch::Condensed),
        "semi-condensed" => Some(FontStretch::SemiCondensed),
        "normal" => Some(FontStretch::Normal),
        "semi-expanded" => Some(FontStretch::SemiExpanded),
        "expanded" => Some(FontStretch::Expanded),
        "extra-expanded" => Some(FontStretch::ExtraExpanded),
        "ultra-expanded" => Some(FontStretch::UltraExpanded),
        _ => None,
    }
}

fn parse_spacing(text: &str, ctx: LengthContext) -> Option<f64> {
    if text.trim() == "normal" {
        return Some(0.0);
    }
    let length = crate::convert::units::parse_length(text)?;
    Some(ctx.resolve(length, Axis::Diagonal))
}

fn resolve_positive_length(text: &str, ctx: LengthContext) -> Option<f64> {
    let length = crate::convert::units::parse_length(text)?;
    if length.number < 0.0 {
        return None;
    }
    Some(ctx.resolve(length, Axis::Diagonal))
}

fn parse_dasharray(text: &str, ctx: LengthContext) -> Option<Option<Vec<f64>>> {
    if text.trim() == "none" {
        return Some(None);
    }
    let mut dashes = Vec::new();
    for length in svgtypes::LengthListParser::from(text) {
        let length = length.ok()?;
        if length.number < 0.0 {
            return None;
        }
        dashes.push(ctx.resolve(length, Axis::Diagonal));
    }
    if dashes.is_empty() {
        return None;
    }
    if dashes.iter().sum::<f64>() == 0.0 {
        return Some(None);
    }
    // An odd count repeats the list, yielding an even output.
    if dashes.len() % 2 == 1 {
        let doubled = dashes.clone();
        dashes.extend(doubled);
    }
    Some(Some(dashes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::geom::Size;

    fn ctx() -> LengthContext {
        LengthContext {
            dpi_render: 96.0,
            dpi_units: 96.0,
            viewport: Size::new(100.0, 100.0),
            font_size: 16.0,
        }
    }

    fn derive_first(text: &str) -> (ResolvedStyle, Vec<Diagnostic>) {
        let (doc, _) = Document::parse(text, 40).expect("parse");
        let svg = doc.svg_element().expect("svg");
        let node = svg.children().next().expect("child");
        let mut diagnostics = Vec::new();
        let initial = ResolvedStyle::initial("sans-serif", 16.0);
        let parent = initial.derive(svg, ctx(), &mut diagnostics);
        let style = parent.derive(node, ctx(), &mut diagnostics);
        (style, diagnostics)
    }

    #[test]
    fn inheritable_properties_flow_down() {
        let (style, _) = derive_first(r#"<svg fill="red" stroke-width="3"><rect/></svg>"#);
        assert_eq!(
            style.fill,
            StylePaint::Color {
                color: Color::new(255, 0, 0),
                alpha: 1.0
            }
        );
        assert_eq!(style.stroke_width, 3.0);
    }

    #[test]
    fn own_value_overrides_inherited() {
        let (style, _) = derive_first(r#"<svg fill="red"><rect fill="blue"/></svg>"#);
        assert_eq!(
            style.fill,
            StylePaint::Color {
                color: Color::new(0, 0, 255),
                alpha: 1.0
            }
        );
    }

    #[test]
    fn current_color_resolves_against_own_color() {
        let (style, _) = derive_first(r#"<svg color="green"><rect fill="currentColor"/></svg>"#);
        assert_eq!(
            style.fill,
            StylePaint::Color {
                color: Color::new(0, 128, 0),
                alpha: 1.0
            }
        );
    }

    #[test]
    fn malformed_value_keeps_parent_and_records_diagnostic() {
        let (style, diags) =
            derive_first(r#"<svg stroke-width="5"><rect stroke-width="oops"/></svg>"#);
        assert_eq!(style.stroke_width, 5.0);
        assert!(matches!(
            &diags[..],
            [Diagnostic::InvalidDimension { attribute, .. }] if attribute == "stroke-width"
        ));
    }

    #[test]
    fn font_size_em_compounds_through_ancestors() {
        let (style, _) = derive_first(r#"<svg font-size="20"><text font-size="2em">x</text></svg>"#);
        assert_eq!(style.font_size, 40.0);
    }

    #[test]
    fn font_size_keywords_resolve() {
        let (style, _) = derive_first(r#"<svg><text font-size="medium">x</text></svg>"#);
        assert_eq!(style.font_size, 16.0);
    }

    #[test]
    fn paint_reference_with_fallback() {
        let (style, _) = derive_first(r#"<svg><rect fill="url(#grad) blue"/></svg>"#);
        assert_eq!(
            style.fill,
            StylePaint::Link {
                id: "grad".to_string(),
                fallback: Some(Some(Color::new(0, 0, 255))),
            }
        );
    }

    #[test]
    fn bolder_steps_up_from_parent_weight() {
        let (style, _) = derive_first(
            r#"<svg font-weight="400"><text font-weight="bolder">x</text></svg>"#,
        );
        assert_eq!(style.font_weight, 700);
    }

    #[test]
    fn odd_dasharray_repeats_to_even() {
        let (style, _) = derive_first(r#"<svg><rect stroke-dasharray="4 2 1"/></svg>"#);
        assert_eq!(style.stroke_dasharray, Some(vec![4.0, 2.0, 1.0, 4.0, 2.0, 1.0]));
    }

    #[test]
    fn dasharray_with_negative_entry_is_rejected() {
        let (style, diags) = derive_first(r#"<svg><rect stroke-dasharray="4 -2"/></svg>"#);
        assert_eq!(style.stroke_dasharray, None);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn explicit_inherit_keeps_parent_value() {
        let (style, diags) = derive_first(r#"<svg fill="red"><rect fill="inherit"/></svg>"#);
        assert_eq!(
            style.fill,
            StylePaint::Color {
                color: Color::new(255, 0, 0),
                alpha: 1.0
            }
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn quoted_font_family_list_is_split() {
        let (style, _) =
            derive_first(r#"<svg><text font-family="'Liberation Sans', serif">x</text></svg>"#);
        assert_eq!(style.font_families, vec!["Liberation Sans", "serif"]);
    }
}
