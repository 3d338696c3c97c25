//! Serialization of the simplified tree.
//!
//! The output is SVG-shaped markup that this crate can read back into a
//! structurally identical tree: interior coordinates stay in canonical
//! units and the root `viewBox` pins that coordinate system, while the
//! root `width`/`height` restate the size in the configured output unit.
//! Definitions (paint servers, clips, masks, filters) are deduplicated
//! into `<defs>` under regenerated sequential ids, all unit spaces are
//! written as `userSpaceOnUse`, and filter wiring is explicit (`in=` on
//! every primitive, `result="r{index}"`). A reserved `flat:` namespace
//! marks the document as already simplified.

use crate::config::Config;
use crate::convert::units::to_output_unit;
use crate::document::SVG_NS;
use crate::geom::Transform;
use crate::path::{PathData, PathSegment};
use crate::tree::{
    ColorMatrixKind, CompositeOperator, Effect, Fill, Filter, FilterInput, FilterPrimitive,
    Group, LineCap, LineJoin, Mask, MaskType, Node, Paint, Stroke, Tree,
};
use crate::tree::{Clip, Color, FillRule, FontStyle, Text};

/// Namespace identifying output of this pipeline.
pub const FLAT_NS: &str = "https://flatvg.dev/ns/simplified";
/// Format revision carried in `flat:version`.
pub const FLAT_VERSION: &str = "1";

/// Serializes a resolved tree to the canonical textual form.
pub fn serialize(tree: &Tree, config: &Config) -> String {
    let mut defs = Defs::default();
    collect_group(&tree.root, &mut defs);

    let unit = config.output_unit;
    let k = to_output_unit(1.0, unit.to_length_unit(), config.dpi_render);

    let mut out = String::new();
    out.push_str(&format!(
        "<svg xmlns=\"{SVG_NS}\" xmlns:flat=\"{FLAT_NS}\" flat:version=\"{FLAT_VERSION}\" \
         width=\"{w}{suffix}\" height=\"{h}{suffix}\" viewBox=\"0 0 {vw} {vh}\">",
        w = fmt_number(tree.size.width * k),
        h = fmt_number(tree.size.height * k),
        vw = fmt_number(tree.size.width),
        vh = fmt_number(tree.size.height),
        suffix = unit.suffix(),
    ));

    if !defs.is_empty() {
        out.push_str("<defs>");
        write_defs(&mut out, &defs);
        out.push_str("</defs>");
    }

    if tree.root.is_passthrough() {
        write_children(&mut out, &tree.root, &defs);
    } else {
        write_group(&mut out, &tree.root, &defs);
    }

    out.push_str("</svg>");
    out
}

/// Deduplicated definitions with their regenerated ids, in encounter
/// order. Equality dedup keeps two nodes that resolved to the same
/// definition pointing at one serialized def.
#[derive(Default)]
struct Defs {
    paints: Vec<(Paint, String)>,
    clips: Vec<(Clip, String)>,
    masks: Vec<(Mask, String)>,
    filters: Vec<(Filter, String)>,
}

impl Defs {
    fn is_empty(&self) -> bool {
        self.paints.is_empty()
            && self.clips.is_empty()
            && self.masks.is_empty()
            && self.filters.is_empty()
    }

    fn paint_id(&self, paint: &Paint) -> Option<&str> {
        self.paints
            .iter()
            .find(|(p, _)| p == paint)
            .map(|(_, id)| id.as_str())
    }

    fn intern_paint(&mut self, paint: &Paint) {
        let prefix = match paint {
            Paint::LinearGradient(_) => "lg",
            Paint::RadialGradient(_) => "rg",
            Paint::Pattern(_) => "pat",
            Paint::None | Paint::Color(_) => return,
        };
        if self.paint_id(paint).is_some() {
            return;
        }
        let n = self
            .paints
            .iter()
            .filter(|(p, _)| std::mem::discriminant(p) == std::mem::discriminant(paint))
            .count()
            + 1;
        self.paints.push((paint.clone(), format!("{prefix}{n}")));

        // Pattern content can carry its own definitions.
        if let Paint::Pattern(pattern) = paint {
            collect_group(&pattern.root, self);
        }
    }

    fn intern_clip(&mut self, clip: &Clip) -> String {
        if let Some((_, id)) = self.clips.iter().find(|(c, _)| c == clip) {
            return id.clone();
        }
        let id = format!("clip{}", self.clips.len() + 1);
        self.clips.push((clip.clone(), id.clone()));
        if let Some(nested) = &clip.clip {
            self.intern_clip(nested);
        }
        id
    }

    fn intern_mask(&mut self, mask: &Mask) -> String {
        if let Some((_, id)) = self.masks.iter().find(|(m, _)| m == mask) {
            return id.clone();
        }
        let id = format!("mask{}", self.masks.len() + 1);
        self.masks.push((mask.clone(), id.clone()));
        if let Some(nested) = &mask.mask {
            self.intern_mask(nested);
        }
        collect_group(&mask.root, self);
        id
    }

    fn intern_filter(&mut self, filter: &Filter) -> String {
        if let Some((_, id)) = self.filters.iter().find(|(f, _)| f == filter) {
            return id.clone();
        }
        let id = format!("filter{}", self.filters.len() + 1);
        self.filters.push((filter.clone(), id.clone()));
        id
    }
}

fn collect_group(group: &Group, defs: &mut Defs) {
    for effect in &group.effects {
        match effect {
            Effect::Clip(clip) => {
                defs.intern_clip(clip);
            }
            Effect::Mask(mask) => {
                defs.intern_mask(mask);
            }
            Effect::Filter(filter) => {
                defs.intern_filter(filter);
            }
        }
    }
    for child in &group.children {
        match child {
            Node::Group(child) => collect_group(child, defs),
            Node::Path(path) => {
                if let Some(fill) = &path.fill {
                    defs.intern_paint(&fill.paint);
                }
                if let Some(stroke) = &path.stroke {
                    defs.intern_paint(&stroke.paint);
                }
            }
            Node::Text(text) => {
                for run in &text.runs {
                    if let Some(fill) = &run.fill {
                        defs.intern_paint(&fill.paint);
                    }
                    if let Some(stroke) = &run.stroke {
                        defs.intern_paint(&stroke.paint);
                    }
                }
            }
        }
    }
}

fn write_defs(out: &mut String, defs: &Defs) {
    for (paint, id) in &defs.paints {
        match paint {
            Paint::LinearGradient(gradient) => {
                out.push_str(&format!(
                    "<linearGradient id=\"{id}\" gradientUnits=\"userSpaceOnUse\" \
                     x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\"",
                    fmt_number(gradient.x1),
                    fmt_number(gradient.y1),
                    fmt_number(gradient.x2),
                    fmt_number(gradient.y2),
                ));
                write_gradient_tail(
                    out,
                    gradient.transform,
                    gradient.spread_method.as_str(),
                    &gradient.stops,
                    "linearGradient",
                );
            }
            Paint::RadialGradient(gradient) => {
                out.push_str(&format!(
                    "<radialGradient id=\"{id}\" gradientUnits=\"userSpaceOnUse\" \
                     cx=\"{}\" cy=\"{}\" r=\"{}\" fx=\"{}\" fy=\"{}\"",
                    fmt_number(gradient.cx),
                    fmt_number(gradient.cy),
                    fmt_number(gradient.r),
                    fmt_number(gradient.fx),
                    fmt_number(gradient.fy),
                ));
                write_gradient_tail(
                    out,
                    gradient.transform,
                    gradient.spread_method.as_str(),
                    &gradient.stops,
                    "radialGradient",
                );
            }
            Paint::Pattern(pattern) => {
                out.push_str(&format!(
                    "<pattern id=\"{id}\" patternUnits=\"userSpaceOnUse\" \
                     x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"",
                    fmt_number(pattern.rect.x),
                    fmt_number(pattern.rect.y),
                    fmt_number(pattern.rect.width),
                    fmt_number(pattern.rect.height),
                ));
                if !pattern.transform.is_identity() {
                    push_attr(out, "patternTransform", &fmt_transform(pattern.transform));
                }
                out.push('>');
                if pattern.root.is_passthrough() {
                    write_children(out, &pattern.root, defs);
                } else {
                    write_group(out, &pattern.root, defs);
                }
                out.push_str("</pattern>");
            }
            Paint::None | Paint::Color(_) => {}
        }
    }

    for (clip, id) in &defs.clips {
        out.push_str(&format!(
            "<clipPath id=\"{id}\" clipPathUnits=\"userSpaceOnUse\""
        ));
        if !clip.transform.is_identity() {
            push_attr(out, "transform", &fmt_transform(clip.transform));
        }
        if let Some(nested) = &clip.clip {
            if let Some((_, nested_id)) = defs.clips.iter().find(|(c, _)| c == nested.as_ref()) {
                push_attr(out, "clip-path", &format!("url(#{nested_id})"));
            }
        }
        out.push('>');
        for path in &clip.paths {
            out.push_str("<path");
            push_attr(out, "d", &fmt_path_data(&path.data));
            let rule = path.fill.as_ref().map(|f| f.rule).unwrap_or_default();
            if rule == FillRule::EvenOdd {
                push_attr(out, "clip-rule", rule.as_str());
            }
            out.push_str("/>");
        }
        out.push_str("</clipPath>");
    }

    for (mask, id) in &defs.masks {
        out.push_str(&format!(
            "<mask id=\"{id}\" maskUnits=\"userSpaceOnUse\" \
             x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"",
            fmt_number(mask.region.x),
            fmt_number(mask.region.y),
            fmt_number(mask.region.width),
            fmt_number(mask.region.height),
        ));
        if mask.kind == MaskType::Alpha {
            push_attr(out, "mask-type", mask.kind.as_str());
        }
        if let Some(nested) = &mask.mask {
            if let Some((_, nested_id)) = defs.masks.iter().find(|(m, _)| m == nested.as_ref()) {
                push_attr(out, "mask", &format!("url(#{nested_id})"));
            }
        }
        out.push('>');
        if mask.root.is_passthrough() {
            write_children(out, &mask.root, defs);
        } else {
            write_group(out, &mask.root, defs);
        }
        out.push_str("</mask>");
    }

    for (filter, id) in &defs.filters {
        out.push_str(&format!(
            "<filter id=\"{id}\" filterUnits=\"userSpaceOnUse\" \
             x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\">",
            fmt_number(filter.region.x),
            fmt_number(filter.region.y),
            fmt_number(filter.region.width),
            fmt_number(filter.region.height),
        ));
        for (index, primitive) in filter.primitives.iter().enumerate() {
            write_primitive(out, primitive, index);
        }
        out.push_str("</filter>");
    }
}

fn write_gradient_tail(
    out: &mut String,
    transform: Transform,
    spread: &str,
    stops: &[crate::tree::Stop],
    element: &str,
) {
    if spread != "pad" {
        push_attr(out, "spreadMethod", spread);
    }
    if !transform.is_identity() {
        push_attr(out, "gradientTransform", &fmt_transform(transform));
    }
    out.push('>');
    for stop in stops {
        out.push_str(&format!(
            "<stop offset=\"{}\" stop-color=\"{}\"",
            fmt_number(stop.offset),
            fmt_color(stop.color),
        ));
        if stop.opacity != 1.0 {
            push_attr(out, "stop-opacity", &fmt_number(stop.opacity));
        }
        out.push_str("/>");
    }
    out.push_str(&format!("</{element}>"));
}

fn write_primitive(out: &mut String, primitive: &FilterPrimitive, index: usize) {
    match primitive {
        FilterPrimitive::GaussianBlur {
            input,
            std_dev_x,
            std_dev_y,
        } => {
            out.push_str("<feGaussianBlur");
            push_attr(out, "in", &fmt_input(*input));
            let deviation = if std_dev_x == std_dev_y {
                fmt_number(*std_dev_x)
            } else {
                format!("{} {}", fmt_number(*std_dev_x), fmt_number(*std_dev_y))
            };
            push_attr(out, "stdDeviation", &deviation);
        }
        FilterPrimitive::Offset { input, dx, dy } => {
            out.push_str("<feOffset");
            push_attr(out, "in", &fmt_input(*input));
            push_attr(out, "dx", &fmt_number(*dx));
            push_attr(out, "dy", &fmt_number(*dy));
        }
        FilterPrimitive::Flood { color, opacity } => {
            out.push_str("<feFlood");
            push_attr(out, "flood-color", &fmt_color(*color));
            if *opacity != 1.0 {
                push_attr(out, "flood-opacity", &fmt_number(*opacity));
            }
        }
        FilterPrimitive::Blend {
            input,
            input2,
            mode,
        } => {
            out.push_str("<feBlend");
            push_attr(out, "in", &fmt_input(*input));
            push_attr(out, "in2", &fmt_input(*input2));
            push_attr(out, "mode", mode.as_str());
        }
        FilterPrimitive::Merge { inputs } => {
            out.push_str("<feMerge");
            push_attr(out, "result", &format!("r{index}"));
            out.push('>');
            for input in inputs {
                out.push_str("<feMergeNode");
                push_attr(out, "in", &fmt_input(*input));
                out.push_str("/>");
            }
            out.push_str("</feMerge>");
            return;
        }
        FilterPrimitive::Composite {
            input,
            input2,
            operator,
        } => {
            out.push_str("<feComposite");
            push_attr(out, "in", &fmt_input(*input));
            push_attr(out, "in2", &fmt_input(*input2));
            match operator {
                CompositeOperator::Over => push_attr(out, "operator", "over"),
                CompositeOperator::In => push_attr(out, "operator", "in"),
                CompositeOperator::Out => push_attr(out, "operator", "out"),
                CompositeOperator::Atop => push_attr(out, "operator", "atop"),
                CompositeOperator::Xor => push_attr(out, "operator", "xor"),
                CompositeOperator::Arithmetic { k1, k2, k3, k4 } => {
                    push_attr(out, "operator", "arithmetic");
                    push_attr(out, "k1", &fmt_number(*k1));
                    push_attr(out, "k2", &fmt_number(*k2));
                    push_attr(out, "k3", &fmt_number(*k3));
                    push_attr(out, "k4", &fmt_number(*k4));
                }
            }
        }
        FilterPrimitive::ColorMatrix { input, kind } => {
            out.push_str("<feColorMatrix");
            push_attr(out, "in", &fmt_input(*input));
            match kind {
                ColorMatrixKind::Matrix(values) => {
                    push_attr(out, "type", "matrix");
                    push_attr(out, "values", &fmt_number_list(values));
                }
                ColorMatrixKind::Saturate(v) => {
                    push_attr(out, "type", "saturate");
                    push_attr(out, "values", &fmt_number(*v));
                }
                ColorMatrixKind::HueRotate(v) => {
                    push_attr(out, "type", "hueRotate");
                    push_attr(out, "values", &fmt_number(*v));
                }
                ColorMatrixKind::LuminanceToAlpha => {
                    push_attr(out, "type", "luminanceToAlpha");
                }
            }
        }
        // Reparses back into a pass-through: a foreign element whose local
        // name starts with `fe`.
        FilterPrimitive::PassThrough { input } => {
            out.push_str("<flat:feUnsupported");
            push_attr(out, "in", &fmt_input(*input));
        }
    }
    push_attr(out, "result", &format!("r{index}"));
    out.push_str("/>");
}

fn write_children(out: &mut String, group: &Group, defs: &Defs) {
    for child in &group.children {
        match child {
            Node::Group(child) => write_group(out, child, defs),
            Node::Path(path) => write_path(out, path, defs),
            Node::Text(text) => write_text(out, text, defs),
        }
    }
}

fn write_group(out: &mut String, group: &Group, defs: &Defs) {
    out.push_str("<g");
    if !group.transform.is_identity() {
        push_attr(out, "transform", &fmt_transform(group.transform));
    }
    if group.opacity != 1.0 {
        push_attr(out, "opacity", &fmt_number(group.opacity));
    }
    // Attribute order carries the effect chain order.
    for effect in &group.effects {
        match effect {
            Effect::Clip(clip) => {
                if let Some((_, id)) = defs.clips.iter().find(|(c, _)| c == clip) {
                    push_attr(out, "clip-path", &format!("url(#{id})"));
                }
            }
            Effect::Mask(mask) => {
                if let Some((_, id)) = defs.masks.iter().find(|(m, _)| m == mask) {
                    push_attr(out, "mask", &format!("url(#{id})"));
                }
            }
            Effect::Filter(filter) => {
                if let Some((_, id)) = defs.filters.iter().find(|(f, _)| f == filter) {
                    push_attr(out, "filter", &format!("url(#{id})"));
                }
            }
        }
    }
    if group.children.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        write_children(out, group, defs);
        out.push_str("</g>");
    }
}

fn write_path(out: &mut String, path: &crate::tree::Path, defs: &Defs) {
    out.push_str("<path");
    push_attr(out, "d", &fmt_path_data(&path.data));
    write_fill(out, path.fill.as_ref(), defs);
    write_stroke(out, path.stroke.as_ref(), defs);
    out.push_str("/>");
}

fn write_fill(out: &mut String, fill: Option<&Fill>, defs: &Defs) {
    match fill {
        None => push_attr(out, "fill", "none"),
        Some(fill) => {
            push_attr(out, "fill", &fmt_paint(&fill.paint, defs));
            if fill.opacity != 1.0 {
                push_attr(out, "fill-opacity", &fmt_number(fill.opacity));
            }
            if fill.rule == FillRule::EvenOdd {
                push_attr(out, "fill-rule", fill.rule.as_str());
            }
        }
    }
}

fn write_stroke(out: &mut String, stroke: Option<&Stroke>, defs: &Defs) {
    let Some(stroke) = stroke else {
        return;
    };
    push_attr(out, "stroke", &fmt_paint(&stroke.paint, defs));
    if stroke.opacity != 1.0 {
        push_attr(out, "stroke-opacity", &fmt_number(stroke.opacity));
    }
    if stroke.width != 1.0 {
        push_attr(out, "stroke-width", &fmt_number(stroke.width));
    }
    if stroke.linecap != LineCap::Butt {
        push_attr(out, "stroke-linecap", stroke.linecap.as_str());
    }
    if stroke.linejoin != LineJoin::Miter {
        push_attr(out, "stroke-linejoin", stroke.linejoin.as_str());
    }
    if stroke.miterlimit != 4.0 {
        push_attr(out, "stroke-miterlimit", &fmt_number(stroke.miterlimit));
    }
    if let Some(dasharray) = &stroke.dasharray {
        push_attr(out, "stroke-dasharray", &fmt_number_list(dasharray));
    }
    if stroke.dashoffset != 0.0 {
        push_attr(out, "stroke-dashoffset", &fmt_number(stroke.dashoffset));
    }
}

fn write_text(out: &mut String, text: &Text, defs: &Defs) {
    out.push_str("<text xml:space=\"preserve\">");
    for run in &text.runs {
        out.push_str("<tspan");
        let xs: Vec<String> = run.glyphs.iter().map(|g| fmt_number(g.x)).collect();
        let ys: Vec<String> = run.glyphs.iter().map(|g| fmt_number(g.y)).collect();
        push_attr(out, "x", &xs.join(" "));
        push_attr(out, "y", &ys.join(" "));
        if run.glyphs.iter().any(|g| g.rotate != 0.0) {
            let rotations: Vec<String> =
                run.glyphs.iter().map(|g| fmt_number(g.rotate)).collect();
            push_attr(out, "rotate", &rotations.join(" "));
        }
        push_attr(out, "font-family", &escape_xml(&run.face.family));
        if run.face.weight != 400 {
            push_attr(out, "font-weight", &run.face.weight.to_string());
        }
        if run.face.style != FontStyle::Normal {
            push_attr(out, "font-style", run.face.style.as_str());
        }
        push_attr(out, "font-size", &fmt_number(run.font_size));
        write_fill(out, run.fill.as_ref(), defs);
        write_stroke(out, run.stroke.as_ref(), defs);
        out.push('>');
        out.push_str(&escape_xml(&run.text()));
        out.push_str("</tspan>");
    }
    out.push_str("</text>");
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(value);
    out.push('"');
}

fn fmt_paint(paint: &Paint, defs: &Defs) -> String {
    match paint {
        Paint::None => "none".to_string(),
        Paint::Color(color) => fmt_color(*color),
        server => match defs.paint_id(server) {
            Some(id) => format!("url(#{id})"),
            None => "none".to_string(),
        },
    }
}

fn fmt_color(color: Color) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}

fn fmt_input(input: FilterInput) -> String {
    match input {
        FilterInput::SourceGraphic => "SourceGraphic".to_string(),
        FilterInput::SourceAlpha => "SourceAlpha".to_string(),
        FilterInput::Result(index) => format!("r{index}"),
    }
}

fn fmt_transform(ts: Transform) -> String {
    format!(
        "matrix({} {} {} {} {} {})",
        fmt_number(ts.a),
        fmt_number(ts.b),
        fmt_number(ts.c),
        fmt_number(ts.d),
        fmt_number(ts.e),
        fmt_number(ts.f),
    )
}

fn fmt_path_data(data: &PathData) -> String {
    let mut out = String::new();
    for segment in data.iter() {
        if !out.is_empty() {
            out.push(' ');
        }
        match *segment {
            PathSegment::MoveTo { x, y } => {
                out.push_str(&format!("M {} {}", fmt_number(x), fmt_number(y)));
            }
            PathSegment::LineTo { x, y } => {
                out.push_str(&format!("L {} {}", fmt_number(x), fmt_number(y)));
            }
            PathSegment::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                out.push_str(&format!(
                    "C {} {} {} {} {} {}",
                    fmt_number(x1),
                    fmt_number(y1),
                    fmt_number(x2),
                    fmt_number(y2),
                    fmt_number(x),
                    fmt_number(y),
                ));
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
                out.push_str(&format!(
                    "A {} {} {} {} {} {} {}",
                    fmt_number(rx),
                    fmt_number(ry),
                    fmt_number(x_axis_rotation),
                    u8::from(large_arc),
                    u8::from(sweep),
                    fmt_number(x),
                    fmt_number(y),
                ));
            }
            PathSegment::ClosePath => out.push('Z'),
        }
    }
    out
}

fn fmt_number_list(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|&v| fmt_number(v)).collect();
    parts.join(" ")
}

/// Fixed-precision formatting: six decimals, trailing zeros trimmed, so
/// serialization is stable across runs and re-serialization of a reparsed
/// document reproduces the exact string.
pub(crate) fn fmt_number(n: f64) -> String {
    if !n.is_finite() {
        return "0".to_string();
    }
    let mut s = format!("{n:.6}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" { "0".to_string() } else { s }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputUnit;
    use crate::fonts::FontDatabase;

    fn convert(text: &str, config: &Config) -> Tree {
        let fonts = FontDatabase::new();
        Tree::from_str(text, config, &fonts).unwrap()
    }

    fn roundtrip(text: &str, config: &Config) -> (String, String) {
        let first = serialize(&convert(text, config), config);
        let second = serialize(&convert(&first, config), config);
        (first, second)
    }

    #[test]
    fn number_formatting_rounds_and_trims() {
        assert_eq!(fmt_number(96.0), "96");
        assert_eq!(fmt_number(0.30000000000000004), "0.3");
        assert_eq!(fmt_number(-0.0000001), "0");
        assert_eq!(fmt_number(1.5), "1.5");
        assert_eq!(fmt_number(f64::NAN), "0");
    }

    #[test]
    fn root_carries_the_namespace_marker() {
        let config = Config::default();
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='10in' height='5in'></svg>",
            &config,
        );
        let svg = serialize(&tree, &config);
        assert!(svg.contains("xmlns:flat=\"https://flatvg.dev/ns/simplified\""));
        assert!(svg.contains("flat:version=\"1\""));
        assert!(svg.contains("width=\"960px\" height=\"480px\""));
        assert!(svg.contains("viewBox=\"0 0 960 480\""));
    }

    #[test]
    fn physical_output_units_keep_canonical_coordinates() {
        let config = Config {
            output_unit: OutputUnit::In,
            ..Config::default()
        };
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='10in' height='5in'>\
             <rect width='5in' height='5in' fill='red'/></svg>",
            &config,
        );
        let svg = serialize(&tree, &config);
        // Size restated in inches, geometry pinned by the canonical viewBox.
        assert!(svg.contains("width=\"10in\" height=\"5in\""));
        assert!(svg.contains("viewBox=\"0 0 960 480\""));
        assert!(svg.contains("M 0 0 L 480 0"));
    }

    #[test]
    fn solid_paths_serialize_with_their_paint() {
        let config = Config::default();
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <rect width='40' height='30' fill='red' fill-opacity='0.5' \
             stroke='blue' stroke-width='2'/></svg>",
            &config,
        );
        let svg = serialize(&tree, &config);
        assert!(svg.contains("d=\"M 0 0 L 40 0 L 40 30 L 0 30 Z\""));
        assert!(svg.contains("fill=\"#ff0000\" fill-opacity=\"0.5\""));
        assert!(svg.contains("stroke=\"#0000ff\" stroke-width=\"2\""));
    }

    #[test]
    fn shared_gradient_interns_to_one_def() {
        let config = Config::default();
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><linearGradient id='g' gradientUnits='userSpaceOnUse' x2='100'>\
             <stop offset='0' stop-color='red'/><stop offset='1' stop-color='blue'/>\
             </linearGradient></defs>\
             <rect width='40' height='40' fill='url(#g)'/>\
             <circle cx='70' cy='70' r='10' fill='url(#g)'/></svg>",
            &config,
        );
        let svg = serialize(&tree, &config);
        assert_eq!(svg.matches("<linearGradient").count(), 1);
        assert_eq!(svg.matches("url(#lg1)").count(), 2);
        assert!(svg.contains("<stop offset=\"0\" stop-color=\"#ff0000\"/>"));
    }

    #[test]
    fn filter_wiring_is_explicit() {
        let config = Config::default();
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><filter id='f' filterUnits='userSpaceOnUse' x='0' y='0' \
             width='100' height='100'>\
             <feGaussianBlur stdDeviation='2'/>\
             <feOffset dx='4' dy='5'/>\
             </filter></defs>\
             <rect width='40' height='40' filter='url(#f)'/></svg>",
            &config,
        );
        let svg = serialize(&tree, &config);
        assert!(svg.contains(
            "<feGaussianBlur in=\"SourceGraphic\" stdDeviation=\"2\" result=\"r0\"/>"
        ));
        assert!(svg.contains("<feOffset in=\"r0\" dx=\"4\" dy=\"5\" result=\"r1\"/>"));
        assert!(svg.contains("filter=\"url(#filter1)\""));
    }

    #[test]
    fn pass_through_primitive_survives_a_round_trip() {
        let config = Config::default();
        let (first, second) = roundtrip(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><filter id='f' filterUnits='userSpaceOnUse' x='0' y='0' \
             width='100' height='100'>\
             <feGaussianBlur stdDeviation='1'/>\
             <feTurbulence baseFrequency='0.05'/>\
             </filter></defs>\
             <rect width='40' height='40' filter='url(#f)'/></svg>",
            &config,
        );
        assert!(first.contains("<flat:feUnsupported in=\"r0\" result=\"r1\"/>"));
        assert_eq!(first, second);
    }

    #[test]
    fn serialization_is_a_fixpoint() {
        let config = Config::default();
        let (first, second) = roundtrip(
            "<svg xmlns='http://www.w3.org/2000/svg' width='200' height='100'>\
             <defs>\
             <linearGradient id='g' gradientUnits='userSpaceOnUse' x2='50'>\
             <stop offset='0' stop-color='red'/><stop offset='1' stop-color='blue'/>\
             </linearGradient>\
             <clipPath id='c'><rect width='30' height='30'/></clipPath>\
             </defs>\
             <g transform='translate(10 20)' opacity='0.5'>\
             <rect width='50' height='40' fill='url(#g)' clip-path='url(#c)'/>\
             </g>\
             <text x='10' y='90' font-size='10'>hi &amp; bye</text>\
             </svg>",
            &config,
        );
        assert_eq!(first, second);
    }

    #[test]
    fn clip_defs_use_clip_rule() {
        let config = Config::default();
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <defs><clipPath id='c'>\
             <rect width='30' height='30' clip-rule='evenodd'/>\
             </clipPath></defs>\
             <rect width='40' height='40' clip-path='url(#c)'/></svg>",
            &config,
        );
        let svg = serialize(&tree, &config);
        assert!(svg.contains("<clipPath id=\"clip1\" clipPathUnits=\"userSpaceOnUse\">"));
        assert!(svg.contains("clip-rule=\"evenodd\""));
        assert!(svg.contains("clip-path=\"url(#clip1)\""));
    }

    #[test]
    fn text_serializes_per_glyph_positions() {
        let config = Config::default();
        let (first, second) = roundtrip(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <text x='10' y='20' font-size='10'>ab</text></svg>",
            &config,
        );
        assert!(first.contains("<text xml:space=\"preserve\">"));
        assert!(first.contains("x=\"10 15\" y=\"20 20\""));
        assert!(first.contains("font-family=\"sans-serif\" font-size=\"10\""));
        assert_eq!(first, second);
    }

    #[test]
    fn arcs_survive_serialization_when_preserved() {
        let config = Config {
            keep_arcs: true,
            ..Config::default()
        };
        let tree = convert(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100'>\
             <path d='M 10 50 A 20 30 15 1 0 60 50' fill='black'/></svg>",
            &config,
        );
        let svg = serialize(&tree, &config);
        assert!(svg.contains("A 20 30 15 1 0 60 50"));
    }

    #[test]
    fn empty_tree_serializes_to_a_bare_root() {
        let config = Config::default();
        let (first, second) = roundtrip(
            "<svg xmlns='http://www.w3.org/2000/svg' width='100' height='100' \
             viewBox='0 0 0 100'></svg>",
            &config,
        );
        assert!(first.contains("</svg>"));
        assert!(!first.contains("<defs>"));
        assert_eq!(first, second);
    }
}
