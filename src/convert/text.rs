//! Text layout: character streams into absolutely positioned glyph runs.
//!
//! The element's `tspan`/`textPath` structure flattens into one character
//! stream first; positional lists (`x`, `y`, `dx`, `dy`, `rotate`) index
//! characters across an element's whole subtree, innermost list winning.
//! Shaping is per character against the resolved face, with the configured
//! family and then heuristic metrics as fallbacks, so documents lay out
//! even without any usable font. Explicit positions start anchoring chunks;
//! `textPath` chunks place glyph midpoints by arc length.

use std::collections::{HashMap, HashSet};

use crate::document::{AId, EId, Node};
use crate::error::Diagnostic;
use crate::geom::Rect;
use crate::path::PathSampler;
use crate::style::{ResolvedStyle, TextAnchor};
use crate::tree::{self, FontFace, Glyph, GlyphRun, Group};

use super::units::{Axis, LengthContext};
use super::{Cache, State, paint};

/// Per-conversion font memo: query results and the anomalies already
/// reported, so a missing family surfaces once rather than per character.
#[derive(Default)]
pub(crate) struct FaceCache {
    queries: HashMap<FaceRequest, Option<fontdb::ID>>,
    reported: HashSet<String>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct FaceRequest {
    families: Vec<String>,
    weight: u16,
    style: tree::FontStyle,
    stretch: crate::style::FontStretch,
}

/// One style scope inside the text element. Characters refer to their
/// segment by index; consecutive glyphs from one segment form a run.
struct Segment<'d> {
    style: ResolvedStyle,
    node: Node<'d>,
}

/// A `textPath` target, reduced to an arc-length sampler.
struct PathRef {
    sampler: PathSampler,
    start_offset: f64,
}

/// Positional lists of one element, resolved to canonical units. `start`
/// is the global character index where the element began.
struct PosContext {
    start: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    dx: Vec<f64>,
    dy: Vec<f64>,
    rotate: Vec<f64>,
}

struct CharSpec {
    ch: char,
    x: Option<f64>,
    y: Option<f64>,
    dx: f64,
    dy: f64,
    rotate: f64,
    preserve: bool,
    seg: usize,
    path: Option<usize>,
}

#[derive(Default)]
struct Collected<'d> {
    chars: Vec<CharSpec>,
    segments: Vec<Segment<'d>>,
    paths: Vec<PathRef>,
    stack: Vec<PosContext>,
    index: usize,
}

struct SegmentFont {
    id: Option<fontdb::ID>,
    identity: FontFace,
}

struct LaidGlyph {
    seg: usize,
    glyph: Glyph,
}

pub(crate) fn convert(
    node: Node,
    style: &ResolvedStyle,
    state: &State,
    cache: &mut Cache,
    parent: &mut Group,
) {
    let mut collected = Collected::default();
    enter_element(node, style.clone(), false, None, state, cache, &mut collected);

    let Collected {
        chars,
        segments,
        paths,
        ..
    } = collected;
    let chars = apply_whitespace(chars);
    if chars.is_empty() {
        return;
    }

    let fonts = resolve_fonts(&segments, state, cache);
    let shaped = shape_chars(&chars, &segments, &fonts, state, cache);
    let laid = layout(&chars, &shaped, &segments, &paths);
    if laid.is_empty() {
        return;
    }

    let bbox = advance_bounds(&laid, &segments);
    let runs = build_runs(laid, &segments, &fonts, bbox, state, cache);

    parent.children.push(tree::Node::Text(tree::Text {
        abs_transform: parent.abs_transform,
        runs,
    }));
}

/// Registers the element as a segment and a positional context, then walks
/// its children, descending into `tspan` and `textPath`.
fn enter_element<'d>(
    node: Node<'d>,
    style: ResolvedStyle,
    preserve: bool,
    path: Option<usize>,
    state: &State,
    cache: &mut Cache,
    out: &mut Collected<'d>,
) {
    let ctx = state.lengths(style.font_size);
    let preserve = match node.attribute(AId::Space).map(str::trim) {
        Some("preserve") => true,
        Some("default") => false,
        _ => preserve,
    };

    out.stack.push(PosContext {
        start: out.index,
        x: length_list(node, AId::X, Axis::X, ctx, cache),
        y: length_list(node, AId::Y, Axis::Y, ctx, cache),
        dx: length_list(node, AId::Dx, Axis::X, ctx, cache),
        dy: length_list(node, AId::Dy, Axis::Y, ctx, cache),
        rotate: number_list(node, AId::Rotate, cache),
    });
    out.segments.push(Segment {
        style: style.clone(),
        node,
    });
    let seg = out.segments.len() - 1;

    for child in node.children() {
        if let Some(text) = child.text() {
            for ch in text.chars() {
                out.chars.push(CharSpec {
                    ch,
                    x: positional(&out.stack, out.index, |c| &c.x),
                    y: positional(&out.stack, out.index, |c| &c.y),
                    dx: positional(&out.stack, out.index, |c| &c.dx).unwrap_or(0.0),
                    dy: positional(&out.stack, out.index, |c| &c.dy).unwrap_or(0.0),
                    rotate: rotation(&out.stack, out.index),
                    preserve,
                    seg,
                    path,
                });
                out.index += 1;
            }
            continue;
        }
        if !child.is_element() {
            continue;
        }
        if child.attribute(AId::Display).map(str::trim) == Some("none") {
            continue;
        }

        match child.tag() {
            Some(EId::Tspan) => {
                let child_style =
                    style.derive(child, state.lengths(style.font_size), &mut cache.diagnostics);
                enter_element(child, child_style, preserve, path, state, cache, out);
            }
            Some(EId::TextPath) => {
                let child_style =
                    style.derive(child, state.lengths(style.font_size), &mut cache.diagnostics);
                // Without a usable path there is nothing to lay out on;
                // the content is skipped, matching the reference rules.
                let Some(idx) = resolve_text_path(child, &child_style, state, cache, out) else {
                    continue;
                };
                enter_element(child, child_style, preserve, Some(idx), state, cache, out);
            }
            Some(_) => {}
            None => cache.report_unsupported(child.tag_name()),
        }
    }

    out.stack.pop();
}

/// Innermost list carrying an entry for this character wins.
fn positional(
    stack: &[PosContext],
    index: usize,
    pick: impl Fn(&PosContext) -> &Vec<f64>,
) -> Option<f64> {
    stack.iter().rev().find_map(|ctx| {
        let local = index.checked_sub(ctx.start)?;
        pick(ctx).get(local).copied()
    })
}

/// Like the positional lists, except a shorter list repeats its last value
/// for the remaining characters.
fn rotation(stack: &[PosContext], index: usize) -> f64 {
    stack
        .iter()
        .rev()
        .find_map(|ctx| {
            let local = index.checked_sub(ctx.start)?;
            match ctx.rotate.as_slice() {
                [] => None,
                list => Some(list[local.min(list.len() - 1)]),
            }
        })
        .unwrap_or(0.0)
}

fn length_list(node: Node, aid: AId, axis: Axis, ctx: LengthContext, cache: &mut Cache) -> Vec<f64> {
    let Some(text) = node.attribute(aid) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for item in svgtypes::LengthListParser::from(text) {
        match item {
            Ok(length) => out.push(ctx.resolve(length, axis)),
            Err(_) => {
                cache.invalid_value(node, aid, text);
                break;
            }
        }
    }
    out
}

fn number_list(node: Node, aid: AId, cache: &mut Cache) -> Vec<f64> {
    let Some(text) = node.attribute(aid) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for item in svgtypes::NumberListParser::from(text) {
        match item {
            Ok(n) => out.push(n),
            Err(_) => {
                cache.invalid_value(node, aid, text);
                break;
            }
        }
    }
    out
}

/// Lowers the referenced path into a sampler and resolves `startOffset`
/// (percentages are of the path length). `None` when no usable path exists.
fn resolve_text_path(
    node: Node,
    style: &ResolvedStyle,
    state: &State,
    cache: &mut Cache,
    out: &mut Collected,
) -> Option<usize> {
    let (target, id) = super::refs::resolve_href(node, cache)?;
    let Some(tag) = target.tag().filter(|t| {
        matches!(
            t,
            EId::Rect
                | EId::Circle
                | EId::Ellipse
                | EId::Line
                | EId::Polyline
                | EId::Polygon
                | EId::Path
        )
    }) else {
        cache.report(Diagnostic::DanglingReference { id: id.to_string() });
        return None;
    };

    let ctx = state.lengths(style.font_size);
    let mut data = super::shapes::convert(target, tag, style, state, cache)?;
    let target_ts = super::resolve_transform(target, ctx, cache)?;
    if !target_ts.is_identity() {
        data.transform(target_ts);
    }

    let sampler = PathSampler::new(&data);
    if sampler.length() <= 0.0 {
        return None;
    }

    let start_offset = match node.attribute(AId::StartOffset) {
        Some(text) => match super::units::parse_length(text) {
            Some(length) if length.unit == svgtypes::LengthUnit::Percent => {
                sampler.length() * length.number / 100.0
            }
            Some(length) => ctx.resolve(length, Axis::X),
            None => {
                cache.invalid_value(node, AId::StartOffset, text);
                0.0
            }
        },
        None => 0.0,
    };

    out.paths.push(PathRef {
        sampler,
        start_offset,
    });
    Some(out.paths.len() - 1)
}

/// Whitespace processing over the flattened stream: line breaks and tabs
/// become spaces; outside `xml:space="preserve"` scopes, space runs
/// collapse and edges trim.
fn apply_whitespace(chars: Vec<CharSpec>) -> Vec<CharSpec> {
    let mut out: Vec<CharSpec> = Vec::new();
    for mut spec in chars {
        if matches!(spec.ch, '\n' | '\r' | '\t') {
            spec.ch = ' ';
        }
        if spec.ch == ' ' && !spec.preserve {
            match out.last() {
                None => continue,
                Some(prev) if prev.ch == ' ' => continue,
                _ => {}
            }
        }
        out.push(spec);
    }
    while out.last().is_some_and(|s| s.ch == ' ' && !s.preserve) {
        out.pop();
    }
    out
}

/// One face per segment: the requested fallback list, then the configured
/// default family, then no face at all (heuristic metrics).
fn resolve_fonts(segments: &[Segment], state: &State, cache: &mut Cache) -> Vec<SegmentFont> {
    segments
        .iter()
        .map(|seg| {
            let style = &seg.style;
            let key = FaceRequest {
                families: style.font_families.clone(),
                weight: style.font_weight,
                style: style.font_style,
                stretch: style.font_stretch,
            };
            let id = match cache.faces.queries.get(&key) {
                Some(&found) => found,
                None => {
                    let found = state
                        .fonts
                        .query(
                            &style.font_families,
                            style.font_weight,
                            style.font_style,
                            style.font_stretch,
                        )
                        .or_else(|| {
                            state.fonts.query(
                                &[state.config.font_family.clone()],
                                style.font_weight,
                                style.font_style,
                                style.font_stretch,
                            )
                        });
                    cache.faces.queries.insert(key, found);
                    found
                }
            };

            match id.and_then(|id| state.fonts.face_identity(id).map(|face| (id, face))) {
                Some((id, identity)) => SegmentFont {
                    id: Some(id),
                    identity,
                },
                None => {
                    let family = style
                        .font_families
                        .first()
                        .cloned()
                        .unwrap_or_else(|| state.config.font_family.clone());
                    report_font(cache, format!("no face for '{family}'"));
                    SegmentFont {
                        id: None,
                        identity: FontFace {
                            family,
                            weight: style.font_weight,
                            style: style.font_style,
                        },
                    }
                }
            }
        })
        .collect()
}

fn report_font(cache: &mut Cache, reason: String) {
    if cache.faces.reported.insert(reason.clone()) {
        cache.report(Diagnostic::FontResolution {
            tag: EId::Text.as_str().to_string(),
            reason,
        });
    }
}

/// Glyph id and advance per character. A face that cannot be loaded, or a
/// character its cmap misses, degrades to notdef; without any face the
/// advance falls back to half the font size.
fn shape_chars(
    chars: &[CharSpec],
    segments: &[Segment],
    fonts: &[SegmentFont],
    state: &State,
    cache: &mut Cache,
) -> Vec<(u16, f64)> {
    let mut shaped = vec![(0u16, 0.0f64); chars.len()];
    let mut by_segment: Vec<Vec<usize>> = vec![Vec::new(); segments.len()];
    for (i, spec) in chars.iter().enumerate() {
        by_segment[spec.seg].push(i);
    }

    for (seg_idx, indices) in by_segment.iter().enumerate() {
        if indices.is_empty() {
            continue;
        }
        let size = segments[seg_idx].style.font_size;
        let font = &fonts[seg_idx];

        let entries = font.id.and_then(|id| {
            state
                .fonts
                .with_face_data(id, |data, index| {
                    let face = ttf_parser::Face::parse(data, index).ok()?;
                    let upem = f64::from(face.units_per_em());
                    let scale = size / upem;
                    let fallback = face
                        .glyph_hor_advance(ttf_parser::GlyphId(0))
                        .map(|a| f64::from(a) * scale)
                        .unwrap_or(size * 0.5);
                    Some(
                        indices
                            .iter()
                            .map(|&i| match face.glyph_index(chars[i].ch) {
                                Some(gid) => (
                                    gid.0,
                                    face.glyph_hor_advance(gid)
                                        .map(|a| f64::from(a) * scale)
                                        .unwrap_or(fallback),
                                    false,
                                ),
                                None => (0, fallback, true),
                            })
                            .collect::<Vec<_>>(),
                    )
                })
                .flatten()
        });

        match entries {
            Some(entries) => {
                for (&i, (gid, advance, missing)) in indices.iter().zip(&entries) {
                    shaped[i] = (*gid, *advance);
                    if *missing {
                        report_font(
                            cache,
                            format!(
                                "no glyph for '{}' in '{}'",
                                chars[i].ch, font.identity.family
                            ),
                        );
                    }
                }
            }
            None => {
                for &i in indices {
                    shaped[i] = (0, size * 0.5);
                }
            }
        }
    }
    shaped
}

/// Positions every character. A chunk runs until the next explicit
/// position or path change; its `text-anchor` shift comes from the first
/// character's style.
fn layout(
    chars: &[CharSpec],
    shaped: &[(u16, f64)],
    segments: &[Segment],
    paths: &[PathRef],
) -> Vec<LaidGlyph> {
    let mut out = Vec::new();
    let mut cursor_x = 0.0;
    let mut cursor_y = 0.0;

    let mut i = 0;
    while i < chars.len() {
        let path = chars[i].path;
        let mut j = i + 1;
        while j < chars.len()
            && chars[j].path == path
            && chars[j].x.is_none()
            && chars[j].y.is_none()
        {
            j += 1;
        }
        let chunk = &chars[i..j];
        let chunk_shaped = &shaped[i..j];

        let mut extent = 0.0;
        for (spec, &(_, advance)) in chunk.iter().zip(chunk_shaped) {
            extent += spec.dx + advance + spacing(&segments[spec.seg].style, spec.ch);
        }
        let shift = match segments[chunk[0].seg].style.text_anchor {
            TextAnchor::Start => 0.0,
            TextAnchor::Middle => -extent / 2.0,
            TextAnchor::End => -extent,
        };

        match path {
            None => {
                if let Some(x) = chunk[0].x {
                    cursor_x = x;
                }
                if let Some(y) = chunk[0].y {
                    cursor_y = y;
                }
                let mut x = cursor_x + shift;
                for (spec, &(glyph_id, advance)) in chunk.iter().zip(chunk_shaped) {
                    let style = &segments[spec.seg].style;
                    x += spec.dx;
                    cursor_y += spec.dy;
                    if style.visible {
                        out.push(LaidGlyph {
                            seg: spec.seg,
                            glyph: Glyph {
                                glyph_id,
                                text: spec.ch.to_string(),
                                x,
                                y: cursor_y,
                                rotate: spec.rotate,
                                advance,
                            },
                        });
                    }
                    x += advance + spacing(style, spec.ch);
                }
                cursor_x = x - shift;
            }
            Some(p) => {
                let path_ref = &paths[p];
                let mut distance = path_ref.start_offset + shift;
                // `dy` displaces along the rotated glyph axis and persists.
                let mut offset = 0.0;
                for (spec, &(glyph_id, advance)) in chunk.iter().zip(chunk_shaped) {
                    let style = &segments[spec.seg].style;
                    distance += spec.dx;
                    offset += spec.dy;
                    let mid = distance + advance / 2.0;
                    // Glyphs whose midpoint leaves the path are not drawn.
                    if let Some((point, theta)) = path_ref.sampler.sample(mid) {
                        if style.visible {
                            let (sin, cos) = theta.sin_cos();
                            out.push(LaidGlyph {
                                seg: spec.seg,
                                glyph: Glyph {
                                    glyph_id,
                                    text: spec.ch.to_string(),
                                    x: point.x - (advance / 2.0) * cos - offset * sin,
                                    y: point.y - (advance / 2.0) * sin + offset * cos,
                                    rotate: theta.to_degrees() + spec.rotate,
                                    advance,
                                },
                            });
                        }
                    }
                    distance += advance + spacing(style, spec.ch);
                }
            }
        }
        i = j;
    }
    out
}

fn spacing(style: &ResolvedStyle, ch: char) -> f64 {
    style.letter_spacing + if ch == ' ' { style.word_spacing } else { 0.0 }
}

/// Advance-box union over the laid glyphs, the `objectBoundingBox` basis
/// for paints on the text.
fn advance_bounds(laid: &[LaidGlyph], segments: &[Segment]) -> Option<Rect> {
    let mut bounds: Option<Rect> = None;
    for laid_glyph in laid {
        let size = segments[laid_glyph.seg].style.font_size;
        let glyph = &laid_glyph.glyph;
        let rect = Rect::new(glyph.x, glyph.y - size, glyph.advance.max(0.0), size * 1.25);
        bounds = Some(match bounds {
            Some(acc) => acc.expand_to_include(&rect),
            None => rect,
        });
    }
    bounds
}

/// Groups consecutive same-segment glyphs into runs and resolves each
/// segment's paints against the text bounds.
fn build_runs(
    laid: Vec<LaidGlyph>,
    segments: &[Segment],
    fonts: &[SegmentFont],
    bbox: Option<Rect>,
    state: &State,
    cache: &mut Cache,
) -> Vec<GlyphRun> {
    let mut runs: Vec<GlyphRun> = Vec::new();
    let mut last_seg: Option<usize> = None;
    for laid_glyph in laid {
        if last_seg != Some(laid_glyph.seg) {
            let segment = &segments[laid_glyph.seg];
            runs.push(GlyphRun {
                face: fonts[laid_glyph.seg].identity.clone(),
                font_size: segment.style.font_size,
                fill: paint::resolve_fill(segment.node, &segment.style, bbox, state, cache),
                stroke: paint::resolve_stroke(segment.node, &segment.style, bbox, state, cache),
                glyphs: Vec::new(),
            });
            last_seg = Some(laid_glyph.seg);
        }
        if let Some(run) = runs.last_mut() {
            run.glyphs.push(laid_glyph.glyph);
        }
    }
    runs
}
