//! Document parsing: raw markup into a flat, attributed arena.
//!
//! The arena keeps no SVG semantics beyond tag/attribute identification.
//! CSS from `<style>` elements, presentation attributes and inline `style`
//! are merged into each element's attribute list here, in cascade order, so
//! every later stage sees exactly one effective value per property.
//! Unknown elements and attributes are retained opaquely; the conversion
//! stage decides what to do with them.

use std::collections::HashMap;
use std::ops::Range;

use crate::error::{Diagnostic, Error};

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

macro_rules! enum_string {
    ($(#[$outer:meta])* $name:ident { $($variant:ident = $text:expr,)* }) => {
        $(#[$outer])*
        #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn from_str(text: &str) -> Option<Self> {
                match text {
                    $($text => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)*
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

enum_string!(
    /// Element names this pipeline understands.
    EId {
        Svg = "svg",
        G = "g",
        Defs = "defs",
        Use = "use",
        Symbol = "symbol",
        Switch = "switch",
        Rect = "rect",
        Circle = "circle",
        Ellipse = "ellipse",
        Line = "line",
        Polyline = "polyline",
        Polygon = "polygon",
        Path = "path",
        Text = "text",
        Tspan = "tspan",
        TextPath = "textPath",
        LinearGradient = "linearGradient",
        RadialGradient = "radialGradient",
        Stop = "stop",
        Pattern = "pattern",
        ClipPath = "clipPath",
        Mask = "mask",
        Filter = "filter",
        FeGaussianBlur = "feGaussianBlur",
        FeOffset = "feOffset",
        FeFlood = "feFlood",
        FeBlend = "feBlend",
        FeMerge = "feMerge",
        FeMergeNode = "feMergeNode",
        FeComposite = "feComposite",
        FeColorMatrix = "feColorMatrix",
        Title = "title",
        Desc = "desc",
        Metadata = "metadata",
        Style = "style",
    }
);

enum_string!(
    /// Attribute names this pipeline understands.
    AId {
        Id = "id",
        Transform = "transform",
        TransformOrigin = "transform-origin",
        D = "d",
        X = "x",
        Y = "y",
        X1 = "x1",
        Y1 = "y1",
        X2 = "x2",
        Y2 = "y2",
        Cx = "cx",
        Cy = "cy",
        R = "r",
        Rx = "rx",
        Ry = "ry",
        Fx = "fx",
        Fy = "fy",
        Width = "width",
        Height = "height",
        Points = "points",
        Href = "href",
        ViewBox = "viewBox",
        PreserveAspectRatio = "preserveAspectRatio",
        Fill = "fill",
        FillOpacity = "fill-opacity",
        FillRule = "fill-rule",
        Stroke = "stroke",
        StrokeOpacity = "stroke-opacity",
        StrokeWidth = "stroke-width",
        StrokeLinecap = "stroke-linecap",
        StrokeLinejoin = "stroke-linejoin",
        StrokeMiterlimit = "stroke-miterlimit",
        StrokeDasharray = "stroke-dasharray",
        StrokeDashoffset = "stroke-dashoffset",
        Opacity = "opacity",
        Visibility = "visibility",
        Display = "display",
        Color = "color",
        ClipPath = "clip-path",
        ClipRule = "clip-rule",
        Mask = "mask",
        MaskType = "mask-type",
        Filter = "filter",
        StopColor = "stop-color",
        StopOpacity = "stop-opacity",
        Offset = "offset",
        GradientUnits = "gradientUnits",
        GradientTransform = "gradientTransform",
        SpreadMethod = "spreadMethod",
        PatternUnits = "patternUnits",
        PatternContentUnits = "patternContentUnits",
        PatternTransform = "patternTransform",
        ClipPathUnits = "clipPathUnits",
        MaskUnits = "maskUnits",
        MaskContentUnits = "maskContentUnits",
        FilterUnits = "filterUnits",
        PrimitiveUnits = "primitiveUnits",
        StdDeviation = "stdDeviation",
        Dx = "dx",
        Dy = "dy",
        Rotate = "rotate",
        FloodColor = "flood-color",
        FloodOpacity = "flood-opacity",
        In = "in",
        In2 = "in2",
        Mode = "mode",
        Operator = "operator",
        K1 = "k1",
        K2 = "k2",
        K3 = "k3",
        K4 = "k4",
        Result = "result",
        Values = "values",
        Type = "type",
        FontFamily = "font-family",
        FontSize = "font-size",
        FontStyle = "font-style",
        FontWeight = "font-weight",
        FontStretch = "font-stretch",
        TextAnchor = "text-anchor",
        LetterSpacing = "letter-spacing",
        WordSpacing = "word-spacing",
        StartOffset = "startOffset",
        Space = "xml:space",
        SystemLanguage = "systemLanguage",
        RequiredFeatures = "requiredFeatures",
        RequiredExtensions = "requiredExtensions",
    }
);

impl AId {
    /// Properties the CSS cascade and inline `style` may set.
    pub fn is_presentation(&self) -> bool {
        matches!(
            self,
            AId::Fill
                | AId::FillOpacity
                | AId::FillRule
                | AId::Stroke
                | AId::StrokeOpacity
                | AId::StrokeWidth
                | AId::StrokeLinecap
                | AId::StrokeLinejoin
                | AId::StrokeMiterlimit
                | AId::StrokeDasharray
                | AId::StrokeDashoffset
                | AId::Opacity
                | AId::Visibility
                | AId::Display
                | AId::Color
                | AId::ClipPath
                | AId::ClipRule
                | AId::Mask
                | AId::MaskType
                | AId::Filter
                | AId::StopColor
                | AId::StopOpacity
                | AId::FloodColor
                | AId::FloodOpacity
                | AId::FontFamily
                | AId::FontSize
                | AId::FontStyle
                | AId::FontWeight
                | AId::FontStretch
                | AId::TextAnchor
                | AId::LetterSpacing
                | AId::WordSpacing
        )
    }

    /// Properties that inherit down the element tree.
    pub fn is_inheritable(&self) -> bool {
        matches!(
            self,
            AId::Fill
                | AId::FillOpacity
                | AId::FillRule
                | AId::Stroke
                | AId::StrokeOpacity
                | AId::StrokeWidth
                | AId::StrokeLinecap
                | AId::StrokeLinejoin
                | AId::StrokeMiterlimit
                | AId::StrokeDasharray
                | AId::StrokeDashoffset
                | AId::Visibility
                | AId::Color
                | AId::ClipRule
                | AId::FontFamily
                | AId::FontSize
                | AId::FontStyle
                | AId::FontWeight
                | AId::FontStretch
                | AId::TextAnchor
                | AId::LetterSpacing
                | AId::WordSpacing
        )
    }
}

/// An element tag: either one this pipeline understands or a name retained
/// opaquely.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TagName {
    Known(EId),
    Other(String),
}

/// An attribute name: known, or retained opaquely.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AttrName {
    Known(AId),
    Other(String),
}

#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: AttrName,
    pub value: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct NodeId(usize);

#[derive(Clone, Debug)]
pub enum NodeKind {
    Element {
        tag: TagName,
        attributes: Range<usize>,
    },
    Text(String),
}

#[derive(Clone, Debug)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// The parsed document arena.
pub struct Document {
    nodes: Vec<NodeData>,
    attrs: Vec<Attribute>,
    links: HashMap<String, NodeId>,
}

impl Document {
    /// Parses markup into an arena.
    ///
    /// Only syntax errors are fatal. Structural anomalies (over-deep
    /// nesting) degrade into diagnostics.
    pub fn parse(text: &str, max_depth: u32) -> Result<(Document, Vec<Diagnostic>), Error> {
        let opt = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let xml = roxmltree::Document::parse_with_options(text, opt)?;

        let style_sheet = collect_style_sheet(&xml);

        let mut doc = Document {
            nodes: vec![NodeData {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Element {
                    tag: TagName::Other("#root".to_string()),
                    attributes: 0..0,
                },
            }],
            attrs: Vec::new(),
            links: HashMap::new(),
        };
        let mut diagnostics = Vec::new();

        let root_id = NodeId(0);
        append_children(
            xml.root(),
            root_id,
            &style_sheet,
            0,
            max_depth,
            &mut doc,
            &mut diagnostics,
        );

        Ok((doc, diagnostics))
    }

    pub fn root(&self) -> Node<'_> {
        self.get(NodeId(0))
    }

    /// The outermost `svg` element, when the document has one.
    pub fn svg_element(&self) -> Option<Node<'_>> {
        self.root()
            .children()
            .find(|n| n.tag() == Some(EId::Svg))
    }

    pub fn get(&self, id: NodeId) -> Node<'_> {
        Node { id, doc: self }
    }

    pub fn element_by_id(&self, id: &str) -> Option<Node<'_>> {
        self.links.get(id).map(|&node_id| self.get(node_id))
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(id);
        id
    }
}

/// A lightweight handle into the arena.
#[derive(Clone, Copy)]
pub struct Node<'a> {
    id: NodeId,
    doc: &'a Document,
}

impl<'a> Node<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    fn data(&self) -> &'a NodeData {
        &self.doc.nodes[self.id.0]
    }

    pub fn tag(&self) -> Option<EId> {
        match &self.data().kind {
            NodeKind::Element {
                tag: TagName::Known(eid),
                ..
            } => Some(*eid),
            _ => None,
        }
    }

    pub fn tag_name(&self) -> &'a str {
        match &self.data().kind {
            NodeKind::Element { tag, .. } => match tag {
                TagName::Known(eid) => eid.as_str(),
                TagName::Other(name) => name.as_str(),
            },
            NodeKind::Text(_) => "#text",
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data().kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data().kind, NodeKind::Text(_))
    }

    pub fn text(&self) -> Option<&'a str> {
        match &self.data().kind {
            NodeKind::Text(text) => Some(text.as_str()),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn attribute(&self, aid: AId) -> Option<&'a str> {
        let range = match &self.data().kind {
            NodeKind::Element { attributes, .. } => attributes.clone(),
            NodeKind::Text(_) => return None,
        };
        self.doc.attrs[range]
            .iter()
            .find(|a| a.name == AttrName::Known(aid))
            .map(|a| a.value.as_str())
    }

    pub fn has_attribute(&self, aid: AId) -> bool {
        self.attribute(aid).is_some()
    }

    /// All attributes in document order.
    pub fn attributes(&self) -> &'a [Attribute] {
        match &self.data().kind {
            NodeKind::Element { attributes, .. } => &self.doc.attrs[attributes.clone()],
            NodeKind::Text(_) => &[],
        }
    }

    pub fn element_id(&self) -> Option<&'a str> {
        self.attribute(AId::Id)
    }

    pub fn parent(&self) -> Option<Node<'a>> {
        self.data().parent.map(|id| self.doc.get(id))
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'a>> + '_ {
        self.data().children.iter().map(|&id| self.doc.get(id))
    }

    pub fn ancestors(&self) -> impl Iterator<Item = Node<'a>> + '_ {
        std::iter::successors(self.parent(), |n| n.parent())
    }

    /// Finds an attribute on this node or the nearest ancestor carrying it.
    pub fn find_attribute(&self, aid: AId) -> Option<&'a str> {
        if let Some(value) = self.attribute(aid) {
            return Some(value);
        }
        self.ancestors().find_map(|n| n.attribute(aid))
    }
}

impl std::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node({})", self.tag_name())
    }
}

fn collect_style_sheet<'a>(xml: &'a roxmltree::Document<'a>) -> simplecss::StyleSheet<'a> {
    let mut sheet = simplecss::StyleSheet::new();
    for node in xml.descendants().filter(|n| n.has_tag_name("style")) {
        match node.attribute("type") {
            None | Some("text/css") => {}
            Some(_) => continue,
        }
        if let Some(text) = node.text() {
            sheet.parse_more(text);
        }
    }
    sheet
}

fn append_children(
    xml_parent: roxmltree::Node,
    parent: NodeId,
    style_sheet: &simplecss::StyleSheet,
    depth: u32,
    max_depth: u32,
    doc: &mut Document,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for child in xml_parent.children() {
        append_node(
            child,
            parent,
            style_sheet,
            depth,
            max_depth,
            doc,
            diagnostics,
        );
    }
}

fn append_node(
    xml_node: roxmltree::Node,
    parent: NodeId,
    style_sheet: &simplecss::StyleSheet,
    depth: u32,
    max_depth: u32,
    doc: &mut Document,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if xml_node.is_text() {
        let text = xml_node.text().unwrap_or_default();
        if !text.is_empty() {
            doc.append(parent, NodeKind::Text(text.to_string()));
        }
        return;
    }

    if !xml_node.is_element() {
        return;
    }

    let tag = match xml_node.tag_name().namespace() {
        None | Some(SVG_NS) => {
            let name = xml_node.tag_name().name();
            match EId::from_str(name) {
                Some(eid) => TagName::Known(eid),
                None => TagName::Other(name.to_string()),
            }
        }
        // Foreign-namespace subtrees carry no SVG meaning; keep the name
        // only so diagnostics can point at it.
        Some(_) => TagName::Other(xml_node.tag_name().name().to_string()),
    };

    // Style sheets were already collected; metadata carries no geometry.
    if matches!(
        tag,
        TagName::Known(EId::Style) | TagName::Known(EId::Title) | TagName::Known(EId::Desc) | TagName::Known(EId::Metadata)
    ) {
        return;
    }

    if depth >= max_depth {
        diagnostics.push(Diagnostic::ResourceLimit {
            tag: xml_node.tag_name().name().to_string(),
            limit: max_depth,
        });
        return;
    }

    let attributes = collect_attributes(xml_node, style_sheet, doc);
    let node_id = doc.append(parent, NodeKind::Element { tag, attributes });

    // First occurrence of an id wins, matching reference resolution rules.
    if let Some(id) = doc.get(node_id).attribute(AId::Id) {
        let id = id.to_string();
        doc.links.entry(id).or_insert(node_id);
    }

    append_children(
        xml_node,
        node_id,
        style_sheet,
        depth + 1,
        max_depth,
        doc,
        diagnostics,
    );
}

/// Merges presentation attributes, matching CSS rules (ascending
/// specificity, source order breaking ties) and inline `style` into one
/// attribute list. Later sources replace earlier values.
fn collect_attributes(
    xml_node: roxmltree::Node,
    style_sheet: &simplecss::StyleSheet,
    doc: &mut Document,
) -> Range<usize> {
    let mut list: Vec<Attribute> = Vec::new();

    let insert = |list: &mut Vec<Attribute>, name: AttrName, value: &str| {
        if let Some(existing) = list.iter_mut().find(|a| a.name == name) {
            existing.value = value.to_string();
        } else {
            list.push(Attribute {
                name,
                value: value.to_string(),
            });
        }
    };

    let mut plain_href = false;
    for attr in xml_node.attributes() {
        let name = match attr.namespace() {
            None | Some(SVG_NS) => attr.name(),
            Some(XLINK_NS) if attr.name() == "href" => {
                // `href` outranks `xlink:href` regardless of order.
                if !plain_href {
                    insert(&mut list, AttrName::Known(AId::Href), attr.value());
                }
                continue;
            }
            Some(XML_NS) if attr.name() == "space" => "xml:space",
            Some(XML_NS) => continue,
            Some(_) => continue,
        };

        // `style` splits into declarations below; `class` only matters for
        // selector matching, which has the raw XML node available.
        if name == "style" || name == "class" {
            continue;
        }

        match AId::from_str(name) {
            Some(aid) => {
                if aid == AId::Href {
                    plain_href = true;
                }
                insert(&mut list, AttrName::Known(aid), attr.value());
            }
            None => insert(&mut list, AttrName::Other(name.to_string()), attr.value()),
        }
    }

    // CSS rules, folded in ascending specificity so later wins.
    let mut matched: Vec<(usize, &simplecss::Rule)> = style_sheet
        .rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.selector.matches(&XmlNode(xml_node)))
        .collect();
    matched.sort_by_key(|(idx, rule)| (rule.selector.specificity(), *idx));

    for (_, rule) in matched {
        for declaration in &rule.declarations {
            if let Some(aid) = AId::from_str(declaration.name) {
                if aid.is_presentation() || aid == AId::Transform {
                    insert(&mut list, AttrName::Known(aid), declaration.value);
                }
            }
        }
    }

    // Inline `style` has the final say.
    if let Some(value) = xml_node.attribute("style") {
        for declaration in simplecss::DeclarationTokenizer::from(value) {
            if let Some(aid) = AId::from_str(declaration.name) {
                if aid.is_presentation() || aid == AId::Transform {
                    insert(&mut list, AttrName::Known(aid), declaration.value);
                }
            }
        }
    }

    let start = doc.attrs.len();
    doc.attrs.extend(list);
    start..doc.attrs.len()
}

struct XmlNode<'a, 'input>(roxmltree::Node<'a, 'input>);

impl simplecss::Element for XmlNode<'_, '_> {
    fn parent_element(&self) -> Option<Self> {
        self.0.parent_element().map(XmlNode)
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.0.prev_sibling_element().map(XmlNode)
    }

    fn has_local_name(&self, local_name: &str) -> bool {
        self.0.tag_name().name() == local_name
    }

    fn attribute_matches(&self, local_name: &str, operator: simplecss::AttributeOperator) -> bool {
        match self.0.attribute(local_name) {
            Some(value) => operator.matches(value),
            None => false,
        }
    }

    fn pseudo_class_matches(&self, class: simplecss::PseudoClass) -> bool {
        // Static documents: only structural pseudo-classes make sense.
        matches!(class, simplecss::PseudoClass::FirstChild if self.prev_sibling_element().is_none())
    }
}
