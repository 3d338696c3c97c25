/// A fatal conversion error. Only syntactically broken input aborts a
/// conversion; everything else degrades into [`Diagnostic`]s.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("xml parse error: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// A non-fatal anomaly recorded while resolving a document.
///
/// Diagnostics never abort the conversion. Each carries the identity of the
/// originating element and enough context to explain the fallback that was
/// applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Diagnostic {
    /// A reference chain reached an element already on the current
    /// resolution path. The reference resolved to its neutral value.
    #[error("cyclic reference through '#{id}'")]
    CyclicReference { id: String },

    /// A reference to an id no element carries, or to an element of the
    /// wrong kind. The reference resolved to its neutral value.
    #[error("unresolved reference '#{id}'")]
    DanglingReference { id: String },

    /// An element (or filter primitive) this pipeline does not understand.
    /// It was dropped or passed through untouched.
    #[error("unsupported element '{tag}'")]
    UnsupportedElement { tag: String },

    /// A dimensional attribute failed to parse. The SVG default was used.
    #[error("invalid dimension '{value}' in '{attribute}' on '{tag}'")]
    InvalidDimension {
        tag: String,
        attribute: String,
        value: String,
    },

    /// Font lookup or glyph mapping fell back (default family or notdef).
    #[error("font fallback on '{tag}': {reason}")]
    FontResolution { tag: String, reason: String },

    /// Structural nesting passed the configured limit. The subtree was
    /// truncated.
    #[error("nesting limit {limit} exceeded at '{tag}'")]
    ResourceLimit { tag: String, limit: u32 },
}
