//! flatvg lowers CSS-styled SVG into a flat, fully resolved form.
//!
//! One pass parses the document, merges the CSS cascade into per-node
//! styles, resolves every reference (gradients, patterns, clips, masks,
//! filters, `use`), converts all units through a dual-DPI policy, lowers
//! shapes to canonical paths, lays text out into absolutely positioned
//! glyph runs, and serializes the result as namespace-tagged markup that
//! feeds back through the same pipeline unchanged.
//!
//! ```no_run
//! use flatvg::{convert_str, Config, FontDatabase};
//!
//! let config = Config::default();
//! let fonts = FontDatabase::with_system_fonts();
//! let result = convert_str("<svg width=\"1in\" height=\"1in\"/>", &config, &fonts)?;
//! println!("{}", result.svg);
//! # Ok::<(), flatvg::Error>(())
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod convert;
pub mod detect;
pub mod document;
pub mod error;
pub mod fonts;
pub mod geom;
pub mod path;
pub mod style;
pub mod tree;
pub mod writer;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, OutputUnit, load_config};
pub use detect::{Generator, detect_generator, detect_units_dpi};
pub use error::{Diagnostic, Error};
pub use fonts::FontDatabase;
pub use tree::Tree;
pub use writer::serialize;

/// The serialized document plus everything non-fatal that happened on the
/// way there.
#[derive(Debug)]
pub struct Conversion {
    pub svg: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses, resolves and serializes in one call.
///
/// Only syntactically broken XML is an error; every other anomaly degrades
/// and surfaces in [`Conversion::diagnostics`].
pub fn convert_str(
    text: &str,
    config: &Config,
    fonts: &FontDatabase,
) -> Result<Conversion, Error> {
    let tree = Tree::from_str(text, config, fonts)?;
    let svg = writer::serialize(&tree, config);
    Ok(Conversion {
        svg,
        diagnostics: tree.diagnostics,
    })
}
