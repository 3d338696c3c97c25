use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::geom::Size;

/// Unit used for lengths in serialized output. The root width/height carry
/// it as a suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputUnit {
    #[default]
    Px,
    In,
    Cm,
    Mm,
    Pt,
    Pc,
}

impl OutputUnit {
    pub fn to_length_unit(self) -> svgtypes::LengthUnit {
        match self {
            OutputUnit::Px => svgtypes::LengthUnit::Px,
            OutputUnit::In => svgtypes::LengthUnit::In,
            OutputUnit::Cm => svgtypes::LengthUnit::Cm,
            OutputUnit::Mm => svgtypes::LengthUnit::Mm,
            OutputUnit::Pt => svgtypes::LengthUnit::Pt,
            OutputUnit::Pc => svgtypes::LengthUnit::Pc,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            OutputUnit::Px => "px",
            OutputUnit::In => "in",
            OutputUnit::Cm => "cm",
            OutputUnit::Mm => "mm",
            OutputUnit::Pt => "pt",
            OutputUnit::Pc => "pc",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Canonical units per inch of output. Serialization converts through
    /// this when `output_unit` is physical.
    pub dpi_render: f64,
    /// Units per inch assumed of the source document's physical lengths.
    pub dpi_units: f64,
    /// Keep elliptical arcs as first-class segments instead of lowering
    /// them to cubics.
    pub keep_arcs: bool,
    pub output_unit: OutputUnit,
    /// Family used when none of a text's requested families resolve.
    pub font_family: String,
    /// Initial font size, before any `font-size` applies.
    pub font_size: f64,
    /// Languages accepted when evaluating `systemLanguage` on `switch`.
    pub languages: Vec<String>,
    /// Viewport used when the root has neither width/height nor viewBox.
    pub default_size: Size,
    /// Nesting limit for groups, `use` expansion and nested viewports.
    pub max_nesting: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dpi_render: 96.0,
            dpi_units: 96.0,
            keep_arcs: false,
            output_unit: OutputUnit::Px,
            font_family: "sans-serif".to_string(),
            font_size: 16.0,
            languages: vec!["en".to_string()],
            default_size: Size::new(100.0, 100.0),
            max_nesting: 20,
        }
    }
}

impl Config {
    /// Structural depth cap for the raw document arena. `use` expansion
    /// can stack two raw levels per logical level, hence the doubling.
    pub fn max_parse_depth(&self) -> u32 {
        self.max_nesting.saturating_mul(2)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    dpi_render: Option<f64>,
    dpi_units: Option<f64>,
    keep_arcs: Option<bool>,
    output_unit: Option<OutputUnit>,
    font_family: Option<String>,
    font_size: Option<f64>,
    languages: Option<Vec<String>>,
    default_width: Option<f64>,
    default_height: Option<f64>,
    max_nesting: Option<u32>,
}

fn merge(config: &mut Config, parsed: ConfigFile) {
    if let Some(v) = parsed.dpi_render {
        config.dpi_render = v;
    }
    if let Some(v) = parsed.dpi_units {
        config.dpi_units = v;
    }
    if let Some(v) = parsed.keep_arcs {
        config.keep_arcs = v;
    }
    if let Some(v) = parsed.output_unit {
        config.output_unit = v;
    }
    if let Some(v) = parsed.font_family {
        config.font_family = v;
    }
    if let Some(v) = parsed.font_size {
        config.font_size = v;
    }
    if let Some(v) = parsed.languages {
        config.languages = v;
    }
    if let Some(v) = parsed.default_width {
        config.default_size.width = v;
    }
    if let Some(v) = parsed.default_height {
        config.default_size.height = v;
    }
    if let Some(v) = parsed.max_nesting {
        config.max_nesting = v;
    }
}

fn validate(config: &Config) -> anyhow::Result<()> {
    if !(config.dpi_render.is_finite() && config.dpi_render > 0.0) {
        anyhow::bail!("dpiRender must be a positive number");
    }
    if !(config.dpi_units.is_finite() && config.dpi_units > 0.0) {
        anyhow::bail!("dpiUnits must be a positive number");
    }
    if !(config.font_size.is_finite() && config.font_size > 0.0) {
        anyhow::bail!("fontSize must be a positive number");
    }
    if config.max_nesting == 0 {
        anyhow::bail!("maxNesting must be at least 1");
    }
    Ok(())
}

/// Loads a configuration file over the defaults. Strict JSON is tried
/// first; JSON5 covers hand-edited files with comments and bare keys.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = match serde_json::from_str(&contents) {
        Ok(parsed) => parsed,
        Err(_) => json5::from_str(&contents)?,
    };
    merge(&mut config, parsed);
    validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_text(text: &str) -> anyhow::Result<Config> {
        let mut config = Config::default();
        let parsed: ConfigFile = match serde_json::from_str(text) {
            Ok(parsed) => parsed,
            Err(_) => json5::from_str(text)?,
        };
        merge(&mut config, parsed);
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn defaults_match_the_css_pixel_world() {
        let config = Config::default();
        assert_eq!(config.dpi_render, 96.0);
        assert_eq!(config.dpi_units, 96.0);
        assert!(!config.keep_arcs);
        assert_eq!(config.output_unit, OutputUnit::Px);
    }

    #[test]
    fn camel_case_fields_merge_over_defaults() {
        let config =
            from_text(r#"{"dpiUnits": 72, "keepArcs": true, "outputUnit": "mm"}"#).unwrap();
        assert_eq!(config.dpi_units, 72.0);
        assert!(config.keep_arcs);
        assert_eq!(config.output_unit, OutputUnit::Mm);
        assert_eq!(config.dpi_render, 96.0);
    }

    #[test]
    fn json5_relaxed_syntax_is_accepted() {
        let config = from_text("{ dpiRender: 300, /* print */ fontFamily: 'serif' }").unwrap();
        assert_eq!(config.dpi_render, 300.0);
        assert_eq!(config.font_family, "serif");
    }

    #[test]
    fn non_positive_dpi_is_rejected() {
        assert!(from_text(r#"{"dpiRender": 0}"#).is_err());
        assert!(from_text(r#"{"dpiUnits": -96}"#).is_err());
    }
}
