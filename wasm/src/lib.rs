use std::cell::RefCell;

use flatvg::{Config, FontDatabase, OutputUnit, convert_str, detect_units_dpi};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

thread_local! {
    static FONTS: RefCell<FontDatabase> = RefCell::new(FontDatabase::new());
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConvertOptions {
    dpi_render: Option<f64>,
    dpi_units: Option<f64>,
    keep_arcs: Option<bool>,
    output_unit: Option<OutputUnit>,
    font_family: Option<String>,
    font_size: Option<f64>,
}

fn build_config(options: ConvertOptions, text: &str) -> Config {
    let mut config = Config::default();

    if let Some(dpi_render) = options.dpi_render {
        config.dpi_render = dpi_render;
    }
    config.dpi_units = match options.dpi_units {
        Some(dpi_units) => dpi_units,
        None => detect_units_dpi(text),
    };
    if let Some(keep_arcs) = options.keep_arcs {
        config.keep_arcs = keep_arcs;
    }
    if let Some(output_unit) = options.output_unit {
        config.output_unit = output_unit;
    }
    if let Some(font_family) = options.font_family {
        config.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        config.font_size = font_size;
    }

    config
}

#[wasm_bindgen]
pub fn convert_svg(text: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<ConvertOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        ConvertOptions::default()
    };

    let config = build_config(options, text);
    FONTS.with(|fonts| {
        convert_str(text, &config, &fonts.borrow())
            .map(|conversion| conversion.svg)
            .map_err(|error| JsValue::from_str(&error.to_string()))
    })
}

/// Registers an in-memory font with the shared database and returns the
/// number of faces known afterwards.
#[wasm_bindgen]
pub fn register_font(data: &[u8]) -> usize {
    FONTS.with(|fonts| {
        let mut fonts = fonts.borrow_mut();
        fonts.register(data.to_vec());
        fonts.len()
    })
}

#[cfg(test)]
mod tests {
    use crate::{ConvertOptions, build_config};

    #[test]
    fn options_override_the_defaults() {
        let options = serde_json::from_str::<ConvertOptions>(
            r#"{ "dpiRender": 72, "keepArcs": true, "outputUnit": "in", "fontFamily": "serif" }"#,
        )
        .expect("options should parse");

        let config = build_config(options, "<svg/>");
        assert_eq!(config.dpi_render, 72.0);
        assert!(config.keep_arcs);
        assert_eq!(config.output_unit, flatvg::OutputUnit::In);
        assert_eq!(config.font_family, "serif");
    }

    #[test]
    fn units_dpi_falls_back_to_generator_detection() {
        let text = r#"<svg xmlns="http://www.w3.org/2000/svg"><!-- Generator: Adobe Illustrator --></svg>"#;
        let config = build_config(ConvertOptions::default(), text);
        assert_eq!(config.dpi_units, 72.0);

        let explicit = ConvertOptions { dpi_units: Some(90.0), ..ConvertOptions::default() };
        assert_eq!(build_config(explicit, text).dpi_units, 90.0);
    }
}
