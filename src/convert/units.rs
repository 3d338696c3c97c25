//! Length and DPI conversion.
//!
//! All resolved lengths are canonical pixels. Physical units scale by
//! `dpi_render / dpi_units` so a document authored against one unit scale
//! can be retargeted to another raster resolution; `px` and unitless
//! numbers never scale.

use svgtypes::{Length, LengthUnit};

use crate::geom::Size;

/// Percentage basis for a length, per the property it belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Axis {
    X,
    Y,
    /// Lengths tied to neither axis resolve against the normalized
    /// viewport diagonal.
    Diagonal,
}

/// Everything a single length needs to become a canonical number.
#[derive(Clone, Copy, Debug)]
pub struct LengthContext {
    pub dpi_render: f64,
    pub dpi_units: f64,
    /// Nearest established viewport, in canonical units.
    pub viewport: Size,
    /// Resolved font size of the owning element, for `em`/`ex`.
    pub font_size: f64,
}

impl LengthContext {
    fn dpi_factor(&self) -> f64 {
        self.dpi_render / self.dpi_units
    }

    fn percent_basis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.viewport.width,
            Axis::Y => self.viewport.height,
            Axis::Diagonal => {
                (self.viewport.width.hypot(self.viewport.height)) / std::f64::consts::SQRT_2
            }
        }
    }

    /// Resolves one length to canonical units.
    pub fn resolve(&self, length: Length, axis: Axis) -> f64 {
        let n = length.number;
        match length.unit {
            LengthUnit::None | LengthUnit::Px => n,
            LengthUnit::Em => n * self.font_size,
            LengthUnit::Ex => n * self.font_size * 0.5,
            LengthUnit::In => n * 96.0 * self.dpi_factor(),
            LengthUnit::Pt => n * (96.0 / 72.0) * self.dpi_factor(),
            LengthUnit::Pc => n * 16.0 * self.dpi_factor(),
            LengthUnit::Cm => n * (96.0 / 2.54) * self.dpi_factor(),
            LengthUnit::Mm => n * (96.0 / 25.4) * self.dpi_factor(),
            LengthUnit::Percent => self.percent_basis(axis) * n / 100.0,
        }
    }
}

/// Converts a canonical value into the requested serialization unit.
/// `dpi_render` defines how many canonical units make one inch of output.
pub fn to_output_unit(value: f64, unit: LengthUnit, dpi_render: f64) -> f64 {
    match unit {
        LengthUnit::None | LengthUnit::Px | LengthUnit::Em | LengthUnit::Ex
        | LengthUnit::Percent => value,
        LengthUnit::In => value / dpi_render,
        LengthUnit::Pt => value / dpi_render * 72.0,
        LengthUnit::Pc => value / dpi_render * 6.0,
        LengthUnit::Cm => value / dpi_render * 2.54,
        LengthUnit::Mm => value / dpi_render * 25.4,
    }
}

/// Lenient length parse. Anything svgtypes rejects becomes `None` so the
/// caller can fall back and record a diagnostic.
pub fn parse_length(text: &str) -> Option<Length> {
    text.trim().parse::<Length>().ok().filter(|l| l.number.is_finite())
}
