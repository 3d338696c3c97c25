use crate::config::{OutputUnit, load_config};
use crate::convert_str;
use crate::detect::detect_units_dpi;
use crate::fonts::FontDatabase;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "flatvg", version, about = "Lowers CSS-styled SVG into a flat, fully resolved form")]
pub struct Args {
    /// Input file (.svg) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output raster resolution in units per inch
    #[arg(long = "dpi-render")]
    pub dpi_render: Option<f64>,

    /// Unit scale the source document was authored against. Detected from
    /// generator fingerprints when omitted.
    #[arg(long = "dpi-units")]
    pub dpi_units: Option<f64>,

    /// Unit for serialized lengths
    #[arg(long = "output-unit", value_enum)]
    pub output_unit: Option<UnitArg>,

    /// Keep elliptical arcs instead of lowering them to cubics
    #[arg(long = "keep-arcs")]
    pub keep_arcs: bool,

    /// Config JSON/JSON5 file
    #[arg(short = 'c', long = "config-file")]
    pub config: Option<PathBuf>,

    /// Scan fonts installed on the system (default)
    #[arg(long = "system-fonts", overrides_with = "no_system_fonts")]
    pub system_fonts: bool,

    /// Skip the system font scan
    #[arg(long = "no-system-fonts", overrides_with = "system_fonts")]
    pub no_system_fonts: bool,

    /// Register a font file (repeatable)
    #[arg(long = "font-file")]
    pub font_files: Vec<PathBuf>,

    /// Suppress diagnostics on stderr
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum UnitArg {
    Px,
    In,
    Cm,
    Mm,
    Pt,
    Pc,
}

impl UnitArg {
    fn to_output_unit(self) -> OutputUnit {
        match self {
            UnitArg::Px => OutputUnit::Px,
            UnitArg::In => OutputUnit::In,
            UnitArg::Cm => OutputUnit::Cm,
            UnitArg::Mm => OutputUnit::Mm,
            UnitArg::Pt => OutputUnit::Pt,
            UnitArg::Pc => OutputUnit::Pc,
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    let input = read_input(args.input.as_deref())?;

    if let Some(dpi) = args.dpi_render {
        config.dpi_render = dpi;
    }
    // Precedence: explicit flag, then config file, then fingerprinting.
    match args.dpi_units {
        Some(dpi) => config.dpi_units = dpi,
        None if args.config.is_none() => config.dpi_units = detect_units_dpi(&input),
        None => {}
    }
    if let Some(unit) = args.output_unit {
        config.output_unit = unit.to_output_unit();
    }
    if args.keep_arcs {
        config.keep_arcs = true;
    }

    let mut fonts = if args.no_system_fonts {
        FontDatabase::new()
    } else {
        FontDatabase::with_system_fonts()
    };
    for path in &args.font_files {
        fonts.register(std::fs::read(path)?);
    }

    let result = convert_str(&input, &config, &fonts)?;
    if !args.quiet {
        for diagnostic in &result.diagnostics {
            eprintln!("warning: {diagnostic}");
        }
    }
    write_output(&result.svg, args.output.as_deref())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(svg: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, svg)?,
        None => println!("{svg}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_args_map_onto_config_units() {
        assert_eq!(UnitArg::Px.to_output_unit(), OutputUnit::Px);
        assert_eq!(UnitArg::Mm.to_output_unit(), OutputUnit::Mm);
        assert_eq!(UnitArg::Pt.to_output_unit(), OutputUnit::Pt);
    }

    #[test]
    fn flags_parse_with_repeatable_fonts() {
        let args = Args::parse_from([
            "flatvg",
            "-i",
            "in.svg",
            "--dpi-units",
            "72",
            "--keep-arcs",
            "--font-file",
            "a.ttf",
            "--font-file",
            "b.ttf",
        ]);
        assert_eq!(args.dpi_units, Some(72.0));
        assert!(args.keep_arcs);
        assert_eq!(args.font_files.len(), 2);
        assert!(!args.no_system_fonts);
    }
}
