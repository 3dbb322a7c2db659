//! Intrinsic size extraction from SVG markup.
//!
//! Only the root element's `width`/`height` attributes are consulted; a
//! `viewBox` on its own does not count as explicit sizing.

use crate::{Error, Result};

/// Intrinsic width/height of a document in CSS pixels.
///
/// `Metadata::default()` is the (0, 0) state used when no document is
/// loaded or extraction failed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metadata {
    pub width: f64,
    pub height: f64,
}

impl Metadata {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Both dimensions are positive, so a render target can be derived.
    pub fn is_renderable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

// CSS reference values (96dpi, 16px default font size)
const PX_PER_IN: f64 = 96.0;
const PX_PER_CM: f64 = PX_PER_IN / 2.54;
const PX_PER_MM: f64 = PX_PER_IN / 25.4;
const PX_PER_PT: f64 = PX_PER_IN / 72.0;
const PX_PER_PC: f64 = PX_PER_IN / 6.0;
const PX_PER_EM: f64 = 16.0;
const PX_PER_EX: f64 = 8.0;

/// Parse `svg` and return the root element's intrinsic size.
///
/// Returns `Error::MalformedInput` when the text is not XML and
/// `Error::MissingDimensions` when the root isn't `<svg>` or either attribute
/// is absent, relative (`%`) or not a non-negative length.
pub fn extract_dimensions(svg: &str) -> Result<Metadata> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(svg, options)
        .map_err(|e| Error::MalformedInput(e.to_string()))?;

    let root = doc.root_element();
    if root.tag_name().name() != "svg" {
        log::debug!("root element is <{}>, not <svg>", root.tag_name().name());
        return Err(Error::MissingDimensions);
    }

    let width = root.attribute("width").and_then(parse_length);
    let height = root.attribute("height").and_then(parse_length);
    match (width, height) {
        (Some(width), Some(height)) => Ok(Metadata { width, height }),
        _ => Err(Error::MissingDimensions),
    }
}

/// Convert an SVG length attribute into pixels.
fn parse_length(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let (number, unit) = raw.split_at(unit_start(raw));

    let value: f64 = number.trim_end().parse().ok()?;
    let factor = match unit.to_ascii_lowercase().as_str() {
        "" | "px" => 1.0,
        "in" => PX_PER_IN,
        "cm" => PX_PER_CM,
        "mm" => PX_PER_MM,
        "pt" => PX_PER_PT,
        "pc" => PX_PER_PC,
        "em" => PX_PER_EM,
        "ex" => PX_PER_EX,
        _ => return None,
    };

    let px = value * factor;
    (px.is_finite() && px >= 0.0).then_some(px)
}

// Byte offset of the unit suffix; an `e` followed by a digit or sign is an
// exponent, not the start of `em`/`ex`.
fn unit_start(raw: &str) -> usize {
    let bytes = raw.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'%' {
            return i;
        }
        if b.is_ascii_alphabetic() {
            let exponent = matches!(b, b'e' | b'E')
                && bytes
                    .get(i + 1)
                    .is_some_and(|n| n.is_ascii_digit() || *n == b'+' || *n == b'-');
            if !exponent {
                return i;
            }
        }
    }
    raw.len()
}
