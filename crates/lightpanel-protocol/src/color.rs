//! Color parsing for LED commands.
//!
//! The state machine takes the parser as a plain function pointer so callers
//! can plug in a richer color table. [`parse_color`] is the default.

use std::fmt;

/// Signature of an injected color parser.
pub type ColorParser = fn(&str) -> Option<Rgba>;

/// A parsed color.
///
/// Alpha is only present when the source string specified one, and is only
/// emitted on the wire in that case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: Option<u8>,
}

impl Rgba {
    /// Opaque color without an explicit alpha.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba { r, g, b, a: None }
    }

    /// Color with an explicit alpha component.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba { r, g, b, a: Some(a) }
    }
}

/// Formats as space separated wire components: `r g b` or `r g b a`.
impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.r, self.g, self.b)?;
        if let Some(a) = self.a {
            write!(f, " {}", a)?;
        }
        Ok(())
    }
}

/// Named colors understood by [`parse_color`].
const NAMED_COLORS: &[(&str, Rgba)] = &[
    ("black", Rgba::rgb(0, 0, 0)),
    ("white", Rgba::rgb(255, 255, 255)),
    ("red", Rgba::rgb(255, 0, 0)),
    ("lime", Rgba::rgb(0, 255, 0)),
    ("green", Rgba::rgb(0, 128, 0)),
    ("blue", Rgba::rgb(0, 0, 255)),
    ("yellow", Rgba::rgb(255, 255, 0)),
    ("cyan", Rgba::rgb(0, 255, 255)),
    ("aqua", Rgba::rgb(0, 255, 255)),
    ("magenta", Rgba::rgb(255, 0, 255)),
    ("fuchsia", Rgba::rgb(255, 0, 255)),
    ("orange", Rgba::rgb(255, 165, 0)),
    ("purple", Rgba::rgb(128, 0, 128)),
    ("pink", Rgba::rgb(255, 192, 203)),
    ("gray", Rgba::rgb(128, 128, 128)),
    ("grey", Rgba::rgb(128, 128, 128)),
    ("silver", Rgba::rgb(192, 192, 192)),
    ("maroon", Rgba::rgb(128, 0, 0)),
    ("navy", Rgba::rgb(0, 0, 128)),
    ("olive", Rgba::rgb(128, 128, 0)),
    ("teal", Rgba::rgb(0, 128, 128)),
    ("gold", Rgba::rgb(255, 215, 0)),
    ("indigo", Rgba::rgb(75, 0, 130)),
    ("violet", Rgba::rgb(238, 130, 238)),
    ("transparent", Rgba::rgba(0, 0, 0, 0)),
];

/// Default color parser.
///
/// Accepts, case-insensitively:
/// - a color name (`red`, `orange`, ...)
/// - hex notation: `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`
/// - `rgb(r, g, b)` / `rgba(r, g, b, a)` with decimal components
pub fn parse_color(input: &str) -> Option<Rgba> {
    let text = input.trim().to_ascii_lowercase();

    if let Some(hex) = text.strip_prefix('#') {
        return parse_hex(hex);
    }

    if let Some(args) = text
        .strip_prefix("rgba(")
        .or_else(|| text.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_components(args);
    }

    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == text)
        .map(|(_, color)| *color)
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Rgba::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Some(Rgba::rgba(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Rgba::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Rgba::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn parse_components(args: &str) -> Option<Rgba> {
    let parts = args
        .split(',')
        .map(|part| part.trim().parse::<u8>().ok())
        .collect::<Option<Vec<u8>>>()?;

    match parts.as_slice() {
        [r, g, b] => Some(Rgba::rgb(*r, *g, *b)),
        [r, g, b, a] => Some(Rgba::rgba(*r, *g, *b, *a)),
        _ => None,
    }
}
