//! LED colour resolution for the `led` command.
//!
//! The `led` parameter is free text on the wire.  The hub keeps a local
//! prediction of each controller's LED colour, so it needs to turn that text
//! into an RGB triple the same way the firmware does: a small set of named
//! colours, or six hex digits.  Anything it cannot interpret falls back to
//! white.

use serde::{Deserialize, Serialize};

/// An RGB colour with 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

const NAMED_COLORS: &[(&str, Rgb)] = &[
    ("red", Rgb::new(255, 0, 0)),
    ("green", Rgb::new(0, 255, 0)),
    ("blue", Rgb::new(0, 0, 255)),
    ("white", Rgb::new(255, 255, 255)),
    ("yellow", Rgb::new(255, 255, 0)),
    ("cyan", Rgb::new(0, 255, 255)),
    ("magenta", Rgb::new(255, 0, 255)),
    ("orange", Rgb::new(255, 165, 0)),
];

/// Resolves an `led` parameter into an RGB triple.
///
/// Named colours are matched case-insensitively.  Hex input must be exactly
/// six digits, optionally preceded by `#`.
///
/// # Examples
///
/// ```rust
/// use wandlink_core::{resolve_color, Rgb};
///
/// assert_eq!(resolve_color("Orange"), Rgb::new(255, 165, 0));
/// assert_eq!(resolve_color("#00ff80"), Rgb::new(0, 255, 128));
/// assert_eq!(resolve_color("chartreuse"), Rgb::WHITE);
/// ```
pub fn resolve_color(value: &str) -> Rgb {
    let value = value.trim();

    if let Some((_, rgb)) = NAMED_COLORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(value))
    {
        return *rgb;
    }

    parse_hex_color(value.strip_prefix('#').unwrap_or(value)).unwrap_or(Rgb::WHITE)
}

fn parse_hex_color(hex: &str) -> Option<Rgb> {
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
}
