//! RGBA colors as written in settings files and on the command line.
//!
//! Accepted forms: `#rgb`, `#rrggbb`, `#rrggbbaa` and a handful of names
//! (`black`, `white`, `red`, `green`, `blue`, `gray`/`grey`, `transparent`).
//! Serialised back as `#rrggbb` (or `#rrggbbaa` when not opaque).

use crate::error::ScienceHelperError;
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }

    /// `#rrggbb`, the form draw.io styles expect.
    pub fn hex_rgb(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn is_opaque(self) -> bool {
        self.a == 255
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opaque() {
            f.write_str(&self.hex_rgb())
        } else {
            write!(f, "{}{:02x}", self.hex_rgb(), self.a)
        }
    }
}

impl FromStr for Color {
    type Err = ScienceHelperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let named = match raw.to_ascii_lowercase().as_str() {
            "black" => Some(Color::BLACK),
            "white" => Some(Color::WHITE),
            "red" => Some(Color::rgb(255, 0, 0)),
            "green" => Some(Color::rgb(0, 128, 0)),
            "blue" => Some(Color::rgb(0, 0, 255)),
            "gray" | "grey" => Some(Color::rgb(128, 128, 128)),
            "transparent" => Some(Color::TRANSPARENT),
            _ => None,
        };
        if let Some(c) = named {
            return Ok(c);
        }

        let bad = || ScienceHelperError::InvalidConfig(format!("invalid color '{raw}'"));
        let hex = raw.strip_prefix('#').ok_or_else(bad)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(bad());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
        let nibble = |i: usize| {
            u8::from_str_radix(&hex[i..i + 1], 16)
                .map(|v| v * 17)
                .map_err(|_| bad())
        };

        match hex.len() {
            3 => Ok(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
            6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Color {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => Err(bad()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ScienceHelperError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!("#fff".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!("#FF8000".parse::<Color>().unwrap(), Color::rgb(255, 128, 0));
        let c: Color = "#00000080".parse().unwrap();
        assert_eq!(c.a, 0x80);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Black".parse::<Color>().unwrap(), Color::BLACK);
        assert_eq!("grey".parse::<Color>().unwrap(), Color::rgb(128, 128, 128));
        assert_eq!("transparent".parse::<Color>().unwrap(), Color::TRANSPARENT);
    }

    #[test]
    fn rejects_garbage() {
        assert!("#12".parse::<Color>().is_err());
        assert!("#gggggg".parse::<Color>().is_err());
        assert!("ff0000".parse::<Color>().is_err());
        assert!("#ффф".parse::<Color>().is_err());
    }

    #[test]
    fn display_round_trips_through_serde() {
        let c = Color::rgb(18, 52, 86);
        assert_eq!(c.to_string(), "#123456");
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"#123456\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
