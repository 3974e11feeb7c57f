//! Geometry
//!
//! A `(width, height)` pair with an optional resize modifier, written
//! `WxH[modifier]` as in `100x100#` or `640x480>`.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static GEOMETRY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d*)x?(\d*)([><#@%^!])?$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("Invalid geometry: {0:?}")]
    Invalid(String),
}

/// Pixel dimensions of an image or rendition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    /// One of `# > < ! % @ ^`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifier: Option<char>,
}

impl Geometry {
    /// Used when a file cannot be identified as an image
    pub const ZERO: Geometry = Geometry {
        width: 0,
        height: 0,
        modifier: None,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            modifier: None,
        }
    }

    pub fn with_modifier(mut self, modifier: char) -> Self {
        self.modifier = Some(modifier);
        self
    }

    /// Parse `WxH[modifier]`; either side may be omitted (`x100`, `100x`).
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        let caps = GEOMETRY_PATTERN.captures(spec)?;

        let width = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let height = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        if width.is_empty() && height.is_empty() {
            return None;
        }

        Some(Self {
            width: parse_side(width)?,
            height: parse_side(height)?,
            modifier: caps.get(3).and_then(|m| m.as_str().chars().next()),
        })
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    pub fn is_horizontal(&self) -> bool {
        self.height < self.width
    }

    pub fn is_vertical(&self) -> bool {
        self.height > self.width
    }

    /// Width divided by height, `None` for a zero height
    pub fn aspect(&self) -> Option<f64> {
        if self.height == 0 {
            None
        } else {
            Some(self.width as f64 / self.height as f64)
        }
    }
}

fn parse_side(digits: &str) -> Option<u32> {
    if digits.is_empty() {
        Some(0)
    } else {
        digits.parse().ok()
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)?;
        if let Some(modifier) = self.modifier {
            write!(f, "{}", modifier)?;
        }
        Ok(())
    }
}

impl FromStr for Geometry {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Geometry::parse(s).ok_or_else(|| GeometryError::Invalid(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let g = Geometry::parse("800x600").unwrap();
        assert_eq!((g.width, g.height), (800, 600));
        assert_eq!(g.modifier, None);
        assert!(g.is_horizontal());
        assert!(!g.is_vertical());
    }

    #[test]
    fn test_parse_with_modifier() {
        let g = Geometry::parse("100x100#").unwrap();
        assert_eq!(g, Geometry::new(100, 100).with_modifier('#'));
        assert!(g.is_square());
        assert_eq!(g.to_string(), "100x100#");

        let g: Geometry = "640x480>".parse().unwrap();
        assert_eq!(g.modifier, Some('>'));
    }

    #[test]
    fn test_parse_partial() {
        assert_eq!(Geometry::parse("x100"), Some(Geometry::new(0, 100)));
        assert_eq!(Geometry::parse("200x"), Some(Geometry::new(200, 0)));
        assert_eq!(Geometry::parse("50"), Some(Geometry::new(50, 0)));
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(Geometry::parse(""), None);
        assert_eq!(Geometry::parse("x"), None);
        assert_eq!(Geometry::parse("big"), None);
        assert_eq!(Geometry::parse("10x10x10"), None);
        assert!("abc".parse::<Geometry>().is_err());
    }

    #[test]
    fn test_orientation() {
        assert!(Geometry::new(300, 400).is_vertical());
        assert!(Geometry::ZERO.is_square());
        assert_eq!(Geometry::ZERO.aspect(), None);
        assert_eq!(Geometry::new(300, 150).aspect(), Some(2.0));
    }
}
