//! Scale factor selection and derived raster sizes.

use crate::dimensions::Metadata;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the fixed integer scale factors offered for export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ScaleFactor {
    #[default]
    X1,
    X2,
    X4,
    X8,
    X16,
    X32,
    X64,
}

/// Target raster size in whole pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}w x {}h", self.width, self.height)
    }
}

impl ScaleFactor {
    /// Every selectable factor, smallest first
    pub const ALL: [ScaleFactor; 7] = [
        ScaleFactor::X1,
        ScaleFactor::X2,
        ScaleFactor::X4,
        ScaleFactor::X8,
        ScaleFactor::X16,
        ScaleFactor::X32,
        ScaleFactor::X64,
    ];

    pub fn value(self) -> u32 {
        match self {
            ScaleFactor::X1 => 1,
            ScaleFactor::X2 => 2,
            ScaleFactor::X4 => 4,
            ScaleFactor::X8 => 8,
            ScaleFactor::X16 => 16,
            ScaleFactor::X32 => 32,
            ScaleFactor::X64 => 64,
        }
    }

    /// `floor(dimension * factor)` for both axes.
    ///
    /// Flooring keeps the exported size an integral pixel count; the `as`
    /// conversion saturates on absurdly large inputs.
    pub fn apply(self, metadata: Metadata) -> TargetSize {
        let factor = f64::from(self.value());
        TargetSize {
            width: (metadata.width * factor).floor() as u32,
            height: (metadata.height * factor).floor() as u32,
        }
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.value())
    }
}

/// Returned for integers outside the enumerated set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid scale factor '{0}' (expected one of 1, 2, 4, 8, 16, 32, 64)")]
pub struct InvalidScale(pub String);

impl TryFrom<u32> for ScaleFactor {
    type Error = InvalidScale;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        ScaleFactor::ALL
            .into_iter()
            .find(|s| s.value() == value)
            .ok_or_else(|| InvalidScale(value.to_string()))
    }
}

impl From<ScaleFactor> for u32 {
    fn from(scale: ScaleFactor) -> Self {
        scale.value()
    }
}

impl FromStr for ScaleFactor {
    type Err = InvalidScale;

    /// Accepts `"4"` as well as `"4x"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_suffix('x')
            .or_else(|| trimmed.strip_suffix('X'))
            .unwrap_or(trimmed);
        let value: u32 = digits.parse().map_err(|_| InvalidScale(s.to_string()))?;
        ScaleFactor::try_from(value).map_err(|_| InvalidScale(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_ordered_powers_of_two() {
        let values: Vec<u32> = ScaleFactor::ALL.iter().map(|s| s.value()).collect();
        assert_eq!(values, vec![1, 2, 4, 8, 16, 32, 64]);
        assert_eq!(ScaleFactor::default(), ScaleFactor::X1);
    }

    #[test]
    fn apply_floors_fractional_sizes() {
        let m = Metadata::new(10.7, 3.3);
        assert_eq!(ScaleFactor::X1.apply(m), TargetSize { width: 10, height: 3 });
        assert_eq!(ScaleFactor::X4.apply(m), TargetSize { width: 42, height: 13 });
        assert_eq!(ScaleFactor::X64.apply(m), TargetSize { width: 684, height: 211 });
    }

    #[test]
    fn zero_metadata_gives_empty_target() {
        assert!(ScaleFactor::X64.apply(Metadata::default()).is_empty());
    }

    #[test]
    fn parses_with_or_without_suffix() {
        assert_eq!("16".parse::<ScaleFactor>().unwrap(), ScaleFactor::X16);
        assert_eq!("8x".parse::<ScaleFactor>().unwrap(), ScaleFactor::X8);
        assert!("3".parse::<ScaleFactor>().is_err());
        assert!("x".parse::<ScaleFactor>().is_err());
        assert!(ScaleFactor::try_from(128).is_err());
    }

    #[test]
    fn serde_uses_the_integer() {
        let json = serde_json::to_string(&ScaleFactor::X32).unwrap();
        assert_eq!(json, "32");
        let back: ScaleFactor = serde_json::from_str("2").unwrap();
        assert_eq!(back, ScaleFactor::X2);
        assert!(serde_json::from_str::<ScaleFactor>("5").is_err());
    }

    #[test]
    fn displays_with_suffix() {
        assert_eq!(ScaleFactor::X4.to_string(), "4x");
    }

    #[test]
    fn invalid_scale_reports_input_and_choices() {
        let err = "12x".parse::<ScaleFactor>().unwrap_err();
        assert_eq!(err, InvalidScale("12x".into()));
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert_eq!(
            boxed.to_string(),
            "invalid scale factor '12x' (expected one of 1, 2, 4, 8, 16, 32, 64)"
        );
    }
}
