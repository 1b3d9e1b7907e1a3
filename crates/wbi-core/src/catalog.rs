//! Risk catalog for the Waldbrandgefahrenindex
//!
//! Maps a published risk level (nominally 1 to 5) to its display color and
//! German description. Every integer maps to something: values outside 1..=5
//! fall into the catastrophic bucket.
//!
//! # Examples
//!
//! ```
//! use wbi_core::catalog::describe;
//!
//! let risk = describe(3);
//! assert_eq!(risk.color, "#ffc107");
//! assert_eq!(risk.description, "Mittlere Gefahr");
//!
//! // Unparseable source values arrive as 0
//! assert_eq!(describe(0).description, "Katastrophen Gefahr");
//! ```

use serde::Serialize;

/// Risk class derived from a published level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
    /// Any level outside 1..=5, including 0 for non-numeric source values
    Catastrophic,
}

impl RiskClass {
    pub fn from_level(level: i64) -> Self {
        match level {
            1 => RiskClass::VeryLow,
            2 => RiskClass::Low,
            3 => RiskClass::Medium,
            4 => RiskClass::High,
            5 => RiskClass::VeryHigh,
            _ => RiskClass::Catastrophic,
        }
    }

    /// Hex color code used to render this class
    pub fn color(self) -> &'static str {
        match self {
            RiskClass::VeryLow => "#28a745",  // green
            RiskClass::Low => "#9acd32",      // yellow-green
            RiskClass::Medium => "#ffc107",   // yellow
            RiskClass::High => "#fd7e14",     // orange
            RiskClass::VeryHigh => "#dc3545", // red
            RiskClass::Catastrophic => "#6c757d",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RiskClass::VeryLow => "Sehr geringe Gefahr",
            RiskClass::Low => "Geringe Gefahr",
            RiskClass::Medium => "Mittlere Gefahr",
            RiskClass::High => "Hohe Gefahr",
            RiskClass::VeryHigh => "Sehr hohe Gefahr",
            RiskClass::Catastrophic => "Katastrophen Gefahr",
        }
    }

    /// RGB components of [`RiskClass::color`]
    pub fn rgb(self) -> (u8, u8, u8) {
        let hex = &self.color()[1..];
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
        (channel(0), channel(2), channel(4))
    }
}

/// Risk level of a district together with its derived display values
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskDescriptor {
    pub level: i64,
    pub color: &'static str,
    pub description: &'static str,
}

/// Color code for a risk level
pub fn color_for(level: i64) -> &'static str {
    RiskClass::from_level(level).color()
}

/// Human readable description for a risk level
pub fn description_for(level: i64) -> &'static str {
    RiskClass::from_level(level).description()
}

/// Build the full descriptor for a risk level
pub fn describe(level: i64) -> RiskDescriptor {
    let class = RiskClass::from_level(level);
    RiskDescriptor {
        level,
        color: class.color(),
        description: class.description(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_levels() {
        let expected = [
            (1, "#28a745", "Sehr geringe Gefahr"),
            (2, "#9acd32", "Geringe Gefahr"),
            (3, "#ffc107", "Mittlere Gefahr"),
            (4, "#fd7e14", "Hohe Gefahr"),
            (5, "#dc3545", "Sehr hohe Gefahr"),
        ];

        for (level, color, description) in expected {
            assert_eq!(color_for(level), color, "color for level {level}");
            assert_eq!(description_for(level), description, "description for level {level}");
            assert_eq!(
                describe(level),
                RiskDescriptor {
                    level,
                    color,
                    description
                }
            );
        }
    }

    #[test]
    fn test_out_of_range_levels_are_catastrophic() {
        for level in [0, -1, 6, 42, i64::MIN, i64::MAX] {
            assert_eq!(RiskClass::from_level(level), RiskClass::Catastrophic);
            assert_eq!(color_for(level), "#6c757d");
            assert_eq!(description_for(level), "Katastrophen Gefahr");
            assert_eq!(describe(level).level, level);
        }
    }

    #[test]
    fn test_rgb() {
        assert_eq!(RiskClass::VeryLow.rgb(), (0x28, 0xa7, 0x45));
        assert_eq!(RiskClass::Catastrophic.rgb(), (0x6c, 0x75, 0x7d));
    }

    #[test]
    fn test_descriptor_serializes() {
        let json = serde_json::to_value(describe(4)).unwrap();
        assert_eq!(json["level"], 4);
        assert_eq!(json["color"], "#fd7e14");
        assert_eq!(json["description"], "Hohe Gefahr");
    }
}
