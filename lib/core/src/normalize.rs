//! Value normalization
//!
//! Every constraint value and catalog attribute is brought into one canonical
//! domain before it is compared: trimmed, lower-cased, whitespace collapsed,
//! and attribute names resolved through an alias table.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{Error, Result};

/// Lower-case, trim and collapse internal whitespace
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a human-entered number: `$25,000`, `25k`, `1.2m`, `30_000`
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = strip_thousands(raw.trim())
        .chars()
        .filter(|c| !matches!(c, '$' | '_' | ' '))
        .collect();
    let lower = cleaned.to_lowercase();

    let (digits, scale) = if let Some(rest) = lower.strip_suffix('k') {
        (rest, 1_000.0)
    } else if let Some(rest) = lower.strip_suffix('m') {
        (rest, 1_000_000.0)
    } else {
        (lower.as_str(), 1.0)
    };

    digits.parse::<f64>().ok().filter(|n| n.is_finite()).map(|n| n * scale)
}

/// Remove commas used as thousands separators (`30,000` -> `30000`)
fn strip_thousands(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());

    for (i, &c) in chars.iter().enumerate() {
        if c == ',' {
            let before = i > 0 && chars[i - 1].is_ascii_digit();
            let group = chars.len() >= i + 4 && chars[i + 1..i + 4].iter().all(char::is_ascii_digit);
            let closed = chars.get(i + 4).map(|n| !n.is_ascii_digit()).unwrap_or(true);
            if before && group && closed {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Canonicalizes attribute names and knows which attributes are numeric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalizer {
    /// alias -> canonical attribute name
    pub aliases: BTreeMap<String, String>,
    /// attributes whose constraints are parsed as numbers or ranges
    pub numeric_attributes: BTreeSet<String>,
    /// attribute carrying a distance-from-location constraint
    pub distance_attribute: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        let aliases = [
            ("brand", "make"),
            ("manufacturer", "make"),
            ("body", "body_style"),
            ("body_type", "body_style"),
            ("odometer", "mileage"),
            ("miles", "mileage"),
            ("colour", "color"),
            ("drive", "drivetrain"),
            ("fuel_type", "fuel"),
        ]
        .into_iter()
        .map(|(a, c)| (a.to_string(), c.to_string()))
        .collect();

        let numeric_attributes = ["price", "year", "mileage"].into_iter().map(String::from).collect();

        Self {
            aliases,
            numeric_attributes,
            distance_attribute: "distance".to_string(),
        }
    }
}

impl Normalizer {
    /// Canonical attribute name: normalized, spaces as underscores, aliases resolved
    pub fn attribute(&self, raw: &str) -> Result<String> {
        let name = normalize_text(raw).replace([' ', '-'], "_");
        if name.is_empty() {
            return Err(Error::EmptyAttribute);
        }
        Ok(self.aliases.get(&name).cloned().unwrap_or(name))
    }

    #[inline]
    pub fn is_numeric(&self, attribute: &str) -> bool {
        self.numeric_attributes.contains(attribute)
    }

    #[inline]
    pub fn is_distance(&self, attribute: &str) -> bool {
        self.distance_attribute == attribute
    }

    /// Lower-case alias keys and targets so lookups match normalized names
    pub fn normalize_self(&mut self) {
        self.aliases = std::mem::take(&mut self.aliases)
            .into_iter()
            .map(|(a, c)| (normalize_text(&a).replace(' ', "_"), normalize_text(&c).replace(' ', "_")))
            .collect();
        self.numeric_attributes = std::mem::take(&mut self.numeric_attributes)
            .into_iter()
            .map(|a| normalize_text(&a).replace(' ', "_"))
            .collect();
        self.distance_attribute = normalize_text(&self.distance_attribute).replace(' ', "_");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Land   Rover "), "land rover");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("30000"), Some(30000.0));
        assert_eq!(parse_number("$30,000"), Some(30000.0));
        assert_eq!(parse_number("25k"), Some(25000.0));
        assert_eq!(parse_number("1.5M"), Some(1_500_000.0));
        assert_eq!(parse_number("30_000"), Some(30000.0));
        assert_eq!(parse_number("cheap"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_strip_thousands_keeps_lists() {
        assert_eq!(strip_thousands("1,234,567"), "1234567");
        assert_eq!(strip_thousands("2019,2020"), "2019,2020");
    }

    #[test]
    fn test_attribute_aliases() {
        let n = Normalizer::default();
        assert_eq!(n.attribute("Brand").unwrap(), "make");
        assert_eq!(n.attribute("body type").unwrap(), "body_style");
        assert_eq!(n.attribute("Model").unwrap(), "model");
        assert!(matches!(n.attribute("   "), Err(Error::EmptyAttribute)));
    }
}
