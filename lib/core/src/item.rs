use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::normalize::normalize_text;

/// Stable identity of a catalog row (VIN, part number, SKU)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId(s)
    }
}

/// Attribute value of a catalog row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            AttrValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<f64> for AttrValue {
    fn from(n: f64) -> Self {
        AttrValue::Number(n)
    }
}

/// Latitude/longitude in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    const EARTH_RADIUS_MILES: f64 = 3958.8;

    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in miles (haversine)
    pub fn distance_miles(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * Self::EARTH_RADIUS_MILES * a.sqrt().asin()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// A catalog row as returned by the catalog store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub media: Vec<MediaAsset>,
    /// Capability measure used by the value-ratio tie-break (horsepower, range, capacity)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<f64>,
}

impl CatalogItem {
    #[must_use]
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            attributes: BTreeMap::new(),
            tags: Vec::new(),
            location: None,
            media: Vec::new(),
            capability: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_media(mut self, url: &str) -> Self {
        self.media.push(MediaAsset { url: url.to_string(), kind: None });
        self
    }

    #[must_use]
    pub fn with_capability(mut self, capability: f64) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Canonical form used by the catalog: lower-cased attribute names,
    /// normalized text values and tags
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.attributes = std::mem::take(&mut self.attributes)
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    AttrValue::Text(s) => AttrValue::Text(normalize_text(&s)),
                    number => number,
                };
                (normalize_text(&name).replace(' ', "_"), value)
            })
            .collect();
        self.tags = self.tags.iter().map(|t| normalize_text(t)).filter(|t| !t.is_empty()).collect();
        self
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(AttrValue::as_text)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).and_then(AttrValue::as_number)
    }

    pub fn price(&self) -> Option<f64> {
        self.number("price")
    }

    pub fn mileage(&self) -> Option<f64> {
        self.number("mileage")
    }

    #[inline]
    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }

    /// Price per unit of capability; lower is better value
    pub fn value_ratio(&self) -> Option<f64> {
        match (self.price(), self.capability) {
            (Some(price), Some(cap)) if cap > 0.0 => Some(price / cap),
            _ => None,
        }
    }

    /// All searchable text of the row, used by keyword re-ranking
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(self.title.len() + self.description.len() + 64);
        text.push_str(&self.title);
        text.push(' ');
        text.push_str(&self.description);
        for value in self.attributes.values() {
            if let AttrValue::Text(s) = value {
                text.push(' ');
                text.push_str(s);
            }
        }
        for tag in &self.tags {
            text.push(' ');
            text.push_str(tag);
        }
        text
    }
}
