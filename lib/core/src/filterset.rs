//! Filter sets
//!
//! A [`FilterSet`] is the structured query handed to the engine by the NLU
//! collaborator. It carries soft `constraints`, never-relaxed `must_have`
//! constraints and an [`AvoidList`] that is enforced on every retrieval path.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::filter::FilterCondition;
use crate::normalize::{normalize_text, parse_number, Normalizer};
use crate::{CatalogItem, Error, GeoPoint, Result};

pub type Values = SmallVec<[String; 4]>;

/// A single normalized attribute constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    Exact(String),
    AnyOf(Values),
    Range { min: Option<f64>, max: Option<f64> },
    /// Distance from the filter set's location, in miles
    Within { miles: f64 },
}

/// Constraint value as produced by upstream collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl Constraint {
    /// Parse a raw value for `attribute` (already canonical) into a constraint
    pub fn parse(attribute: &str, raw: &RawValue, normalizer: &Normalizer) -> Result<Self> {
        let numeric = normalizer.is_numeric(attribute);

        if normalizer.is_distance(attribute) {
            let text = match raw {
                RawValue::Number(n) => n.to_string(),
                RawValue::Text(s) => s.clone(),
                RawValue::List(_) => return Err(Error::InvalidRange { attribute: attribute.to_string(), raw: format!("{:?}", raw) }),
            };
            return match Self::parse_range(attribute, &text)? {
                Constraint::Range { max: Some(miles), .. } => Ok(Constraint::Within { miles }),
                _ => Err(Error::InvalidRange { attribute: attribute.to_string(), raw: text }),
            };
        }

        match raw {
            RawValue::Number(n) if numeric => Ok(Constraint::Range { min: Some(*n), max: Some(*n) }),
            RawValue::Number(n) => Ok(Constraint::Exact(normalize_number(*n))),
            RawValue::List(values) => Self::from_values(attribute, values.iter().map(String::as_str), numeric),
            RawValue::Text(text) => {
                let text = text.trim();
                if numeric && is_range_syntax(text) {
                    return Self::parse_range(attribute, text);
                }
                if numeric {
                    if let Some(n) = parse_number(text) {
                        return Ok(Constraint::Range { min: Some(n), max: Some(n) });
                    }
                }
                Self::from_values(attribute, text.split(','), numeric)
            }
        }
    }

    fn from_values<'a>(attribute: &str, values: impl Iterator<Item = &'a str>, numeric: bool) -> Result<Self> {
        let mut out: Values = SmallVec::new();
        for value in values {
            let value = if numeric {
                match parse_number(value) {
                    Some(n) => normalize_number(n),
                    None => return Err(Error::InvalidNumber { attribute: attribute.to_string(), raw: value.to_string() }),
                }
            } else {
                normalize_text(value)
            };
            if !value.is_empty() && !out.contains(&value) {
                out.push(value);
            }
        }
        match out.len() {
            0 => Err(Error::InvalidNumber { attribute: attribute.to_string(), raw: String::new() }),
            1 => Ok(Constraint::Exact(out.remove(0))),
            _ => Ok(Constraint::AnyOf(out)),
        }
    }

    /// `min-max`, `min-` or `-max`; reversed bounds are swapped
    fn parse_range(attribute: &str, raw: &str) -> Result<Self> {
        let invalid = || Error::InvalidRange { attribute: attribute.to_string(), raw: raw.to_string() };
        let raw = raw.trim();

        let (lo, hi) = match raw.split_once('-') {
            Some((lo, hi)) => (lo.trim(), hi.trim()),
            None => ("", raw),
        };
        let min = if lo.is_empty() { None } else { Some(parse_number(lo).ok_or_else(invalid)?) };
        let max = if hi.is_empty() { None } else { Some(parse_number(hi).ok_or_else(invalid)?) };

        match (min, max) {
            (None, None) => Err(invalid()),
            (Some(a), Some(b)) if a > b => Ok(Constraint::Range { min: Some(b), max: Some(a) }),
            (min, max) => Ok(Constraint::Range { min, max }),
        }
    }

    /// Predicate form of this constraint
    pub fn to_condition(&self, attribute: &str, location: Option<GeoPoint>) -> Result<FilterCondition> {
        let field = attribute.to_string();
        Ok(match self {
            Constraint::Exact(value) => FilterCondition::Equals { field, value: value.clone() },
            Constraint::AnyOf(values) => FilterCondition::In { field, values: values.to_vec() },
            Constraint::Range { min, max } => FilterCondition::Range { field, min: *min, max: *max },
            Constraint::Within { miles } => {
                let center = location.ok_or_else(|| Error::MissingLocation(field.clone()))?;
                FilterCondition::WithinMiles { center, miles: *miles }
            }
        })
    }

    /// Canonical `(attr, value)` tokens used for overlap comparisons between filter sets
    pub fn signature(&self, attribute: &str) -> Vec<String> {
        match self {
            Constraint::Exact(v) => vec![format!("{attribute}={v}")],
            Constraint::AnyOf(vs) => vs.iter().map(|v| format!("{attribute}={v}")).collect(),
            Constraint::Range { min, max } => vec![format!(
                "{attribute}={}..{}",
                min.map(normalize_number).unwrap_or_default(),
                max.map(normalize_number).unwrap_or_default()
            )],
            Constraint::Within { miles } => vec![format!("{attribute}<={}", normalize_number(*miles))],
        }
    }
}

fn is_range_syntax(text: &str) -> bool {
    text.contains('-')
}

fn normalize_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One side of an avoid rule: `attribute == value`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldMatch {
    pub attribute: String,
    pub value: String,
}

impl FieldMatch {
    /// Parse `"Make:Toyota"`; a bare value targets the `category` attribute
    pub fn parse(raw: &str, normalizer: &Normalizer) -> Result<Self> {
        let (attribute, value) = match raw.split_once(':') {
            Some((attr, value)) => (normalizer.attribute(attr)?, normalize_text(value)),
            None => ("category".to_string(), normalize_text(raw)),
        };
        if value.is_empty() {
            return Err(Error::InvalidAvoidRule(raw.to_string()));
        }
        Ok(Self { attribute, value })
    }

    fn matches(&self, item: &CatalogItem) -> bool {
        match item.attr(&self.attribute) {
            Some(crate::AttrValue::Text(s)) => *s == self.value,
            Some(crate::AttrValue::Number(n)) => normalize_number(*n) == self.value,
            None => false,
        }
    }

    fn to_condition(&self) -> FilterCondition {
        FilterCondition::Equals { field: self.attribute.clone(), value: self.value.clone() }
    }
}

/// Exclusion tuple: rows matching every present field are excluded
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AvoidRule {
    pub primary: FieldMatch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<FieldMatch>,
}

impl AvoidRule {
    pub fn matches(&self, item: &CatalogItem) -> bool {
        self.primary.matches(item) && self.secondary.as_ref().map_or(true, |s| s.matches(item))
    }
}

/// Raw avoid tuple as produced upstream (`{category: "Make:Toyota", sub: "Model:RAV4"}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAvoidRule {
    pub category: String,
    #[serde(default, alias = "sub_category")]
    pub sub: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvoidList {
    rules: Vec<AvoidRule>,
}

impl AvoidList {
    pub fn new(rules: Vec<AvoidRule>) -> Self {
        let mut list = Self { rules: Vec::new() };
        for rule in rules {
            list.push(rule);
        }
        list
    }

    pub fn push(&mut self, rule: AvoidRule) {
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
    }

    pub fn rules(&self) -> &[AvoidRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether any rule excludes the item
    pub fn excludes(&self, item: &CatalogItem) -> bool {
        self.rules.iter().any(|rule| rule.matches(item))
    }

    /// Conjunction of negated rule conjunctions
    pub fn to_condition(&self) -> FilterCondition {
        FilterCondition::all(self.rules.iter().map(|rule| {
            let mut fields = vec![rule.primary.to_condition()];
            if let Some(secondary) = &rule.secondary {
                fields.push(secondary.to_condition());
            }
            FilterCondition::Not(Box::new(FilterCondition::all(fields)))
        }))
    }
}

/// Filter set in the shape produced by the NLU collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFilterSet {
    #[serde(alias = "filters")]
    pub constraints: BTreeMap<String, RawValue>,
    pub must_have: BTreeMap<String, RawValue>,
    pub avoid_list: Vec<RawAvoidRule>,
    pub location: Option<GeoPoint>,
}

/// Normalized, immutable query constraints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    pub constraints: BTreeMap<String, Constraint>,
    pub must_have: BTreeMap<String, Constraint>,
    pub avoid_list: AvoidList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a raw filter set. Entries that cannot be normalized are
    /// dropped and returned alongside the result.
    pub fn from_raw(raw: &RawFilterSet, normalizer: &Normalizer) -> (Self, Vec<Error>) {
        let mut rejected = Vec::new();
        let mut set = FilterSet { location: raw.location, ..Default::default() };

        let mut parse_into = |source: &BTreeMap<String, RawValue>, target: &mut BTreeMap<String, Constraint>| {
            for (name, value) in source {
                let parsed = normalizer.attribute(name).and_then(|attr| {
                    let constraint = Constraint::parse(&attr, value, normalizer)?;
                    if matches!(constraint, Constraint::Within { .. }) && raw.location.is_none() {
                        return Err(Error::MissingLocation(attr));
                    }
                    Ok((attr, constraint))
                });
                match parsed {
                    Ok((attr, constraint)) => {
                        target.insert(attr, constraint);
                    }
                    Err(e) => rejected.push(e),
                }
            }
        };
        parse_into(&raw.must_have, &mut set.must_have);
        parse_into(&raw.constraints, &mut set.constraints);

        for rule in &raw.avoid_list {
            let primary = FieldMatch::parse(&rule.category, normalizer);
            let secondary = rule.sub.as_deref().filter(|s| !s.trim().is_empty()).map(|s| FieldMatch::parse(s, normalizer)).transpose();
            match (primary, secondary) {
                (Ok(primary), Ok(secondary)) => set.avoid_list.push(AvoidRule { primary, secondary }),
                (Err(e), _) | (_, Err(e)) => rejected.push(e),
            }
        }

        set.enforce_must_have_precedence();
        (set, rejected)
    }

    #[must_use]
    pub fn with_constraint(mut self, attribute: &str, constraint: Constraint) -> Self {
        self.constraints.insert(attribute.to_string(), constraint);
        self.enforce_must_have_precedence();
        self
    }

    #[must_use]
    pub fn with_must_have(mut self, attribute: &str, constraint: Constraint) -> Self {
        self.must_have.insert(attribute.to_string(), constraint);
        self.enforce_must_have_precedence();
        self
    }

    #[must_use]
    pub fn with_avoid(mut self, rule: AvoidRule) -> Self {
        self.avoid_list.push(rule);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    fn enforce_must_have_precedence(&mut self) {
        let must_have = &self.must_have;
        self.constraints.retain(|attr, _| !must_have.contains_key(attr));
    }

    /// must_have ∧ ¬avoid
    pub fn base_condition(&self) -> Result<FilterCondition> {
        let mut parts = Vec::with_capacity(self.must_have.len() + 1);
        for (attr, constraint) in &self.must_have {
            parts.push(constraint.to_condition(attr, self.location)?);
        }
        parts.push(self.avoid_list.to_condition());
        Ok(FilterCondition::all(parts))
    }

    /// must_have ∧ the given soft constraints ∧ ¬avoid
    pub fn condition_with<'a>(&self, soft: impl IntoIterator<Item = &'a str>) -> Result<FilterCondition> {
        let mut parts = vec![self.base_condition()?];
        for attr in soft {
            if let Some(constraint) = self.constraints.get(attr) {
                parts.push(constraint.to_condition(attr, self.location)?);
            }
        }
        Ok(FilterCondition::all(parts))
    }

    /// Every constraint, must-have first
    pub fn all_constraints(&self) -> impl Iterator<Item = (&String, &Constraint)> {
        self.must_have.iter().chain(self.constraints.iter())
    }

    /// Sorted `(attr, value)` tokens of the soft constraints
    pub fn signature(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.constraints.iter().flat_map(|(attr, c)| c.signature(attr)).collect();
        tokens.sort();
        tokens.dedup();
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Filter, Predicate};

    fn normalizer() -> Normalizer {
        Normalizer::default()
    }

    #[test]
    fn test_parse_range_and_multi_value() {
        let n = normalizer();
        assert_eq!(
            Constraint::parse("price", &"0-30000".into(), &n).unwrap(),
            Constraint::Range { min: Some(0.0), max: Some(30000.0) }
        );
        assert_eq!(
            Constraint::parse("price", &"$20k - $30k".into(), &n).unwrap(),
            Constraint::Range { min: Some(20000.0), max: Some(30000.0) }
        );
        assert_eq!(
            Constraint::parse("year", &"2022-2018".into(), &n).unwrap(),
            Constraint::Range { min: Some(2018.0), max: Some(2022.0) }
        );
        assert_eq!(
            Constraint::parse("mileage", &"-50000".into(), &n).unwrap(),
            Constraint::Range { min: None, max: Some(50000.0) }
        );
        assert_eq!(
            Constraint::parse("make", &"Honda, Mazda ,honda".into(), &n).unwrap(),
            Constraint::AnyOf(SmallVec::from_vec(vec!["honda".to_string(), "mazda".to_string()]))
        );
        assert_eq!(Constraint::parse("make", &"  Kia ".into(), &n).unwrap(), Constraint::Exact("kia".into()));
    }

    #[test]
    fn test_parse_numeric_rejects_garbage() {
        let n = normalizer();
        assert!(matches!(
            Constraint::parse("price", &"cheap-ish".into(), &n),
            Err(Error::InvalidRange { .. })
        ));
        assert!(matches!(Constraint::parse("year", &"recent".into(), &n), Err(Error::InvalidNumber { .. })));
    }

    #[test]
    fn test_numeric_value_and_list() {
        let n = normalizer();
        assert_eq!(
            Constraint::parse("year", &RawValue::Number(2020.0), &n).unwrap(),
            Constraint::Range { min: Some(2020.0), max: Some(2020.0) }
        );
        assert_eq!(
            Constraint::parse("year", &"2019,2020".into(), &n).unwrap(),
            Constraint::AnyOf(SmallVec::from_vec(vec!["2019".to_string(), "2020".to_string()]))
        );
    }

    #[test]
    fn test_distance_constraint() {
        let n = normalizer();
        assert_eq!(Constraint::parse("distance", &"0-50".into(), &n).unwrap(), Constraint::Within { miles: 50.0 });
        assert_eq!(Constraint::parse("distance", &RawValue::Number(25.0), &n).unwrap(), Constraint::Within { miles: 25.0 });
    }

    #[test]
    fn test_from_raw_normalizes_and_rejects() {
        let mut raw = RawFilterSet::default();
        raw.constraints.insert("Body Type".into(), "SUV".into());
        raw.constraints.insert("price".into(), "0-30000".into());
        raw.constraints.insert("year".into(), "someday".into());
        raw.constraints.insert("distance".into(), "0-50".into());
        raw.must_have.insert("Brand".into(), "Honda".into());
        raw.constraints.insert("make".into(), "Mazda".into());
        raw.avoid_list.push(RawAvoidRule { category: "Make:Toyota".into(), sub: Some("Model:RAV4".into()) });

        let (set, rejected) = FilterSet::from_raw(&raw, &normalizer());

        assert_eq!(set.must_have.get("make"), Some(&Constraint::Exact("honda".into())));
        assert!(!set.constraints.contains_key("make"), "must-have wins over soft constraint");
        assert_eq!(set.constraints.get("body_style"), Some(&Constraint::Exact("suv".into())));
        assert!(set.constraints.contains_key("price"));
        assert!(!set.constraints.contains_key("year"));
        assert!(!set.constraints.contains_key("distance"), "no location given");
        assert_eq!(rejected.len(), 2);
        assert_eq!(set.avoid_list.len(), 1);
        assert_eq!(set.avoid_list.rules()[0].secondary.as_ref().unwrap().value, "rav4");
    }

    #[test]
    fn test_avoid_list_excludes_and_condition_agree() {
        let n = normalizer();
        let avoid = AvoidList::new(vec![
            AvoidRule {
                primary: FieldMatch::parse("Make:Toyota", &n).unwrap(),
                secondary: Some(FieldMatch::parse("Model:RAV4", &n).unwrap()),
            },
            AvoidRule { primary: FieldMatch::parse("Trucks", &n).unwrap(), secondary: None },
        ]);
        let predicate = Predicate::new(avoid.to_condition());

        let rav4 = CatalogItem::new("1").with_attr("make", "toyota").with_attr("model", "rav4");
        let camry = CatalogItem::new("2").with_attr("make", "toyota").with_attr("model", "camry");
        let truck = CatalogItem::new("3").with_attr("category", "trucks");

        for item in [&rav4, &camry, &truck] {
            assert_eq!(avoid.excludes(item), !predicate.matches(item), "item {}", item.id);
        }
        assert!(avoid.excludes(&rav4));
        assert!(!avoid.excludes(&camry));
        assert!(avoid.excludes(&truck));
    }

    #[test]
    fn test_base_condition_requires_location_for_distance() {
        let set = FilterSet::new().with_must_have("distance", Constraint::Within { miles: 10.0 });
        assert!(matches!(set.base_condition(), Err(Error::MissingLocation(_))));

        let located = set.with_location(GeoPoint::new(0.0, 0.0));
        assert!(located.base_condition().is_ok());
    }

    #[test]
    fn test_signature_is_order_independent() {
        let a = FilterSet::new()
            .with_constraint("make", Constraint::Exact("honda".into()))
            .with_constraint("year", Constraint::Range { min: Some(2018.0), max: Some(2020.0) });
        let b = FilterSet::new()
            .with_constraint("year", Constraint::Range { min: Some(2018.0), max: Some(2020.0) })
            .with_constraint("make", Constraint::Exact("honda".into()));
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.signature(), vec!["make=honda".to_string(), "year=2018..2020".to_string()]);
    }
}
