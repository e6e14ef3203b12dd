//! Criteria result values
//!
//! A [`CriteriaValue`] is the raw result an external expression engine produced
//! for one subject and one named expression. Measure evaluation never computes
//! these values; it only inspects their membership, runtime types and
//! normalized identity.

use chrono::{DateTime, FixedOffset, NaiveDate};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::key::ValueKey;
use crate::resource::ResourceRef;

/// Raw result of one criteria expression for one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value")]
pub enum CriteriaValue {
    // === Primitive Types ===
    /// No value
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),

    // === Clinical Types ===
    Code(Code),
    Concept(Concept),
    Quantity(Quantity),
    Range(Range),
    Interval(Interval),

    // === Resources ===
    /// A resource instance returned by a retrieve
    Resource(ResourceRef),
    /// A reference element pointing at a resource
    Reference(ResourceRef),

    // === Composite Types ===
    List(Vec<CriteriaValue>),
    Tuple(IndexMap<String, CriteriaValue>),
    /// Result of a function-style expression: one entry per input resource
    Map(Vec<(CriteriaValue, CriteriaValue)>),
}

/// A code from a code system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Code {
    pub system: Option<String>,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Code {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            code: code.into(),
            display: None,
        }
    }

    /// `system|code`, or just `code` when the system is unknown
    pub fn token(&self) -> String {
        match &self.system {
            Some(system) => format!("{system}|{}", self.code),
            None => self.code.clone(),
        }
    }
}

/// A set of codes with optional text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub codes: Vec<Code>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A decimal value with an optional unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Quantity {
    pub fn new(value: Decimal, unit: Option<&str>) -> Self {
        Self {
            value,
            unit: unit.map(str::to_string),
        }
    }
}

/// A pair of quantity bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub low: Option<Quantity>,
    pub high: Option<Quantity>,
}

/// An interval over point values (dates, numbers)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub low: Option<Box<CriteriaValue>>,
    pub high: Option<Box<CriteriaValue>>,
    pub low_closed: bool,
    pub high_closed: bool,
}

/// Runtime type of a non-null leaf value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKind {
    Boolean,
    Integer,
    Decimal,
    String,
    Date,
    DateTime,
    Code,
    Concept,
    Quantity,
    Range,
    Interval,
    /// Resource instance of the named type
    Resource(String),
    Reference,
    Tuple,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(resource_type) => f.write_str(resource_type),
            other => write!(f, "{other:?}"),
        }
    }
}

impl CriteriaValue {
    /// Create a resource instance value
    pub fn resource(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Resource(ResourceRef::new(resource_type, id))
    }

    /// Create a coded value
    pub fn code(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Code(Code::new(system, code))
    }

    /// Create a list of resource instances of one type
    pub fn resources<'a>(resource_type: &str, ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self::List(
            ids.into_iter()
                .map(|id| Self::resource(resource_type, id))
                .collect(),
        )
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Null, or a collection holding nothing but empty values.
    ///
    /// A list holding a single null is how engines commonly return "no value"
    /// for a singleton expression, so it counts as empty too.
    pub fn is_empty_value(&self) -> bool {
        match self {
            Self::Null => true,
            Self::List(items) => items.iter().all(Self::is_empty_value),
            Self::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }

    /// Whether this result places its subject in a population.
    ///
    /// Null, `false` and empty collections are not members.
    pub fn is_member(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Boolean(b) => *b,
            Self::List(items) => items.iter().any(Self::is_member),
            Self::Map(entries) => !entries.is_empty(),
            _ => true,
        }
    }

    /// Runtime type of this value, `None` for null and containers
    pub fn kind(&self) -> Option<ValueKind> {
        let kind = match self {
            Self::Null | Self::List(_) | Self::Map(_) => return None,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::String(_) => ValueKind::String,
            Self::Date(_) => ValueKind::Date,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::Code(_) => ValueKind::Code,
            Self::Concept(_) => ValueKind::Concept,
            Self::Quantity(_) => ValueKind::Quantity,
            Self::Range(_) => ValueKind::Range,
            Self::Interval(_) => ValueKind::Interval,
            Self::Resource(r) => ValueKind::Resource(r.resource_type.clone()),
            Self::Reference(_) => ValueKind::Reference,
            Self::Tuple(_) => ValueKind::Tuple,
        };
        Some(kind)
    }

    /// All non-null leaf values, flattening lists and both sides of maps
    pub fn leaves(&self) -> Vec<&CriteriaValue> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a CriteriaValue>) {
        match self {
            Self::Null => {}
            Self::List(items) => items.iter().for_each(|v| v.collect_leaves(out)),
            Self::Map(entries) => {
                for (k, v) in entries {
                    k.collect_leaves(out);
                    v.collect_leaves(out);
                }
            }
            leaf => out.push(leaf),
        }
    }

    /// Resource instances contained in this value, in order of appearance
    pub fn resource_refs(&self) -> Vec<&ResourceRef> {
        self.leaves()
            .into_iter()
            .filter_map(|v| match v {
                Self::Resource(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Collapse a list holding a single value into that value.
    ///
    /// Returns `Null` for values that are [empty](Self::is_empty_value).
    pub fn singleton(&self) -> &CriteriaValue {
        const NULL: &CriteriaValue = &CriteriaValue::Null;
        match self {
            _ if self.is_empty_value() => NULL,
            Self::List(items) if items.len() == 1 => items[0].singleton(),
            other => other,
        }
    }

    /// Numeric content of an observation value
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Integer(i) => Some(Decimal::from(*i)),
            Self::Decimal(d) => Some(*d),
            Self::Quantity(q) => Some(q.value),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&ResourceRef> {
        match self {
            Self::Resource(r) => Some(r),
            _ => None,
        }
    }

    /// Entries of a function-style result
    pub fn as_map(&self) -> Option<&[(CriteriaValue, CriteriaValue)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Normalized identity used to group equal values
    pub fn key(&self) -> ValueKey {
        ValueKey::of(self)
    }
}

impl fmt::Display for CriteriaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{}", d.normalize()),
            Self::String(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            Self::Code(c) => f.write_str(c.display.as_deref().unwrap_or(&c.code)),
            Self::Concept(c) => match (&c.text, c.codes.first()) {
                (Some(text), _) => f.write_str(text),
                (None, Some(code)) => f.write_str(code.display.as_deref().unwrap_or(&code.code)),
                (None, None) => f.write_str(""),
            },
            Self::Quantity(q) => write_quantity(f, q),
            Self::Range(r) => {
                if let Some(low) = &r.low {
                    write_quantity(f, low)?;
                }
                f.write_str(" - ")?;
                if let Some(high) = &r.high {
                    write_quantity(f, high)?;
                }
                Ok(())
            }
            Self::Interval(i) => {
                f.write_str(if i.low_closed { "[" } else { "(" })?;
                if let Some(low) = &i.low {
                    write!(f, "{low}")?;
                }
                f.write_str(", ")?;
                if let Some(high) = &i.high {
                    write!(f, "{high}")?;
                }
                f.write_str(if i.high_closed { "]" } else { ")" })
            }
            Self::Resource(r) | Self::Reference(r) => write!(f, "{r}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Tuple(elements) => {
                f.write_str("{ ")?;
                for (i, (name, value)) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str(" }")
            }
            Self::Map(entries) => {
                f.write_str("{ ")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k} -> {v}")?;
                }
                f.write_str(" }")
            }
        }
    }
}

fn write_quantity(f: &mut fmt::Formatter<'_>, q: &Quantity) -> fmt::Result {
    match &q.unit {
        Some(unit) => write!(f, "{} {unit}", q.value.normalize()),
        None => write!(f, "{}", q.value.normalize()),
    }
}

// === Conversions ===

impl From<bool> for CriteriaValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for CriteriaValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<Decimal> for CriteriaValue {
    fn from(d: Decimal) -> Self {
        Self::Decimal(d)
    }
}

impl From<&str> for CriteriaValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for CriteriaValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<ResourceRef> for CriteriaValue {
    fn from(r: ResourceRef) -> Self {
        Self::Resource(r)
    }
}

impl From<Code> for CriteriaValue {
    fn from(c: Code) -> Self {
        Self::Code(c)
    }
}

impl<T: Into<CriteriaValue>> From<Option<T>> for CriteriaValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<CriteriaValue>> FromIterator<T> for CriteriaValue {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::List(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership() {
        assert!(!CriteriaValue::Null.is_member());
        assert!(!CriteriaValue::Boolean(false).is_member());
        assert!(CriteriaValue::Boolean(true).is_member());
        assert!(!CriteriaValue::List(vec![]).is_member());
        assert!(!CriteriaValue::List(vec![CriteriaValue::Null]).is_member());
        assert!(CriteriaValue::resources("Encounter", ["e1"]).is_member());
        assert!(CriteriaValue::from("M").is_member());
    }

    #[test]
    fn test_single_null_list_is_empty() {
        let v = CriteriaValue::List(vec![CriteriaValue::Null]);
        assert!(v.is_empty_value());
        assert!(v.singleton().is_null());
    }

    #[test]
    fn test_leaves_flatten_lists_and_maps() {
        let v = CriteriaValue::Map(vec![(
            CriteriaValue::resource("Encounter", "e1"),
            CriteriaValue::List(vec![CriteriaValue::Integer(3), CriteriaValue::Null]),
        )]);
        let kinds: Vec<_> = v.leaves().iter().filter_map(|l| l.kind()).collect();
        assert_eq!(
            kinds,
            vec![ValueKind::Resource("Encounter".into()), ValueKind::Integer]
        );
    }

    #[test]
    fn test_display() {
        let q = CriteriaValue::Quantity(Quantity::new(Decimal::new(1250, 2), Some("mg")));
        assert_eq!(q.to_string(), "12.5 mg");
        assert_eq!(
            CriteriaValue::resource("Patient", "p1").to_string(),
            "Patient/p1"
        );
    }
}
