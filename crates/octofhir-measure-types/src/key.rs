//! Normalized value identity
//!
//! Stratification groups subjects by "the same" value. Two values are the same
//! when their [`ValueKey`]s are equal:
//!
//! - strings, booleans and numbers compare by value (decimals ignore trailing zeros)
//! - codes compare by `system|code`, ignoring display text
//! - concepts compare by their sorted, de-duplicated code set
//! - quantities, ranges, intervals and composites compare by canonical text
//!
//! Each key is prefixed with the value's kind so that `"5"` and `5` stay distinct.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write;

use crate::value::{CriteriaValue, Quantity};

/// Canonical key of a criteria value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueKey(String);

impl ValueKey {
    /// Compute the key of a value
    pub fn of(value: &CriteriaValue) -> Self {
        let mut out = String::new();
        write_key(&mut out, value);
        Self(out)
    }

    /// Key of a tuple of component values, in component order
    pub fn of_tuple<'a>(values: impl IntoIterator<Item = &'a CriteriaValue>) -> Self {
        let mut out = String::from("(");
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_key(&mut out, value);
        }
        out.push(')');
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_key(out: &mut String, value: &CriteriaValue) {
    // Writing to a String cannot fail
    let _ = match value.singleton() {
        CriteriaValue::Null => write!(out, "Null"),
        CriteriaValue::Boolean(b) => write!(out, "Boolean:{b}"),
        CriteriaValue::Integer(i) => write!(out, "Integer:{i}"),
        CriteriaValue::Decimal(d) => write!(out, "Decimal:{}", d.normalize()),
        CriteriaValue::String(s) => write!(out, "String:{s}"),
        CriteriaValue::Date(d) => write!(out, "Date:{}", d.format("%Y-%m-%d")),
        CriteriaValue::DateTime(dt) => write!(out, "DateTime:{}", dt.to_rfc3339()),
        CriteriaValue::Code(c) => write!(out, "Code:{}", c.token()),
        CriteriaValue::Concept(c) => {
            let mut tokens: Vec<String> = c.codes.iter().map(|code| code.token()).collect();
            tokens.sort();
            tokens.dedup();
            write!(out, "Concept:[{}]", tokens.join(","))
        }
        CriteriaValue::Quantity(q) => write!(out, "Quantity:{}", quantity_text(q)),
        CriteriaValue::Range(r) => write!(
            out,
            "Range:[{}..{}]",
            r.low.as_ref().map(quantity_text).unwrap_or_default(),
            r.high.as_ref().map(quantity_text).unwrap_or_default()
        ),
        CriteriaValue::Interval(i) => {
            out.push_str("Interval:");
            out.push(if i.low_closed { '[' } else { '(' });
            if let Some(low) = &i.low {
                write_key(out, low);
            }
            out.push_str("..");
            if let Some(high) = &i.high {
                write_key(out, high);
            }
            out.push(if i.high_closed { ']' } else { ')' });
            Ok(())
        }
        CriteriaValue::Resource(r) => write!(out, "Resource:{}", r.key()),
        CriteriaValue::Reference(r) => write!(out, "Reference:{}", r.key()),
        CriteriaValue::List(items) => {
            out.push_str("List:[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_key(out, item);
            }
            out.push(']');
            Ok(())
        }
        CriteriaValue::Tuple(elements) => {
            out.push_str("Tuple:{");
            for (i, (name, item)) in elements.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(name);
                out.push('=');
                write_key(out, item);
            }
            out.push('}');
            Ok(())
        }
        CriteriaValue::Map(entries) => {
            out.push_str("Map:{");
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_key(out, k);
                out.push_str("=>");
                write_key(out, v);
            }
            out.push('}');
            Ok(())
        }
    };
}

fn quantity_text(q: &Quantity) -> String {
    match &q.unit {
        Some(unit) => format!("{} '{unit}'", q.value.normalize()),
        None => q.value.normalize().to_string(),
    }
}
