//! FHIR JSON to criteria values
//!
//! Complex types are recognized by shape:
//!
//! | JSON shape                         | Criteria value |
//! |------------------------------------|----------------|
//! | object with `resourceType`         | `Resource`     |
//! | object with `reference`            | `Reference`    |
//! | object with `coding` or `text`     | `Concept`      |
//! | object with `value` (+ `unit`)     | `Quantity`     |
//! | object with `code` (+ `system`)    | `Code`         |
//! | object with quantity `low`/`high`  | `Range`        |
//! | object with `start`/`end`          | `Interval`     |
//! | object with `$map` entries         | `Map`          |
//! | object with a `$date` string       | `Date` / `DateTime` |
//! | any other object                   | `Tuple`        |
//!
//! Strings are always `String`; dates need the explicit `$date` form.

use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;
use octofhir_measure_types::{Code, Concept, CriteriaValue, Interval, Quantity, Range, ResourceRef};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};

use crate::error::{FhirError, FhirResult};

/// Key marking an object as a function-style result: `{"$map": [{"key": .., "value": ..}]}`
pub const MAP_KEY: &str = "$map";

/// Key marking an object as a date or date-time: `{"$date": "2024-03-01"}`
pub const DATE_KEY: &str = "$date";

/// Convert a FHIR JSON value into a criteria value
pub fn criteria_value_from_json(value: &Value) -> FhirResult<CriteriaValue> {
    Ok(match value {
        Value::Null => CriteriaValue::Null,
        Value::Bool(b) => CriteriaValue::Boolean(*b),
        Value::Number(n) => number(n)?,
        Value::String(s) => CriteriaValue::String(s.clone()),
        Value::Array(items) => CriteriaValue::List(
            items
                .iter()
                .map(criteria_value_from_json)
                .collect::<FhirResult<_>>()?,
        ),
        Value::Object(object) => object_value(object)?,
    })
}

fn number(n: &Number) -> FhirResult<CriteriaValue> {
    if let Some(i) = n.as_i64() {
        return Ok(CriteriaValue::Integer(i));
    }
    decimal(n).map(CriteriaValue::Decimal)
}

fn decimal(n: &Number) -> FhirResult<Decimal> {
    let text = n.to_string();
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| FhirError::invalid("value", text.clone(), e.to_string()))
}

fn date(value: &Value) -> FhirResult<CriteriaValue> {
    let text = value
        .as_str()
        .ok_or_else(|| FhirError::invalid("result", DATE_KEY, "expected a string"))?;
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(CriteriaValue::Date(date));
    }
    DateTime::parse_from_rfc3339(text)
        .map(CriteriaValue::DateTime)
        .map_err(|e| FhirError::invalid("result", DATE_KEY, format!("'{text}': {e}")))
}

fn object_value(object: &Map<String, Value>) -> FhirResult<CriteriaValue> {
    let field = |name: &str| object.get(name).and_then(Value::as_str);

    if let Some(entries) = object.get(MAP_KEY) {
        return map_entries(entries);
    }
    if let Some(value) = object.get(DATE_KEY) {
        return date(value);
    }
    if let Some(resource_type) = field("resourceType") {
        let id = field("id").ok_or_else(|| FhirError::missing(resource_type, "id"))?;
        return Ok(CriteriaValue::Resource(ResourceRef::new(resource_type, id)));
    }
    if let Some(reference) = field("reference") {
        let reference = reference
            .parse::<ResourceRef>()
            .map_err(|e| FhirError::invalid("Reference", "reference", e.to_string()))?;
        return Ok(CriteriaValue::Reference(reference));
    }
    if object.contains_key("coding") || (object.len() == 1 && object.contains_key("text")) {
        return Ok(CriteriaValue::Concept(concept(object)));
    }
    if let Some(Value::Number(value)) = object.get("value") {
        return Ok(CriteriaValue::Quantity(Quantity {
            value: decimal(value)?,
            unit: field("unit").or_else(|| field("code")).map(str::to_string),
        }));
    }
    if let Some(code) = field("code") {
        return Ok(CriteriaValue::Code(coding(object, code)));
    }
    if object.contains_key("low") || object.contains_key("high") {
        return range(object);
    }
    if object.contains_key("start") || object.contains_key("end") {
        let bound = |name: &str| -> FhirResult<Option<Box<CriteriaValue>>> {
            object
                .get(name)
                .map(|v| criteria_value_from_json(v).map(Box::new))
                .transpose()
        };
        return Ok(CriteriaValue::Interval(Interval {
            low: bound("start")?,
            high: bound("end")?,
            low_closed: true,
            high_closed: true,
        }));
    }

    let elements = object
        .iter()
        .filter(|(name, _)| name.as_str() != "extension")
        .map(|(name, v)| Ok((name.clone(), criteria_value_from_json(v)?)))
        .collect::<FhirResult<IndexMap<_, _>>>()?;
    Ok(CriteriaValue::Tuple(elements))
}

fn coding(object: &Map<String, Value>, code: &str) -> Code {
    let field = |name: &str| object.get(name).and_then(Value::as_str).map(str::to_string);
    Code {
        system: field("system"),
        code: code.to_string(),
        display: field("display"),
    }
}

fn concept(object: &Map<String, Value>) -> Concept {
    let codes = object
        .get("coding")
        .and_then(Value::as_array)
        .map(|codings| {
            codings
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|c| Some(coding(c, c.get("code")?.as_str()?)))
                .collect()
        })
        .unwrap_or_default();
    Concept {
        codes,
        text: object.get("text").and_then(Value::as_str).map(str::to_string),
    }
}

fn range(object: &Map<String, Value>) -> FhirResult<CriteriaValue> {
    let quantity = |name: &str| -> FhirResult<Option<Quantity>> {
        match object.get(name).map(criteria_value_from_json).transpose()? {
            None | Some(CriteriaValue::Null) => Ok(None),
            Some(CriteriaValue::Quantity(q)) => Ok(Some(q)),
            Some(other) => Err(FhirError::invalid(
                "Range",
                name,
                format!("expected a Quantity, found {other}"),
            )),
        }
    };
    Ok(CriteriaValue::Range(Range {
        low: quantity("low")?,
        high: quantity("high")?,
    }))
}

fn map_entries(entries: &Value) -> FhirResult<CriteriaValue> {
    let entries = entries
        .as_array()
        .ok_or_else(|| FhirError::invalid("result", MAP_KEY, "expected an array of entries"))?;
    entries
        .iter()
        .map(|entry| {
            let key = entry
                .get("key")
                .ok_or_else(|| FhirError::missing("result", format!("{MAP_KEY}.key")))?;
            let value = entry.get("value").unwrap_or(&Value::Null);
            Ok((criteria_value_from_json(key)?, criteria_value_from_json(value)?))
        })
        .collect::<FhirResult<Vec<_>>>()
        .map(CriteriaValue::Map)
}
