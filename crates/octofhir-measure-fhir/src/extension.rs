//! Extension urls and JSON element helpers

use serde_json::Value;

const CQFM: &str = "http://hl7.org/fhir/us/cqfmeasures/StructureDefinition/";

pub const POPULATION_BASIS_URL: &str =
    "http://hl7.org/fhir/us/cqfmeasures/StructureDefinition/cqfm-populationBasis";
pub const SCORING_URL: &str = "http://hl7.org/fhir/us/cqfmeasures/StructureDefinition/cqfm-scoring";
pub const IMPROVEMENT_NOTATION_URL: &str =
    "http://hl7.org/fhir/us/cqfmeasures/StructureDefinition/cqfm-improvementNotation";
pub const CRITERIA_REFERENCE_URL: &str =
    "http://hl7.org/fhir/us/cqfmeasures/StructureDefinition/cqfm-criteriaReference";
pub const AGGREGATE_METHOD_URL: &str =
    "http://hl7.org/fhir/us/cqfmeasures/StructureDefinition/cqfm-aggregateMethod";
pub const SUPPLEMENTAL_DATA_URL: &str =
    "http://hl7.org/fhir/us/davinci-deqm/StructureDefinition/extension-supplementalData";
pub const DATE_OF_COMPLIANCE_URL: &str =
    "http://hl7.org/fhir/us/davinci-deqm/StructureDefinition/extension-careGapDateOfComplianceExpression";

/// Whether `url` names a cqfm profile extension
pub fn is_cqfm(url: &str) -> bool {
    url.starts_with(CQFM)
}

/// The `value[x]` of the first extension of `element` with `url`
pub fn extension_value<'a>(element: &'a Value, url: &str) -> Option<&'a Value> {
    element
        .get("extension")?
        .as_array()?
        .iter()
        .find(|ext| ext.get("url").and_then(Value::as_str) == Some(url))?
        .as_object()?
        .iter()
        .find(|(key, _)| key.starts_with("value"))
        .map(|(_, value)| value)
}

/// Code of the first coding of a CodeableConcept, or a plain code string
pub fn first_code(value: &Value) -> Option<&str> {
    match value {
        Value::String(code) => Some(code),
        _ => value
            .get("coding")?
            .as_array()?
            .first()?
            .get("code")?
            .as_str(),
    }
}

/// System of the first coding of a CodeableConcept
pub fn first_system(value: &Value) -> Option<&str> {
    value
        .get("coding")?
        .as_array()?
        .first()?
        .get("system")?
        .as_str()
}

/// `criteria.expression` of a population, stratifier or supplemental data element
pub fn criteria_expression(element: &Value) -> Option<&str> {
    element
        .get("criteria")?
        .get("expression")?
        .as_str()
        .filter(|e| !e.is_empty())
}

pub fn str_field<'a>(element: &'a Value, name: &str) -> Option<&'a str> {
    element.get(name).and_then(Value::as_str)
}

pub fn array_field<'a>(element: &'a Value, name: &str) -> &'a [Value] {
    element
        .get(name)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extension_value() {
        let element = json!({
            "extension": [
                {"url": "http://other", "valueString": "x"},
                {"url": SCORING_URL, "valueCodeableConcept": {"coding": [{"code": "ratio"}]}}
            ]
        });
        let value = extension_value(&element, SCORING_URL).unwrap();
        assert_eq!(first_code(value), Some("ratio"));
        assert!(extension_value(&element, POPULATION_BASIS_URL).is_none());
        assert!(is_cqfm(SCORING_URL));
    }
}
