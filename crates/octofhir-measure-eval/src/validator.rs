//! Population basis validation
//!
//! Before a result is aggregated, its runtime types are checked against the
//! group's population basis. Nothing is coerced: a result containing a single
//! incompatible leaf fails the whole evaluation.

use std::collections::BTreeSet;

use octofhir_measure_def::{GroupDef, PopulationBasis, PopulationDef, StratifierDef};
use octofhir_measure_types::{CriteriaValue, ValueKind};

use crate::error::{MeasureError, MeasureResult};

/// Leaf types a stratifier may return regardless of basis
pub const STRATIFIER_TYPES: &[ValueKind] = &[
    ValueKind::Boolean,
    ValueKind::Integer,
    ValueKind::String,
    ValueKind::Code,
    ValueKind::Concept,
    ValueKind::Quantity,
    ValueKind::Range,
    ValueKind::Reference,
];

/// Checks evaluated results against a group's population basis
pub trait PopulationBasisValidator {
    /// Validate the result of a population expression
    fn validate_population(
        &self,
        measure: &str,
        group: &GroupDef,
        population: &PopulationDef,
        value: &CriteriaValue,
    ) -> MeasureResult<()>;

    /// Validate the result of one stratifier (or stratifier component) expression
    fn validate_stratifier(
        &self,
        measure: &str,
        group: &GroupDef,
        stratifier: &StratifierDef,
        expression: &str,
        value: &CriteriaValue,
    ) -> MeasureResult<()>;
}

/// Basis validation rules for measure groups.
///
/// - boolean basis: population leaves must be booleans or stratifier types
/// - resource basis: population leaves must be instances of the basis type
/// - stratifiers: leaves must be stratifier types, or basis resources under a resource basis
/// - function-style (map) stratifier results need a resource basis
///
/// Observation and date-of-compliance populations carry no basis members and are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBasisValidator;

impl DefaultBasisValidator {
    pub fn new() -> Self {
        Self
    }
}

impl PopulationBasisValidator for DefaultBasisValidator {
    fn validate_population(
        &self,
        measure: &str,
        group: &GroupDef,
        population: &PopulationDef,
        value: &CriteriaValue,
    ) -> MeasureResult<()> {
        if !population.population_type.holds_members() {
            return Ok(());
        }
        let found = offending_kinds(value, |kind| match &group.basis {
            PopulationBasis::Boolean => {
                *kind == ValueKind::Boolean || STRATIFIER_TYPES.contains(kind)
            }
            PopulationBasis::Resource(basis) => is_basis_resource(kind, basis),
        });
        check(
            found,
            measure,
            "population",
            &population.id,
            &population.expression,
            &group.basis,
        )
    }

    fn validate_stratifier(
        &self,
        measure: &str,
        group: &GroupDef,
        stratifier: &StratifierDef,
        expression: &str,
        value: &CriteriaValue,
    ) -> MeasureResult<()> {
        let mut found = offending_kinds(value, |kind| {
            STRATIFIER_TYPES.contains(kind)
                || group
                    .basis
                    .resource_type()
                    .is_some_and(|basis| is_basis_resource(kind, basis))
        });
        // One row per subject under a boolean basis
        if group.basis.is_boolean() && value.singleton().as_map().is_some() {
            found.insert("Map".to_string());
        }
        check(found, measure, "stratifier", &stratifier.id, expression, &group.basis)
    }
}

fn is_basis_resource(kind: &ValueKind, basis: &str) -> bool {
    match kind {
        ValueKind::Resource(resource_type) => {
            octofhir_measure_types::is_resource_subtype(resource_type, basis)
        }
        _ => false,
    }
}

/// Runtime types of the leaves of `value` rejected by `accepts`
fn offending_kinds(value: &CriteriaValue, accepts: impl Fn(&ValueKind) -> bool) -> BTreeSet<String> {
    value
        .leaves()
        .into_iter()
        .filter_map(CriteriaValue::kind)
        .filter(|kind| !accepts(kind))
        .map(|kind| kind.to_string())
        .collect()
}

fn check(
    found: BTreeSet<String>,
    measure: &str,
    element: &str,
    id: &str,
    expression: &str,
    basis: &PopulationBasis,
) -> MeasureResult<()> {
    if found.is_empty() {
        return Ok(());
    }
    Err(MeasureError::BasisMismatch {
        measure: measure.to_string(),
        element: element.to_string(),
        id: id.to_string(),
        expression: expression.to_string(),
        basis: basis.to_string(),
        found: found.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_measure_def::{ImprovementNotation, MeasureScoring, PopulationType};

    fn group(basis: PopulationBasis) -> GroupDef {
        GroupDef {
            id: "g".into(),
            scoring: MeasureScoring::Cohort,
            basis,
            improvement_notation: ImprovementNotation::Increase,
            populations: vec![PopulationDef::of_type(PopulationType::InitialPopulation, "IP")],
            stratifiers: vec![StratifierDef::expression("s", "Gender")],
        }
    }

    #[test]
    fn test_resource_basis_rejects_other_resource() {
        let g = group(PopulationBasis::Resource("Encounter".into()));
        let value = CriteriaValue::List(vec![
            CriteriaValue::resource("Encounter", "e1"),
            CriteriaValue::resource("Patient", "p1"),
        ]);
        let err = DefaultBasisValidator
            .validate_population("m", &g, &g.populations[0], &value)
            .unwrap_err();
        match err {
            MeasureError::BasisMismatch { found, basis, id, .. } => {
                assert_eq!(found, vec!["Patient".to_string()]);
                assert_eq!(basis, "Encounter");
                assert_eq!(id, "initial-population");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resource_basis_rejects_boolean() {
        let g = group(PopulationBasis::Resource("Encounter".into()));
        assert!(DefaultBasisValidator
            .validate_population("m", &g, &g.populations[0], &CriteriaValue::Boolean(true))
            .is_err());
    }

    #[test]
    fn test_nulls_are_skipped() {
        let g = group(PopulationBasis::Resource("Encounter".into()));
        let value = CriteriaValue::List(vec![CriteriaValue::Null]);
        assert!(DefaultBasisValidator
            .validate_population("m", &g, &g.populations[0], &value)
            .is_ok());
    }

    #[test]
    fn test_stratifier_function_result() {
        let g = group(PopulationBasis::Resource("Encounter".into()));
        let value = CriteriaValue::Map(vec![(
            CriteriaValue::resource("Encounter", "e1"),
            CriteriaValue::code("http://example.org", "inpatient"),
        )]);
        assert!(DefaultBasisValidator
            .validate_stratifier("m", &g, &g.stratifiers[0], "Gender", &value)
            .is_ok());
    }

    #[test]
    fn test_boolean_basis_rejects_function_stratifier() {
        let g = group(PopulationBasis::Boolean);
        let value = CriteriaValue::Map(vec![
            (
                CriteriaValue::Reference(octofhir_measure_types::ResourceRef::new("Encounter", "e1")),
                CriteriaValue::from("inpatient"),
            ),
            (
                CriteriaValue::Reference(octofhir_measure_types::ResourceRef::new("Encounter", "e2")),
                CriteriaValue::from("outpatient"),
            ),
        ]);
        match DefaultBasisValidator
            .validate_stratifier("m", &g, &g.stratifiers[0], "Gender", &value)
            .unwrap_err()
        {
            MeasureError::BasisMismatch { found, element, .. } => {
                assert_eq!(found, vec!["Map".to_string()]);
                assert_eq!(element, "stratifier");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_stratifier_rejects_decimal() {
        let g = group(PopulationBasis::Boolean);
        let value = CriteriaValue::Decimal(rust_decimal::Decimal::new(15, 1));
        assert!(DefaultBasisValidator
            .validate_stratifier("m", &g, &g.stratifiers[0], "Gender", &value)
            .unwrap_err()
            .is_structural());
    }
}
