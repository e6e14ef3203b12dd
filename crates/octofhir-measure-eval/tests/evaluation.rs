//! End-to-end evaluation tests
//!
//! Each test builds a measure definition, feeds it canned per-subject results
//! and checks the assembled report.

use octofhir_measure_def::{
    AggregateMethod, EvaluationResults, GroupDefBuilder, ImprovementNotation, MeasureDef,
    MeasureDefBuilder, MeasureScoring, PopulationBasis, PopulationDef, PopulationType,
    StratifierComponentDef, StratifierDef, SupplementalDataDef,
};
use octofhir_measure_eval::{
    EvaluationOptions, MeasureError, MeasureEvaluator, MeasureReport, ReportType, StratumValue,
};
use octofhir_measure_types::CriteriaValue;
use pretty_assertions::assert_eq;
use rstest::rstest;
use rust_decimal::Decimal;

use PopulationType::{
    DateOfCompliance, Denominator, DenominatorExclusion, InitialPopulation, MeasureObservation,
    MeasurePopulation, MeasurePopulationExclusion, Numerator,
};

// ============================================================================
// Helpers
// ============================================================================

fn proportion_measure(notation: ImprovementNotation) -> MeasureDef {
    MeasureDefBuilder::new("proportion")
        .url("http://example.org/Measure/proportion")
        .scoring(MeasureScoring::Proportion)
        .improvement_notation(notation)
        .group(
            GroupDefBuilder::new("group-1")
                .population_of(InitialPopulation, "IP")
                .population_of(Denominator, "Den")
                .population_of(DenominatorExclusion, "DenEx")
                .population_of(Numerator, "Num")
                .stratifier(StratifierDef::expression("gender", "Gender")),
        )
        .build()
        .unwrap()
}

/// Results for a boolean-basis proportion group from explicit member lists
fn proportion_results(
    subjects: &[&str],
    denominator: &[&str],
    exclusion: &[&str],
    numerator: &[&str],
) -> EvaluationResults {
    let mut results = EvaluationResults::new();
    for subject in subjects {
        results.insert(*subject, "IP", true);
        results.insert(*subject, "Den", denominator.contains(subject));
        results.insert(*subject, "DenEx", exclusion.contains(subject));
        results.insert(*subject, "Num", numerator.contains(subject));
    }
    results
}

fn evaluate(def: &MeasureDef, results: &EvaluationResults) -> MeasureReport {
    MeasureEvaluator::new()
        .evaluate(def, results, &EvaluationOptions::default())
        .unwrap()
}

fn dec(value: &str) -> Decimal {
    value.parse().unwrap()
}

// ============================================================================
// Proportion scoring
// ============================================================================

#[test]
fn test_half_of_denominator_in_numerator() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let subjects = ["P1", "P2", "P3", "P4"];
    let results = proportion_results(&subjects, &subjects, &[], &["P1", "P2"]);

    let report = evaluate(&def, &results);
    let group = &report.groups[0];
    assert_eq!(group.score, Some(dec("0.5")));
    assert_eq!(group.population(Denominator).unwrap().count, 4);
    assert_eq!(group.population(Numerator).unwrap().count, 2);
}

#[test]
fn test_exclusions_shrink_total_denominator() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let results = proportion_results(
        &["P1", "P2", "P3"],
        &["P1", "P2", "P3"],
        &["P2", "P3"],
        &["P1"],
    );

    let report = evaluate(&def, &results);
    let group = &report.groups[0];
    assert_eq!(group.score, Some(Decimal::ONE));
    // Counts are reported as evaluated, before set arithmetic
    assert_eq!(group.population(Denominator).unwrap().count, 3);
    assert_eq!(group.population(DenominatorExclusion).unwrap().count, 2);
}

#[test]
fn test_decrease_notation_inverts_score() {
    let def = proportion_measure(ImprovementNotation::Decrease);
    let subjects: Vec<String> = (1..=10).map(|i| format!("P{i}")).collect();
    let subjects: Vec<&str> = subjects.iter().map(String::as_str).collect();
    let results = proportion_results(&subjects, &subjects, &[], &subjects[..3]);

    let report = evaluate(&def, &results);
    assert_eq!(report.groups[0].score, Some(dec("0.7")));
}

#[test]
fn test_empty_denominator_has_no_score() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let results = proportion_results(&["P1", "P2"], &["P1"], &["P1"], &["P1"]);

    let report = evaluate(&def, &results);
    assert_eq!(report.groups[0].score, None);
}

#[test]
fn test_division_keeps_seventeen_significant_digits() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let subjects = ["P1", "P2", "P3"];
    let results = proportion_results(&subjects, &subjects, &[], &["P1"]);

    let report = evaluate(&def, &results);
    assert_eq!(report.groups[0].score, Some(dec("0.33333333333333333")));
}

#[test]
fn test_missing_results_are_null() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let results = EvaluationResults::new()
        .with("P1", "IP", true)
        .with("P1", "Den", true);

    let report = evaluate(&def, &results);
    let group = &report.groups[0];
    assert_eq!(group.population(Numerator).unwrap().count, 0);
    assert_eq!(group.score, Some(Decimal::ZERO));
    assert!(group.stratifiers[0].strata.is_empty());
}

// ============================================================================
// Stratification
// ============================================================================

#[test]
fn test_gender_strata() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let results = proportion_results(&["P1", "P2", "P3"], &["P1", "P2", "P3"], &[], &["P1"])
        .with("P1", "Gender", "M")
        .with("P2", "Gender", "F")
        .with("P3", "Gender", "M");
    let options = EvaluationOptions::new().with_report_type(ReportType::SubjectList);

    let report = MeasureEvaluator::new().evaluate(&def, &results, &options).unwrap();
    let stratifier = report.groups[0].stratifier("gender").unwrap();
    assert_eq!(stratifier.strata.len(), 2);

    let male = stratifier.stratum(&"M".into()).unwrap();
    assert_eq!(
        male.population(InitialPopulation).unwrap().members,
        Some(vec!["P1".to_string(), "P3".to_string()])
    );
    assert_eq!(male.score, Some(dec("0.5")));

    let female = stratifier.stratum(&"F".into()).unwrap();
    assert_eq!(female.population(Denominator).unwrap().count, 1);
    assert_eq!(female.score, Some(Decimal::ZERO));
}

#[test]
fn test_strata_partition_group_populations() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let results = proportion_results(
        &["P1", "P2", "P3", "P4", "P5"],
        &["P1", "P2", "P3", "P4"],
        &["P4"],
        &["P1", "P3"],
    )
    .with("P1", "Gender", "M")
    .with("P2", "Gender", "F")
    .with("P3", "Gender", "F")
    .with("P4", "Gender", "M")
    .with("P5", "Gender", "O");

    let report = evaluate(&def, &results);
    let group = &report.groups[0];
    let strata = &group.stratifiers[0].strata;
    for population in &group.populations {
        let sum: usize = strata
            .iter()
            .map(|s| s.population(population.population_type).unwrap().count)
            .sum();
        assert_eq!(sum, population.count, "population {}", population.id);
    }
}

#[test]
fn test_subjects_without_stratifier_value_are_in_no_stratum() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let results = proportion_results(&["P1", "P2", "P3"], &["P1", "P2", "P3"], &[], &["P1"])
        .with("P1", "Gender", "M")
        .with("P2", "Gender", CriteriaValue::Null)
        .with("P3", "Gender", "F");
    let options = EvaluationOptions::new().with_report_type(ReportType::SubjectList);

    let report = MeasureEvaluator::new().evaluate(&def, &results, &options).unwrap();
    let group = &report.groups[0];
    let strata = &group.stratifiers[0].strata;
    assert_eq!(strata.len(), 2);

    let members: Vec<String> = strata
        .iter()
        .flat_map(|s| s.population(Denominator).unwrap().members.clone().unwrap_or_default())
        .collect();
    assert_eq!(members, vec!["P1".to_string(), "P3".to_string()]);

    let stratum_denominators: usize = strata
        .iter()
        .map(|s| s.population(Denominator).unwrap().count)
        .sum();
    assert_eq!(stratum_denominators, 2);
    assert_eq!(group.population(Denominator).unwrap().count, 3);
}

#[test]
fn test_equivalent_codes_share_a_stratum() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let results = proportion_results(&["P1", "P2"], &["P1", "P2"], &[], &[])
        .with("P1", "Gender", CriteriaValue::code("http://hl7.org/fhir/administrative-gender", "male"))
        .with(
            "P2",
            "Gender",
            CriteriaValue::List(vec![CriteriaValue::code(
                "http://hl7.org/fhir/administrative-gender",
                "male",
            )]),
        );

    let report = evaluate(&def, &results);
    let strata = &report.groups[0].stratifiers[0].strata;
    assert_eq!(strata.len(), 1);
    assert_eq!(strata[0].population(InitialPopulation).unwrap().count, 2);
}

#[test]
fn test_component_stratifier() {
    let def = MeasureDefBuilder::new("components")
        .scoring(MeasureScoring::Cohort)
        .group(
            GroupDefBuilder::new("g")
                .population_of(InitialPopulation, "IP")
                .stratifier(StratifierDef::components(
                    "gender-age",
                    [
                        StratifierComponentDef::new("gender", "Gender"),
                        StratifierComponentDef::new("age", "Age Group"),
                    ],
                )),
        )
        .build()
        .unwrap();
    let results = EvaluationResults::new()
        .with("P1", "IP", true)
        .with("P1", "Gender", "M")
        .with("P1", "Age Group", "adult")
        .with("P2", "IP", true)
        .with("P2", "Gender", "M")
        .with("P2", "Age Group", "child")
        .with("P3", "IP", true)
        .with("P3", "Gender", "M")
        .with("P3", "Age Group", "adult")
        .with("P4", "IP", true)
        .with("P4", "Gender", "F");

    let report = evaluate(&def, &results);
    let strata = &report.groups[0].stratifiers[0].strata;
    // P4 has no age group and forms no stratum
    assert_eq!(strata.len(), 2);
    assert_eq!(strata[0].population(InitialPopulation).unwrap().count, 2);
    match &strata[0].value {
        StratumValue::Components(components) => {
            assert_eq!(components[0].id, "gender");
            assert_eq!(components[1].value, CriteriaValue::from("adult"));
        }
        other => panic!("expected components, got {other:?}"),
    }
}

#[test]
fn test_resource_basis_stratifier_by_encounter() {
    let def = MeasureDefBuilder::new("encounters")
        .scoring(MeasureScoring::Cohort)
        .basis(PopulationBasis::Resource("Encounter".into()))
        .group(
            GroupDefBuilder::new("g")
                .population_of(InitialPopulation, "Qualifying Encounters")
                .stratifier(StratifierDef::expression("class", "Encounter Class")),
        )
        .build()
        .unwrap();
    let class_of = |pairs: &[(&str, &str)]| {
        CriteriaValue::Map(
            pairs
                .iter()
                .map(|(id, class)| (CriteriaValue::resource("Encounter", *id), CriteriaValue::from(*class)))
                .collect(),
        )
    };
    let results = EvaluationResults::new()
        .with("P1", "Qualifying Encounters", CriteriaValue::resources("Encounter", ["e1", "e2"]))
        .with("P1", "Encounter Class", class_of(&[("e1", "IMP"), ("e2", "AMB")]))
        .with("P2", "Qualifying Encounters", CriteriaValue::resources("Encounter", ["e3"]))
        .with("P2", "Encounter Class", class_of(&[("e3", "AMB")]));

    let report = evaluate(&def, &results);
    let group = &report.groups[0];
    assert_eq!(group.population(InitialPopulation).unwrap().count, 3);

    let stratifier = &group.stratifiers[0];
    let ambulatory = stratifier.stratum(&"AMB".into()).unwrap();
    assert_eq!(ambulatory.population(InitialPopulation).unwrap().count, 2);
    let inpatient = stratifier.stratum(&"IMP".into()).unwrap();
    assert_eq!(inpatient.population(InitialPopulation).unwrap().count, 1);
}

// ============================================================================
// Basis validation
// ============================================================================

#[test]
fn test_wrong_resource_type_for_basis() {
    let def = MeasureDefBuilder::new("encounters")
        .scoring(MeasureScoring::Cohort)
        .basis(PopulationBasis::Resource("Encounter".into()))
        .group(GroupDefBuilder::new("g").population_of(InitialPopulation, "IP"))
        .build()
        .unwrap();
    let results = EvaluationResults::new().with("P1", "IP", CriteriaValue::resource("Patient", "P1"));

    let err = MeasureEvaluator::new()
        .evaluate(&def, &results, &EvaluationOptions::default())
        .unwrap_err();
    assert!(err.is_structural());
    let message = err.to_string();
    assert!(message.contains("initial-population"), "{message}");
    assert!(message.contains("Patient"), "{message}");
    assert!(message.contains("Encounter"), "{message}");
}

#[rstest]
#[case::decimal(CriteriaValue::Decimal(Decimal::new(15, 1)))]
#[case::tuple(CriteriaValue::Tuple(Default::default()))]
#[case::function_result(CriteriaValue::Map(vec![
    (CriteriaValue::Reference("Encounter/e1".parse().unwrap()), CriteriaValue::from("M")),
    (CriteriaValue::Reference("Encounter/e2".parse().unwrap()), CriteriaValue::from("F")),
]))]
fn test_unsupported_stratifier_values(#[case] value: CriteriaValue) {
    let def = proportion_measure(ImprovementNotation::Increase);
    let results = proportion_results(&["P1"], &["P1"], &[], &[]).with("P1", "Gender", value);

    let err = MeasureEvaluator::new()
        .evaluate(&def, &results, &EvaluationOptions::default())
        .unwrap_err();
    assert!(matches!(err, MeasureError::BasisMismatch { .. }));
}

#[test]
fn test_invalid_definition_fails_before_evaluation() {
    let mut def = proportion_measure(ImprovementNotation::Increase);
    def.groups[0].populations.retain(|p| p.population_type != Numerator);

    let err = MeasureEvaluator::new()
        .evaluate(&def, &EvaluationResults::new(), &EvaluationOptions::default())
        .unwrap_err();
    assert!(matches!(err, MeasureError::Definition(_)));
    assert!(err.code().is_definition_error());
}

// ============================================================================
// Measure observations
// ============================================================================

fn continuous_variable(method: AggregateMethod) -> MeasureDef {
    MeasureDefBuilder::new("cv")
        .scoring(MeasureScoring::ContinuousVariable)
        .group(
            GroupDefBuilder::new("g")
                .population_of(InitialPopulation, "IP")
                .population_of(MeasurePopulation, "MP")
                .population_of(MeasurePopulationExclusion, "MPEx")
                .population(
                    PopulationDef::of_type(MeasureObservation, "Length of Stay")
                        .with_aggregate_method(method),
                ),
        )
        .build()
        .unwrap()
}

fn stays() -> EvaluationResults {
    let mut results = EvaluationResults::new();
    for (subject, days, excluded) in [("P1", 10, false), ("P2", 20, false), ("P3", 30, true)] {
        results.insert(subject, "IP", true);
        results.insert(subject, "MP", true);
        results.insert(subject, "MPEx", excluded);
        results.insert(subject, "Length of Stay", days as i64);
    }
    results
}

#[rstest]
#[case::sum(AggregateMethod::Sum, "30")]
#[case::average(AggregateMethod::Average, "15")]
#[case::min(AggregateMethod::Min, "10")]
#[case::max(AggregateMethod::Max, "20")]
#[case::median(AggregateMethod::Median, "15")]
#[case::count(AggregateMethod::Count, "2")]
fn test_continuous_variable_aggregates(#[case] method: AggregateMethod, #[case] expected: &str) {
    let report = evaluate(&continuous_variable(method), &stays());
    let group = &report.groups[0];
    assert_eq!(group.score, None);

    let observation = group.population(MeasureObservation).unwrap();
    assert_eq!(observation.count, 2);
    assert_eq!(observation.aggregate_method, Some(method));
    assert_eq!(observation.aggregate, Some(dec(expected)));
}

#[test]
fn test_observation_without_members_has_no_aggregate() {
    let results = EvaluationResults::new()
        .with("P1", "IP", true)
        .with("P1", "MP", false)
        .with("P1", "Length of Stay", 4i64);

    let report = evaluate(&continuous_variable(AggregateMethod::Average), &results);
    let observation = report.groups[0].population(MeasureObservation).unwrap();
    assert_eq!(observation.count, 0);
    assert_eq!(observation.aggregate, None);
}

#[test]
fn test_ratio_of_observations() {
    let def = MeasureDefBuilder::new("ratio")
        .scoring(MeasureScoring::Ratio)
        .group(
            GroupDefBuilder::new("g")
                .population_of(InitialPopulation, "IP")
                .population_of(Denominator, "Den")
                .population_of(Numerator, "Num")
                .population(
                    PopulationDef::new("den-obs", MeasureObservation, "Den Obs")
                        .with_criteria_reference("denominator"),
                )
                .population(
                    PopulationDef::new("num-obs", MeasureObservation, "Num Obs")
                        .with_criteria_reference("numerator"),
                ),
        )
        .build()
        .unwrap();
    let mut results = EvaluationResults::new();
    for (subject, num, den) in [("P1", 4, 5), ("P2", 6, 15)] {
        results.insert(subject, "IP", true);
        results.insert(subject, "Den", true);
        results.insert(subject, "Num", true);
        results.insert(subject, "Num Obs", num as i64);
        results.insert(subject, "Den Obs", den as i64);
    }

    let report = evaluate(&def, &results);
    let group = &report.groups[0];
    assert_eq!(group.score, Some(dec("0.5")));
    let numerator_obs = group.populations.iter().find(|p| p.id == "num-obs").unwrap();
    assert_eq!(numerator_obs.aggregate, Some(dec("10")));
}

// ============================================================================
// Report types
// ============================================================================

#[test]
fn test_summary_has_no_members() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let results = proportion_results(&["P1"], &["P1"], &[], &["P1"]);

    let report = evaluate(&def, &results);
    assert_eq!(report.report_type, ReportType::Summary);
    assert!(report.groups[0].populations.iter().all(|p| p.members.is_none()));
}

#[test]
fn test_individual_report() {
    let def = MeasureDefBuilder::new("individual")
        .scoring(MeasureScoring::Proportion)
        .group(
            GroupDefBuilder::new("g")
                .population_of(InitialPopulation, "IP")
                .population_of(Denominator, "Den")
                .population_of(Numerator, "Num")
                .population_of(DateOfCompliance, "Compliance Date"),
        )
        .build()
        .unwrap();
    let results = EvaluationResults::new()
        .with("P1", "IP", true)
        .with("P1", "Den", true)
        .with("P1", "Num", true)
        .with("P1", "Compliance Date", "2024-03-01")
        .with("P2", "IP", true);
    let options = EvaluationOptions::new()
        .with_report_type(ReportType::Individual)
        .with_subject("P1");

    let report = MeasureEvaluator::new().evaluate(&def, &results, &options).unwrap();
    assert_eq!(report.subject.as_deref(), Some("P1"));
    let group = &report.groups[0];
    assert_eq!(group.score, Some(Decimal::ONE));
    assert_eq!(group.date_of_compliance, Some(CriteriaValue::from("2024-03-01")));
    assert!(group.population(DateOfCompliance).is_none());
}

#[test]
fn test_individual_report_needs_one_subject() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let results = proportion_results(&["P1", "P2"], &[], &[], &[]);
    let options = EvaluationOptions::new().with_report_type(ReportType::Individual);

    let err = MeasureEvaluator::new().evaluate(&def, &results, &options).unwrap_err();
    assert!(matches!(err, MeasureError::InvalidRequest { .. }));
}

#[test]
fn test_unknown_subject() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let results = proportion_results(&["P1"], &[], &[], &[]);
    let options = EvaluationOptions::new().with_subject("P9");

    let err = MeasureEvaluator::new().evaluate(&def, &results, &options).unwrap_err();
    assert_eq!(err.code().to_string(), "MSR0301");
}

#[test]
fn test_supplemental_data() {
    let def = MeasureDefBuilder::new("sde")
        .scoring(MeasureScoring::Cohort)
        .group(GroupDefBuilder::new("g").population_of(InitialPopulation, "IP"))
        .supplemental_data(SupplementalDataDef::new("sde-sex", "SDE Sex"))
        .build()
        .unwrap();
    let results = EvaluationResults::new()
        .with("P1", "IP", true)
        .with("P1", "SDE Sex", "M")
        .with("P2", "IP", true)
        .with("P2", "SDE Sex", "F")
        .with("P3", "IP", true)
        .with("P3", "SDE Sex", "M");

    let report = evaluate(&def, &results);
    let sde = &report.supplemental_data[0];
    assert_eq!(sde.id, "sde-sex");
    assert_eq!(sde.values.len(), 2);
    assert_eq!(sde.values[0].value, CriteriaValue::from("M"));
    assert_eq!(sde.values[0].count, 2);
}

#[test]
fn test_report_serializes_scores_as_strings() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let results = proportion_results(&["P1", "P2"], &["P1", "P2"], &[], &["P1"]);

    let report = evaluate(&def, &results);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["measure"], "http://example.org/Measure/proportion");
    assert_eq!(json["reportType"], "summary");
    assert_eq!(json["groups"][0]["score"], "0.5");
    assert_eq!(json["groups"][0]["populations"][1]["type"], "denominator");
}

#[test]
fn test_evaluation_is_repeatable() {
    let def = proportion_measure(ImprovementNotation::Increase);
    let results = proportion_results(&["P1", "P2", "P3"], &["P1", "P2"], &[], &["P2"])
        .with("P1", "Gender", "M")
        .with("P2", "Gender", "F");
    let evaluator = MeasureEvaluator::new();
    let options = EvaluationOptions::default();

    let first = evaluator.evaluate(&def, &results, &options).unwrap();
    let second = evaluator.evaluate(&def, &results, &options).unwrap();
    assert_eq!(first, second);
}
