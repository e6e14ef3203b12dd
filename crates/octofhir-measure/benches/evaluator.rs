//! Evaluator benchmarks using divan
//!
//! Benchmarks for measure evaluation over generated subject populations.

use octofhir_measure::{
    EvaluationOptions, EvaluationResults, GroupDefBuilder, MeasureDef, MeasureDefBuilder,
    MeasureEvaluator, MeasureScoring, PopulationType, ReportType,
};
use octofhir_measure::def::StratifierDef;
use octofhir_measure::types::CriteriaValue;

fn main() {
    divan::main();
}

fn proportion_measure() -> MeasureDef {
    MeasureDefBuilder::new("bench")
        .scoring(MeasureScoring::Proportion)
        .group(
            GroupDefBuilder::new("group-1")
                .population_of(PopulationType::InitialPopulation, "IP")
                .population_of(PopulationType::Denominator, "Den")
                .population_of(PopulationType::DenominatorExclusion, "DenEx")
                .population_of(PopulationType::Numerator, "Num")
                .stratifier(StratifierDef::expression("gender", "Gender")),
        )
        .build()
        .expect("valid measure")
}

// Deterministic mix: every 7th subject excluded, every other one compliant
fn results(subjects: usize) -> EvaluationResults {
    let mut results = EvaluationResults::new();
    for i in 0..subjects {
        let subject = format!("Patient/p{i}");
        let gender = if i % 3 == 0 { "female" } else { "male" };
        results.insert(subject.as_str(), "IP", true);
        results.insert(subject.as_str(), "Den", i % 5 != 0);
        results.insert(subject.as_str(), "DenEx", i % 7 == 0);
        results.insert(subject.as_str(), "Num", i % 2 == 0);
        results.insert(
            subject.as_str(),
            "Gender",
            CriteriaValue::code("http://hl7.org/fhir/administrative-gender", gender),
        );
    }
    results
}

mod summary {
    use super::*;

    #[divan::bench(args = [100, 1_000, 10_000])]
    fn proportion(bencher: divan::Bencher, subjects: usize) {
        let evaluator = MeasureEvaluator::new();
        let def = proportion_measure();
        let results = results(subjects);
        let options = EvaluationOptions::default();

        bencher.bench_local(|| evaluator.evaluate(&def, &results, &options));
    }
}

mod subject_list {
    use super::*;

    #[divan::bench(args = [100, 1_000, 10_000])]
    fn proportion(bencher: divan::Bencher, subjects: usize) {
        let evaluator = MeasureEvaluator::new();
        let def = proportion_measure();
        let results = results(subjects);
        let options = EvaluationOptions::new().with_report_type(ReportType::SubjectList);

        bencher.bench_local(|| evaluator.evaluate(&def, &results, &options));
    }
}
