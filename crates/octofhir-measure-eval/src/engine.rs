//! Measure evaluator
//!
//! Evaluation runs in a single synchronous pass:
//!
//! 1. validate the definition against the scoring population tables
//! 2. aggregate each subject's results (basis-checked) into fresh state
//! 3. partition stratifier rows into strata
//! 4. score every group and every stratum independently
//! 5. assemble the report in definition order
//!
//! Any error aborts the evaluation; no partial report is produced.

use log::debug;
use octofhir_measure_def::{MeasureDef, MeasureSource, ResultSource};
use octofhir_measure_types::CriteriaValue;

use crate::aggregate::Aggregator;
use crate::error::{MeasureError, MeasureResult};
use crate::options::{EvaluationOptions, ReportType};
use crate::report::{MeasureReport, ReportAssembler};
use crate::scoring::Scorer;
use crate::state::MeasureState;
use crate::stratify::stratify;
use crate::validator::{DefaultBasisValidator, PopulationBasisValidator};

const NULL: &CriteriaValue = &CriteriaValue::Null;

/// Evaluates measure definitions against per-subject results
#[derive(Debug, Clone, Default)]
pub struct MeasureEvaluator<V = DefaultBasisValidator> {
    validator: V,
    scorer: Scorer,
}

impl MeasureEvaluator {
    /// Create an evaluator with the default basis validation rules
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: PopulationBasisValidator> MeasureEvaluator<V> {
    /// Create an evaluator with custom basis validation
    pub fn with_validator(validator: V) -> Self {
        Self {
            validator,
            scorer: Scorer::new(),
        }
    }

    /// Evaluate a measure read from `source`.
    ///
    /// Source errors keep their type: definition errors raised while reading
    /// the measure surface as [`MeasureError::Definition`].
    pub fn evaluate_source<M, R>(
        &self,
        source: &M,
        results: &R,
        options: &EvaluationOptions,
    ) -> MeasureResult<MeasureReport>
    where
        M: MeasureSource + ?Sized,
        M::Error: Into<MeasureError>,
        R: ResultSource + ?Sized,
    {
        let def = source.measure_def().map_err(Into::into)?;
        self.evaluate(&def, results, options)
    }

    /// Evaluate `def` against `results`
    pub fn evaluate<R: ResultSource + ?Sized>(
        &self,
        def: &MeasureDef,
        results: &R,
        options: &EvaluationOptions,
    ) -> MeasureResult<MeasureReport> {
        def.validate()?;
        let state = self.compute(def, results, options)?;
        ReportAssembler::new(def, options).assemble(&state)
    }

    /// Aggregate, stratify and score without assembling a report
    pub fn compute<R: ResultSource + ?Sized>(
        &self,
        def: &MeasureDef,
        results: &R,
        options: &EvaluationOptions,
    ) -> MeasureResult<MeasureState> {
        let subjects = select_subjects(results, options)?;
        debug!(
            "evaluating measure {} ({} groups) for {} subjects",
            def.identity(),
            def.groups.len(),
            subjects.len()
        );

        let mut state = MeasureState::new(def);
        let aggregator = Aggregator::new(def.identity(), &self.validator);

        for subject in &subjects {
            for (group, group_state) in def.groups.iter().zip(state.groups.iter_mut()) {
                aggregator.add_subject(group, group_state, subject, results)?;
            }
            for (sde, sde_state) in def
                .supplemental_data
                .iter()
                .zip(state.supplemental_data.iter_mut())
            {
                sde_state.record(results.result(subject, &sde.expression).unwrap_or(NULL));
            }
        }
        state.subjects = subjects.iter().map(|s| s.to_string()).collect();

        for (group, group_state) in def.groups.iter().zip(state.groups.iter_mut()) {
            stratify(group_state);
            group_state.score = Some(self.scorer.score(group, &group_state.populations));
            for stratifier in &mut group_state.stratifiers {
                for stratum in &mut stratifier.strata {
                    stratum.score = Some(self.scorer.score(group, &stratum.populations));
                }
            }
            debug!(
                "group '{}' scored: {:?}",
                group.id,
                group_state.score.as_ref().and_then(|s| s.score)
            );
        }

        Ok(state)
    }
}

/// Subjects to evaluate under `options`
fn select_subjects<'r, R: ResultSource + ?Sized>(
    results: &'r R,
    options: &EvaluationOptions,
) -> MeasureResult<Vec<&'r str>> {
    let mut subjects = results.subjects();
    if let Some(subject) = &options.subject {
        subjects.retain(|s| *s == subject.as_str());
        if subjects.is_empty() {
            return Err(MeasureError::invalid_request(format!(
                "subject '{subject}' has no evaluated results"
            )));
        }
    }
    if options.report_type == ReportType::Individual && subjects.len() != 1 {
        return Err(MeasureError::invalid_request(format!(
            "an individual report requires exactly one subject, found {}",
            subjects.len()
        )));
    }
    Ok(subjects)
}
