//! Group and stratum scoring
//!
//! Proportion and ratio scores are computed with set arithmetic over the
//! population members, never by subtracting counts:
//!
//! ```text
//! total_denominator = denominator − denominator_exclusion [− denominator_exception, proportion only]
//! total_numerator   = numerator − numerator_exclusion
//! score             = |total_numerator ∩ total_denominator| / |total_denominator|
//! ```
//!
//! An empty total denominator yields no score. A `decrease` improvement
//! notation reports `1 − score`.

use indexmap::IndexMap;
use octofhir_measure_def::{
    AggregateMethod, GroupDef, ImprovementNotation, MeasureScoring, PopulationDef,
    PopulationType,
};
use rust_decimal::Decimal;

use crate::observation::{aggregate, ratio_score, round_quotient};
use crate::state::{PopulationMembers, PopulationState};

/// Aggregated observations of one measure-observation population
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationSummary {
    pub method: AggregateMethod,
    /// Number of observations taken over the referenced population
    pub count: usize,
    pub value: Option<Decimal>,
}

/// Score of a group or a stratum
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupScore {
    pub score: Option<Decimal>,
    /// Observation summaries by population id
    pub observations: IndexMap<String, ObservationSummary>,
}

/// Scores populations according to their group's scoring method
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer;

impl Scorer {
    pub fn new() -> Self {
        Self
    }

    /// Score one set of populations (a whole group, or one stratum of it).
    ///
    /// `populations` must mirror `group.populations`.
    pub fn score(&self, group: &GroupDef, populations: &[PopulationState]) -> GroupScore {
        let sets = PopulationSets::new(group, populations);

        let observations: IndexMap<String, ObservationSummary> = group
            .populations_of(PopulationType::MeasureObservation)
            .filter_map(|def| {
                let state = populations.iter().find(|p| p.id == def.id)?;
                Some((def.id.clone(), sets.summarize(def, state)))
            })
            .collect();

        let score = match group.scoring {
            MeasureScoring::Proportion | MeasureScoring::Ratio => {
                let raw = if observations.len() == 2 {
                    let aggregate_of = |t: PopulationType| {
                        group
                            .populations_of(PopulationType::MeasureObservation)
                            .find(|o| sets.referenced_type(o) == Some(t))
                            .and_then(|o| observations.get(&o.id))
                            .and_then(|s| s.value)
                    };
                    ratio_score(
                        aggregate_of(PopulationType::Numerator),
                        aggregate_of(PopulationType::Denominator),
                    )
                } else {
                    sets.proportion()
                };
                raw.and_then(|s| apply_improvement_notation(s, group.improvement_notation))
            }
            MeasureScoring::ContinuousVariable | MeasureScoring::Cohort => None,
        };

        GroupScore {
            score,
            observations,
        }
    }
}

/// Report `1 − score` for decrease notation; negative raw scores yield no score
pub fn apply_improvement_notation(
    score: Decimal,
    notation: ImprovementNotation,
) -> Option<Decimal> {
    if score.is_sign_negative() {
        return None;
    }
    Some(match notation {
        ImprovementNotation::Increase => score,
        ImprovementNotation::Decrease => Decimal::ONE - score,
    })
}

/// Effective population sets of one group or stratum
struct PopulationSets<'a> {
    group: &'a GroupDef,
    populations: &'a [PopulationState],
    empty: PopulationMembers,
}

impl<'a> PopulationSets<'a> {
    fn new(group: &'a GroupDef, populations: &'a [PopulationState]) -> Self {
        Self {
            group,
            populations,
            empty: PopulationMembers::new(),
        }
    }

    fn members(&self, population_type: PopulationType) -> &PopulationMembers {
        self.populations
            .iter()
            .find(|p| p.population_type == population_type)
            .map_or(&self.empty, |p| &p.members)
    }

    fn total_denominator(&self) -> PopulationMembers {
        let basis = &self.group.basis;
        let mut total = self
            .members(PopulationType::Denominator)
            .difference(self.members(PopulationType::DenominatorExclusion), basis);
        if self.group.scoring == MeasureScoring::Proportion {
            total = total.difference(self.members(PopulationType::DenominatorException), basis);
        }
        total
    }

    fn total_numerator(&self) -> PopulationMembers {
        self.members(PopulationType::Numerator)
            .difference(self.members(PopulationType::NumeratorExclusion), &self.group.basis)
    }

    fn measure_population(&self) -> PopulationMembers {
        self.members(PopulationType::MeasurePopulation).difference(
            self.members(PopulationType::MeasurePopulationExclusion),
            &self.group.basis,
        )
    }

    fn proportion(&self) -> Option<Decimal> {
        let basis = &self.group.basis;
        let denominator = self.total_denominator();
        let total = denominator.count(basis);
        if total == 0 {
            return None;
        }
        let hits = self
            .total_numerator()
            .intersection(&denominator, basis)
            .count(basis);
        Decimal::from(hits)
            .checked_div(Decimal::from(total))
            .map(round_quotient)
    }

    /// Type of the population an observation is taken over
    fn referenced_type(&self, observation: &PopulationDef) -> Option<PopulationType> {
        match &observation.criteria_reference {
            Some(reference) => self
                .group
                .population_by_id(reference)
                .map(|p| p.population_type),
            None => match self.group.scoring {
                MeasureScoring::ContinuousVariable => Some(PopulationType::MeasurePopulation),
                _ => None,
            },
        }
    }

    /// Effective members an observation is aligned to
    fn observed_members(&self, observation: &PopulationDef) -> PopulationMembers {
        match self.referenced_type(observation) {
            Some(PopulationType::MeasurePopulation) => self.measure_population(),
            Some(PopulationType::Numerator) => self.total_numerator(),
            Some(PopulationType::Denominator) => self.total_denominator(),
            Some(other) => self.members(other).clone(),
            None => PopulationMembers::new(),
        }
    }

    fn summarize(&self, def: &PopulationDef, state: &PopulationState) -> ObservationSummary {
        let members = self.observed_members(def);
        let values: Vec<Decimal> = state
            .observations
            .iter()
            .filter(|o| match &o.resource {
                Some(resource) if !self.group.basis.is_boolean() => {
                    members.contains_resource(&o.subject, resource)
                }
                _ => members.contains_subject(&o.subject),
            })
            .map(|o| o.value)
            .collect();
        let method = def.aggregate_method.unwrap_or_default();
        ObservationSummary {
            method,
            count: values.len(),
            value: aggregate(method, &values),
        }
    }
}
