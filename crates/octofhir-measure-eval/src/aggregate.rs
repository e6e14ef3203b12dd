//! Per-subject population aggregation
//!
//! The aggregator reads one subject's expression results at a time and
//! records them into the group state: population membership, measure
//! observations, date-of-compliance values and stratifier rows.
//! Populations never interact here; set arithmetic happens at scoring time.

use indexmap::IndexMap;
use log::{debug, trace};
use octofhir_measure_def::{GroupDef, PopulationDef, PopulationType, ResultSource, StratifierDef};
use octofhir_measure_types::CriteriaValue;

use crate::error::{MeasureError, MeasureResult};
use crate::state::{GroupState, Observation, PopulationState, RowKey, RowValues, StratifierState};
use crate::validator::PopulationBasisValidator;

const NULL: &CriteriaValue = &CriteriaValue::Null;

/// Records subject results into group state, validating each against the basis
pub struct Aggregator<'a, V: ?Sized> {
    measure: &'a str,
    validator: &'a V,
}

impl<'a, V: PopulationBasisValidator + ?Sized> Aggregator<'a, V> {
    pub fn new(measure: &'a str, validator: &'a V) -> Self {
        Self { measure, validator }
    }

    /// Record every result of `subject` for one group
    pub fn add_subject<R: ResultSource + ?Sized>(
        &self,
        group: &GroupDef,
        state: &mut GroupState,
        subject: &str,
        results: &R,
    ) -> MeasureResult<()> {
        let lookup = |expression: &str| results.result(subject, expression).unwrap_or(NULL);

        for (def, population) in group.populations.iter().zip(state.populations.iter_mut()) {
            let value = lookup(&def.expression);
            match def.population_type {
                PopulationType::MeasureObservation => {
                    self.add_observations(def, population, subject, value)?;
                }
                PopulationType::DateOfCompliance => {
                    let value = value.singleton();
                    if !value.is_null() {
                        state
                            .date_of_compliance
                            .insert(subject.to_string(), value.clone());
                    }
                }
                _ => {
                    self.validator
                        .validate_population(self.measure, group, def, value)?;
                    add_members(group, population, subject, value);
                }
            }
        }

        for (def, stratifier) in group.stratifiers.iter().zip(state.stratifiers.iter_mut()) {
            let mut values = Vec::new();
            for expression in def.expressions() {
                let value = lookup(expression);
                self.validator
                    .validate_stratifier(self.measure, group, def, expression, value)?;
                values.push(value);
            }
            add_rows(def, stratifier, subject, &values);
        }

        Ok(())
    }

    fn add_observations(
        &self,
        def: &PopulationDef,
        population: &mut PopulationState,
        subject: &str,
        value: &CriteriaValue,
    ) -> MeasureResult<()> {
        let entries: Vec<(Option<String>, &CriteriaValue)> = match value.as_map() {
            Some(map) => map
                .iter()
                .map(|(key, observed)| (Some(row_resource(key)), observed))
                .collect(),
            None => value.leaves().into_iter().map(|leaf| (None, leaf)).collect(),
        };

        for (resource, observed) in entries {
            let observed = observed.singleton();
            if observed.is_null() {
                continue;
            }
            let Some(number) = observed.as_decimal() else {
                return Err(MeasureError::InvalidObservation {
                    measure: self.measure.to_string(),
                    population: def.id.clone(),
                    subject: subject.to_string(),
                    found: observed
                        .kind()
                        .map_or_else(|| "collection".to_string(), |k| k.to_string()),
                });
            };
            population.observations.push(Observation {
                subject: subject.to_string(),
                resource,
                value: number,
            });
        }
        Ok(())
    }
}

fn add_members(group: &GroupDef, population: &mut PopulationState, subject: &str, value: &CriteriaValue) {
    if !value.is_member() {
        return;
    }
    if group.basis.is_boolean() {
        trace!("subject {subject} is in population {}", population.id);
        population.members.add_subject(subject);
    } else {
        for resource in value.resource_refs() {
            population.members.add_resource(subject, resource.key());
        }
    }
}

/// Identity of the input resource a function-style result was produced for
fn row_resource(key: &CriteriaValue) -> String {
    match key.singleton() {
        CriteriaValue::Resource(r) | CriteriaValue::Reference(r) => r.key(),
        other => other.key().to_string(),
    }
}

/// Component value of one row: the same value for every row of a subject, or one value per resource
enum ComponentValues<'v> {
    Scalar(&'v CriteriaValue),
    PerResource(IndexMap<String, &'v CriteriaValue>),
}

impl ComponentValues<'_> {
    fn value_for(&self, resource: Option<&str>) -> Option<&CriteriaValue> {
        let value = match (self, resource) {
            (Self::Scalar(v), _) => *v,
            (Self::PerResource(map), Some(r)) => *map.get(r)?,
            (Self::PerResource(_), None) => return None,
        };
        let value = value.singleton();
        (!value.is_null()).then_some(value)
    }
}

/// Record the stratifier rows of one subject; incomplete rows are dropped
fn add_rows(
    def: &StratifierDef,
    stratifier: &mut StratifierState,
    subject: &str,
    values: &[&CriteriaValue],
) {
    let components: Vec<ComponentValues<'_>> = values
        .iter()
        .map(|&value| match value.as_map() {
            Some(map) => ComponentValues::PerResource(
                map.iter().map(|(k, v)| (row_resource(k), v)).collect(),
            ),
            None => ComponentValues::Scalar(value),
        })
        .collect();

    let mut row_resources: Vec<Option<String>> = Vec::new();
    for component in &components {
        if let ComponentValues::PerResource(map) = component {
            for resource in map.keys() {
                if !row_resources.iter().flatten().any(|r| r == resource) {
                    row_resources.push(Some(resource.clone()));
                }
            }
        }
    }
    if row_resources.is_empty() && components.iter().all(|c| matches!(c, ComponentValues::Scalar(_))) {
        row_resources.push(None);
    }

    for resource in row_resources {
        let row: Option<RowValues> = components
            .iter()
            .map(|c| c.value_for(resource.as_deref()).cloned())
            .collect();
        let key = RowKey {
            subject: subject.to_string(),
            resource,
        };
        match row {
            Some(row) => {
                stratifier.rows.insert(key, row);
            }
            None => debug!(
                "stratifier '{}': no value for {}{}, skipping",
                def.id,
                key.subject,
                key.resource.as_deref().map(|r| format!(" ({r})")).unwrap_or_default()
            ),
        }
    }
}
