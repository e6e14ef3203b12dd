//! Measure reports and their assembly
//!
//! The assembler walks the definition in order, in lock-step with the
//! computed state, and refuses to produce a report whose shape differs from
//! the definition.

use octofhir_measure_def::{
    AggregateMethod, GroupDef, MeasureDef, MeasureScoring, PopulationBasis, PopulationType,
    StratifierCriteria, StratifierDef,
};
use octofhir_measure_types::{CriteriaValue, ResourceRef, ValueKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{MeasureError, MeasureResult};
use crate::options::{EvaluationOptions, ReportType};
use crate::scoring::GroupScore;
use crate::state::{GroupState, MeasureState, PopulationState, StratumState, SupplementalDataState};

/// Result of evaluating one measure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureReport {
    /// Canonical url of the measure, or its id
    pub measure: String,
    pub measure_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure_version: Option<String>,
    pub report_type: ReportType,
    /// The subject of an individual report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub groups: Vec<GroupReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supplemental_data: Vec<SupplementalDataReport>,
}

impl MeasureReport {
    pub fn group(&self, id: &str) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.id == id)
    }
}

/// One group of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupReport {
    pub id: String,
    pub scoring: MeasureScoring,
    pub basis: PopulationBasis,
    /// Absent for continuous-variable and cohort groups, and for empty denominators
    pub score: Option<Decimal>,
    pub populations: Vec<PopulationReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stratifiers: Vec<StratifierReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_compliance: Option<CriteriaValue>,
}

impl GroupReport {
    pub fn population(&self, population_type: PopulationType) -> Option<&PopulationReport> {
        self.populations
            .iter()
            .find(|p| p.population_type == population_type)
    }

    pub fn stratifier(&self, id: &str) -> Option<&StratifierReport> {
        self.stratifiers.iter().find(|s| s.id == id)
    }
}

/// Count of one population
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationReport {
    pub id: String,
    #[serde(rename = "type")]
    pub population_type: PopulationType,
    pub count: usize,
    /// Subject ids (boolean basis) or resource keys (resource basis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_method: Option<AggregateMethod>,
    /// Aggregated observation value, for measure-observation populations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Decimal>,
}

/// Strata of one stratifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StratifierReport {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub strata: Vec<StratumReport>,
}

impl StratifierReport {
    /// Stratum whose single value has the given key
    pub fn stratum(&self, value: &CriteriaValue) -> Option<&StratumReport> {
        let key = value.key();
        self.strata.iter().find(|s| s.key == key)
    }
}

/// One stratum with its own populations and score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StratumReport {
    pub key: ValueKey,
    pub value: StratumValue,
    pub score: Option<Decimal>,
    pub populations: Vec<PopulationReport>,
}

impl StratumReport {
    pub fn population(&self, population_type: PopulationType) -> Option<&PopulationReport> {
        self.populations
            .iter()
            .find(|p| p.population_type == population_type)
    }
}

/// Value defining a stratum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StratumValue {
    Value(CriteriaValue),
    Components(Vec<StratumComponent>),
}

/// One component value of a multi-component stratum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StratumComponent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub value: CriteriaValue,
}

/// Values collected by one supplemental data element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplementalDataReport {
    pub id: String,
    pub values: Vec<ValueCount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceRef>,
}

/// A distinct value and how many times it occurred
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: CriteriaValue,
    pub count: usize,
}

/// Builds reports from definitions and computed state
pub struct ReportAssembler<'a> {
    def: &'a MeasureDef,
    options: &'a EvaluationOptions,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(def: &'a MeasureDef, options: &'a EvaluationOptions) -> Self {
        Self { def, options }
    }

    fn mismatch(&self, id: &str, message: String) -> MeasureError {
        MeasureError::structural_mismatch(self.def.identity(), id, message)
    }

    /// Assemble the report, failing on any shape difference between definition and state
    pub fn assemble(&self, state: &MeasureState) -> MeasureResult<MeasureReport> {
        if state.groups.len() != self.def.groups.len() {
            return Err(self.mismatch(
                &self.def.id,
                format!(
                    "measure defines {} groups but {} were computed",
                    self.def.groups.len(),
                    state.groups.len()
                ),
            ));
        }

        let groups = self
            .def
            .groups
            .iter()
            .zip(&state.groups)
            .map(|(def, group)| self.group(def, group, state))
            .collect::<MeasureResult<Vec<_>>>()?;

        if state.supplemental_data.len() != self.def.supplemental_data.len() {
            return Err(self.mismatch(
                &self.def.id,
                format!(
                    "measure defines {} supplemental data elements but {} were computed",
                    self.def.supplemental_data.len(),
                    state.supplemental_data.len()
                ),
            ));
        }
        let supplemental_data = state
            .supplemental_data
            .iter()
            .map(supplemental_report)
            .collect();

        Ok(MeasureReport {
            measure: self.def.identity().to_string(),
            measure_id: self.def.id.clone(),
            measure_version: self.def.version.clone(),
            report_type: self.options.report_type,
            subject: self.individual_subject(state).map(str::to_string),
            groups,
            supplemental_data,
        })
    }

    fn individual_subject<'s>(&self, state: &'s MeasureState) -> Option<&'s str> {
        match self.options.report_type {
            ReportType::Individual => state.subjects.first().map(String::as_str),
            _ => None,
        }
    }

    fn group(
        &self,
        def: &GroupDef,
        group: &GroupState,
        state: &MeasureState,
    ) -> MeasureResult<GroupReport> {
        if def.id != group.id {
            return Err(self.mismatch(
                &def.id,
                format!("group '{}' was computed in place of '{}'", group.id, def.id),
            ));
        }

        let populations = self.populations(def, &group.populations, group.score.as_ref(), &def.id)?;

        if group.stratifiers.len() != def.stratifiers.len() {
            return Err(self.mismatch(
                &def.id,
                format!(
                    "group defines {} stratifiers but {} were computed",
                    def.stratifiers.len(),
                    group.stratifiers.len()
                ),
            ));
        }
        let stratifiers = def
            .stratifiers
            .iter()
            .zip(&group.stratifiers)
            .map(|(stratifier_def, stratifier)| {
                if stratifier_def.id != stratifier.id {
                    return Err(self.mismatch(
                        &stratifier_def.id,
                        format!("stratifier '{}' was computed in its place", stratifier.id),
                    ));
                }
                let strata = stratifier
                    .strata
                    .iter()
                    .map(|stratum| self.stratum(def, stratifier_def, stratum))
                    .collect::<MeasureResult<Vec<_>>>()?;
                Ok(StratifierReport {
                    id: stratifier_def.id.clone(),
                    code: stratifier_def.code.clone(),
                    strata,
                })
            })
            .collect::<MeasureResult<Vec<_>>>()?;

        let date_of_compliance = self
            .individual_subject(state)
            .and_then(|subject| group.date_of_compliance.get(subject))
            .cloned();

        Ok(GroupReport {
            id: def.id.clone(),
            scoring: def.scoring,
            basis: def.basis.clone(),
            score: group.score.as_ref().and_then(|s| s.score),
            populations,
            stratifiers,
            date_of_compliance,
        })
    }

    fn stratum(
        &self,
        group: &GroupDef,
        def: &StratifierDef,
        stratum: &StratumState,
    ) -> MeasureResult<StratumReport> {
        let value = match &def.criteria {
            StratifierCriteria::Expression(_) => match stratum.values.as_slice() {
                [value] => StratumValue::Value(value.clone()),
                _ => {
                    return Err(self.mismatch(
                        &def.id,
                        format!("stratum '{}' has {} values for a single expression", stratum.key, stratum.values.len()),
                    ));
                }
            },
            StratifierCriteria::Components(components) => {
                if components.len() != stratum.values.len() {
                    return Err(self.mismatch(
                        &def.id,
                        format!(
                            "stratum '{}' has {} values for {} components",
                            stratum.key,
                            stratum.values.len(),
                            components.len()
                        ),
                    ));
                }
                StratumValue::Components(
                    components
                        .iter()
                        .zip(&stratum.values)
                        .map(|(component, value)| StratumComponent {
                            id: component.id.clone(),
                            code: component.code.clone(),
                            value: value.clone(),
                        })
                        .collect(),
                )
            }
        };

        Ok(StratumReport {
            key: stratum.key.clone(),
            value,
            score: stratum.score.as_ref().and_then(|s| s.score),
            populations: self.populations(group, &stratum.populations, stratum.score.as_ref(), &def.id)?,
        })
    }

    fn populations(
        &self,
        group: &GroupDef,
        populations: &[PopulationState],
        score: Option<&GroupScore>,
        owner: &str,
    ) -> MeasureResult<Vec<PopulationReport>> {
        let reported: Vec<&PopulationState> = populations
            .iter()
            .filter(|p| !p.population_type.is_computed_only())
            .collect();
        let expected = group.reported_populations().count();
        if reported.len() != expected {
            return Err(self.mismatch(
                owner,
                format!(
                    "definition has {expected} reportable populations but {} were computed",
                    reported.len()
                ),
            ));
        }

        group
            .reported_populations()
            .zip(reported)
            .map(|(def, population)| {
                if def.id != population.id || def.population_type != population.population_type {
                    return Err(self.mismatch(
                        owner,
                        format!(
                            "population '{}' ({}) was computed in place of '{}' ({})",
                            population.id, population.population_type, def.id, def.population_type
                        ),
                    ));
                }
                let observation = score.and_then(|s| s.observations.get(&def.id));
                let count = match observation {
                    Some(summary) => summary.count,
                    None => population.members.count(&group.basis),
                };
                let members = (self.options.includes_members()
                    && def.population_type.holds_members())
                .then(|| {
                    population
                        .members
                        .member_keys(&group.basis)
                        .into_iter()
                        .map(str::to_string)
                        .collect()
                });
                Ok(PopulationReport {
                    id: def.id.clone(),
                    population_type: def.population_type,
                    count,
                    members,
                    aggregate_method: observation.map(|s| s.method),
                    aggregate: observation.and_then(|s| s.value),
                })
            })
            .collect()
    }
}

fn supplemental_report(state: &SupplementalDataState) -> SupplementalDataReport {
    SupplementalDataReport {
        id: state.id.clone(),
        values: state
            .values
            .values()
            .map(|(value, count)| ValueCount {
                value: value.clone(),
                count: *count,
            })
            .collect(),
        resources: state.resources.iter().cloned().collect(),
    }
}
