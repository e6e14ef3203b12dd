//! Structural validation of measure definitions

use indexmap::{IndexMap, IndexSet};

use crate::error::{DefinitionError, DefinitionResult};
use crate::model::{
    GroupDef, MeasureDef, MeasureScoring, PopulationType, StratifierCriteria,
};

impl MeasureDef {
    /// Check every group against its scoring method's population table.
    ///
    /// Returns the first error found, in definition order.
    pub fn validate(&self) -> DefinitionResult<()> {
        for group in &self.groups {
            group.validate(self.identity())?;
        }
        let mut seen = IndexSet::new();
        for sde in &self.supplemental_data {
            if !seen.insert(sde.id.as_str()) {
                return Err(DefinitionError::DuplicateId {
                    measure: self.identity().to_string(),
                    group: "supplementalData".to_string(),
                    id: sde.id.clone(),
                });
            }
        }
        Ok(())
    }
}

impl GroupDef {
    /// Validate this group within measure `measure`
    pub fn validate(&self, measure: &str) -> DefinitionResult<()> {
        self.check_unique_ids(measure)?;

        for population in &self.populations {
            if !self.scoring.allows(population.population_type) {
                return Err(DefinitionError::UnsupportedPopulation {
                    measure: measure.to_string(),
                    group: self.id.clone(),
                    scoring: self.scoring,
                    population_type: population.population_type,
                });
            }
        }

        for required in self.scoring.required_populations() {
            if !self.has(*required) {
                return Err(DefinitionError::MissingRequiredPopulation {
                    measure: measure.to_string(),
                    group: self.id.clone(),
                    scoring: self.scoring,
                    population_type: *required,
                });
            }
        }

        let mut counts: IndexMap<PopulationType, usize> = IndexMap::new();
        for population in &self.populations {
            *counts.entry(population.population_type).or_default() += 1;
        }
        for (population_type, count) in counts {
            if count > self.scoring.max_populations(population_type) {
                return Err(DefinitionError::DuplicatePopulation {
                    measure: measure.to_string(),
                    group: self.id.clone(),
                    population_type,
                    count,
                });
            }
        }

        self.check_observations(measure)?;

        for stratifier in &self.stratifiers {
            let empty = match &stratifier.criteria {
                StratifierCriteria::Expression(e) => e.is_empty(),
                StratifierCriteria::Components(c) => c.is_empty(),
            };
            if empty {
                return Err(DefinitionError::InvalidStratifier {
                    measure: measure.to_string(),
                    stratifier: stratifier.id.clone(),
                });
            }
        }

        Ok(())
    }

    fn check_unique_ids(&self, measure: &str) -> DefinitionResult<()> {
        let duplicate = |id: &str| DefinitionError::DuplicateId {
            measure: measure.to_string(),
            group: self.id.clone(),
            id: id.to_string(),
        };
        let mut seen = IndexSet::new();
        for population in &self.populations {
            if !seen.insert(population.id.as_str()) {
                return Err(duplicate(&population.id));
            }
        }
        let mut seen = IndexSet::new();
        for stratifier in &self.stratifiers {
            if !seen.insert(stratifier.id.as_str()) {
                return Err(duplicate(&stratifier.id));
            }
        }
        Ok(())
    }

    fn check_observations(&self, measure: &str) -> DefinitionResult<()> {
        let observations: Vec<_> = self
            .populations_of(PopulationType::MeasureObservation)
            .collect();

        for observation in &observations {
            let Some(reference) = &observation.criteria_reference else {
                if self.scoring == MeasureScoring::Ratio {
                    return Err(DefinitionError::invalid_observations(
                        measure,
                        &self.id,
                        format!(
                            "ratio observation '{}' must reference the numerator or denominator",
                            observation.id
                        ),
                    ));
                }
                continue;
            };
            let target = self.population_by_id(reference).filter(|p| {
                p.population_type.holds_members() && p.id != observation.id
            });
            if target.is_none() {
                return Err(DefinitionError::InvalidCriteriaReference {
                    measure: measure.to_string(),
                    group: self.id.clone(),
                    population: observation.id.clone(),
                    reference: reference.clone(),
                });
            }
        }

        if self.scoring == MeasureScoring::Ratio && !observations.is_empty() {
            if observations.len() != 2 {
                return Err(DefinitionError::invalid_observations(
                    measure,
                    &self.id,
                    format!(
                        "ratio scoring with observations requires exactly 2 measure-observation populations, found {}",
                        observations.len()
                    ),
                ));
            }
            let referenced: IndexSet<PopulationType> = observations
                .iter()
                .filter_map(|o| o.criteria_reference.as_deref())
                .filter_map(|r| self.population_by_id(r))
                .map(|p| p.population_type)
                .collect();
            if !referenced.contains(&PopulationType::Numerator)
                || !referenced.contains(&PopulationType::Denominator)
            {
                return Err(DefinitionError::invalid_observations(
                    measure,
                    &self.id,
                    "ratio observations must reference the numerator and the denominator",
                ));
            }
        }

        Ok(())
    }
}
