//! Builders resolving measure-level defaults into validated definitions
//!
//! A measure may declare scoring, basis and improvement notation once at
//! measure level; each group inherits those unless it overrides them.
//!
//! ```
//! use octofhir_measure_def::{MeasureDefBuilder, GroupDefBuilder, MeasureScoring, PopulationType};
//!
//! let measure = MeasureDefBuilder::new("cms-example")
//!     .scoring(MeasureScoring::Proportion)
//!     .group(
//!         GroupDefBuilder::new("group-1")
//!             .population_of(PopulationType::InitialPopulation, "Initial Population")
//!             .population_of(PopulationType::Denominator, "Denominator")
//!             .population_of(PopulationType::Numerator, "Numerator"),
//!     )
//!     .build()
//!     .unwrap();
//! assert_eq!(measure.groups[0].scoring, MeasureScoring::Proportion);
//! ```

use crate::error::{DefinitionError, DefinitionResult};
use crate::model::{
    GroupDef, ImprovementNotation, MeasureDef, MeasureScoring, PopulationBasis, PopulationDef,
    PopulationType, StratifierDef, SupplementalDataDef,
};

/// Builder for [`MeasureDef`]
#[derive(Debug, Clone, Default)]
pub struct MeasureDefBuilder {
    id: String,
    url: Option<String>,
    version: Option<String>,
    scoring: Option<MeasureScoring>,
    basis: Option<PopulationBasis>,
    improvement_notation: Option<ImprovementNotation>,
    groups: Vec<GroupDefBuilder>,
    supplemental_data: Vec<SupplementalDataDef>,
}

impl MeasureDefBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Default scoring for groups that declare none
    pub fn scoring(mut self, scoring: MeasureScoring) -> Self {
        self.scoring = Some(scoring);
        self
    }

    /// Default basis for groups that declare none
    pub fn basis(mut self, basis: PopulationBasis) -> Self {
        self.basis = Some(basis);
        self
    }

    /// Default improvement notation for groups that declare none
    pub fn improvement_notation(mut self, notation: ImprovementNotation) -> Self {
        self.improvement_notation = Some(notation);
        self
    }

    pub fn group(mut self, group: GroupDefBuilder) -> Self {
        self.groups.push(group);
        self
    }

    pub fn supplemental_data(mut self, sde: SupplementalDataDef) -> Self {
        self.supplemental_data.push(sde);
        self
    }

    fn identity(&self) -> &str {
        self.url.as_deref().unwrap_or(&self.id)
    }

    /// Resolve defaults and validate the result
    pub fn build(self) -> DefinitionResult<MeasureDef> {
        let measure = self.identity().to_string();
        let groups = self
            .groups
            .iter()
            .map(|group| -> DefinitionResult<GroupDef> {
                let scoring = group
                    .scoring
                    .or(self.scoring)
                    .ok_or_else(|| DefinitionError::missing_scoring(&measure, &group.id))?;
                Ok(GroupDef {
                    id: group.id.clone(),
                    scoring,
                    basis: group
                        .basis
                        .clone()
                        .or_else(|| self.basis.clone())
                        .unwrap_or_default(),
                    improvement_notation: group
                        .improvement_notation
                        .or(self.improvement_notation)
                        .unwrap_or_default(),
                    populations: group.populations.clone(),
                    stratifiers: group.stratifiers.clone(),
                })
            })
            .collect::<DefinitionResult<Vec<_>>>()?;

        let def = MeasureDef {
            id: self.id,
            url: self.url,
            version: self.version,
            groups,
            supplemental_data: self.supplemental_data,
        };
        def.validate()?;
        Ok(def)
    }
}

/// Builder for [`GroupDef`]
#[derive(Debug, Clone, Default)]
pub struct GroupDefBuilder {
    id: String,
    scoring: Option<MeasureScoring>,
    basis: Option<PopulationBasis>,
    improvement_notation: Option<ImprovementNotation>,
    populations: Vec<PopulationDef>,
    stratifiers: Vec<StratifierDef>,
}

impl GroupDefBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn scoring(mut self, scoring: MeasureScoring) -> Self {
        self.scoring = Some(scoring);
        self
    }

    pub fn basis(mut self, basis: PopulationBasis) -> Self {
        self.basis = Some(basis);
        self
    }

    pub fn improvement_notation(mut self, notation: ImprovementNotation) -> Self {
        self.improvement_notation = Some(notation);
        self
    }

    pub fn population(mut self, population: PopulationDef) -> Self {
        self.populations.push(population);
        self
    }

    /// Add a population whose id is its type code
    pub fn population_of(
        self,
        population_type: PopulationType,
        expression: impl Into<String>,
    ) -> Self {
        self.population(PopulationDef::of_type(population_type, expression))
    }

    pub fn stratifier(mut self, stratifier: StratifierDef) -> Self {
        self.stratifiers.push(stratifier);
        self
    }
}
