//! Measure definition model
//!
//! Definitions describe the shape of a measure: its groups, their populations
//! and stratifiers, and the supplemental data collected alongside. They are
//! built once from measure metadata and never mutated by evaluation; all
//! evaluation state lives outside of them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Code system of population type codes
pub const MEASURE_POPULATION_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/measure-population";
/// Code system of scoring codes
pub const MEASURE_SCORING_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/measure-scoring";
/// Code system of improvement notation codes
pub const IMPROVEMENT_NOTATION_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/measure-improvement-notation";

/// Implements `code()`, `from_code()`, `Display` and `FromStr` for a code enum
macro_rules! coded_enum {
    ($name:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        impl $name {
            /// All variants, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The FHIR code of this value
            pub const fn code(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }

            /// Look up a value by its FHIR code
            pub fn from_code(code: &str) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_code(s).ok_or_else(|| format!("unknown {} '{}'", stringify!($name), s))
            }
        }
    };
}

/// Scoring method of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasureScoring {
    Proportion,
    Ratio,
    ContinuousVariable,
    Cohort,
}

coded_enum!(MeasureScoring {
    Proportion => "proportion",
    Ratio => "ratio",
    ContinuousVariable => "continuous-variable",
    Cohort => "cohort",
});

/// Population type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PopulationType {
    InitialPopulation,
    Denominator,
    DenominatorExclusion,
    DenominatorException,
    Numerator,
    NumeratorExclusion,
    MeasurePopulation,
    MeasurePopulationExclusion,
    MeasureObservation,
    DateOfCompliance,
}

coded_enum!(PopulationType {
    InitialPopulation => "initial-population",
    Denominator => "denominator",
    DenominatorExclusion => "denominator-exclusion",
    DenominatorException => "denominator-exception",
    Numerator => "numerator",
    NumeratorExclusion => "numerator-exclusion",
    MeasurePopulation => "measure-population",
    MeasurePopulationExclusion => "measure-population-exclusion",
    MeasureObservation => "measure-observation",
    DateOfCompliance => "date-of-compliance",
});

impl PopulationType {
    /// Whether results of this population are basis members (subjects or resources).
    ///
    /// Observations carry measured values and date-of-compliance carries dates.
    pub const fn holds_members(&self) -> bool {
        !matches!(self, Self::MeasureObservation | Self::DateOfCompliance)
    }

    /// Computed during evaluation but never reported as a population
    pub const fn is_computed_only(&self) -> bool {
        matches!(self, Self::DateOfCompliance)
    }
}

/// Improvement notation of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImprovementNotation {
    #[default]
    Increase,
    Decrease,
}

coded_enum!(ImprovementNotation {
    Increase => "increase",
    Decrease => "decrease",
});

/// Aggregation of measure observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregateMethod {
    #[default]
    Sum,
    Average,
    Min,
    Max,
    Median,
    Count,
}

coded_enum!(AggregateMethod {
    Sum => "sum",
    Average => "average",
    Min => "min",
    Max => "max",
    Median => "median",
    Count => "count",
});

/// What a group counts: subjects (boolean basis) or resources of a type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PopulationBasis {
    #[default]
    Boolean,
    Resource(String),
}

impl PopulationBasis {
    /// Parse a basis code; anything but `boolean` names a resource type
    pub fn from_code(code: &str) -> Self {
        if code.eq_ignore_ascii_case("boolean") {
            Self::Boolean
        } else {
            Self::Resource(code.to_string())
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Self::Boolean)
    }

    /// The resource type counted by a resource basis
    pub fn resource_type(&self) -> Option<&str> {
        match self {
            Self::Boolean => None,
            Self::Resource(t) => Some(t),
        }
    }
}

impl fmt::Display for PopulationBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => f.write_str("boolean"),
            Self::Resource(t) => f.write_str(t),
        }
    }
}

impl From<String> for PopulationBasis {
    fn from(code: String) -> Self {
        Self::from_code(&code)
    }
}

impl From<PopulationBasis> for String {
    fn from(basis: PopulationBasis) -> Self {
        basis.to_string()
    }
}

/// A measure and its groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureDef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub groups: Vec<GroupDef>,
    #[serde(default)]
    pub supplemental_data: Vec<SupplementalDataDef>,
}

impl MeasureDef {
    /// Canonical identity used in messages: url when known, id otherwise
    pub fn identity(&self) -> &str {
        self.url.as_deref().unwrap_or(&self.id)
    }

    pub fn group(&self, id: &str) -> Option<&GroupDef> {
        self.groups.iter().find(|g| g.id == id)
    }
}

/// One group of a measure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDef {
    pub id: String,
    pub scoring: MeasureScoring,
    #[serde(default)]
    pub basis: PopulationBasis,
    #[serde(default)]
    pub improvement_notation: ImprovementNotation,
    pub populations: Vec<PopulationDef>,
    #[serde(default)]
    pub stratifiers: Vec<StratifierDef>,
}

impl GroupDef {
    /// First population of the given type
    pub fn population(&self, population_type: PopulationType) -> Option<&PopulationDef> {
        self.populations
            .iter()
            .find(|p| p.population_type == population_type)
    }

    /// All populations of the given type, in definition order
    pub fn populations_of(
        &self,
        population_type: PopulationType,
    ) -> impl Iterator<Item = &PopulationDef> {
        self.populations
            .iter()
            .filter(move |p| p.population_type == population_type)
    }

    pub fn population_by_id(&self, id: &str) -> Option<&PopulationDef> {
        self.populations.iter().find(|p| p.id == id)
    }

    /// Populations that appear in a report
    pub fn reported_populations(&self) -> impl Iterator<Item = &PopulationDef> {
        self.populations
            .iter()
            .filter(|p| !p.population_type.is_computed_only())
    }

    pub fn has(&self, population_type: PopulationType) -> bool {
        self.population(population_type).is_some()
    }
}

/// A population criterion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationDef {
    pub id: String,
    #[serde(rename = "type")]
    pub population_type: PopulationType,
    /// Name of the expression whose per-subject result defines membership
    pub expression: String,
    /// Population an observation is taken over
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_method: Option<AggregateMethod>,
}

impl PopulationDef {
    pub fn new(
        id: impl Into<String>,
        population_type: PopulationType,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            population_type,
            expression: expression.into(),
            criteria_reference: None,
            aggregate_method: None,
        }
    }

    /// Use the population code as both id and expression name
    pub fn of_type(population_type: PopulationType, expression: impl Into<String>) -> Self {
        Self::new(population_type.code(), population_type, expression)
    }

    pub fn with_criteria_reference(mut self, reference: impl Into<String>) -> Self {
        self.criteria_reference = Some(reference.into());
        self
    }

    pub fn with_aggregate_method(mut self, method: AggregateMethod) -> Self {
        self.aggregate_method = Some(method);
        self
    }
}

/// A stratifier: one expression, or several components whose values form a tuple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StratifierDef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub criteria: StratifierCriteria,
}

/// Criteria of a stratifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StratifierCriteria {
    Expression(String),
    Components(Vec<StratifierComponentDef>),
}

/// One component of a multi-component stratifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StratifierComponentDef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub expression: String,
}

impl StratifierComponentDef {
    pub fn new(id: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: None,
            expression: expression.into(),
        }
    }
}

impl StratifierDef {
    /// Single-expression stratifier
    pub fn expression(id: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: None,
            criteria: StratifierCriteria::Expression(expression.into()),
        }
    }

    /// Multi-component stratifier
    pub fn components(
        id: impl Into<String>,
        components: impl IntoIterator<Item = StratifierComponentDef>,
    ) -> Self {
        Self {
            id: id.into(),
            code: None,
            criteria: StratifierCriteria::Components(components.into_iter().collect()),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Expression names read by this stratifier, in component order
    pub fn expressions(&self) -> Vec<&str> {
        match &self.criteria {
            StratifierCriteria::Expression(e) => vec![e.as_str()],
            StratifierCriteria::Components(components) => {
                components.iter().map(|c| c.expression.as_str()).collect()
            }
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self.criteria, StratifierCriteria::Components(_))
    }
}

/// A supplemental data element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplementalDataDef {
    pub id: String,
    pub expression: String,
}

impl SupplementalDataDef {
    pub fn new(id: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expression: expression.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for t in PopulationType::ALL {
            assert_eq!(PopulationType::from_code(t.code()), Some(*t));
        }
        assert_eq!(
            "continuous-variable".parse::<MeasureScoring>(),
            Ok(MeasureScoring::ContinuousVariable)
        );
        assert!("sideways".parse::<ImprovementNotation>().is_err());
    }

    #[test]
    fn test_basis_serde() {
        let json = serde_json::to_string(&PopulationBasis::Resource("Encounter".into())).unwrap();
        assert_eq!(json, "\"Encounter\"");
        let basis: PopulationBasis = serde_json::from_str("\"boolean\"").unwrap();
        assert!(basis.is_boolean());
    }

    #[test]
    fn test_reported_populations_skip_date_of_compliance() {
        let group = GroupDef {
            id: "g".into(),
            scoring: MeasureScoring::Proportion,
            basis: PopulationBasis::Boolean,
            improvement_notation: ImprovementNotation::Increase,
            populations: vec![
                PopulationDef::of_type(PopulationType::InitialPopulation, "IP"),
                PopulationDef::of_type(PopulationType::DateOfCompliance, "DOC"),
            ],
            stratifiers: vec![],
        };
        assert_eq!(group.reported_populations().count(), 1);
    }
}
