//! Populations required and allowed by each scoring method

use crate::model::{MeasureScoring, PopulationType};

use PopulationType::{
    DateOfCompliance, Denominator, DenominatorException, DenominatorExclusion, InitialPopulation,
    MeasureObservation, MeasurePopulation, MeasurePopulationExclusion, Numerator,
    NumeratorExclusion,
};

const PROPORTION_REQUIRED: &[PopulationType] = &[InitialPopulation, Denominator, Numerator];
const PROPORTION_ALLOWED: &[PopulationType] = &[
    InitialPopulation,
    Denominator,
    Numerator,
    DenominatorExclusion,
    DenominatorException,
    NumeratorExclusion,
    DateOfCompliance,
];

const RATIO_REQUIRED: &[PopulationType] = &[InitialPopulation, Denominator, Numerator];
const RATIO_ALLOWED: &[PopulationType] = &[
    InitialPopulation,
    Denominator,
    Numerator,
    DenominatorExclusion,
    NumeratorExclusion,
    MeasureObservation,
    DateOfCompliance,
];

const COHORT_REQUIRED: &[PopulationType] = &[InitialPopulation];
const COHORT_ALLOWED: &[PopulationType] = &[InitialPopulation];

const CV_REQUIRED: &[PopulationType] = &[InitialPopulation, MeasurePopulation];
const CV_ALLOWED: &[PopulationType] = &[
    InitialPopulation,
    MeasurePopulation,
    MeasurePopulationExclusion,
    MeasureObservation,
];

impl MeasureScoring {
    /// Population types a group with this scoring must declare
    pub fn required_populations(&self) -> &'static [PopulationType] {
        match self {
            Self::Proportion => PROPORTION_REQUIRED,
            Self::Ratio => RATIO_REQUIRED,
            Self::Cohort => COHORT_REQUIRED,
            Self::ContinuousVariable => CV_REQUIRED,
        }
    }

    /// Population types a group with this scoring may declare (includes required)
    pub fn allowed_populations(&self) -> &'static [PopulationType] {
        match self {
            Self::Proportion => PROPORTION_ALLOWED,
            Self::Ratio => RATIO_ALLOWED,
            Self::Cohort => COHORT_ALLOWED,
            Self::ContinuousVariable => CV_ALLOWED,
        }
    }

    pub fn allows(&self, population_type: PopulationType) -> bool {
        self.allowed_populations().contains(&population_type)
    }

    /// Maximum number of populations of one type in a group
    pub fn max_populations(&self, population_type: PopulationType) -> usize {
        match (self, population_type) {
            (Self::Ratio, MeasureObservation) => 2,
            _ => 1,
        }
    }

    /// Whether groups with this scoring produce a numeric group score
    pub fn is_scored(&self) -> bool {
        matches!(self, Self::Proportion | Self::Ratio)
    }
}
