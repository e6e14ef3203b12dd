//! Per-evaluation aggregate state
//!
//! A [`MeasureState`] mirrors a [`MeasureDef`] group-for-group and
//! population-for-population. It is created empty at the start of an
//! evaluation, filled by the aggregator, partitioned by the stratifier, scored,
//! and then read once by the report assembler. Definitions themselves are
//! never touched.

use indexmap::{IndexMap, IndexSet};
use octofhir_measure_def::{
    GroupDef, MeasureDef, PopulationBasis, PopulationType, StratifierDef,
};
use octofhir_measure_types::{CriteriaValue, ResourceRef, ValueKey};
use rust_decimal::Decimal;
use smallvec::SmallVec;

use crate::scoring::GroupScore;

/// Component values of one stratifier row
pub type RowValues = SmallVec<[CriteriaValue; 2]>;

/// Members of one population: each member subject with the basis resources it contributed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationMembers {
    subjects: IndexMap<String, IndexSet<String>>,
}

impl PopulationMembers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subject (boolean basis)
    pub fn add_subject(&mut self, subject: &str) {
        if !self.subjects.contains_key(subject) {
            self.subjects.insert(subject.to_string(), IndexSet::new());
        }
    }

    /// Add a resource contributed by `subject` (resource basis)
    pub fn add_resource(&mut self, subject: &str, resource: impl Into<String>) {
        self.subjects
            .entry(subject.to_string())
            .or_default()
            .insert(resource.into());
    }

    pub fn contains_subject(&self, subject: &str) -> bool {
        self.subjects.contains_key(subject)
    }

    /// Whether `subject` contributed `resource`
    pub fn contains_resource(&self, subject: &str, resource: &str) -> bool {
        self.subjects
            .get(subject)
            .is_some_and(|resources| resources.contains(resource))
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.subjects.keys().map(String::as_str)
    }

    /// Distinct resources across all subjects, in first-contributed order
    pub fn resources(&self) -> IndexSet<&str> {
        self.subjects
            .values()
            .flat_map(|r| r.iter().map(String::as_str))
            .collect()
    }

    /// Member identities under `basis`: subject ids or resource keys
    pub fn member_keys(&self, basis: &PopulationBasis) -> IndexSet<&str> {
        match basis {
            PopulationBasis::Boolean => self.subjects().collect(),
            PopulationBasis::Resource(_) => self.resources(),
        }
    }

    /// Population count under `basis`
    pub fn count(&self, basis: &PopulationBasis) -> usize {
        match basis {
            PopulationBasis::Boolean => self.subjects.len(),
            PopulationBasis::Resource(_) => self.resources().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Members of `self` that are not members of `other`
    pub fn difference(&self, other: &Self, basis: &PopulationBasis) -> Self {
        let excluded = other.resources();
        self.filter(basis, |subject, resource| match resource {
            None => !other.contains_subject(subject),
            Some(r) => !excluded.contains(r),
        })
    }

    /// Members of `self` that are also members of `other`
    pub fn intersection(&self, other: &Self, basis: &PopulationBasis) -> Self {
        let shared = other.resources();
        self.filter(basis, |subject, resource| match resource {
            None => other.contains_subject(subject),
            Some(r) => shared.contains(r),
        })
    }

    /// Members within a stratum
    pub fn restrict(&self, stratum: &StratumMembers) -> Self {
        let mut out = Self::new();
        for (subject, resources) in &self.subjects {
            match stratum.rows.get(subject) {
                None => {}
                Some(None) => {
                    out.subjects.insert(subject.clone(), resources.clone());
                }
                Some(Some(row_resources)) => {
                    let kept = resources
                        .iter()
                        .filter(|r| row_resources.contains(*r))
                        .cloned()
                        .collect();
                    out.subjects.insert(subject.clone(), kept);
                }
            }
        }
        out
    }

    /// Keep members passing `keep(subject, resource)`; boolean basis passes `None`
    fn filter(&self, basis: &PopulationBasis, keep: impl Fn(&str, Option<&str>) -> bool) -> Self {
        let mut out = Self::new();
        for (subject, resources) in &self.subjects {
            if basis.is_boolean() {
                if keep(subject, None) {
                    out.subjects.insert(subject.clone(), resources.clone());
                }
                continue;
            }
            let kept: IndexSet<String> = resources
                .iter()
                .filter(|r| keep(subject, Some(r.as_str())))
                .cloned()
                .collect();
            if !kept.is_empty() {
                out.subjects.insert(subject.clone(), kept);
            }
        }
        out
    }
}

impl<S: AsRef<str>> FromIterator<S> for PopulationMembers {
    /// Collect a boolean-basis population from subject ids
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut members = Self::new();
        for subject in iter {
            members.add_subject(subject.as_ref());
        }
        members
    }
}

/// Identity of one stratifier row: a subject, or one resource of a subject
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub subject: String,
    pub resource: Option<String>,
}

impl RowKey {
    pub fn subject(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            resource: None,
        }
    }

    pub fn resource(subject: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            resource: Some(resource.into()),
        }
    }
}

/// Rows belonging to one stratum.
///
/// `None` admits every resource of the subject, `Some` only the listed ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StratumMembers {
    rows: IndexMap<String, Option<IndexSet<String>>>,
}

impl StratumMembers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, row: &RowKey) {
        match &row.resource {
            None => {
                self.rows.insert(row.subject.clone(), None);
            }
            Some(resource) => {
                let entry = self
                    .rows
                    .entry(row.subject.clone())
                    .or_insert_with(|| Some(IndexSet::new()));
                if let Some(resources) = entry {
                    resources.insert(resource.clone());
                }
            }
        }
    }

    /// Whether a subject (and optionally one of its resources) falls in this stratum
    pub fn includes(&self, subject: &str, resource: Option<&str>) -> bool {
        match (self.rows.get(subject), resource) {
            (None, _) => false,
            (Some(None), _) | (Some(Some(_)), None) => true,
            (Some(Some(resources)), Some(r)) => resources.contains(r),
        }
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One measure observation: a value taken for a subject or one of its resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub subject: String,
    pub resource: Option<String>,
    pub value: Decimal,
}

/// Aggregate state of one population
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationState {
    pub id: String,
    pub population_type: PopulationType,
    pub members: PopulationMembers,
    /// Observations, for measure-observation populations
    pub observations: Vec<Observation>,
}

impl PopulationState {
    pub fn new(id: impl Into<String>, population_type: PopulationType) -> Self {
        Self {
            id: id.into(),
            population_type,
            members: PopulationMembers::new(),
            observations: Vec::new(),
        }
    }

    /// This population limited to a stratum
    pub fn restrict(&self, stratum: &StratumMembers) -> Self {
        Self {
            id: self.id.clone(),
            population_type: self.population_type,
            members: self.members.restrict(stratum),
            observations: self
                .observations
                .iter()
                .filter(|o| stratum.includes(&o.subject, o.resource.as_deref()))
                .cloned()
                .collect(),
        }
    }
}

/// One discovered stratum
#[derive(Debug, Clone, PartialEq)]
pub struct StratumState {
    pub key: ValueKey,
    /// The value (single-expression) or value tuple (components) defining the stratum
    pub values: RowValues,
    pub members: StratumMembers,
    pub populations: Vec<PopulationState>,
    pub score: Option<GroupScore>,
}

/// Aggregate state of one stratifier
#[derive(Debug, Clone, PartialEq)]
pub struct StratifierState {
    pub id: String,
    /// Complete rows only: every component has a value
    pub rows: IndexMap<RowKey, RowValues>,
    pub strata: Vec<StratumState>,
}

impl StratifierState {
    pub fn new(def: &StratifierDef) -> Self {
        Self {
            id: def.id.clone(),
            rows: IndexMap::new(),
            strata: Vec::new(),
        }
    }
}

/// Aggregate state of one group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupState {
    pub id: String,
    pub populations: Vec<PopulationState>,
    pub stratifiers: Vec<StratifierState>,
    /// Date-of-compliance value per subject
    pub date_of_compliance: IndexMap<String, CriteriaValue>,
    pub score: Option<GroupScore>,
}

impl GroupState {
    pub fn new(def: &GroupDef) -> Self {
        Self {
            id: def.id.clone(),
            populations: def
                .populations
                .iter()
                .map(|p| PopulationState::new(&p.id, p.population_type))
                .collect(),
            stratifiers: def.stratifiers.iter().map(StratifierState::new).collect(),
            date_of_compliance: IndexMap::new(),
            score: None,
        }
    }

    pub fn population(&self, id: &str) -> Option<&PopulationState> {
        self.populations.iter().find(|p| p.id == id)
    }
}

/// Collected values of one supplemental data element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupplementalDataState {
    pub id: String,
    /// Distinct scalar values with their occurrence counts, in first-seen order
    pub values: IndexMap<ValueKey, (CriteriaValue, usize)>,
    pub resources: IndexSet<ResourceRef>,
}

impl SupplementalDataState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Record one subject's value
    pub fn record(&mut self, value: &CriteriaValue) {
        for leaf in value.singleton().leaves() {
            match leaf {
                CriteriaValue::Resource(r) => {
                    self.resources.insert(r.clone());
                }
                scalar => {
                    self.values
                        .entry(scalar.key())
                        .or_insert_with(|| (scalar.clone(), 0))
                        .1 += 1;
                }
            }
        }
    }
}

/// Aggregate state of a whole measure evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureState {
    pub groups: Vec<GroupState>,
    pub supplemental_data: Vec<SupplementalDataState>,
    /// Subjects that were evaluated, in order
    pub subjects: Vec<String>,
}

impl MeasureState {
    /// Empty state mirroring `def`
    pub fn new(def: &MeasureDef) -> Self {
        Self {
            groups: def.groups.iter().map(GroupState::new).collect(),
            supplemental_data: def
                .supplemental_data
                .iter()
                .map(|s| SupplementalDataState::new(&s.id))
                .collect(),
            subjects: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encounters(pairs: &[(&str, &str)]) -> PopulationMembers {
        let mut members = PopulationMembers::new();
        for (subject, encounter) in pairs {
            members.add_resource(subject, *encounter);
        }
        members
    }

    #[test]
    fn test_boolean_set_operations() {
        let basis = PopulationBasis::Boolean;
        let den: PopulationMembers = ["p1", "p2", "p3"].into_iter().collect();
        let denex: PopulationMembers = ["p2"].into_iter().collect();
        let total = den.difference(&denex, &basis);
        assert_eq!(total.subjects().collect::<Vec<_>>(), vec!["p1", "p3"]);
        let num: PopulationMembers = ["p3", "p4"].into_iter().collect();
        assert_eq!(num.intersection(&total, &basis).count(&basis), 1);
    }

    #[test]
    fn test_resource_count_is_distinct() {
        let basis = PopulationBasis::Resource("Encounter".into());
        let members = encounters(&[("p1", "Encounter/e1"), ("p1", "Encounter/e2"), ("p2", "Encounter/e3")]);
        assert_eq!(members.count(&basis), 3);
        assert_eq!(members.count(&PopulationBasis::Boolean), 2);

        let excluded = encounters(&[("p1", "Encounter/e2")]);
        let remaining = members.difference(&excluded, &basis);
        assert_eq!(remaining.count(&basis), 2);
        assert!(!remaining.contains_resource("p1", "Encounter/e2"));
    }

    #[test]
    fn test_restrict_to_resource_rows() {
        let members = encounters(&[("p1", "Encounter/e1"), ("p1", "Encounter/e2"), ("p2", "Encounter/e3")]);
        let mut stratum = StratumMembers::new();
        stratum.add(&RowKey::resource("p1", "Encounter/e2"));
        let restricted = members.restrict(&stratum);
        assert_eq!(
            restricted.resources().into_iter().collect::<Vec<_>>(),
            vec!["Encounter/e2"]
        );
    }

    #[test]
    fn test_sde_counts() {
        let mut sde = SupplementalDataState::new("sde-sex");
        sde.record(&CriteriaValue::from("M"));
        sde.record(&CriteriaValue::List(vec![CriteriaValue::from("M")]));
        sde.record(&CriteriaValue::List(vec![CriteriaValue::Null]));
        sde.record(&CriteriaValue::from("F"));
        let counts: Vec<_> = sde.values.values().map(|(v, c)| (v.to_string(), *c)).collect();
        assert_eq!(counts, vec![("M".to_string(), 2), ("F".to_string(), 1)]);
    }
}
