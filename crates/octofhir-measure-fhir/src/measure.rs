//! Reading FHIR `Measure` resources
//!
//! R4 measures carry group-level scoring, basis and improvement notation in
//! cqfm extensions; R5 measures have dedicated elements for them. Both
//! resolve to the same [`MeasureDef`].

use log::debug;
use octofhir_measure_def::{
    AggregateMethod, DefinitionError, GroupDefBuilder, IMPROVEMENT_NOTATION_SYSTEM,
    ImprovementNotation, MeasureDef, MeasureDefBuilder, MeasureScoring, MeasureSource,
    PopulationBasis, PopulationDef, PopulationType, StratifierComponentDef, StratifierDef,
    SupplementalDataDef,
};
use serde_json::Value;

use crate::error::{FhirError, FhirResult};
use crate::extension::{
    AGGREGATE_METHOD_URL, CRITERIA_REFERENCE_URL, DATE_OF_COMPLIANCE_URL,
    IMPROVEMENT_NOTATION_URL, POPULATION_BASIS_URL, SCORING_URL, array_field,
    criteria_expression, extension_value, first_code, first_system, is_cqfm, str_field,
};

/// FHIR release a measure resource is written against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FhirVersion {
    R4,
    R5,
}

impl FhirVersion {
    /// Guess the release from R5-only elements
    pub fn detect(measure: &Value) -> Self {
        let r5_group = array_field(measure, "group").iter().any(|group| {
            ["basis", "scoring", "improvementNotation", "rateAggregation"]
                .iter()
                .any(|element| group.get(element).is_some())
        });
        if r5_group || measure.get("basis").is_some() {
            Self::R5
        } else {
            Self::R4
        }
    }
}

/// A FHIR `Measure` resource
#[derive(Debug, Clone, PartialEq)]
pub struct FhirMeasure {
    resource: Value,
    version: FhirVersion,
}

impl FhirMeasure {
    /// Parse a `Measure` from JSON text
    pub fn from_json(json: &str) -> FhirResult<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Wrap a parsed `Measure`, detecting its FHIR release
    pub fn from_value(resource: Value) -> FhirResult<Self> {
        match str_field(&resource, "resourceType") {
            Some("Measure") => {}
            other => {
                return Err(FhirError::UnexpectedResource {
                    expected: "Measure".into(),
                    found: other.unwrap_or("<none>").to_string(),
                });
            }
        }
        let version = FhirVersion::detect(&resource);
        Ok(Self { resource, version })
    }

    /// Override the detected release
    pub fn with_version(mut self, version: FhirVersion) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> FhirVersion {
        self.version
    }

    pub fn resource(&self) -> &Value {
        &self.resource
    }

    /// Canonical url, or the resource id
    pub fn identity(&self) -> &str {
        str_field(&self.resource, "url")
            .or_else(|| str_field(&self.resource, "id"))
            .unwrap_or("Measure")
    }

    /// Convert to a validated measure definition
    pub fn to_measure_def(&self) -> FhirResult<MeasureDef> {
        let measure = &self.resource;
        let id = str_field(measure, "id").ok_or_else(|| FhirError::missing("Measure", "id"))?;
        let identity = self.identity().to_string();

        let mut builder = MeasureDefBuilder::new(id);
        if let Some(url) = str_field(measure, "url") {
            builder = builder.url(url);
        }
        if let Some(version) = str_field(measure, "version") {
            builder = builder.version(version);
        }
        if let Some(scoring) = measure.get("scoring") {
            builder = builder.scoring(parse_scoring(&identity, id, scoring)?);
        }
        if let Some(basis) = self.measure_basis() {
            builder = builder.basis(PopulationBasis::from_code(basis));
        }
        if let Some(notation) = measure.get("improvementNotation") {
            builder = builder.improvement_notation(parse_improvement_notation(&identity, id, notation)?);
        }

        for (index, group) in array_field(measure, "group").iter().enumerate() {
            builder = builder.group(self.group(&identity, index, group)?);
        }

        for (index, sde) in array_field(measure, "supplementalData").iter().enumerate() {
            let sde_id = element_id(sde, "sde", index);
            let expression = criteria_expression(sde).ok_or_else(|| {
                FhirError::missing("Measure", format!("supplementalData[{index}].criteria.expression"))
            })?;
            builder = builder.supplemental_data(SupplementalDataDef::new(sde_id, expression));
        }

        Ok(builder.build()?)
    }

    fn measure_basis(&self) -> Option<&str> {
        match self.version {
            FhirVersion::R4 => extension_value(&self.resource, POPULATION_BASIS_URL)?.as_str(),
            FhirVersion::R5 => first_code(self.resource.get("basis")?),
        }
    }

    /// Group-level element, from the R5 element or the R4 extension
    fn group_element<'a>(&self, group: &'a Value, element: &str, url: &str) -> Option<&'a Value> {
        match self.version {
            FhirVersion::R4 => extension_value(group, url),
            FhirVersion::R5 => group.get(element),
        }
    }

    fn group(&self, identity: &str, index: usize, group: &Value) -> FhirResult<GroupDefBuilder> {
        let group_id = element_id(group, "group", index);
        let mut builder = GroupDefBuilder::new(&group_id);

        if let Some(scoring) = self.group_element(group, "scoring", SCORING_URL) {
            builder = builder.scoring(parse_scoring(identity, &group_id, scoring)?);
        }
        if let Some(basis) = self
            .group_element(group, "basis", POPULATION_BASIS_URL)
            .and_then(first_code)
        {
            builder = builder.basis(PopulationBasis::from_code(basis));
        }
        if let Some(notation) =
            self.group_element(group, "improvementNotation", IMPROVEMENT_NOTATION_URL)
        {
            builder = builder
                .improvement_notation(parse_improvement_notation(identity, &group_id, notation)?);
        }

        for ext in array_field(group, "extension") {
            if let Some(url) = str_field(ext, "url").filter(|url| is_cqfm(url)) {
                if ![SCORING_URL, POPULATION_BASIS_URL, IMPROVEMENT_NOTATION_URL].contains(&url) {
                    debug!("group '{group_id}': ignoring extension {url}");
                }
            }
        }

        for (index, population) in array_field(group, "population").iter().enumerate() {
            builder = builder.population(self.population(identity, &group_id, index, population)?);
        }

        if let Some(expression) = extension_value(group, DATE_OF_COMPLIANCE_URL)
            .and_then(|value| value.get("expression"))
            .and_then(Value::as_str)
        {
            builder = builder.population(PopulationDef::of_type(
                PopulationType::DateOfCompliance,
                expression,
            ));
        }

        for (index, stratifier) in array_field(group, "stratifier").iter().enumerate() {
            builder = builder.stratifier(stratifier_def(&group_id, index, stratifier)?);
        }

        Ok(builder)
    }

    fn population(
        &self,
        identity: &str,
        group_id: &str,
        index: usize,
        population: &Value,
    ) -> FhirResult<PopulationDef> {
        let path = format!("group[{group_id}].population[{index}]");
        let code = population
            .get("code")
            .and_then(first_code)
            .ok_or_else(|| FhirError::missing("Measure", format!("{path}.code")))?;
        let population_type = PopulationType::from_code(code).ok_or_else(|| {
            FhirError::invalid("Measure", format!("{path}.code"), format!("unknown population type '{code}'"))
        })?;
        let expression = criteria_expression(population)
            .ok_or_else(|| FhirError::missing("Measure", format!("{path}.criteria.expression")))?;
        let id = str_field(population, "id").unwrap_or(population_type.code());

        let mut def = PopulationDef::new(id, population_type, expression);

        let reference = match self.version {
            FhirVersion::R4 => extension_value(population, CRITERIA_REFERENCE_URL).and_then(Value::as_str),
            FhirVersion::R5 => str_field(population, "inputPopulationId")
                .or_else(|| extension_value(population, CRITERIA_REFERENCE_URL).and_then(Value::as_str)),
        };
        if let Some(reference) = reference {
            def = def.with_criteria_reference(reference);
        }

        let method = match self.version {
            FhirVersion::R4 => extension_value(population, AGGREGATE_METHOD_URL),
            FhirVersion::R5 => population
                .get("aggregateMethod")
                .or_else(|| extension_value(population, AGGREGATE_METHOD_URL)),
        };
        if let Some(method) = method.and_then(first_code) {
            let method = AggregateMethod::from_code(method).ok_or_else(|| {
                DefinitionError::invalid_aggregate_method(identity, id, method)
            })?;
            def = def.with_aggregate_method(method);
        }

        Ok(def)
    }
}

impl MeasureSource for FhirMeasure {
    type Error = FhirError;

    fn measure_def(&self) -> FhirResult<MeasureDef> {
        self.to_measure_def()
    }
}

/// `id` of a backbone element, or a positional fallback
fn element_id(element: &Value, prefix: &str, index: usize) -> String {
    str_field(element, "id")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{prefix}-{}", index + 1))
}

fn parse_scoring(identity: &str, owner: &str, value: &Value) -> FhirResult<MeasureScoring> {
    let code = first_code(value).unwrap_or_default();
    MeasureScoring::from_code(code)
        .ok_or_else(|| DefinitionError::invalid_scoring(identity, owner, code).into())
}

fn parse_improvement_notation(
    identity: &str,
    owner: &str,
    value: &Value,
) -> FhirResult<ImprovementNotation> {
    let code = first_code(value).unwrap_or_default();
    let system_ok = first_system(value).is_none_or(|s| s == IMPROVEMENT_NOTATION_SYSTEM);
    ImprovementNotation::from_code(code)
        .filter(|_| system_ok)
        .ok_or_else(|| DefinitionError::invalid_improvement_notation(identity, owner, code).into())
}

fn stratifier_def(group_id: &str, index: usize, stratifier: &Value) -> FhirResult<StratifierDef> {
    let id = element_id(stratifier, "stratifier", index);
    let components = array_field(stratifier, "component");

    let def = if components.is_empty() {
        let expression = criteria_expression(stratifier).ok_or_else(|| {
            FhirError::missing(
                "Measure",
                format!("group[{group_id}].stratifier[{id}].criteria.expression"),
            )
        })?;
        StratifierDef::expression(id, expression)
    } else {
        let components = components
            .iter()
            .enumerate()
            .map(|(index, component)| {
                let component_id = element_id(component, "component", index);
                let expression = criteria_expression(component).ok_or_else(|| {
                    FhirError::missing(
                        "Measure",
                        format!("group[{group_id}].stratifier[{id}].component[{component_id}].criteria.expression"),
                    )
                })?;
                let mut def = StratifierComponentDef::new(&component_id, expression);
                def.code = component.get("code").and_then(concept_label);
                Ok(def)
            })
            .collect::<FhirResult<Vec<_>>>()?;
        StratifierDef::components(id, components)
    };

    Ok(match stratifier.get("code").and_then(concept_label) {
        Some(code) => def.with_code(code),
        None => def,
    })
}

/// First code of a CodeableConcept, falling back to its text
fn concept_label(concept: &Value) -> Option<String> {
    first_code(concept)
        .or_else(|| str_field(concept, "text"))
        .map(str::to_string)
}
