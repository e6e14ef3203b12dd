//! Rendering reports as FHIR `MeasureReport` resources

use octofhir_measure_def::{MEASURE_POPULATION_SYSTEM, MeasureScoring, PopulationType};
use octofhir_measure_eval::{
    GroupReport, MeasureReport, PopulationReport, StratifierReport, StratumReport, StratumValue,
    SupplementalDataReport,
};
use octofhir_measure_types::CriteriaValue;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};

use crate::extension::SUPPLEMENTAL_DATA_URL;

/// Render `report` as a FHIR `MeasureReport`.
///
/// Member lists become contained `List` resources referenced from
/// `subjectResults`; supplemental data values become contained `Observation`s.
pub fn measure_report_to_fhir(report: &MeasureReport) -> Value {
    let mut writer = Writer::default();

    let groups: Vec<Value> = report.groups.iter().map(|g| writer.group(g)).collect();
    let extensions: Vec<Value> = report
        .supplemental_data
        .iter()
        .flat_map(|sde| writer.supplemental_data(sde))
        .collect();

    let mut resource = json!({
        "resourceType": "MeasureReport",
        "status": "complete",
        "type": report.report_type.code(),
        "measure": report.measure,
        "group": groups,
    });
    if let Some(subject) = &report.subject {
        resource["subject"] = json!({ "reference": subject });
    }
    if !writer.contained.is_empty() {
        resource["contained"] = Value::Array(writer.contained);
    }
    if !extensions.is_empty() {
        resource["extension"] = Value::Array(extensions);
    }
    resource
}

#[derive(Default)]
struct Writer {
    contained: Vec<Value>,
}

impl Writer {
    fn group(&mut self, group: &GroupReport) -> Value {
        let populations: Vec<Value> = group
            .populations
            .iter()
            .map(|p| self.population(&group.id, p))
            .collect();
        let mut value = json!({ "id": group.id, "population": populations });
        if let Some(score) = group_score(group.scoring, group.score, &group.populations) {
            value["measureScore"] = json!({ "value": score });
        }
        if !group.stratifiers.is_empty() {
            let stratifiers: Vec<Value> = group
                .stratifiers
                .iter()
                .map(|s| self.stratifier(group, s))
                .collect();
            value["stratifier"] = Value::Array(stratifiers);
        }
        value
    }

    fn population(&mut self, owner: &str, population: &PopulationReport) -> Value {
        let mut value = json!({
            "id": population.id,
            "code": {
                "coding": [{
                    "system": MEASURE_POPULATION_SYSTEM,
                    "code": population.population_type.code(),
                }]
            },
            "count": population.count,
        });
        if let Some(members) = &population.members {
            let id = format!("{owner}-{}", population.id);
            self.contained.push(json!({
                "resourceType": "List",
                "id": id,
                "status": "current",
                "mode": "working",
                "entry": members
                    .iter()
                    .map(|m| json!({ "item": { "reference": m } }))
                    .collect::<Vec<_>>(),
            }));
            value["subjectResults"] = json!({ "reference": format!("#{id}") });
        }
        value
    }

    fn stratifier(&mut self, group: &GroupReport, stratifier: &StratifierReport) -> Value {
        let strata: Vec<Value> = stratifier
            .strata
            .iter()
            .enumerate()
            .map(|(index, stratum)| {
                let owner = format!("{}-{}-{}", group.id, stratifier.id, index + 1);
                self.stratum(group.scoring, &owner, stratum)
            })
            .collect();
        let mut value = json!({ "id": stratifier.id, "stratum": strata });
        if let Some(code) = &stratifier.code {
            value["code"] = json!([{ "text": code }]);
        }
        value
    }

    fn stratum(&mut self, scoring: MeasureScoring, owner: &str, stratum: &StratumReport) -> Value {
        let populations: Vec<Value> = stratum
            .populations
            .iter()
            .map(|p| self.population(owner, p))
            .collect();
        let mut value = json!({ "population": populations });
        match &stratum.value {
            StratumValue::Value(v) => value["value"] = concept(v),
            StratumValue::Components(components) => {
                value["component"] = components
                    .iter()
                    .map(|c| {
                        json!({
                            "code": { "text": c.code.as_deref().unwrap_or(&c.id) },
                            "value": concept(&c.value),
                        })
                    })
                    .collect();
            }
        }
        if let Some(score) = group_score(scoring, stratum.score, &stratum.populations) {
            value["measureScore"] = json!({ "value": score });
        }
        value
    }

    fn supplemental_data(&mut self, sde: &SupplementalDataReport) -> Vec<Value> {
        let mut extensions = Vec::new();
        for (index, value) in sde.values.iter().enumerate() {
            let id = format!("{}-{}", sde.id, index + 1);
            self.contained.push(json!({
                "resourceType": "Observation",
                "id": id,
                "status": "final",
                "code": { "text": sde.id },
                "valueCodeableConcept": concept(&value.value),
                "component": [{
                    "code": { "text": "count" },
                    "valueInteger": value.count,
                }],
            }));
            extensions.push(json!({
                "url": SUPPLEMENTAL_DATA_URL,
                "valueReference": { "reference": format!("#{id}") },
            }));
        }
        for resource in &sde.resources {
            extensions.push(json!({
                "url": SUPPLEMENTAL_DATA_URL,
                "valueReference": { "reference": resource.key() },
            }));
        }
        extensions
    }
}

/// Score as a JSON number.
///
/// Continuous-variable groups report the aggregate of their observation.
fn group_score(
    scoring: MeasureScoring,
    score: Option<Decimal>,
    populations: &[PopulationReport],
) -> Option<f64> {
    let score = match scoring {
        MeasureScoring::ContinuousVariable => populations
            .iter()
            .find(|p| p.population_type == PopulationType::MeasureObservation)
            .and_then(|p| p.aggregate),
        _ => score,
    };
    score.and_then(|s| s.to_f64())
}

/// A criteria value as a CodeableConcept
fn concept(value: &CriteriaValue) -> Value {
    match value {
        CriteriaValue::Code(code) => json!({ "coding": [coding(code)] }),
        CriteriaValue::Concept(concept) => {
            let mut value = json!({
                "coding": concept.codes.iter().map(coding).collect::<Vec<_>>(),
            });
            if let Some(text) = &concept.text {
                value["text"] = json!(text);
            }
            value
        }
        other => json!({ "text": other.to_string() }),
    }
}

fn coding(code: &octofhir_measure_types::Code) -> Value {
    let mut value = json!({ "code": code.code });
    if let Some(system) = &code.system {
        value["system"] = json!(system);
    }
    if let Some(display) = &code.display {
        value["display"] = json!(display);
    }
    value
}
