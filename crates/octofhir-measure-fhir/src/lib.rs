//! FHIR adapter for measure evaluation
//!
//! Reads FHIR R4/R5 `Measure` resources into measure definitions, reads
//! per-subject results documents, and renders evaluated reports as FHIR
//! `MeasureReport` resources. Everything here is plain `serde_json`; no FHIR
//! object model is required.

pub mod error;
pub mod extension;
pub mod measure;
pub mod report;
pub mod results;
pub mod value;

pub use error::{FhirError, FhirResult};
pub use measure::{FhirMeasure, FhirVersion};
pub use report::measure_report_to_fhir;
pub use results::JsonResults;
pub use value::criteria_value_from_json;
