//! Resource references and the resource-type hierarchy used by basis checks

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Resource types that derive directly from `Resource` rather than `DomainResource`
const NON_DOMAIN_RESOURCES: &[&str] = &["Bundle", "Binary", "Parameters"];

/// A typed resource identity (`Encounter/e1`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    /// Resource type name (e.g., "Encounter")
    pub resource_type: String,
    /// Logical id
    pub id: String,
}

impl ResourceRef {
    /// Create a new resource reference
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// The `Type/id` key identifying this resource within an evaluation
    pub fn key(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }

    /// Check whether this resource is an instance of `declared`
    pub fn is_instance_of(&self, declared: &str) -> bool {
        is_resource_subtype(&self.resource_type, declared)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// Error parsing a `Type/id` reference string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid resource reference '{0}': expected 'Type/id'")]
pub struct ParseReferenceError(pub String);

impl FromStr for ResourceRef {
    type Err = ParseReferenceError;

    /// Parses `Type/id`, also accepting absolute URLs ending in `Type/id`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim_end_matches('/').rsplitn(3, '/');
        let id = parts.next().filter(|p| !p.is_empty());
        let resource_type = parts
            .next()
            .filter(|p| p.chars().next().is_some_and(|c| c.is_ascii_uppercase()));
        match (resource_type, id) {
            (Some(t), Some(id)) => Ok(Self::new(t, id)),
            _ => Err(ParseReferenceError(s.to_string())),
        }
    }
}

/// Check whether resource type `actual` satisfies a declared basis type.
///
/// `Resource` accepts every resource, `DomainResource` accepts every resource
/// except `Bundle`, `Binary` and `Parameters`; any other declared type must match exactly.
pub fn is_resource_subtype(actual: &str, declared: &str) -> bool {
    match declared {
        "Resource" => true,
        "DomainResource" => !NON_DOMAIN_RESOURCES.contains(&actual),
        _ => actual == declared,
    }
}
