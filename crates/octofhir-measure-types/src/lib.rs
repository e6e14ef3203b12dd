//! Criteria result values for quality measure evaluation
//!
//! This crate defines the values an external expression engine hands to the
//! measure evaluator:
//!
//! - [`CriteriaValue`]: the raw per-subject result of one named expression
//! - [`ValueKey`]: normalized identity used to group equal stratifier values
//! - [`ResourceRef`]: typed resource identity and the resource-type hierarchy

pub mod key;
pub mod resource;
pub mod value;

pub use key::ValueKey;
pub use resource::{ParseReferenceError, ResourceRef, is_resource_subtype};
pub use value::{Code, Concept, CriteriaValue, Interval, Quantity, Range, ValueKind};
