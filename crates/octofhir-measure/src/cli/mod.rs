//! CLI functionality for the measure tool
//!
//! This module contains all CLI-related functionality including:
//! - Measure evaluation against a results document
//! - Measure definition validation
//! - Output formatting

pub mod evaluate;
pub mod output;
pub mod validate;
