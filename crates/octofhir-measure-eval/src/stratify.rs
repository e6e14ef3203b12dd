//! Stratification
//!
//! Rows recorded by the aggregator are grouped by the normalized key of their
//! value (single expression) or value tuple (components). Only observed
//! values and combinations form strata, in the order they were first seen.
//! Each stratum then receives its own copy of the group's populations,
//! limited to the stratum's rows.

use indexmap::IndexMap;
use log::debug;
use octofhir_measure_types::ValueKey;

use crate::state::{GroupState, RowValues, StratifierState, StratumMembers, StratumState};

/// Key of one stratifier row
pub fn row_key(values: &RowValues) -> ValueKey {
    match values.as_slice() {
        [single] => single.key(),
        tuple => ValueKey::of_tuple(tuple),
    }
}

/// Partition the rows of one stratifier into strata
pub fn partition(stratifier: &StratifierState) -> Vec<(ValueKey, RowValues, StratumMembers)> {
    let mut strata: IndexMap<ValueKey, (RowValues, StratumMembers)> = IndexMap::new();
    for (row, values) in &stratifier.rows {
        strata
            .entry(row_key(values))
            .or_insert_with(|| (values.clone(), StratumMembers::new()))
            .1
            .add(row);
    }
    strata
        .into_iter()
        .map(|(key, (values, members))| (key, values, members))
        .collect()
}

/// Build the strata of every stratifier of a group
pub fn stratify(group: &mut GroupState) {
    let populations = &group.populations;
    for stratifier in &mut group.stratifiers {
        stratifier.strata = partition(stratifier)
            .into_iter()
            .map(|(key, values, members)| StratumState {
                populations: populations.iter().map(|p| p.restrict(&members)).collect(),
                key,
                values,
                members,
                score: None,
            })
            .collect();
        debug!(
            "group '{}' stratifier '{}': {} rows in {} strata",
            group.id,
            stratifier.id,
            stratifier.rows.len(),
            stratifier.strata.len()
        );
    }
}
