//! Measure observation aggregation

use octofhir_measure_def::AggregateMethod;
use rust_decimal::{Decimal, RoundingStrategy};

/// Significant digits kept by divisions
pub const DIVISION_PRECISION: u32 = 17;

/// Round a quotient to [`DIVISION_PRECISION`] significant digits, half away from zero
pub fn round_quotient(value: Decimal) -> Decimal {
    value
        .round_sf_with_strategy(DIVISION_PRECISION, RoundingStrategy::MidpointAwayFromZero)
        .unwrap_or(value)
        .normalize()
}

/// Aggregate observation values. Returns `None` for an empty input or on overflow.
pub fn aggregate(method: AggregateMethod, values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    match method {
        AggregateMethod::Sum => sum(values),
        AggregateMethod::Average => {
            let total = sum(values)?;
            total
                .checked_div(Decimal::from(values.len()))
                .map(round_quotient)
        }
        AggregateMethod::Min => values.iter().min().copied(),
        AggregateMethod::Max => values.iter().max().copied(),
        AggregateMethod::Median => median(values),
        AggregateMethod::Count => Some(Decimal::from(values.len())),
    }
}

fn sum(values: &[Decimal]) -> Option<Decimal> {
    values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
}

fn median(values: &[Decimal]) -> Option<Decimal> {
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        return Some(sorted[mid]);
    }
    sorted[mid - 1]
        .checked_add(sorted[mid])?
        .checked_div(Decimal::TWO)
        .map(round_quotient)
}

/// Ratio of two observation aggregates.
///
/// Absent when either side is absent or the denominator is zero;
/// zero when the numerator is zero and the denominator positive.
pub fn ratio_score(numerator: Option<Decimal>, denominator: Option<Decimal>) -> Option<Decimal> {
    let (numerator, denominator) = (numerator?, denominator?);
    if denominator.is_zero() {
        return None;
    }
    if numerator.is_zero() {
        return (denominator > Decimal::ZERO).then_some(Decimal::ZERO);
    }
    numerator.checked_div(denominator).map(round_quotient)
}
