//! Construction and merge policies bound into a `FieldMapping`

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{Entry, EntryId, Range, RangeValue, Value};

/// Builds an entry range from the start/end cells and back
pub trait RangePolicy<T>: Send + Sync {
    /// Unparsable cells fall back to `T::default()`; a missing end collapses to the start.
    fn build(&self, start: &Value, end: &Value) -> Range<T>;

    /// Cell values written for `range` (start, end)
    fn to_values(&self, range: &Range<T>) -> (Value, Value);
}

/// Creates the entry an `EntryMapper` fills in
pub trait EntryFactory<T>: Send + Sync {
    fn create(&self, id: EntryId, range: Range<T>) -> Entry<T>;
}

/// `Entry::new` with its defaults ("New Entry", completion 0)
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEntryFactory;

impl<T: RangeValue> EntryFactory<T> for DefaultEntryFactory {
    fn create(&self, id: EntryId, range: Range<T>) -> Entry<T> {
        Entry::new(id, range)
    }
}

/// Date/time ranges; text cells accept RFC 3339, `YYYY-MM-DD HH:MM:SS` and dates
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampRangePolicy;

impl RangePolicy<NaiveDateTime> for TimestampRangePolicy {
    fn build(&self, start: &Value, end: &Value) -> Range<NaiveDateTime> {
        let start = start.as_timestamp().unwrap_or_default();
        let end = end.as_timestamp().unwrap_or(start);
        Range::new(start, end)
    }

    fn to_values(&self, range: &Range<NaiveDateTime>) -> (Value, Value) {
        (Value::Timestamp(range.start), Value::Timestamp(range.end))
    }
}

/// Plain numeric ranges (e.g. day offsets)
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericRangePolicy;

impl RangePolicy<f64> for NumericRangePolicy {
    fn build(&self, start: &Value, end: &Value) -> Range<f64> {
        let start = start.as_f64().unwrap_or_default();
        let end = end.as_f64().unwrap_or(start);
        Range::new(start, end)
    }

    fn to_values(&self, range: &Range<f64>) -> (Value, Value) {
        (Value::Real(range.start), Value::Real(range.end))
    }
}

/// How an external row update is merged into an existing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Apply every field that differs
    #[default]
    AllChanged,
    /// Apply only the first differing field in name → completion → range order
    FirstChanged,
}

impl FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all_changed" => Ok(UpdatePolicy::AllChanged),
            "first_changed" => Ok(UpdatePolicy::FirstChanged),
            _ => Err(format!("Unknown update policy: {}", s)),
        }
    }
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdatePolicy::AllChanged => write!(f, "all_changed"),
            UpdatePolicy::FirstChanged => write!(f, "first_changed"),
        }
    }
}

/// How children's completions roll up into their parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Arithmetic mean of the children
    #[default]
    Mean,
    /// Mean weighted by each child's range span
    DurationWeighted,
    /// Least complete child
    Minimum,
}

impl FromStr for AggregationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(AggregationPolicy::Mean),
            "duration_weighted" => Ok(AggregationPolicy::DurationWeighted),
            "minimum" => Ok(AggregationPolicy::Minimum),
            _ => Err(format!("Unknown aggregation policy: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_policy_build() {
        let range = TimestampRangePolicy.build(
            &Value::Text("2024-01-01".into()),
            &Value::Text("2024-01-03".into()),
        );
        assert_eq!(range.span(), 2.0 * 86_400.0);

        let (start, end) = TimestampRangePolicy.to_values(&range);
        assert_eq!(start, Value::Timestamp(range.start));
        assert_eq!(end, Value::Timestamp(range.end));
    }

    #[test]
    fn test_timestamp_policy_missing_end_collapses() {
        let range = TimestampRangePolicy.build(&Value::Text("2024-05-01".into()), &Value::Null);
        assert_eq!(range.start, range.end);
    }

    #[test]
    fn test_numeric_policy() {
        let range = NumericRangePolicy.build(&Value::Int(3), &Value::Real(7.5));
        assert_eq!(range, Range::new(3.0, 7.5));

        let range = NumericRangePolicy.build(&Value::Null, &Value::Null);
        assert_eq!(range, Range::new(0.0, 0.0));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "first_changed".parse::<UpdatePolicy>().unwrap(),
            UpdatePolicy::FirstChanged
        );
        assert!("sometimes".parse::<UpdatePolicy>().is_err());
        assert_eq!(
            "Duration_Weighted".parse::<AggregationPolicy>().unwrap(),
            AggregationPolicy::DurationWeighted
        );
        assert_eq!(UpdatePolicy::default(), UpdatePolicy::AllChanged);
        assert_eq!(AggregationPolicy::default(), AggregationPolicy::Mean);
    }
}
