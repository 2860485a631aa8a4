//! Transient ids for rows inserted outside an authoritative load

use chrono::Utc;
use std::time::Instant;

use crate::domain::{ColumnType, Value};

/// Strictly increasing ids from a monotonic nanosecond clock
///
/// The wall clock fixes the epoch once; `Instant` advances it, so ids keep
/// increasing even if the system clock steps backwards.
#[derive(Debug, Clone)]
pub struct TransientIdGenerator {
    epoch_nanos: i64,
    started: Instant,
    last: i64,
}

impl Default for TransientIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TransientIdGenerator {
    pub fn new() -> Self {
        Self {
            epoch_nanos: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            started: Instant::now(),
            last: i64::MIN,
        }
    }

    /// Next raw clock reading, strictly greater than the previous one
    pub fn next_raw(&mut self) -> i64 {
        let elapsed = i64::try_from(self.started.elapsed().as_nanos()).unwrap_or(i64::MAX);
        let now = self.epoch_nanos.saturating_add(elapsed);
        let next = if now > self.last {
            now
        } else {
            self.last.saturating_add(1)
        };
        self.last = next;
        next
    }

    /// Next id cast to `column_type`, skipping values for which `is_taken` holds
    pub fn next_id(
        &mut self,
        column_type: ColumnType,
        mut is_taken: impl FnMut(&Value) -> bool,
    ) -> Value {
        loop {
            let value = cast(self.next_raw(), column_type);
            if !is_taken(&value) {
                return value;
            }
        }
    }
}

fn cast(raw: i64, column_type: ColumnType) -> Value {
    match column_type {
        ColumnType::Text => Value::Text(raw.to_string()),
        ColumnType::Real => Value::Real(raw as f64),
        ColumnType::Integer | ColumnType::Timestamp | ColumnType::Boolean => Value::Int(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let mut ids = TransientIdGenerator::new();
        let mut previous = ids.next_raw();
        for _ in 0..1000 {
            let next = ids.next_raw();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_cast_to_column_type() {
        let mut ids = TransientIdGenerator::new();

        assert!(matches!(ids.next_id(ColumnType::Integer, |_| false), Value::Int(_)));
        assert!(matches!(ids.next_id(ColumnType::Real, |_| false), Value::Real(_)));
        match ids.next_id(ColumnType::Text, |_| false) {
            Value::Text(s) => assert!(s.parse::<i64>().is_ok()),
            other => panic!("expected text id, got {:?}", other),
        }
    }

    #[test]
    fn test_taken_ids_are_skipped() {
        let mut ids = TransientIdGenerator::new();
        let mut rejected = 0;

        let value = ids.next_id(ColumnType::Integer, |_| {
            rejected += 1;
            rejected <= 3
        });

        assert_eq!(rejected, 4);
        assert!(value.as_i64().is_some());
    }
}
