//! Completion rollup from children to parents

pub use crate::config::AggregationPolicy;

use tracing::debug;

use crate::domain::{Entry, RangeValue};

/// Tolerance below which two completions count as equal
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionAggregator {
    policy: AggregationPolicy,
}

impl CompletionAggregator {
    pub fn new(policy: AggregationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// Aggregate completion of `children`; `None` for leaves
    pub fn aggregate<T: RangeValue>(&self, children: &[Entry<T>]) -> Option<f64> {
        if children.is_empty() {
            return None;
        }
        let value = match self.policy {
            AggregationPolicy::Mean => mean(children),
            AggregationPolicy::DurationWeighted => {
                let total: f64 = children.iter().map(|c| c.range.span()).sum();
                if total > 0.0 {
                    children
                        .iter()
                        .map(|c| c.completion * c.range.span())
                        .sum::<f64>()
                        / total
                } else {
                    mean(children)
                }
            }
            AggregationPolicy::Minimum => children
                .iter()
                .map(|c| c.completion)
                .fold(f64::INFINITY, f64::min),
        };
        Some(value)
    }

    /// Store the aggregate into `entry`; true when its completion changed
    pub fn recompute<T: RangeValue>(&self, entry: &mut Entry<T>) -> bool {
        let Some(value) = self.aggregate(&entry.children) else {
            return false;
        };
        if (entry.completion - value).abs() <= EPSILON {
            return false;
        }
        debug!(
            "recompute: entry {} completion {} -> {}",
            entry.id, entry.completion, value
        );
        entry.completion = value;
        true
    }
}

fn mean<T: RangeValue>(children: &[Entry<T>]) -> f64 {
    children.iter().map(|c| c.completion).sum::<f64>() / children.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Range;

    fn parent_with(children: &[(f64, f64)]) -> Entry<f64> {
        let mut parent = Entry::new(1, Range::new(0.0, 10.0));
        for (i, (span, completion)) in children.iter().enumerate() {
            parent.add_child(
                Entry::new(10 + i as i64, Range::new(0.0, *span)).with_completion(*completion),
            );
        }
        parent
    }

    #[test]
    fn test_mean_single_child() {
        let mut parent = parent_with(&[(1.0, 100.0)]);

        assert!(CompletionAggregator::default().recompute(&mut parent));
        assert_eq!(parent.completion, 100.0);
    }

    #[test]
    fn test_mean_unchanged_reports_false() {
        let mut parent = parent_with(&[(1.0, 20.0), (1.0, 40.0)]).with_completion(30.0);
        assert!(!CompletionAggregator::default().recompute(&mut parent));
    }

    #[test]
    fn test_leaf_is_untouched() {
        let mut leaf = Entry::new(1, Range::new(0.0, 1.0)).with_completion(42.0);
        assert!(!CompletionAggregator::default().recompute(&mut leaf));
        assert_eq!(leaf.completion, 42.0);
    }

    #[test]
    fn test_duration_weighted() {
        let aggregator = CompletionAggregator::new(AggregationPolicy::DurationWeighted);
        let parent = parent_with(&[(3.0, 100.0), (1.0, 0.0)]);

        assert_eq!(aggregator.aggregate(&parent.children), Some(75.0));
    }

    #[test]
    fn test_duration_weighted_zero_spans_fall_back_to_mean() {
        let aggregator = CompletionAggregator::new(AggregationPolicy::DurationWeighted);
        let parent = parent_with(&[(0.0, 100.0), (0.0, 50.0)]);

        assert_eq!(aggregator.aggregate(&parent.children), Some(75.0));
    }

    #[test]
    fn test_minimum() {
        let aggregator = CompletionAggregator::new(AggregationPolicy::Minimum);
        let parent = parent_with(&[(1.0, 80.0), (1.0, 15.0), (1.0, 60.0)]);

        assert_eq!(aggregator.aggregate(&parent.children), Some(15.0));
    }
}
