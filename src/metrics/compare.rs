use serde::Serialize;

use super::types::AggregateMetrics;

/// Direction of a period-over-period change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emphasis {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TotalTasks,
    DistinctUsers,
}

impl Metric {
    fn read(&self, m: &AggregateMetrics) -> u64 {
        match self {
            Metric::TotalTasks => m.total_tasks,
            Metric::DistinctUsers => m.distinct_users,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comparison {
    pub current: u64,
    pub previous: u64,
    pub delta: i64,
    /// `"+5"`, `"0"` or `"-3"`.
    pub label: String,
    pub emphasis: Emphasis,
}

impl Comparison {
    pub fn headline(&self) -> String {
        format!("{} ({})", self.current, self.label)
    }
}

pub fn compare(
    current: &AggregateMetrics,
    previous: &AggregateMetrics,
    metric: Metric,
) -> Comparison {
    compare_counts(metric.read(current), metric.read(previous))
}

pub fn compare_counts(current: u64, previous: u64) -> Comparison {
    let delta = current as i64 - previous as i64;
    let (label, emphasis) = match delta {
        d if d > 0 => (format!("+{d}"), Emphasis::Positive),
        0 => ("0".to_string(), Emphasis::Neutral),
        d => (d.to_string(), Emphasis::Negative),
    };
    Comparison {
        current,
        previous,
        delta,
        label,
        emphasis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(total_tasks: u64, distinct_users: u64) -> AggregateMetrics {
        AggregateMetrics {
            total_tasks,
            distinct_users,
            ..Default::default()
        }
    }

    #[test]
    fn test_compare_identical_is_neutral() {
        let a = metrics(12, 4);
        let c = compare(&a, &a, Metric::TotalTasks);
        assert_eq!(c.delta, 0);
        assert_eq!(c.label, "0");
        assert_eq!(c.emphasis, Emphasis::Neutral);
    }

    #[test]
    fn test_compare_positive_and_negative() {
        let up = compare(&metrics(15, 2), &metrics(10, 6), Metric::TotalTasks);
        assert_eq!(up.label, "+5");
        assert_eq!(up.emphasis, Emphasis::Positive);
        assert_eq!(up.headline(), "15 (+5)");

        let down = compare(&metrics(15, 2), &metrics(10, 5), Metric::DistinctUsers);
        assert_eq!(down.delta, -3);
        assert_eq!(down.label, "-3");
        assert_eq!(down.emphasis, Emphasis::Negative);
    }

    #[test]
    fn test_emphasis_serializes_lowercase() {
        let json = serde_json::to_string(&compare_counts(1, 0)).unwrap();
        assert!(json.contains("\"emphasis\":\"positive\""));
    }
}
