use serde::Serialize;

/// Sentinel shown when no resolved ticket exists in the set.
pub const NO_DATA: &str = "—";

/// Reporter ranked by filed task count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contributor {
    pub reporter: String,
    pub tasks: u64,
}

/// One slice of the resolution-time breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionBucket {
    pub label: &'static str,
    pub tasks: u64,
    /// Fraction of all bucketed tasks, 0.0 when nothing was resolved.
    pub share: f64,
    pub mean_seconds: Option<i64>,
}

/// Aggregates for one (queue, period) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateMetrics {
    pub total_tasks: u64,
    pub distinct_users: u64,
    /// Formatted mean resolution time or [`NO_DATA`].
    pub mean_resolution: String,
    pub mean_resolution_seconds: Option<i64>,
    pub top_contributors: Vec<Contributor>,
    pub resolution_buckets: Vec<ResolutionBucket>,
}

impl Default for AggregateMetrics {
    fn default() -> Self {
        Self {
            total_tasks: 0,
            distinct_users: 0,
            mean_resolution: NO_DATA.to_string(),
            mean_resolution_seconds: None,
            top_contributors: Vec::new(),
            resolution_buckets: Vec::new(),
        }
    }
}

/// Reporting units and individual reporters left out of the contributor ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
    pub units: Vec<String>,
    pub reporters: Vec<String>,
}

impl Exclusions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn excludes(&self, unit: &str, reporter: &str) -> bool {
        self.units.iter().any(|u| u == unit) || self.reporters.iter().any(|r| r == reporter)
    }
}
