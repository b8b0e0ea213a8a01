//! Website traffic from the analytics API: fetching, flattening into
//! [`SiteMetricsRow`]s, and the section views built on top of them.

pub mod client;
pub mod sections;

pub use client::AnalyticsClient;
pub use sections::{
    daily_traffic, label_stats, section_breakdown, site_summary, sub_area_breakdown, top_sections,
    DailyTraffic, LabelStats, LabeledRow, SectionName, SectionTraffic, SiteSummary,
    TopSectionConfig,
};

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::query::period::DateRange;

/// Text used in every textual field of the placeholder row.
pub const NO_DATA_TEXT: &str = "-";

pub const METRICS: [&str; 6] = [
    "ym:s:visits",
    "ym:s:users",
    "ym:s:pageviews",
    "ym:s:bounceRate",
    "ym:s:pageDepth",
    "ym:s:avgVisitDurationSeconds",
];

pub const DIMENSIONS: [&str; 6] = [
    "ym:s:date",
    "ym:s:startURLPathLevel1",
    "ym:s:startURLPathLevel2",
    "ym:s:startURLPathLevel3",
    "ym:s:startURLPathLevel4",
    "ym:s:startURL",
];

/// One flattened analytics row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteMetricsRow {
    pub date: String,
    pub level1: String,
    pub level2: String,
    pub level3: String,
    pub level4: String,
    pub full_url: String,
    pub visits: u64,
    pub users: u64,
    pub pageviews: u64,
    pub bounce_rate: f64,
    pub page_depth: f64,
    pub avg_visit_duration_seconds: f64,
}

impl SiteMetricsRow {
    /// The zero-filled row standing in for "no data".
    pub fn placeholder() -> Self {
        let text = || NO_DATA_TEXT.to_string();
        Self {
            date: text(),
            level1: text(),
            level2: text(),
            level3: text(),
            level4: text(),
            full_url: text(),
            visits: 0,
            users: 0,
            pageviews: 0,
            bounce_rate: 0.0,
            page_depth: 0.0,
            avg_visit_duration_seconds: 0.0,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.date == NO_DATA_TEXT && self.visits == 0
    }
}

/// Outcome of one analytics fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    /// The API answered but reported zero rows.
    NoData,
    /// Transport failure, non-success status, or an unusable body.
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub status: ReportStatus,
    /// Never empty: non-`Ok` reports carry exactly one placeholder row.
    pub rows: Vec<SiteMetricsRow>,
}

impl SiteReport {
    pub fn ok(rows: Vec<SiteMetricsRow>) -> Self {
        if rows.is_empty() {
            return Self::degraded(ReportStatus::NoData);
        }
        Self {
            status: ReportStatus::Ok,
            rows,
        }
    }

    pub fn degraded(status: ReportStatus) -> Self {
        Self {
            status,
            rows: vec![SiteMetricsRow::placeholder()],
        }
    }
}

/// Where the dashboard gets site traffic from.
#[async_trait]
pub trait SiteSource: Send + Sync {
    async fn site_report(&self, range: &DateRange) -> SiteReport;
}

// ── Wire format ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiReport {
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub query: ApiQuery,
    #[serde(default)]
    pub data: Vec<ApiRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiQuery {
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRow {
    pub dimensions: Vec<ApiDimension>,
    pub metrics: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiDimension {
    pub name: Option<String>,
}

fn positions<'a>(declared: &'a [String], wanted: &[&str]) -> Result<Vec<usize>> {
    let index: HashMap<&'a str, usize> = declared
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();
    wanted
        .iter()
        .map(|name| {
            index
                .get(*name)
                .copied()
                .ok_or_else(|| Error::Analytics(format!("response is missing column {name}")))
        })
        .collect()
}

/// Flatten the API's per-row dimension and metric lists using the column
/// order the response declares, not the order requested.
pub fn normalize(report: &ApiReport) -> Result<Vec<SiteMetricsRow>> {
    let dims = positions(&report.query.dimensions, &DIMENSIONS)?;
    let mets = positions(&report.query.metrics, &METRICS)?;

    let rows = report
        .data
        .iter()
        .map(|row| {
            let dim = |i: usize| {
                row.dimensions
                    .get(dims[i])
                    .and_then(|d| d.name.clone())
                    .unwrap_or_default()
            };
            let met = |i: usize| {
                let value = row.metrics.get(mets[i]).copied().flatten();
                value.unwrap_or(0.0).max(0.0)
            };
            SiteMetricsRow {
                date: dim(0),
                level1: dim(1),
                level2: dim(2),
                level3: dim(3),
                level4: dim(4),
                full_url: dim(5),
                visits: met(0).round() as u64,
                users: met(1).round() as u64,
                pageviews: met(2).round() as u64,
                bounce_rate: met(3),
                page_depth: met(4),
                avg_visit_duration_seconds: met(5),
            }
        })
        .collect();
    Ok(rows)
}
