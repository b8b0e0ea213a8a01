use std::time::Duration;

use async_trait::async_trait;

use super::{normalize, ApiReport, ReportStatus, SiteReport, SiteSource, DIMENSIONS, METRICS};
use crate::config::AnalyticsConfig;
use crate::error::{Error, Result};
use crate::query::period::DateRange;

/// HTTP client for the web-analytics reporting API.
#[derive(Debug, Clone)]
pub struct AnalyticsClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    counter_id: u64,
    filter: String,
    limit: u32,
}

impl AnalyticsClient {
    pub fn new(config: &AnalyticsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let token = config.token();
        if token.is_none() {
            log::warn!("No analytics token configured; requests will be unauthenticated");
        }
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            token,
            counter_id: config.counter_id,
            filter: config.filter.clone(),
            limit: config.limit,
        })
    }

    fn query(&self, range: &DateRange) -> Vec<(&'static str, String)> {
        vec![
            ("metrics", METRICS.join(",")),
            ("dimensions", DIMENSIONS.join(",")),
            ("date1", range.start.format("%Y-%m-%d").to_string()),
            ("date2", range.end.format("%Y-%m-%d").to_string()),
            ("accuracy", "full".to_string()),
            ("ids", self.counter_id.to_string()),
            ("limit", self.limit.to_string()),
            ("filters", self.filter.clone()),
        ]
    }

    /// Raw report for `range`. Fails on transport errors and non-success statuses.
    pub async fn fetch(&self, range: &DateRange) -> Result<ApiReport> {
        let mut request = self.http.get(&self.endpoint).query(&self.query(range));
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("OAuth {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        log::info!("Analytics API responded {} for {}..{}", status, range.start, range.end);
        if !status.is_success() {
            return Err(Error::Analytics(format!("HTTP {status}")));
        }
        let report: ApiReport = response.json().await?;
        log::debug!("Analytics report: {} rows", report.total_rows);
        Ok(report)
    }

    /// Fetch and flatten `range`. Never fails: problems degrade to a
    /// placeholder report whose status tells "no traffic" from "unreachable".
    pub async fn fetch_and_normalize(&self, range: &DateRange) -> SiteReport {
        let report = match self.fetch(range).await {
            Ok(report) => report,
            Err(e) => {
                log::warn!("Analytics unavailable: {e}");
                return SiteReport::degraded(ReportStatus::Unavailable);
            }
        };
        if report.total_rows == 0 {
            return SiteReport::degraded(ReportStatus::NoData);
        }
        match normalize(&report) {
            Ok(rows) => SiteReport::ok(rows),
            Err(e) => {
                log::warn!("Analytics report unusable: {e}");
                SiteReport::degraded(ReportStatus::Unavailable)
            }
        }
    }
}

#[async_trait]
impl SiteSource for AnalyticsClient {
    async fn site_report(&self, range: &DateRange) -> SiteReport {
        self.fetch_and_normalize(range).await
    }
}
