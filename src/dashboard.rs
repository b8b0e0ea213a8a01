//! One full dashboard recomputation for a period selection.

use serde::Serialize;

use crate::clock::Clock;
use crate::config::Settings;
use crate::error::Result;
use crate::metrics::{self, compare_counts, AggregateMetrics, Comparison};
use crate::query::filter;
use crate::query::period::{resolve, PeriodSelection, ResolvedPeriod};
use crate::site::{
    self, DailyTraffic, LabelStats, LabeledRow, ReportStatus, SectionTraffic, SiteSummary,
};
use crate::storage::Database;
use crate::tickets::{TicketRecord, TicketSource};

pub use crate::site::SiteSource;

#[derive(Debug, Clone, Serialize)]
pub struct QueueMetrics {
    pub source: TicketSource,
    pub label: &'static str,
    pub current: AggregateMetrics,
    pub previous: AggregateMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentsView {
    /// Set when at least one incident falls in the current period.
    pub alert: bool,
    pub incidents: Vec<TicketRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteSection {
    pub status: ReportStatus,
    pub summary: SiteSummary,
    pub top_sections: Vec<SectionTraffic>,
    pub budget_sections: Vec<LabeledRow>,
    pub budget_stats: Vec<LabelStats>,
    pub sub_area: Vec<LabeledRow>,
    pub sub_area_stats: Vec<LabelStats>,
    pub daily: Vec<DailyTraffic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardPayload {
    pub period: ResolvedPeriod,
    pub queues: Vec<QueueMetrics>,
    /// Summed over the three queues.
    pub total_tasks: Comparison,
    /// Summed per-queue distinct reporter counts.
    pub distinct_users: Comparison,
    pub incidents: IncidentsView,
    pub site: SiteSection,
}

/// Resolve, filter, aggregate, compare and fetch site traffic for `selection`.
pub async fn build_dashboard(
    db: &Database,
    site_source: &dyn SiteSource,
    settings: &Settings,
    selection: &PeriodSelection,
    clock: &dyn Clock,
) -> Result<DashboardPayload> {
    let period = resolve(selection, clock)?;
    let exclusions = settings.aggregation.exclusions();

    let mut queues = Vec::with_capacity(TicketSource::ALL.len());
    for source in TicketSource::ALL {
        let current = filter::filter(db, source, &period.current.period).await?;
        let previous = filter::filter(db, source, &period.previous.period).await?;
        queues.push(QueueMetrics {
            source,
            label: source.label(),
            current: metrics::aggregate(&current, &exclusions),
            previous: metrics::aggregate(&previous, &exclusions),
        });
    }

    let sum = |f: fn(&QueueMetrics) -> u64| queues.iter().map(f).sum::<u64>();
    let total_tasks = compare_counts(
        sum(|q| q.current.total_tasks),
        sum(|q| q.previous.total_tasks),
    );
    let distinct_users = compare_counts(
        sum(|q| q.current.distinct_users),
        sum(|q| q.previous.distinct_users),
    );

    let incidents = filter::filter_incidents(db, &period.current.period).await?;
    if !incidents.is_empty() {
        log::info!("{} incidents in {}", incidents.len(), period.current.period);
    }
    let incidents = IncidentsView {
        alert: !incidents.is_empty(),
        incidents,
    };

    let report = site_source.site_report(&period.current.range).await;
    if report.status != ReportStatus::Ok {
        log::warn!("Site traffic for {} is {:?}", period.current.period, report.status);
    }
    let site = site_section(report.status, &report.rows, settings);

    log::info!(
        "Dashboard for {}: {} tasks, {} users",
        period.current.period,
        total_tasks.headline(),
        distinct_users.headline()
    );
    Ok(DashboardPayload {
        period,
        queues,
        total_tasks,
        distinct_users,
        incidents,
        site,
    })
}

fn site_section(
    status: ReportStatus,
    rows: &[site::SiteMetricsRow],
    settings: &Settings,
) -> SiteSection {
    let sections = &settings.sections;
    let budget_sections = site::section_breakdown(rows, &sections.budget_names);
    let sub_area = site::sub_area_breakdown(
        rows,
        |r| r.level3 == sections.sub_area_url,
        &sections.sub_area_names,
    );
    SiteSection {
        status,
        summary: site::site_summary(rows),
        top_sections: site::top_sections(rows, &sections.top_section_config()),
        budget_stats: site::label_stats(&budget_sections),
        budget_sections,
        sub_area_stats: site::label_stats(&sub_area),
        sub_area,
        daily: site::daily_traffic(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::Error;
    use crate::metrics::Emphasis;
    use crate::query::period::{DateRange, Period};
    use crate::site::{SiteMetricsRow, SiteReport};
    use crate::storage::repository::insert_ticket;
    use crate::tickets::NewTicket;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use std::sync::Mutex;

    struct CannedSite {
        report: SiteReport,
        asked: Mutex<Vec<DateRange>>,
    }

    impl CannedSite {
        fn new(report: SiteReport) -> Self {
            Self {
                report,
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SiteSource for CannedSite {
        async fn site_report(&self, range: &DateRange) -> SiteReport {
            self.asked.lock().unwrap().push(*range);
            self.report.clone()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(10, 0, 0).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock(date(2025, 10, 15))
    }

    async fn seeded() -> Database {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                // Week 42 of 2025 is Oct 13..19, week 41 is Oct 6..12.
                insert_ticket(
                    conn,
                    TicketSource::Etsp,
                    &NewTicket::new(at(2025, 10, 13), "A", "U1")
                        .task_count(3)
                        .resolved(at(2025, 10, 13) + Duration::hours(2)),
                )?;
                let plain = |day: u32, reporter: &str, unit: &str| {
                    NewTicket::new(at(2025, 10, day), reporter, unit)
                };
                insert_ticket(conn, TicketSource::Etsp, &plain(14, "B", "U1"))?;
                insert_ticket(conn, TicketSource::Osp, &plain(15, "C", "U2"))?;
                insert_ticket(
                    conn,
                    TicketSource::Sue,
                    &NewTicket::new(at(2025, 10, 14), "D", "U3").status("Массовый инцидент"),
                )?;
                insert_ticket(conn, TicketSource::Etsp, &plain(7, "A", "U1"))?;
                insert_ticket(conn, TicketSource::Sue, &plain(8, "E", "U3"))?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
        db
    }

    fn traffic_row() -> SiteMetricsRow {
        SiteMetricsRow {
            date: "2025-10-13".into(),
            level1: "https://mbufk.roskazna.gov.ru/".into(),
            level2: "https://mbufk.roskazna.gov.ru/dokumenty/".into(),
            level3: "".into(),
            level4: "".into(),
            full_url: "https://mbufk.roskazna.gov.ru/dokumenty/".into(),
            visits: 12,
            users: 9,
            pageviews: 30,
            bounce_rate: 5.0,
            page_depth: 2.5,
            avg_visit_duration_seconds: 90.0,
        }
    }

    #[tokio::test]
    async fn test_build_dashboard_week() {
        let db = seeded().await;
        let site = CannedSite::new(SiteReport::ok(vec![traffic_row()]));
        let settings = Settings::default();

        let payload = build_dashboard(&db, &site, &settings, &PeriodSelection::week(42), &clock())
            .await
            .unwrap();

        assert_eq!(payload.period.current.period, Period::Week { year: 2025, week: 42 });
        assert_eq!(payload.period.previous.period, Period::Week { year: 2025, week: 41 });

        let etsp = &payload.queues[0];
        assert_eq!(etsp.source, TicketSource::Etsp);
        assert_eq!(etsp.current.total_tasks, 4);
        assert_eq!(etsp.current.mean_resolution, "2 час. 0 мин.");
        assert_eq!(etsp.previous.total_tasks, 1);

        // 4 + 1 + 1 now, 1 + 1 + 0 before.
        assert_eq!(payload.total_tasks.current, 6);
        assert_eq!(payload.total_tasks.previous, 2);
        assert_eq!(payload.total_tasks.label, "+4");
        assert_eq!(payload.total_tasks.emphasis, Emphasis::Positive);
        assert_eq!(payload.distinct_users.current, 4);

        assert!(payload.incidents.alert);
        assert_eq!(payload.incidents.incidents.len(), 1);

        assert_eq!(payload.site.status, ReportStatus::Ok);
        assert_eq!(payload.site.summary.visits, 12);
        assert_eq!(payload.site.top_sections.len(), 1);
        assert_eq!(payload.site.top_sections[0].section, "Документы");
        assert_eq!(
            site.asked.lock().unwrap().as_slice(),
            &[DateRange {
                start: date(2025, 10, 13),
                end: date(2025, 10, 19)
            }]
        );
    }

    #[tokio::test]
    async fn test_build_dashboard_with_unavailable_site() {
        let db = seeded().await;
        let site = CannedSite::new(SiteReport::degraded(ReportStatus::Unavailable));
        let payload = build_dashboard(
            &db,
            &site,
            &Settings::default(),
            &PeriodSelection::range("2025-01-01", "2025-01-31"),
            &clock(),
        )
        .await
        .unwrap();

        assert!(payload.queues.iter().all(|q| q.current.total_tasks == 0));
        assert_eq!(payload.total_tasks.label, "0");
        assert!(!payload.incidents.alert);
        assert_eq!(payload.site.status, ReportStatus::Unavailable);
        assert_eq!(payload.site.summary.visits, 0);
        assert!(payload.site.daily.is_empty());
        assert!(payload.site.top_sections.is_empty());
    }

    #[tokio::test]
    async fn test_build_dashboard_rejects_bad_selection() {
        let db = seeded().await;
        let site = CannedSite::new(SiteReport::degraded(ReportStatus::NoData));
        let result = build_dashboard(
            &db,
            &site,
            &Settings::default(),
            &PeriodSelection::month(13),
            &clock(),
        )
        .await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(site.asked.lock().unwrap().is_empty());
    }
}
