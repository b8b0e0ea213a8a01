use crate::date_util::{end_of_day, format_timestamp, start_of_day};
use crate::error::Result;
use crate::query::period::Period;
use crate::storage::repository::{ticket_from_row, TICKET_COLUMNS};
use crate::storage::Database;
use crate::tickets::{TicketRecord, TicketSource, TicketStatus};

/// How a period is matched against ticket rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodFilter {
    /// Exact ISO week + week-year bucket equality.
    Week { year: i32, week: u32 },
    /// Exact calendar month + year bucket equality.
    Month { year: i32, month: u32 },
    /// `registered_at` within `[start 00:00:00, end 23:59:59]`.
    Between { start: String, end: String },
}

impl PeriodFilter {
    pub fn for_period(period: &Period) -> Self {
        match period {
            Period::Week { year, week } => PeriodFilter::Week {
                year: *year,
                week: *week,
            },
            Period::Month { year, month } => PeriodFilter::Month {
                year: *year,
                month: *month,
            },
            Period::Range { start, end } => PeriodFilter::Between {
                start: format_timestamp(&start_of_day(*start)),
                end: format_timestamp(&end_of_day(*end)),
            },
        }
    }
}

/// One parameterized query over a support queue: (source, period, optional
/// incident restriction).
#[derive(Debug, Clone)]
pub struct RecordFilter {
    source: TicketSource,
    period: PeriodFilter,
    incidents_only: bool,
}

impl RecordFilter {
    pub fn for_period(source: TicketSource, period: &Period) -> Self {
        Self {
            source,
            period: PeriodFilter::for_period(period),
            incidents_only: false,
        }
    }

    /// Restrict to tickets flagged as a problem or mass incident.
    pub fn incidents_only(mut self) -> Self {
        self.incidents_only = true;
        self
    }

    /// Execute against the store. Never fails for "no rows"; that is an empty vector.
    pub async fn records(self, db: &Database) -> Result<Vec<TicketRecord>> {
        let filter = self;
        log::debug!("Filtering {:?}", filter);
        let records = db
            .reader()
            .call(move |conn| {
                let (sql, params) = filter.build_sql();
                let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                    params.iter().map(|p| p.as_ref()).collect();
                let mut stmt = conn.prepare(&sql)?;
                let source = filter.source;
                let rows =
                    stmt.query_map(param_refs.as_slice(), |row| ticket_from_row(source, row))?;
                rows.collect::<std::result::Result<Vec<TicketRecord>, rusqlite::Error>>()
            })
            .await?;
        Ok(records)
    }

    fn build_sql(&self) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut wheres = Vec::new();

        match &self.period {
            PeriodFilter::Week { year, week } => {
                wheres.push("week_opened = ?1 AND week_year = ?2".to_string());
                params.push(Box::new(*week));
                params.push(Box::new(*year));
            }
            PeriodFilter::Month { year, month } => {
                wheres.push("month_opened = ?1 AND year_opened = ?2".to_string());
                params.push(Box::new(*month));
                params.push(Box::new(*year));
            }
            PeriodFilter::Between { start, end } => {
                wheres.push("registered_at >= ?1 AND registered_at <= ?2".to_string());
                params.push(Box::new(start.clone()));
                params.push(Box::new(end.clone()));
            }
        }

        if self.incidents_only {
            // Same whitespace rule as `TicketStatus::from_stored`.
            wheres.push("TRIM(status) IN (?3, ?4)".to_string());
            params.push(Box::new(TicketStatus::PROBLEM));
            params.push(Box::new(TicketStatus::MASS_INCIDENT));
        }

        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM {} WHERE {} ORDER BY registered_at, id",
            self.source.table(),
            wheres.join(" AND ")
        );
        (sql, params)
    }
}

/// Tickets of one queue registered in `period`.
pub async fn filter(
    db: &Database,
    source: TicketSource,
    period: &Period,
) -> Result<Vec<TicketRecord>> {
    RecordFilter::for_period(source, period).records(db).await
}

/// SUE tickets in `period` flagged as a problem or mass incident.
pub async fn filter_incidents(db: &Database, period: &Period) -> Result<Vec<TicketRecord>> {
    RecordFilter::for_period(TicketSource::Sue, period)
        .incidents_only()
        .records(db)
        .await
}
