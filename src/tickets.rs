use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::Serialize;

use crate::error::{Error, Result};

/// One of the three support queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketSource {
    Etsp,
    Sue,
    Osp,
}

impl TicketSource {
    pub const ALL: [TicketSource; 3] = [TicketSource::Etsp, TicketSource::Sue, TicketSource::Osp];

    /// Backing table for this queue.
    pub fn table(&self) -> &'static str {
        match self {
            TicketSource::Etsp => "etsp_tickets",
            TicketSource::Sue => "sue_tickets",
            TicketSource::Osp => "osp_tickets",
        }
    }

    /// Display name used on the dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            TicketSource::Etsp => "ЕЦП",
            TicketSource::Sue => "СУЭ ФК",
            TicketSource::Osp => "ОСП",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketSource::Etsp => "etsp",
            TicketSource::Sue => "sue",
            TicketSource::Osp => "osp",
        }
    }
}

impl FromStr for TicketSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "etsp" => Ok(TicketSource::Etsp),
            "sue" => Ok(TicketSource::Sue),
            "osp" => Ok(TicketSource::Osp),
            other => Err(Error::Configuration(format!("unknown ticket source: {other}"))),
        }
    }
}

impl std::fmt::Display for TicketSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket severity. Only the SUE queue fills it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Normal,
    Problem,
    MassIncident,
}

impl TicketStatus {
    pub const PROBLEM: &'static str = "Проблема";
    pub const MASS_INCIDENT: &'static str = "Массовый инцидент";

    /// Map the ticketing system's status text. Anything unrecognised is `Normal`.
    pub fn from_stored(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            Some(Self::PROBLEM) => TicketStatus::Problem,
            Some(Self::MASS_INCIDENT) => TicketStatus::MassIncident,
            _ => TicketStatus::Normal,
        }
    }

    pub fn is_incident(&self) -> bool {
        matches!(self, TicketStatus::Problem | TicketStatus::MassIncident)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::Normal => "",
            TicketStatus::Problem => Self::PROBLEM,
            TicketStatus::MassIncident => Self::MASS_INCIDENT,
        }
    }
}

/// A ticket row read from one of the queues.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketRecord {
    pub source: TicketSource,
    pub registered_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
    pub ticket_number: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub reporting_unit: String,
    pub reporter: String,
    pub status: TicketStatus,
    pub task_count: u32,
    pub week_opened: u32,
    pub month_opened: u32,
    pub year_opened: i32,
}

impl TicketRecord {
    /// Time from registration to resolution; `None` while unresolved.
    pub fn duration(&self) -> Option<Duration> {
        self.resolved_at.map(|r| r - self.registered_at)
    }
}

/// Input for inserting a ticket. Bucket columns are derived on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTicket {
    pub registered_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
    pub ticket_number: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub reporting_unit: String,
    pub reporter: String,
    pub status: Option<String>,
    pub task_count: u32,
}

impl NewTicket {
    pub fn new(registered_at: NaiveDateTime, reporter: &str, reporting_unit: &str) -> Self {
        Self {
            registered_at,
            resolved_at: None,
            ticket_number: None,
            kind: None,
            description: None,
            reporting_unit: reporting_unit.to_string(),
            reporter: reporter.to_string(),
            status: None,
            task_count: 1,
        }
    }

    pub fn resolved(mut self, at: NaiveDateTime) -> Self {
        self.resolved_at = Some(at);
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn task_count(mut self, n: u32) -> Self {
        self.task_count = n;
        self
    }

    pub fn number(mut self, number: &str) -> Self {
        self.ticket_number = Some(number.to_string());
        self
    }

    /// Reject tickets that would carry a negative duration.
    pub fn validate(&self) -> Result<()> {
        if let Some(resolved) = self.resolved_at {
            if resolved < self.registered_at {
                return Err(Error::Validation(format!(
                    "ticket resolved at {resolved} before it was registered at {}",
                    self.registered_at
                )));
            }
        }
        if self.reporter.trim().is_empty() {
            return Err(Error::Validation("ticket reporter is empty".into()));
        }
        Ok(())
    }

    /// ISO week number and ISO week-year of registration.
    pub fn week_bucket(&self) -> (u32, i32) {
        let iso = self.registered_at.date().iso_week();
        (iso.week(), iso.year())
    }

    /// Calendar month and year of registration.
    pub fn month_bucket(&self) -> (u32, i32) {
        let d = self.registered_at.date();
        (d.month(), d.year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_source_from_str() {
        assert_eq!("etsp".parse::<TicketSource>().unwrap(), TicketSource::Etsp);
        assert_eq!(" SUE ".parse::<TicketSource>().unwrap(), TicketSource::Sue);
        assert!(matches!(
            "helpdesk".parse::<TicketSource>(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(TicketStatus::from_stored(Some("Проблема")), TicketStatus::Problem);
        assert_eq!(
            TicketStatus::from_stored(Some("Массовый инцидент")),
            TicketStatus::MassIncident
        );
        assert_eq!(TicketStatus::from_stored(Some("Обычный")), TicketStatus::Normal);
        assert_eq!(TicketStatus::from_stored(None), TicketStatus::Normal);
        assert!(TicketStatus::Problem.is_incident());
        assert!(!TicketStatus::Normal.is_incident());
    }

    #[test]
    fn test_validate_rejects_negative_duration() {
        let t = NewTicket::new(ts(2025, 1, 2, 10), "A", "Unit").resolved(ts(2025, 1, 1, 10));
        assert!(matches!(t.validate(), Err(Error::Validation(_))));
        let t = NewTicket::new(ts(2025, 1, 2, 10), "A", "Unit").resolved(ts(2025, 1, 2, 10));
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_buckets_use_iso_week_year() {
        // 2024-12-30 belongs to ISO week 1 of 2025.
        let t = NewTicket::new(ts(2024, 12, 30, 9), "A", "Unit");
        assert_eq!(t.week_bucket(), (1, 2025));
        assert_eq!(t.month_bucket(), (12, 2024));
    }
}
