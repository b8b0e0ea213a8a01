use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::date_util::{format_timestamp, parse_timestamp};
use crate::projects::{Project, ProjectStatus};
use crate::tickets::{NewTicket, TicketRecord, TicketSource, TicketStatus};

/// Columns read by [`ticket_from_row`], in order.
pub const TICKET_COLUMNS: &str = "registered_at, resolved_at, ticket_number, kind, description, \
     reporter, reporting_unit, status, task_count, week_opened, month_opened, year_opened";

// ── Tickets ────────────────────────────────────────────────────────

/// Insert a ticket into its queue, deriving the week/month bucket columns.
pub fn insert_ticket(
    conn: &Connection,
    source: TicketSource,
    ticket: &NewTicket,
) -> Result<i64, rusqlite::Error> {
    let (week_opened, week_year) = ticket.week_bucket();
    let (month_opened, year_opened) = ticket.month_bucket();
    let sql = format!(
        "INSERT INTO {} (
            registered_at, resolved_at, ticket_number, kind, description,
            reporter, reporting_unit, status, task_count,
            week_opened, week_year, month_opened, year_opened
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        source.table()
    );
    conn.execute(
        &sql,
        params![
            format_timestamp(&ticket.registered_at),
            ticket.resolved_at.as_ref().map(format_timestamp),
            ticket.ticket_number,
            ticket.kind,
            ticket.description,
            ticket.reporter,
            ticket.reporting_unit,
            ticket.status,
            ticket.task_count,
            week_opened,
            week_year,
            month_opened,
            year_opened,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Map a row selected with [`TICKET_COLUMNS`].
pub fn ticket_from_row(
    source: TicketSource,
    row: &Row<'_>,
) -> Result<TicketRecord, rusqlite::Error> {
    let registered: String = row.get(0)?;
    let resolved: Option<String> = row.get(1)?;
    let status: Option<String> = row.get(7)?;
    Ok(TicketRecord {
        source,
        registered_at: parse_timestamp(&registered).ok_or_else(|| bad_text(0, &registered))?,
        resolved_at: match resolved {
            Some(s) => Some(parse_timestamp(&s).ok_or_else(|| bad_text(1, &s))?),
            None => None,
        },
        ticket_number: row.get(2)?,
        kind: row.get(3)?,
        description: row.get(4)?,
        reporter: row.get(5)?,
        reporting_unit: row.get(6)?,
        status: TicketStatus::from_stored(status.as_deref()),
        task_count: row.get(8)?,
        week_opened: row.get(9)?,
        month_opened: row.get(10)?,
        year_opened: row.get(11)?,
    })
}

/// Earliest and latest registration timestamps across all queues.
pub fn ticket_span(conn: &Connection) -> Result<Option<(String, String)>, rusqlite::Error> {
    let unions = TicketSource::ALL
        .iter()
        .map(|s| format!("SELECT registered_at FROM {}", s.table()))
        .collect::<Vec<_>>()
        .join(" UNION ALL ");
    let sql = format!("SELECT MIN(registered_at), MAX(registered_at) FROM ({unions})");
    let (min, max): (Option<String>, Option<String>) =
        conn.query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(min.zip(max))
}

// ── Projects ───────────────────────────────────────────────────────

const PROJECT_COLUMNS: &str =
    "name, assignees, percent, description, planned_date, actual_date, status, created_at";

pub fn insert_project(conn: &Connection, project: &Project) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO projects (
            name, assignees, percent, description, planned_date, actual_date,
            status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))",
        params![
            project.name,
            assignees_json(&project.assignees)?,
            project.percent,
            project.description,
            project.planned_date.map(date_key),
            project.actual_date.map(date_key),
            project.status.as_str(),
            format_timestamp(&project.created_at),
        ],
    )?;
    Ok(())
}

/// Overwrite every mutable field of an existing project.
pub fn update_project(conn: &Connection, project: &Project) -> Result<bool, rusqlite::Error> {
    let count = conn.execute(
        "UPDATE projects SET
            assignees = ?2, percent = ?3, description = ?4, planned_date = ?5,
            actual_date = ?6, status = ?7, updated_at = datetime('now')
         WHERE name = ?1",
        params![
            project.name,
            assignees_json(&project.assignees)?,
            project.percent,
            project.description,
            project.planned_date.map(date_key),
            project.actual_date.map(date_key),
            project.status.as_str(),
        ],
    )?;
    Ok(count > 0)
}

pub fn get_project(conn: &Connection, name: &str) -> Result<Option<Project>, rusqlite::Error> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE name = ?1");
    conn.query_row(&sql, params![name], project_from_row)
        .optional()
}

pub fn list_projects(
    conn: &Connection,
    status: Option<ProjectStatus>,
) -> Result<Vec<Project>, rusqlite::Error> {
    let mut sql = format!("SELECT {PROJECT_COLUMNS} FROM projects");
    if status.is_some() {
        sql.push_str(" WHERE status = ?1");
    }
    sql.push_str(" ORDER BY created_at, name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = match status {
        Some(s) => stmt.query_map(params![s.as_str()], project_from_row)?,
        None => stmt.query_map([], project_from_row)?,
    };
    rows.collect()
}

fn project_from_row(row: &Row<'_>) -> Result<Project, rusqlite::Error> {
    let assignees: String = row.get(1)?;
    let planned: Option<String> = row.get(4)?;
    let actual: Option<String> = row.get(5)?;
    let status: String = row.get(6)?;
    let created: String = row.get(7)?;
    Ok(Project {
        name: row.get(0)?,
        assignees: serde_json::from_str(&assignees).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
        })?,
        percent: row.get(2)?,
        description: row.get(3)?,
        planned_date: parse_optional_date(4, planned)?,
        actual_date: parse_optional_date(5, actual)?,
        status: ProjectStatus::from_stored(&status),
        created_at: parse_timestamp(&created).ok_or_else(|| bad_text(7, &created))?,
    })
}

// ── Helpers ────────────────────────────────────────────────────────

fn date_key(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn assignees_json(assignees: &[String]) -> Result<String, rusqlite::Error> {
    serde_json::to_string(assignees)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn parse_optional_date(
    idx: usize,
    s: Option<String>,
) -> Result<Option<NaiveDate>, rusqlite::Error> {
    match s {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

fn bad_text(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unparseable timestamp: {value}").into(),
    )
}
