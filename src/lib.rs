pub mod clock;
pub mod config;
pub mod dashboard;
pub mod date_util;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod projects;
pub mod query;
pub mod site;
pub mod storage;
pub mod tickets;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Settings;
pub use dashboard::{build_dashboard, DashboardPayload};
pub use error::{Error, Result};
pub use metrics::{AggregateMetrics, Comparison, Emphasis, Exclusions};
pub use notify::{Notification, NotificationSink, NoopNotifier};
pub use projects::{NewProject, Project, ProjectStatus, ProjectUpdate};
pub use query::options::PeriodOption;
pub use query::period::{DateRange, Period, PeriodMode, PeriodSelection, ResolvedPeriod};
pub use site::{AnalyticsClient, ReportStatus, SiteReport, SiteSource};
pub use storage::Database;
pub use tickets::{NewTicket, TicketRecord, TicketSource, TicketStatus};

use chrono::NaiveDate;
use serde::Serialize;

use notify::{notify_best_effort, SUBJECT_ASSIGNED, SUBJECT_CHANGED};
use storage::repository;

/// Week and month choices for the period pickers.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodOptions {
    pub weeks: Vec<PeriodOption>,
    pub months: Vec<PeriodOption>,
}

/// Main entry point: the ticket/project store plus its collaborators.
pub struct SupportDashboard {
    db: Database,
    settings: Settings,
    site: Box<dyn SiteSource>,
    notifier: Box<dyn NotificationSink>,
    clock: Box<dyn Clock>,
}

impl SupportDashboard {
    /// Wire up from settings. Malformed settings fail here, not mid-request.
    pub fn new(db: Database, settings: Settings) -> Result<Self> {
        settings.validate()?;
        let site = Box::new(AnalyticsClient::new(&settings.analytics)?);
        let notifier = notify::from_config(&settings.mail)?;
        Ok(Self {
            db,
            settings,
            site,
            notifier,
            clock: Box::new(SystemClock),
        })
    }

    /// Wire up with explicit collaborators.
    pub fn with_parts(
        db: Database,
        settings: Settings,
        site: Box<dyn SiteSource>,
        notifier: Box<dyn NotificationSink>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            db,
            settings,
            site,
            notifier,
            clock,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ── Dashboard ──────────────────────────────────────────────────

    pub async fn load_metrics(&self, selection: &PeriodSelection) -> Result<DashboardPayload> {
        build_dashboard(
            &self.db,
            self.site.as_ref(),
            &self.settings,
            selection,
            self.clock.as_ref(),
        )
        .await
    }

    pub async fn site_report(&self, range: &DateRange) -> SiteReport {
        self.site.site_report(range).await
    }

    /// Pickers spanning the stored tickets, or just today when the store is empty.
    pub async fn period_options(&self) -> Result<PeriodOptions> {
        let today = self.clock.today();
        let (from, to) = query::options::data_span(&self.db)
            .await?
            .unwrap_or((today, today));
        Ok(PeriodOptions {
            weeks: query::options::week_options(from, to),
            months: query::options::month_options(from, to),
        })
    }

    // ── Tickets ────────────────────────────────────────────────────

    pub async fn add_ticket(&self, source: TicketSource, ticket: NewTicket) -> Result<i64> {
        ticket.validate()?;
        let id = self
            .db
            .writer()
            .call(move |conn| repository::insert_ticket(conn, source, &ticket))
            .await?;
        log::info!("Added {} ticket #{id}", source.label());
        Ok(id)
    }

    // ── Projects ───────────────────────────────────────────────────

    pub async fn create_project(&self, new: NewProject) -> Result<Project> {
        new.validate()?;
        let project = Project {
            name: new.name.trim().to_string(),
            assignees: new.assignees,
            percent: new.percent,
            description: new.description,
            planned_date: new.planned_date,
            actual_date: None,
            status: ProjectStatus::InProgress,
            created_at: chrono::Local::now().naive_local(),
        };

        let inserted = self
            .db
            .writer()
            .call({
                let project = project.clone();
                move |conn| -> std::result::Result<bool, rusqlite::Error> {
                    if repository::get_project(conn, &project.name)?.is_some() {
                        return Ok(false);
                    }
                    repository::insert_project(conn, &project)?;
                    Ok(true)
                }
            })
            .await?;
        if !inserted {
            return Err(Error::Validation(format!(
                "project '{}' already exists",
                project.name
            )));
        }

        log::info!("Created project '{}'", project.name);
        self.notify_assignees(SUBJECT_ASSIGNED, &project).await;
        Ok(project)
    }

    pub async fn update_project(&self, name: &str, update: ProjectUpdate) -> Result<Project> {
        let mut project = self.get_project(name).await?;
        update.apply(&mut project)?;
        self.save_project(&project).await?;
        self.notify_assignees(SUBJECT_CHANGED, &project).await;
        Ok(project)
    }

    /// Mark done: 100%, complete status, `actual_date` recorded.
    pub async fn complete_project(&self, name: &str, actual_date: NaiveDate) -> Result<Project> {
        let mut project = self.get_project(name).await?;
        project.percent = 100;
        project.status = ProjectStatus::Complete;
        project.actual_date = Some(actual_date);
        self.save_project(&project).await?;
        self.notify_assignees(SUBJECT_CHANGED, &project).await;
        Ok(project)
    }

    pub async fn list_projects(&self, status: Option<ProjectStatus>) -> Result<Vec<Project>> {
        let projects = self
            .db
            .reader()
            .call(move |conn| repository::list_projects(conn, status))
            .await?;
        Ok(projects)
    }

    pub async fn get_project(&self, name: &str) -> Result<Project> {
        let project = self
            .db
            .reader()
            .call({
                let name = name.to_string();
                move |conn| repository::get_project(conn, &name)
            })
            .await?;
        project.ok_or_else(|| Error::NotFound(format!("project '{name}'")))
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        let updated = self
            .db
            .writer()
            .call({
                let project = project.clone();
                move |conn| repository::update_project(conn, &project)
            })
            .await?;
        if !updated {
            return Err(Error::NotFound(format!("project '{}'", project.name)));
        }
        log::info!("Saved project '{}' ({}%)", project.name, project.percent);
        Ok(())
    }

    /// Best effort: the save has already happened and is never undone.
    async fn notify_assignees(&self, subject: &str, project: &Project) {
        let mut recipients = Vec::new();
        for assignee in &project.assignees {
            match self.settings.staff.get(assignee) {
                Some(email) => recipients.push(email.clone()),
                None => log::warn!("No email known for assignee '{assignee}'"),
            }
        }
        if recipients.is_empty() {
            return;
        }
        let notification = Notification {
            subject: subject.to_string(),
            fields: project.notification_fields(),
            recipients,
        };
        notify_best_effort(self.notifier.as_ref(), &notification).await;
    }
}
