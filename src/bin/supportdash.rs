use std::path::PathBuf;

use clap::{Parser, Subcommand};

use supportdash::metrics::AggregateMetrics;
use supportdash::{
    DashboardPayload, DateRange, NewProject, NewTicket, PeriodSelection, ProjectStatus,
    ProjectUpdate, Settings, SupportDashboard, TicketSource,
};

#[derive(Parser)]
#[command(name = "supportdash", about = "Support desk dashboard metrics")]
struct Cli {
    /// Database path (default: <data_dir>/supportdash/supportdash.db)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Settings file (default: <config_dir>/supportdash/settings.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dashboard for one period
    Metrics {
        /// ISO week number
        #[arg(long, conflicts_with_all = ["month", "from", "to", "period"])]
        week: Option<u32>,
        /// Month number
        #[arg(long, conflicts_with_all = ["from", "to", "period"])]
        month: Option<u32>,
        /// Year of --week or --month (default: inferred from today)
        #[arg(long, conflicts_with_all = ["from", "to", "period"])]
        year: Option<i32>,
        /// Range start (YYYY-MM-DD)
        #[arg(long, requires = "to", conflicts_with = "period")]
        from: Option<String>,
        /// Range end (YYYY-MM-DD)
        #[arg(long, requires = "from", conflicts_with = "period")]
        to: Option<String>,
        /// Compact selection: w5, 2024-W05, m3, 2024-03 or 2025-01-01..2025-01-31
        #[arg(long)]
        period: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List week and month choices covering the stored tickets
    Periods {
        #[arg(long)]
        json: bool,
    },
    /// Fetch site traffic for a date range
    Site {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        json: bool,
    },
    /// Manage tickets
    Ticket {
        #[command(subcommand)]
        action: TicketAction,
    },
    /// Manage projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
}

#[derive(Subcommand)]
enum TicketAction {
    /// Insert a ticket into a queue (etsp, sue, osp)
    Add {
        source: String,
        /// Registration time (YYYY-MM-DD HH:MM:SS)
        #[arg(long)]
        registered: String,
        #[arg(long)]
        resolved: Option<String>,
        #[arg(long)]
        reporter: String,
        #[arg(long)]
        unit: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "1")]
        tasks: u32,
        #[arg(long)]
        number: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Create a project and notify its assignees
    Create {
        name: String,
        /// Assignee display name (repeatable)
        #[arg(long = "assignee")]
        assignees: Vec<String>,
        #[arg(long, default_value = "0")]
        percent: u8,
        #[arg(long, default_value = "")]
        description: String,
        /// Planned completion date (YYYY-MM-DD)
        #[arg(long)]
        planned: Option<String>,
    },
    /// Change some fields of a project
    Update {
        name: String,
        #[arg(long = "assignee")]
        assignees: Vec<String>,
        #[arg(long)]
        percent: Option<u8>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        planned: Option<String>,
    },
    /// Mark a project complete
    Complete {
        name: String,
        /// Completion date (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// List projects
    List {
        /// in_progress or complete
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    let db_path = cli.db.clone().or_else(|| settings.database.path.clone());
    let db = match db_path {
        Some(path) => supportdash::Database::open_at(path).await?,
        None => supportdash::Database::open().await?,
    };
    let dash = SupportDashboard::new(db, settings)?;

    match cli.command {
        Commands::Metrics {
            week,
            month,
            year,
            from,
            to,
            period,
            json,
        } => {
            let selection = match period {
                Some(p) => PeriodSelection::parse(&p)?,
                None => PeriodSelection::from_inputs(week, month, from, to)?.with_year(year),
            };
            let payload = dash.load_metrics(&selection).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_dashboard(&payload);
            }
        }
        Commands::Periods { json } => {
            let options = dash.period_options().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&options)?);
            } else {
                println!("Weeks:");
                for o in &options.weeks {
                    println!("  {:<9} {}", o.key, o.label);
                }
                println!("Months:");
                for o in &options.months {
                    println!("  {:<9} {}", o.key, o.label);
                }
            }
        }
        Commands::Site { from, to, json } => {
            let range = DateRange {
                start: parse_date(&from)?,
                end: parse_date(&to)?,
            };
            let report = dash.site_report(&range).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Status: {:?} ({} rows)", report.status, report.rows.len());
                let summary = supportdash::site::site_summary(&report.rows);
                println!(
                    "  Visits: {}  Users: {}  Pageviews: {}  Bounce: {}  Depth: {}  Time: {}",
                    summary.visits,
                    summary.users,
                    summary.pageviews,
                    summary.bounce_rate,
                    summary.page_depth,
                    summary.visit_duration
                );
            }
        }
        Commands::Ticket { action } => handle_ticket(&dash, action).await?,
        Commands::Project { action } => handle_project(&dash, action).await?,
    }

    Ok(())
}

fn parse_date(s: &str) -> anyhow::Result<chrono::NaiveDate> {
    supportdash::date_util::parse_date(s).ok_or_else(|| anyhow::anyhow!("invalid date: {s}"))
}

fn parse_timestamp(s: &str) -> anyhow::Result<chrono::NaiveDateTime> {
    supportdash::date_util::parse_timestamp(s)
        .ok_or_else(|| anyhow::anyhow!("invalid timestamp: {s}"))
}

async fn handle_ticket(dash: &SupportDashboard, action: TicketAction) -> anyhow::Result<()> {
    match action {
        TicketAction::Add {
            source,
            registered,
            resolved,
            reporter,
            unit,
            status,
            tasks,
            number,
        } => {
            let source: TicketSource = source.parse()?;
            let mut ticket =
                NewTicket::new(parse_timestamp(&registered)?, &reporter, &unit).task_count(tasks);
            if let Some(r) = resolved {
                ticket = ticket.resolved(parse_timestamp(&r)?);
            }
            if let Some(s) = status {
                ticket = ticket.status(&s);
            }
            if let Some(n) = number {
                ticket = ticket.number(&n);
            }
            let id = dash.add_ticket(source, ticket).await?;
            println!("Added {} ticket {id}", source.label());
        }
    }
    Ok(())
}

async fn handle_project(dash: &SupportDashboard, action: ProjectAction) -> anyhow::Result<()> {
    match action {
        ProjectAction::Create {
            name,
            assignees,
            percent,
            description,
            planned,
        } => {
            let project = dash
                .create_project(NewProject {
                    name,
                    assignees,
                    percent,
                    description,
                    planned_date: planned.as_deref().map(parse_date).transpose()?,
                })
                .await?;
            println!("Created: {}", project.name);
        }
        ProjectAction::Update {
            name,
            assignees,
            percent,
            description,
            planned,
        } => {
            let update = ProjectUpdate {
                assignees: (!assignees.is_empty()).then_some(assignees),
                percent,
                description,
                planned_date: planned.as_deref().map(parse_date).transpose()?,
            };
            if update.is_empty() {
                anyhow::bail!("nothing to update");
            }
            let project = dash.update_project(&name, update).await?;
            println!("Updated: {} ({}%)", project.name, project.percent);
        }
        ProjectAction::Complete { name, date } => {
            let date = match date {
                Some(d) => parse_date(&d)?,
                None => chrono::Local::now().date_naive(),
            };
            let project = dash.complete_project(&name, date).await?;
            println!(
                "Completed: {} in {} days",
                project.name,
                project.duration_days().unwrap_or(0)
            );
        }
        ProjectAction::List { status, json } => {
            let status = match status.as_deref() {
                None => None,
                Some("in_progress") => Some(ProjectStatus::InProgress),
                Some("complete") => Some(ProjectStatus::Complete),
                Some(other) => anyhow::bail!("unknown status: {other}"),
            };
            let projects = dash.list_projects(status).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else if projects.is_empty() {
                println!("No projects.");
            } else {
                for p in &projects {
                    println!(
                        "{:<40} {:>4}%  {:<12} {}",
                        p.name,
                        p.percent,
                        p.status.as_str(),
                        p.assignees.join(", ")
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_dashboard(payload: &DashboardPayload) {
    let period = &payload.period;
    println!(
        "Dashboard: {} ({} .. {}), previous {}",
        period.current.period.label(),
        period.current.range.start,
        period.current.range.end,
        period.previous.period.label()
    );
    println!("  Tasks: {}", payload.total_tasks.headline());
    println!("  Users: {}", payload.distinct_users.headline());

    for q in &payload.queues {
        println!();
        println!("{}", q.label);
        print_aggregate(&q.current);
        println!("  Previous tasks: {}", q.previous.total_tasks);
    }

    println!();
    if payload.incidents.alert {
        println!("Incidents: {}", payload.incidents.incidents.len());
        for t in &payload.incidents.incidents {
            println!(
                "  {}  {:<20} {}",
                t.registered_at,
                t.status.label(),
                t.description.as_deref().unwrap_or("")
            );
        }
    } else {
        println!("Incidents: none");
    }

    println!();
    let site = &payload.site;
    println!("Site ({:?})", site.status);
    println!(
        "  Visits: {}  Users: {}  Bounce: {}  Time: {}",
        site.summary.visits,
        site.summary.users,
        site.summary.bounce_rate,
        site.summary.visit_duration
    );
    for s in &site.top_sections {
        println!("  {:<40} {:>8}", s.section, s.visits);
    }
}

fn print_aggregate(m: &AggregateMetrics) {
    println!("  Tasks:           {}", m.total_tasks);
    println!("  Users:           {}", m.distinct_users);
    println!("  Mean resolution: {}", m.mean_resolution);
    for c in &m.top_contributors {
        println!("    {:<36} {:>5}", c.reporter, c.tasks);
    }
}
