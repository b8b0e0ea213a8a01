use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::SiteMetricsRow;

/// Maps a URL path fragment (matched as a substring) to a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionName {
    pub fragment: String,
    pub name: String,
}

impl SectionName {
    pub fn new(fragment: &str, name: &str) -> Self {
        Self {
            fragment: fragment.to_string(),
            name: name.to_string(),
        }
    }
}

/// Position and display name of the first entry whose fragment occurs in `text`.
fn lookup<'a>(names: &'a [SectionName], text: &str) -> Option<(usize, &'a str)> {
    names
        .iter()
        .enumerate()
        .find(|(_, n)| text.contains(n.fragment.as_str()))
        .map(|(i, n)| (i, n.name.as_str()))
}

#[derive(Debug, Clone)]
pub struct TopSectionConfig {
    pub names: Vec<SectionName>,
    /// Display names kept in the output.
    pub allow_list: Vec<String>,
    /// Level-4 fragment promoted to a section of its own.
    pub special_interest: String,
}

/// Every metric column summed over a section's rows. The rate, depth and
/// duration columns are plain sums too, not averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionTraffic {
    pub section: String,
    pub visits: u64,
    pub users: u64,
    pub pageviews: u64,
    pub bounce_rate: f64,
    pub page_depth: f64,
    pub avg_visit_duration_seconds: f64,
}

impl SectionTraffic {
    fn empty(section: &str) -> Self {
        Self {
            section: section.to_string(),
            visits: 0,
            users: 0,
            pageviews: 0,
            bounce_rate: 0.0,
            page_depth: 0.0,
            avg_visit_duration_seconds: 0.0,
        }
    }

    fn add(&mut self, row: &SiteMetricsRow) {
        self.visits += row.visits;
        self.users += row.users;
        self.pageviews += row.pageviews;
        self.bounce_rate += row.bounce_rate;
        self.page_depth += row.page_depth;
        self.avg_visit_duration_seconds += row.avg_visit_duration_seconds;
    }
}

fn group_into(groups: &mut Vec<SectionTraffic>, key: &str, row: &SiteMetricsRow) {
    let idx = match groups.iter().position(|g| g.section == key) {
        Some(idx) => idx,
        None => {
            groups.push(SectionTraffic::empty(key));
            groups.len() - 1
        }
    };
    groups[idx].add(row);
}

/// Visits per top-level section, ascending by visits.
///
/// Rows are grouped by level-2 path; rows whose level-4 path contains the
/// special-interest fragment are additionally grouped by level 4 and appended
/// as sections of their own. Keys are then relabelled through `config.names`
/// and only allow-listed names survive. Two keys relabelled to the same name
/// stay separate entries.
pub fn top_sections(rows: &[SiteMetricsRow], config: &TopSectionConfig) -> Vec<SectionTraffic> {
    let special_interest = config.special_interest.as_str();
    let mut by_level2 = Vec::new();
    let mut special = Vec::new();
    for row in rows {
        group_into(&mut by_level2, &row.level2, row);
        if !special_interest.is_empty() && row.level4.contains(special_interest) {
            group_into(&mut special, &row.level4, row);
        }
    }

    let mut sections: Vec<SectionTraffic> = by_level2
        .into_iter()
        .chain(special)
        .filter_map(|mut s| {
            if let Some((_, name)) = lookup(&config.names, &s.section) {
                s.section = name.to_string();
            }
            config.allow_list.contains(&s.section).then_some(s)
        })
        .collect();
    sections.sort_by_key(|s| s.visits);
    sections
}

/// A row relabelled through a name table. `rank` is the table position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledRow {
    pub label: String,
    #[serde(skip)]
    pub rank: usize,
    pub row: SiteMetricsRow,
}

fn relabel<'a>(
    rows: impl Iterator<Item = &'a SiteMetricsRow>,
    names: &[SectionName],
    key: impl Fn(&SiteMetricsRow) -> &str,
) -> Vec<LabeledRow> {
    rows.filter_map(|row| {
        lookup(names, key(row)).map(|(rank, name)| LabeledRow {
            label: name.to_string(),
            rank,
            row: row.clone(),
        })
    })
    .collect()
}

/// Rows whose level-3 path matches a table entry, labelled by it.
pub fn section_breakdown(rows: &[SiteMetricsRow], names: &[SectionName]) -> Vec<LabeledRow> {
    relabel(rows.iter(), names, |r| r.level3.as_str())
}

/// Rows of one sub-area (selected by `predicate`) whose full URL matches a
/// table entry, labelled by it.
pub fn sub_area_breakdown<P>(
    rows: &[SiteMetricsRow],
    predicate: P,
    names: &[SectionName],
) -> Vec<LabeledRow>
where
    P: Fn(&SiteMetricsRow) -> bool,
{
    relabel(rows.iter().filter(|&r| predicate(r)), names, |r| r.full_url.as_str())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelStats {
    pub label: String,
    pub visits: u64,
    pub page_depth: f64,
    pub avg_visit_duration_seconds: f64,
}

/// Per-label visit sums and mean depth/duration, in name-table order.
pub fn label_stats(rows: &[LabeledRow]) -> Vec<LabelStats> {
    let mut acc: BTreeMap<usize, (String, u64, f64, f64, u32)> = BTreeMap::new();
    for r in rows {
        let e = acc
            .entry(r.rank)
            .or_insert_with(|| (r.label.clone(), 0, 0.0, 0.0, 0));
        e.1 += r.row.visits;
        e.2 += r.row.page_depth;
        e.3 += r.row.avg_visit_duration_seconds;
        e.4 += 1;
    }
    acc.into_values()
        .map(|(label, visits, depth, duration, n)| LabelStats {
            label,
            visits,
            page_depth: depth / n as f64,
            avg_visit_duration_seconds: duration / n as f64,
        })
        .collect()
}

/// Whole-site totals for the summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteSummary {
    pub visits: u64,
    pub users: u64,
    pub pageviews: u64,
    /// `"NN.NN%"`
    pub bounce_rate: String,
    pub page_depth: String,
    /// `"MM:SS"`
    pub visit_duration: String,
}

pub fn site_summary(rows: &[SiteMetricsRow]) -> SiteSummary {
    let n = rows.len().max(1) as f64;
    let mean = |f: fn(&SiteMetricsRow) -> f64| rows.iter().map(f).sum::<f64>() / n;
    let duration = mean(|r| r.avg_visit_duration_seconds).round() as u64;
    SiteSummary {
        visits: rows.iter().map(|r| r.visits).sum(),
        users: rows.iter().map(|r| r.users).sum(),
        pageviews: rows.iter().map(|r| r.pageviews).sum(),
        bounce_rate: format!("{:.2}%", mean(|r| r.bounce_rate)),
        page_depth: format!("{:.2}", mean(|r| r.page_depth)),
        visit_duration: format!("{:02}:{:02}", duration / 60, duration % 60),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTraffic {
    pub date: String,
    pub visits: u64,
    pub users: u64,
    pub pageviews: u64,
}

/// Per-date sums, oldest first. Placeholder rows are skipped.
pub fn daily_traffic(rows: &[SiteMetricsRow]) -> Vec<DailyTraffic> {
    let mut days: HashMap<&str, DailyTraffic> = HashMap::new();
    for row in rows.iter().filter(|r| !r.is_placeholder()) {
        let day = days.entry(row.date.as_str()).or_insert_with(|| DailyTraffic {
            date: row.date.clone(),
            visits: 0,
            users: 0,
            pageviews: 0,
        });
        day.visits += row.visits;
        day.users += row.users;
        day.pageviews += row.pageviews;
    }
    let mut out: Vec<DailyTraffic> = days.into_values().collect();
    out.sort_by(|a, b| a.date.cmp(&b.date));
    out
}
