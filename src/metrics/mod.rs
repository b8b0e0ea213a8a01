pub mod compare;
pub mod types;

pub use compare::{compare, compare_counts, Comparison, Emphasis, Metric};
pub use types::*;

use std::collections::{HashMap, HashSet};

use crate::tickets::TicketRecord;

const TOP_CONTRIBUTORS: usize = 5;

const HOUR: i64 = 3600;
const DAY: i64 = 24 * HOUR;

/// Upper bounds (inclusive, seconds) of the resolution buckets; the last is open.
const BUCKETS: [(&str, Option<i64>); 5] = [
    ("до 4-х часов", Some(4 * HOUR)),
    ("от 4-х до 8-ми часов", Some(8 * HOUR)),
    ("от 8-ми до 24-х часов", Some(DAY)),
    ("от 1-го до 5-ти дней", Some(5 * DAY)),
    ("свыше 5-ти дней", None),
];

/// Aggregate one queue's filtered records. Total over every input, including empty.
pub fn aggregate(records: &[TicketRecord], exclusions: &Exclusions) -> AggregateMetrics {
    let total_tasks = records.iter().map(|r| r.task_count as u64).sum();
    let distinct_users = records
        .iter()
        .map(|r| r.reporter.as_str())
        .collect::<HashSet<_>>()
        .len() as u64;

    let durations: Vec<(i64, u32)> = records
        .iter()
        .filter_map(|r| r.duration().map(|d| (d.num_seconds(), r.task_count)))
        .collect();
    let mean_resolution_seconds = mean(durations.iter().map(|(s, _)| *s));
    let mean_resolution = mean_resolution_seconds
        .map(format_duration_ru)
        .unwrap_or_else(|| NO_DATA.to_string());

    AggregateMetrics {
        total_tasks,
        distinct_users,
        mean_resolution,
        mean_resolution_seconds,
        top_contributors: top_contributors(records, exclusions),
        resolution_buckets: resolution_buckets(&durations),
    }
}

/// Render seconds as `"D дн. H час. M мин."`, dropping the day part below one day.
pub fn format_duration_ru(seconds: i64) -> String {
    let days = seconds.div_euclid(DAY);
    let hours = seconds.rem_euclid(DAY) / HOUR;
    let minutes = seconds.rem_euclid(HOUR) / 60;
    if days > 0 {
        format!("{days} дн. {hours} час. {minutes} мин.")
    } else {
        format!("{hours} час. {minutes} мин.")
    }
}

fn mean(values: impl Iterator<Item = i64>) -> Option<i64> {
    let (sum, n) = values.fold((0i64, 0i64), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum.div_euclid(n))
}

fn top_contributors(records: &[TicketRecord], exclusions: &Exclusions) -> Vec<Contributor> {
    // First-seen order is the tie-break, so group into a Vec.
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut grouped: Vec<Contributor> = Vec::new();
    for r in records {
        if exclusions.excludes(&r.reporting_unit, &r.reporter) {
            continue;
        }
        match index.get(r.reporter.as_str()) {
            Some(&i) => grouped[i].tasks += r.task_count as u64,
            None => {
                index.insert(&r.reporter, grouped.len());
                grouped.push(Contributor {
                    reporter: r.reporter.clone(),
                    tasks: r.task_count as u64,
                });
            }
        }
    }
    grouped.sort_by(|a, b| b.tasks.cmp(&a.tasks));
    grouped.truncate(TOP_CONTRIBUTORS);
    grouped
}

fn bucket_index(seconds: i64) -> usize {
    BUCKETS
        .iter()
        .position(|(_, bound)| bound.is_none_or(|b| seconds <= b))
        .unwrap_or(BUCKETS.len() - 1)
}

fn resolution_buckets(durations: &[(i64, u32)]) -> Vec<ResolutionBucket> {
    let mut tasks = [0u64; BUCKETS.len()];
    let mut seconds: [Vec<i64>; BUCKETS.len()] = Default::default();
    for &(secs, count) in durations {
        let i = bucket_index(secs);
        tasks[i] += count as u64;
        seconds[i].push(secs);
    }
    let total: u64 = tasks.iter().sum();

    BUCKETS
        .iter()
        .enumerate()
        .map(|(i, (label, _))| ResolutionBucket {
            label: *label,
            tasks: tasks[i],
            share: if total == 0 {
                0.0
            } else {
                tasks[i] as f64 / total as f64
            },
            mean_seconds: mean(seconds[i].iter().copied()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickets::{TicketSource, TicketStatus};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn at(day: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn record(reporter: &str, unit: &str, task_count: u32) -> TicketRecord {
        TicketRecord {
            source: TicketSource::Etsp,
            registered_at: at(3, 9),
            resolved_at: None,
            ticket_number: None,
            kind: None,
            description: None,
            reporting_unit: unit.to_string(),
            reporter: reporter.to_string(),
            status: TicketStatus::Normal,
            task_count,
            week_opened: 10,
            month_opened: 3,
            year_opened: 2025,
        }
    }

    fn resolved_after(mut r: TicketRecord, d: Duration) -> TicketRecord {
        r.resolved_at = Some(r.registered_at + d);
        r
    }

    #[test]
    fn test_aggregate_empty() {
        let m = aggregate(&[], &Exclusions::none());
        assert_eq!(m.total_tasks, 0);
        assert_eq!(m.distinct_users, 0);
        assert_eq!(m.mean_resolution, "—");
        assert_eq!(m.mean_resolution_seconds, None);
        assert!(m.top_contributors.is_empty());
        assert!(m.resolution_buckets.iter().all(|b| b.tasks == 0 && b.share == 0.0));
    }

    #[test]
    fn test_aggregate_totals_and_tie_break() {
        let records = vec![record("A", "U1", 3), record("B", "U2", 5), record("A", "U1", 2)];
        let m = aggregate(&records, &Exclusions::none());
        assert_eq!(m.total_tasks, 10);
        assert_eq!(m.distinct_users, 2);
        assert_eq!(
            m.top_contributors,
            vec![
                Contributor { reporter: "A".into(), tasks: 5 },
                Contributor { reporter: "B".into(), tasks: 5 },
            ]
        );
    }

    #[test]
    fn test_top_contributors_exclusions_and_limit() {
        let mut records: Vec<TicketRecord> = (1..=7)
            .map(|i| record(&format!("R{i}"), "U", i))
            .collect();
        records.push(record("Admin", "U", 100));
        records.push(record("Insider", "ЦОКР", 50));

        let exclusions = Exclusions {
            units: vec!["ЦОКР".into()],
            reporters: vec!["Admin".into()],
        };
        let m = aggregate(&records, &exclusions);
        let names: Vec<&str> = m.top_contributors.iter().map(|c| c.reporter.as_str()).collect();
        assert_eq!(names, vec!["R7", "R6", "R5", "R4", "R3"]);
        // Exclusions only shape the ranking.
        assert_eq!(m.total_tasks, 28 + 150);
        assert_eq!(m.distinct_users, 9);
    }

    #[test]
    fn test_mean_resolution_with_days() {
        let d = Duration::days(1) + Duration::hours(2) + Duration::minutes(30);
        let records = vec![resolved_after(record("A", "U", 1), d), record("B", "U", 1)];
        let m = aggregate(&records, &Exclusions::none());
        assert_eq!(m.mean_resolution, "1 дн. 2 час. 30 мин.");
        assert_eq!(m.mean_resolution_seconds, Some(95_400));
    }

    #[test]
    fn test_mean_resolution_under_a_day() {
        let records = vec![
            resolved_after(record("A", "U", 1), Duration::hours(2)),
            resolved_after(record("B", "U", 1), Duration::hours(2) + Duration::minutes(10)),
        ];
        let m = aggregate(&records, &Exclusions::none());
        assert_eq!(m.mean_resolution, "2 час. 5 мин.");
    }

    #[test]
    fn test_format_duration_discards_seconds() {
        assert_eq!(format_duration_ru(59), "0 час. 0 мин.");
        assert_eq!(format_duration_ru(3 * DAY + 59 * 60 + 59), "3 дн. 0 час. 59 мин.");
    }

    #[test]
    fn test_resolution_buckets() {
        let records = vec![
            resolved_after(record("A", "U", 2), Duration::hours(4)),
            resolved_after(record("B", "U", 1), Duration::hours(4) + Duration::seconds(1)),
            resolved_after(record("C", "U", 1), Duration::hours(30)),
            resolved_after(record("D", "U", 4), Duration::days(6)),
            record("E", "U", 9),
        ];
        let m = aggregate(&records, &Exclusions::none());
        let tasks: Vec<u64> = m.resolution_buckets.iter().map(|b| b.tasks).collect();
        assert_eq!(tasks, vec![2, 1, 0, 1, 4]);
        assert_eq!(m.resolution_buckets[0].label, "до 4-х часов");
        assert_eq!(m.resolution_buckets[0].share, 0.25);
        assert_eq!(m.resolution_buckets[2].mean_seconds, None);
        assert_eq!(m.resolution_buckets[3].mean_seconds, Some(30 * HOUR));
    }
}
