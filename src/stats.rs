use crate::models::{AppData, EntryState, ProjectTotal, StatsResponse, DEFAULT_COLOR};
use chrono::{Datelike, DateTime, Duration, NaiveDate, TimeZone, Weekday};
use std::collections::HashMap;
use uuid::Uuid;

/// Aggregates totals as seen from `now` in its own time zone.
///
/// Entries count toward the local day their timer started on, even when they run
/// past midnight. Running entries add nothing to the totals.
pub fn build_stats_at<Tz: TimeZone>(
    now: &DateTime<Tz>,
    data: &AppData,
    week_start: Weekday,
) -> StatsResponse {
    let tz = now.timezone();
    let today = now.date_naive();
    let week_begin = start_of_week(today, week_start);
    let week_end = week_begin + Duration::days(7);

    let mut today_total = 0u64;
    let mut week_total = 0u64;
    let mut per_project: HashMap<Uuid, (u64, usize)> = HashMap::new();

    for entry in &data.entries {
        let EntryState::Completed {
            start_time,
            duration,
            ..
        } = entry.state
        else {
            continue;
        };
        let day = start_time.with_timezone(&tz).date_naive();

        if day == today {
            today_total = today_total.saturating_add(duration);
            let slot = per_project.entry(entry.project_id).or_default();
            slot.0 = slot.0.saturating_add(duration);
            slot.1 += 1;
        }
        if day >= week_begin && day < week_end {
            week_total = week_total.saturating_add(duration);
        }
    }

    let mut project_breakdown: Vec<ProjectTotal> = per_project
        .into_iter()
        .map(|(project_id, (total, entries))| {
            let project = data.projects.iter().find(|p| p.id == project_id);
            ProjectTotal {
                project_id,
                name: project.map_or_else(|| "Unknown".to_string(), |p| p.name.clone()),
                color: project.map_or_else(|| DEFAULT_COLOR.to_string(), |p| p.color.clone()),
                total,
                entries,
            }
        })
        .collect();
    project_breakdown.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));

    StatsResponse {
        total_entries: data.entries.len(),
        today_total,
        week_total,
        project_count: data.projects.len(),
        active_timer: data.entries.iter().find(|e| e.is_running()).cloned(),
        project_breakdown,
    }
}

fn start_of_week(date: NaiveDate, first: Weekday) -> NaiveDate {
    let back = (7 + date.weekday().num_days_from_monday() - first.num_days_from_monday()) % 7;
    date - Duration::days(back as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Project, TimeEntry};
    use chrono::{FixedOffset, Utc};

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    fn local(day: u32, hour: u32, min: u32) -> DateTime<FixedOffset> {
        // June 2026: the 10th is a Wednesday.
        tz().with_ymd_and_hms(2026, 6, day, hour, min, 0).unwrap()
    }

    fn completed(project: &Project, start: DateTime<FixedOffset>, duration: u64) -> TimeEntry {
        let start = start.with_timezone(&Utc);
        let state = EntryState::completed(start, start + Duration::milliseconds(duration as i64))
            .unwrap();
        TimeEntry::new(project.id, state, None)
    }

    fn fixture() -> (AppData, Project, Project) {
        let created = Utc::now();
        let focus = Project::new("Focus", "#111111", created);
        let admin = Project::new("Admin", "#222222", created);
        let data = AppData {
            projects: vec![focus.clone(), admin.clone()],
            entries: Vec::new(),
        };
        (data, focus, admin)
    }

    #[test]
    fn today_total_excludes_yesterday() {
        let (mut data, focus, _) = fixture();
        data.entries.push(completed(&focus, local(10, 9, 0), 1_500_000));
        data.entries.push(completed(&focus, local(9, 14, 0), 999_999));

        let stats = build_stats_at(&local(10, 18, 0), &data, Weekday::Mon);
        assert_eq!(stats.today_total, 1_500_000);
        assert_eq!(stats.week_total, 2_499_999);
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.project_count, 2);
    }

    #[test]
    fn midnight_span_counts_for_start_day() {
        let (mut data, focus, _) = fixture();
        data.entries.push(completed(&focus, local(9, 23, 30), 3_600_000));

        let stats = build_stats_at(&local(10, 8, 0), &data, Weekday::Mon);
        assert_eq!(stats.today_total, 0);
        assert!(stats.project_breakdown.is_empty());
    }

    #[test]
    fn day_boundary_follows_the_given_zone() {
        let (mut data, focus, _) = fixture();
        // 23:30 UTC on the 9th is 01:30 on the 10th at +02:00.
        let start = Utc.with_ymd_and_hms(2026, 6, 9, 23, 30, 0).unwrap();
        let state = EntryState::completed(start, start + Duration::minutes(10)).unwrap();
        data.entries.push(TimeEntry::new(focus.id, state, None));

        let stats = build_stats_at(&local(10, 12, 0), &data, Weekday::Mon);
        assert_eq!(stats.today_total, 600_000);
    }

    #[test]
    fn week_start_is_configurable() {
        let (mut data, focus, _) = fixture();
        // Sunday the 7th.
        data.entries.push(completed(&focus, local(7, 10, 0), 60_000));

        let monday_weeks = build_stats_at(&local(10, 12, 0), &data, Weekday::Mon);
        assert_eq!(monday_weeks.week_total, 0);

        let sunday_weeks = build_stats_at(&local(10, 12, 0), &data, Weekday::Sun);
        assert_eq!(sunday_weeks.week_total, 60_000);
    }

    #[test]
    fn running_entries_add_nothing_but_show_as_active() {
        let (mut data, focus, _) = fixture();
        let running = TimeEntry::new(
            focus.id,
            EntryState::Running {
                start_time: local(10, 9, 0).with_timezone(&Utc),
            },
            None,
        );
        data.entries.push(running.clone());

        let stats = build_stats_at(&local(10, 12, 0), &data, Weekday::Mon);
        assert_eq!(stats.today_total, 0);
        assert_eq!(stats.week_total, 0);
        assert_eq!(stats.active_timer.map(|e| e.id), Some(running.id));
    }

    #[test]
    fn breakdown_sorted_by_descending_total() {
        let (mut data, focus, admin) = fixture();
        data.entries.push(completed(&admin, local(10, 8, 0), 300_000));
        data.entries.push(completed(&focus, local(10, 9, 0), 900_000));
        data.entries.push(completed(&focus, local(10, 11, 0), 100_000));
        data.entries.push(completed(&admin, local(8, 11, 0), 5_000_000));

        let stats = build_stats_at(&local(10, 12, 0), &data, Weekday::Mon);
        let names: Vec<_> = stats.project_breakdown.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Focus", "Admin"]);
        assert_eq!(stats.project_breakdown[0].total, 1_000_000);
        assert_eq!(stats.project_breakdown[0].entries, 2);
        assert_eq!(stats.project_breakdown[1].total, 300_000);
    }

    #[test]
    fn start_of_week_walks_back() {
        let wednesday = NaiveDate::from_ymd_opt(2026, 6, 10).unwrap();
        assert_eq!(
            start_of_week(wednesday, Weekday::Mon),
            NaiveDate::from_ymd_opt(2026, 6, 8).unwrap()
        );
        assert_eq!(
            start_of_week(wednesday, Weekday::Sun),
            NaiveDate::from_ymd_opt(2026, 6, 7).unwrap()
        );
        assert_eq!(start_of_week(wednesday, Weekday::Wed), wednesday);
    }
}
