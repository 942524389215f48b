use crate::errors::{AppError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_COLOR: &str = "#3b82f6";

/// Projects seeded into an empty store, as `(name, color)`.
pub const DEFAULT_PROJECTS: [(&str, &str); 3] = [
    ("General", DEFAULT_COLOR),
    ("Development", "#10b981"),
    ("Meetings", "#f59e0b"),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, color: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            color: color.into(),
            created_at,
        }
    }
}

/// Whether an entry is the live timer or a closed span. Durations are milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EntryState {
    #[serde(rename_all = "camelCase")]
    Running { start_time: DateTime<Utc> },
    #[serde(rename_all = "camelCase")]
    Completed {
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration: u64,
    },
}

impl EntryState {
    /// Closed span between two instants; `None` when `end` precedes `start`.
    pub fn completed(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Option<Self> {
        if end_time < start_time {
            return None;
        }
        Some(Self::Completed {
            start_time,
            end_time,
            duration: span_millis(start_time, end_time),
        })
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        match *self {
            Self::Running { start_time } | Self::Completed { start_time, .. } => start_time,
        }
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        match *self {
            Self::Running { .. } => None,
            Self::Completed { end_time, .. } => Some(end_time),
        }
    }

    /// Stored duration; running entries count as zero.
    pub fn duration(&self) -> u64 {
        match *self {
            Self::Running { .. } => 0,
            Self::Completed { duration, .. } => duration,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Closes a running entry at `at`, clamped so the duration never goes negative.
    /// Completed entries are returned unchanged.
    pub fn close(self, at: DateTime<Utc>) -> Self {
        match self {
            Self::Running { start_time } => Self::Completed {
                start_time,
                end_time: at.max(start_time),
                duration: span_millis(start_time, at),
            },
            completed => completed,
        }
    }
}

pub fn span_millis(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

/// `start` moved forward by `duration` milliseconds, or `None` past chrono's range.
pub fn end_after(start: DateTime<Utc>, duration: u64) -> Option<DateTime<Utc>> {
    let millis = i64::try_from(duration).ok()?;
    start.checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

pub(crate) fn checked_end(start: DateTime<Utc>, duration: u64) -> Result<DateTime<Utc>> {
    end_after(start, duration).ok_or_else(|| AppError::invalid("duration out of range"))
}

pub(crate) fn completed_or_invalid(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<EntryState> {
    EntryState::completed(start, end)
        .ok_or_else(|| AppError::invalid("endTime must not be before startTime"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: Uuid,
    pub project_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub state: EntryState,
}

impl TimeEntry {
    pub fn new(project_id: Uuid, state: EntryState, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            description,
            state,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppData {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub entries: Vec<TimeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryRequest {
    pub project_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<u64>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntryRequest {
    pub project_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<u64>,
    pub description: Option<String>,
}

/// Validated input for a new time entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeEntry {
    pub project_id: Uuid,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewTimeEntry {
    /// Resolves the entry state: explicit end wins, then start plus duration,
    /// otherwise the entry is a running timer.
    pub fn state(&self) -> Result<EntryState> {
        let end_time = match (self.end_time, self.duration) {
            (Some(end_time), _) => end_time,
            (None, Some(duration)) => checked_end(self.start_time, duration)?,
            (None, None) => {
                return Ok(EntryState::Running {
                    start_time: self.start_time,
                });
            }
        };
        completed_or_invalid(self.start_time, end_time)
    }
}

/// Validated partial update for an existing entry.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub project_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<u64>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTimerRequest {
    pub project_id: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTimerRequest {
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTotal {
    pub project_id: Uuid,
    pub name: String,
    pub color: String,
    pub total: u64,
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_entries: usize,
    pub today_total: u64,
    pub week_total: u64,
    pub project_count: usize,
    pub active_timer: Option<TimeEntry>,
    pub project_breakdown: Vec<ProjectTotal>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataSnapshot {
    pub projects: Vec<Project>,
    pub entries: Vec<TimeEntry>,
    pub stats: StatsResponse,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub exported_at: DateTime<Utc>,
    pub version: String,
    pub projects: Vec<Project>,
    pub entries: Vec<TimeEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub success: bool,
    pub projects: Vec<Project>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Running entry as shown to the extension, with its live elapsed time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTimer {
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub project_name: Option<String>,
    pub elapsed: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionStatus {
    pub is_running: bool,
    pub is_online: bool,
    pub active_timer: Option<ActiveTimer>,
    pub projects: Vec<Project>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimerResponse {
    pub success: bool,
    pub entry: TimeEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<TimeEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 10, hour, min, 0).unwrap()
    }

    #[test]
    fn running_entry_serializes_without_end() {
        let entry = TimeEntry::new(
            Uuid::new_v4(),
            EntryState::Running { start_time: at(9, 0) },
            None,
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["status"], "running");
        assert!(value.get("endTime").is_none());
        assert!(value.get("startTime").is_some());
        assert!(value.get("projectId").is_some());

        let back: TimeEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn completed_entry_carries_millisecond_duration() {
        let state = EntryState::completed(at(9, 0), at(9, 25)).unwrap();
        assert_eq!(state.duration(), 1_500_000);

        let entry = TimeEntry::new(Uuid::new_v4(), state, Some("focus".into()));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["duration"], 1_500_000);
        assert_eq!(value["description"], "focus");
    }

    #[test]
    fn completed_rejects_end_before_start() {
        assert!(EntryState::completed(at(10, 0), at(9, 0)).is_none());
    }

    #[test]
    fn close_clamps_to_start() {
        let closed = EntryState::Running { start_time: at(10, 0) }.close(at(9, 0));
        assert_eq!(closed.duration(), 0);
        assert_eq!(closed.end_time(), Some(at(10, 0)));
    }

    #[test]
    fn new_entry_resolves_state_from_fields() {
        let mut input = NewTimeEntry {
            project_id: Uuid::new_v4(),
            start_time: at(9, 0),
            end_time: None,
            duration: Some(60_000),
            description: None,
        };
        assert_eq!(input.state().unwrap().end_time(), Some(at(9, 1)));

        input.duration = None;
        assert!(input.state().unwrap().is_running());

        input.end_time = Some(at(8, 0));
        assert!(matches!(input.state(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn oversized_duration_is_rejected_not_wrapped() {
        let mut input = NewTimeEntry {
            project_id: Uuid::new_v4(),
            start_time: at(9, 0),
            end_time: None,
            duration: Some(10_000_000_000_000_000),
            description: None,
        };
        let err = input.state().unwrap_err();
        assert_eq!(err.to_string(), "duration out of range");

        input.duration = Some(u64::MAX);
        let err = input.state().unwrap_err();
        assert_eq!(err.to_string(), "duration out of range");

        assert!(end_after(at(9, 0), u64::MAX).is_none());
        assert_eq!(end_after(at(9, 0), 60_000), Some(at(9, 1)));
    }
}
