use crate::errors::{AppError, Result};
use crate::models::{
    checked_end, completed_or_invalid, AppData, EntryPatch, EntryState, NewTimeEntry, Project,
    TimeEntry, DEFAULT_COLOR, DEFAULT_PROJECTS,
};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};
use tracing::{debug, info};
use uuid::Uuid;

/// JSON-file backed store for projects and time entries.
///
/// Every mutation runs under one lock: the change is applied to a copy, the copy
/// is written to disk, and only then does it replace the in-memory state. Readers
/// never observe a change that failed to persist.
pub struct Store {
    path: PathBuf,
    data: Mutex<AppData>,
}

impl Store {
    /// Opens the store at `path`, creating the parent directory and seeding the
    /// default projects when none exist.
    pub async fn open(path: impl Into<PathBuf>, now: DateTime<Utc>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut data = load_data(&path).await?;
        if data.projects.is_empty() {
            seed_defaults(&mut data, now);
            persist_data(&path, &data).await?;
            info!(path = %path.display(), "seeded default projects");
        }

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `read` against the current state without persisting anything.
    pub async fn read<T>(&self, read: impl FnOnce(&AppData) -> T) -> T {
        let data = self.data.lock().await;
        read(&data)
    }

    pub async fn snapshot(&self) -> AppData {
        self.read(|data| AppData {
            projects: data.projects.clone(),
            entries: sorted_entries(data),
        })
        .await
    }

    async fn mutate<T>(&self, change: impl FnOnce(&mut AppData) -> Result<T>) -> Result<T> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let out = change(&mut next)?;
        persist_data(&self.path, &next).await?;
        *data = next;
        Ok(out)
    }

    pub async fn list_projects(&self) -> Vec<Project> {
        self.read(|data| data.projects.clone()).await
    }

    pub async fn create_project(
        &self,
        name: &str,
        color: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::invalid("Project name is required"));
        }
        let color = color
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_COLOR);

        self.mutate(|data| {
            if find_project_by_name(data, name).is_some() {
                return Err(AppError::Conflict(format!(
                    "Project with name '{name}' already exists"
                )));
            }
            let project = Project::new(name, color, now);
            data.projects.push(project.clone());
            Ok(project)
        })
        .await
    }

    /// Removes a project. Its entries stay in place.
    pub async fn delete_project(&self, id: Uuid) -> Result<Project> {
        self.mutate(|data| {
            let index = data
                .projects
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(|| AppError::not_found("Project"))?;
            Ok(data.projects.remove(index))
        })
        .await
    }

    /// All entries, most recent start first.
    pub async fn list_entries(&self) -> Vec<TimeEntry> {
        self.read(sorted_entries).await
    }

    pub async fn active_entry(&self) -> Option<TimeEntry> {
        self.read(|data| data.entries.iter().find(|e| e.is_running()).cloned())
            .await
    }

    /// Stores a new entry. A running entry closes any timer already running at
    /// the new entry's start.
    pub async fn create_entry(&self, input: NewTimeEntry) -> Result<TimeEntry> {
        let state = input.state()?;

        self.mutate(|data| {
            require_project(data, input.project_id)?;
            if state.is_running() {
                close_running(data, state.start_time());
            }
            let entry = TimeEntry::new(input.project_id, state, input.description);
            data.entries.push(entry.clone());
            Ok(entry)
        })
        .await
    }

    pub async fn update_entry(&self, id: Uuid, patch: EntryPatch) -> Result<TimeEntry> {
        self.mutate(|data| {
            if let Some(project_id) = patch.project_id {
                require_project(data, project_id)?;
            }
            let entry = data
                .entries
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| AppError::not_found("Time entry"))?;

            entry.state = patched_state(entry.state, &patch)?;
            if let Some(project_id) = patch.project_id {
                entry.project_id = project_id;
            }
            if let Some(description) = patch.description {
                entry.description = non_empty(description);
            }
            Ok(entry.clone())
        })
        .await
    }

    pub async fn delete_entry(&self, id: Uuid) -> Result<TimeEntry> {
        self.mutate(|data| {
            let index = data
                .entries
                .iter()
                .position(|e| e.id == id)
                .ok_or_else(|| AppError::not_found("Time entry"))?;
            Ok(data.entries.remove(index))
        })
        .await
    }

    /// Closes whatever is running at `now`, then opens a new running entry.
    /// Returns the new entry and the one it closed, if any.
    pub async fn start_timer(
        &self,
        project_id: Uuid,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(TimeEntry, Option<TimeEntry>)> {
        self.mutate(|data| {
            require_project(data, project_id)?;
            let closed = close_running(data, now);
            let entry = TimeEntry::new(
                project_id,
                EntryState::Running { start_time: now },
                description.and_then(non_empty),
            );
            data.entries.push(entry.clone());
            Ok((entry, closed))
        })
        .await
    }

    pub async fn stop_timer(
        &self,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TimeEntry> {
        // `mutate` returns before persisting when nothing is running.
        self.mutate(|data| {
            let entry = data
                .entries
                .iter_mut()
                .find(|e| e.is_running())
                .ok_or(AppError::NoActiveTimer)?;
            entry.state = entry.state.close(now);
            if let Some(description) = description.and_then(non_empty) {
                entry.description = Some(description);
            }
            Ok(entry.clone())
        })
        .await
    }

    /// Drops every project and entry and reseeds the defaults.
    pub async fn reset(&self, now: DateTime<Utc>) -> Result<Vec<Project>> {
        self.mutate(|data| {
            *data = AppData::default();
            seed_defaults(data, now);
            Ok(data.projects.clone())
        })
        .await
    }
}

async fn load_data(path: &Path) -> Result<AppData> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
            AppError::Internal(format!("failed to parse {}: {err}", path.display()))
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no data file yet, starting empty");
            Ok(AppData::default())
        }
        Err(err) => Err(err.into()),
    }
}

async fn persist_data(path: &Path, data: &AppData) -> Result<()> {
    let payload = serde_json::to_vec_pretty(data)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, payload).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

fn seed_defaults(data: &mut AppData, now: DateTime<Utc>) {
    for (name, color) in DEFAULT_PROJECTS {
        data.projects.push(Project::new(name, color, now));
    }
}

/// Entries ordered by start time, most recent first.
pub fn sorted_entries(data: &AppData) -> Vec<TimeEntry> {
    let mut entries = data.entries.clone();
    entries.sort_by(|a, b| b.state.start_time().cmp(&a.state.start_time()));
    entries
}

fn find_project_by_name<'a>(data: &'a AppData, name: &str) -> Option<&'a Project> {
    data.projects
        .iter()
        .find(|p| p.name.to_lowercase() == name.to_lowercase())
}

fn require_project(data: &AppData, id: Uuid) -> Result<()> {
    if data.projects.iter().any(|p| p.id == id) {
        Ok(())
    } else {
        Err(AppError::not_found("Project"))
    }
}

fn close_running(data: &mut AppData, at: DateTime<Utc>) -> Option<TimeEntry> {
    let entry = data.entries.iter_mut().find(|e| e.is_running())?;
    entry.state = entry.state.close(at);
    info!(entry = %entry.id, duration_ms = entry.state.duration(), "closed running entry");
    Some(entry.clone())
}

fn patched_state(current: EntryState, patch: &EntryPatch) -> Result<EntryState> {
    let start_time = patch.start_time.unwrap_or(current.start_time());
    let end_time = match (patch.end_time, patch.duration) {
        (Some(end_time), _) => Some(end_time),
        (None, Some(duration)) => Some(checked_end(start_time, duration)?),
        (None, None) => current.end_time(),
    };

    match end_time {
        Some(end_time) => completed_or_invalid(start_time, end_time),
        None => Ok(EntryState::Running { start_time }),
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
