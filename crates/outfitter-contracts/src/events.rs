use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type ActivityPayload = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    SessionStarted,
    ItemsStaged,
    ClosetItemAdded,
    ClosetItemRemoved,
    AdviceRequested,
    LooksDecoded,
    FavoriteToggled,
    TryOnRequested,
    TryOnCompleted,
    RequestFailed,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::ItemsStaged => "items_staged",
            Self::ClosetItemAdded => "closet_item_added",
            Self::ClosetItemRemoved => "closet_item_removed",
            Self::AdviceRequested => "advice_requested",
            Self::LooksDecoded => "looks_decoded",
            Self::FavoriteToggled => "favorite_toggled",
            Self::TryOnRequested => "try_on_requested",
            Self::TryOnCompleted => "try_on_completed",
            Self::RequestFailed => "request_failed",
        }
    }
}

/// Append-only `events.jsonl` writer for one session.
///
/// - every line carries `type`, `session_id` and `ts`
/// - payload keys are merged last and may override those defaults
/// - one compact JSON object per line
#[derive(Debug, Clone)]
pub struct ActivityLog {
    inner: Arc<ActivityLogInner>,
}

#[derive(Debug)]
struct ActivityLogInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl ActivityLog {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ActivityLogInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn record(&self, kind: ActivityKind, payload: ActivityPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(kind.as_str().to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        event.extend(payload);

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("activity log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }

    /// Like [`ActivityLog::record`] but a failed write only produces a warning.
    pub fn note(&self, kind: ActivityKind, payload: ActivityPayload) {
        if let Err(err) = self.record(kind, payload) {
            tracing::warn!(
                error = %err,
                path = %self.inner.path.display(),
                event = kind.as_str(),
                "failed to append activity event"
            );
        }
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::Value;

    use super::*;

    #[test]
    fn record_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = ActivityLog::new(&path, "session-123");

        let mut payload = ActivityPayload::new();
        payload.insert("count".to_string(), Value::from(3));
        let recorded = log.record(ActivityKind::LooksDecoded, payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, recorded);
        assert_eq!(parsed["type"], Value::String("looks_decoded".to_string()));
        assert_eq!(parsed["session_id"], Value::String("session-123".to_string()));
        assert_eq!(parsed["count"], Value::from(3));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn payload_can_override_default_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = ActivityLog::new(temp.path().join("events.jsonl"), "session-123");

        let mut payload = ActivityPayload::new();
        payload.insert("session_id".to_string(), Value::String("other".to_string()));
        let recorded = log.record(ActivityKind::SessionStarted, payload)?;
        assert_eq!(recorded["session_id"], Value::String("other".to_string()));
        Ok(())
    }

    #[test]
    fn record_appends_lines_and_creates_parent() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("out").join("events.jsonl");
        let log = ActivityLog::new(&path, "session-123");

        log.record(ActivityKind::AdviceRequested, ActivityPayload::new())?;
        log.note(ActivityKind::RequestFailed, ActivityPayload::new());

        let content = fs::read_to_string(&path)?;
        let types: Vec<String> = content
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|row| row["type"].as_str().map(str::to_string))
            .collect();
        assert_eq!(types, vec!["advice_requested", "request_failed"]);
        Ok(())
    }
}
