use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

pub const JOURNAL_SUBDIR: &str = "bet-research";

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn resolve_repo_root() -> Option<PathBuf> {
    let mut cursor = std::env::current_dir().ok()?;
    loop {
        if cursor.join(".git").is_dir() {
            return Some(cursor);
        }
        if !cursor.pop() {
            return None;
        }
    }
}

pub fn resolve_journal_dir() -> PathBuf {
    if let Ok(raw) = std::env::var("RESEARCH_JOURNAL_DIR") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    resolve_repo_root()
        .unwrap_or_default()
        .join("JOURNAL")
        .join(JOURNAL_SUBDIR)
}

/// Append-only JSONL log of research activity, one file per UTC day.
/// Every event carries the `run_id` of the process that wrote it.
pub struct ResearchJournal {
    dir: PathBuf,
    day_key: String,
    file: File,
    run_id: Uuid,
}

impl ResearchJournal {
    pub fn open(dir: PathBuf) -> std::io::Result<Self> {
        create_dir_all(&dir)?;
        let day_key = Utc::now().format("%Y-%m-%d").to_string();
        let file = Self::open_day_file(&dir, &day_key)?;
        Ok(Self {
            dir,
            day_key,
            file,
            run_id: Uuid::new_v4(),
        })
    }

    fn open_day_file(dir: &Path, day_key: &str) -> std::io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("research-{}.jsonl", day_key)))
    }

    fn rotate_if_needed(&mut self) -> std::io::Result<()> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        if today != self.day_key {
            self.file = Self::open_day_file(&self.dir, &today)?;
            self.day_key = today;
        }
        Ok(())
    }

    /// Failures are logged and dropped.
    pub fn write_event(&mut self, mut event: Value) {
        if let Some(fields) = event.as_object_mut() {
            fields.insert("run_id".into(), json!(self.run_id));
        }
        let result = (|| -> std::io::Result<()> {
            self.rotate_if_needed()?;
            let line = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
            writeln!(self.file, "{}", line)?;
            self.file.flush()?;
            Ok(())
        })();

        if let Err(e) = result {
            tracing::warn!("journal write failed: {}", e);
        }
    }

    pub fn requested(&mut self, key: &str) {
        self.write_event(json!({ "ts": now_iso(), "kind": "research_requested", "key": key }));
    }

    pub fn served(&mut self, key: &str, from_cache: bool, validity_hours: u32) {
        self.write_event(json!({
            "ts": now_iso(),
            "kind": "research_served",
            "key": key,
            "from_cache": from_cache,
            "validity_hours": validity_hours,
        }));
    }

    pub fn failed(&mut self, key: &str, code: &str, message: &str) {
        self.write_event(json!({
            "ts": now_iso(),
            "kind": "research_failed",
            "key": key,
            "code": code,
            "message": message,
        }));
    }

    pub fn image_patched(&mut self, key: &str) {
        self.write_event(json!({ "ts": now_iso(), "kind": "image_patched", "key": key }));
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn current_file(&self) -> PathBuf {
        self.dir.join(format!("research-{}.jsonl", self.day_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(journal: &ResearchJournal) -> Vec<Value> {
        std::fs::read_to_string(journal.current_file())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_events_are_appended_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = ResearchJournal::open(dir.path().join("journal")).unwrap();

        journal.requested("ALPHA");
        journal.served("ALPHA", false, 6);
        journal.failed("BETA", "RESEARCH_RATE_LIMITED", "Rate limits exceeded");
        journal.image_patched("ALPHA");

        let events = read_lines(&journal);
        let kinds: Vec<&str> = events.iter().map(|e| e["kind"].as_str().unwrap()).collect();
        assert_eq!(
            kinds,
            vec!["research_requested", "research_served", "research_failed", "image_patched"]
        );
        assert_eq!(events[1]["from_cache"], false);
        assert_eq!(events[2]["code"], "RESEARCH_RATE_LIMITED");
        let run_id = journal.run_id().to_string();
        assert!(events.iter().all(|e| e["run_id"] == run_id.as_str()));
    }

    #[test]
    fn test_reopen_appends_to_same_day_file() {
        let dir = tempfile::tempdir().unwrap();
        ResearchJournal::open(dir.path().to_path_buf()).unwrap().requested("A");
        let mut journal = ResearchJournal::open(dir.path().to_path_buf()).unwrap();
        journal.requested("B");
        assert_eq!(read_lines(&journal).len(), 2);
    }
}
