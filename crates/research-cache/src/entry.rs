use chrono::{DateTime, Duration, Utc};
use common::{FindingsGroup, ResearchArtifact};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid stored timestamp: {0}")]
    Timestamp(i64),
    #[error("Cache lock poisoned")]
    Poisoned,
    #[error("Cache task failed: {0}")]
    Task(String),
}

/// One cached row per request key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// `None` for a narration-only placeholder.
    pub artifact: Option<ResearchArtifact>,
    pub steps: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub validity_hours: u32,
}

impl CacheEntry {
    pub fn for_artifact(
        key: impl Into<String>,
        artifact: ResearchArtifact,
        validity_hours: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            artifact: Some(artifact),
            steps: None,
            created_at: now,
            expires_at: now + Duration::hours(i64::from(validity_hours)),
            validity_hours,
        }
    }

    /// A steps-only row for narration that finished before the artifact.
    pub fn placeholder(
        key: impl Into<String>,
        steps: Vec<String>,
        ttl_hours: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            artifact: None,
            steps: Some(steps),
            created_at: now,
            expires_at: now + Duration::hours(i64::from(ttl_hours)),
            validity_hours: ttl_hours,
        }
    }

    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = Some(steps);
        self
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// A lookup hit: live deadline and an artifact present.
    pub fn is_hit(&self, now: DateTime<Utc>) -> bool {
        self.is_fresh(now) && self.artifact.is_some()
    }

    /// Upsert rule shared by every tier: the incoming row replaces the
    /// existing one, except that absent steps keep the stored steps.
    pub fn merged_over(mut self, existing: Option<&CacheEntry>) -> Self {
        if self.steps.is_none() {
            self.steps = existing.and_then(|e| e.steps.clone());
        }
        self
    }

    /// Applies a partial update. Returns false when there was nothing to
    /// update (artifact-level patch on a placeholder).
    pub fn apply(&mut self, patch: &EntryPatch) -> bool {
        match patch {
            EntryPatch::Steps(steps) => {
                self.steps = Some(steps.clone());
                true
            }
            EntryPatch::Image(image) => match self.artifact.as_mut() {
                Some(artifact) => {
                    artifact.image = Some(image.clone());
                    true
                }
                None => false,
            },
            EntryPatch::AppendGroups(groups) => match self.artifact.as_mut() {
                Some(artifact) => {
                    artifact.groups.extend(groups.iter().cloned());
                    true
                }
                None => false,
            },
        }
    }
}

/// Partial updates applied in place without resubmitting the artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryPatch {
    Image(String),
    Steps(Vec<String>),
    AppendGroups(Vec<FindingsGroup>),
}
