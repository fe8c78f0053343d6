//! Client cache service: owns the local tiers for one session and falls
//! through to the orchestrator on a local miss.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{ChatTurn, FindingsGroup, ResearchRequest};
use llm_client::GenerationError;
use research_cache::{EntryPatch, LocalCache};
use tracing::{debug, info, instrument};

use crate::orchestrator::{BackgroundWork, Orchestrator, ResearchOutcome};

pub struct ResearchSession {
    orchestrator: Arc<Orchestrator>,
    local: LocalCache,
}

impl ResearchSession {
    pub fn new(orchestrator: Arc<Orchestrator>, local: LocalCache) -> Self {
        Self { orchestrator, local }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn local(&self) -> &LocalCache {
        &self.local
    }

    /// Memory, then durable, then the orchestrator. Fresh results are
    /// written into both local tiers.
    #[instrument(skip(self, request), fields(key = %request.key))]
    pub async fn research(&self, request: &ResearchRequest) -> Result<ResearchOutcome, GenerationError> {
        if let Some(entry) = self.local.get(&request.key, Utc::now()) {
            if let Some(artifact) = entry.artifact {
                debug!("Local cache hit");
                return Ok(ResearchOutcome {
                    artifact,
                    from_cache: true,
                    created_at: entry.created_at,
                    validity_hours: entry.validity_hours,
                    background: BackgroundWork::default(),
                });
            }
        }

        let outcome = self.orchestrator.get_research(request).await?;
        self.local.store(outcome.to_entry(&request.key));
        Ok(outcome)
    }

    pub async fn steps(&self, request: &ResearchRequest) -> Vec<String> {
        self.orchestrator.get_steps(request).await
    }

    /// Re-reads the authoritative tier up to `attempts` times, `interval`
    /// apart, until the background image shows up. The image is copied into
    /// the local tiers when found.
    pub async fn refresh_image(
        &self,
        request: &ResearchRequest,
        attempts: u32,
        interval: Duration,
    ) -> Option<String> {
        let now = Utc::now();
        if let Some(image) = self
            .local
            .get(&request.key, now)
            .and_then(|e| e.artifact)
            .and_then(|a| a.image)
        {
            return Some(image);
        }

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(interval).await;
            }
            let image = self
                .orchestrator
                .peek(&request.key)
                .await
                .and_then(|e| e.artifact)
                .and_then(|a| a.image);
            if let Some(image) = image {
                self.local.patch(&request.key, &EntryPatch::Image(image.clone()));
                return Some(image);
            }
        }
        debug!(key = %request.key, attempts, "Image not available yet");
        None
    }

    /// Answers with the locally held artifact when there is one.
    pub async fn chat(
        &self,
        request: &ResearchRequest,
        prior_turns: &[ChatTurn],
        question: &str,
    ) -> Result<String, GenerationError> {
        match self.local.get(&request.key, Utc::now()).and_then(|e| e.artifact) {
            Some(artifact) => {
                self.orchestrator
                    .chat_about(request, &artifact, prior_turns, question)
                    .await
            }
            None => self.orchestrator.chat(request, prior_turns, question).await,
        }
    }

    /// Fetches groups not yet shown and appends them locally and to the
    /// authoritative row.
    #[instrument(skip(self, request), fields(key = %request.key))]
    pub async fn extend(&self, request: &ResearchRequest) -> Result<Vec<FindingsGroup>, GenerationError> {
        let local = self.local.get(&request.key, Utc::now());
        let current = match local {
            Some(entry) => Some(entry),
            None => self.orchestrator.peek(&request.key).await,
        };
        let shown = current
            .and_then(|e| e.artifact)
            .map(|a| a.group_titles())
            .unwrap_or_default();

        let groups = self.orchestrator.extend_research(request, &shown).await?;
        if !groups.is_empty() {
            self.local.patch(&request.key, &EntryPatch::AppendGroups(groups.clone()));
            if self.orchestrator.append_groups(&request.key, groups.clone()).await {
                info!(added = groups.len(), "Research extended");
            }
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use research_cache::{CacheEntry, CacheTier};

    fn make_session(harness: &Harness, local: LocalCache) -> ResearchSession {
        ResearchSession::new(harness.orchestrator.clone(), local)
    }

    #[tokio::test]
    async fn test_second_read_is_served_locally() {
        let harness = make_harness(FakeText::new(), FakeImages::none());
        let session = make_session(&harness, LocalCache::in_memory());

        let first = session.research(&make_request("K")).await.unwrap();
        assert!(!first.from_cache);

        harness
            .store
            .put(CacheEntry::for_artifact("K", make_stored_artifact(0.99), 24, Utc::now()))
            .unwrap();
        let second = session.research(&make_request("K")).await.unwrap();

        assert!(second.from_cache);
        assert_eq!(second.artifact, first.artifact);
        assert_eq!(harness.text.research_calls(), 1);
    }

    #[tokio::test]
    async fn test_durable_tier_survives_new_session() {
        let dir = tempfile::tempdir().unwrap();
        let harness = make_harness(FakeText::new(), FakeImages::none());
        {
            let session = make_session(&harness, LocalCache::with_durable_dir(dir.path()).unwrap());
            session.research(&make_request("K")).await.unwrap();
        }

        let reopened = make_session(&harness, LocalCache::with_durable_dir(dir.path()).unwrap());
        assert!(reopened.local().memory().is_empty());
        let outcome = reopened.research(&make_request("K")).await.unwrap();

        assert!(outcome.from_cache);
        assert_eq!(reopened.local().memory().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_image_polls_until_patched() {
        let harness = make_harness(FakeText::new(), FakeImages::ok("img-1"));
        let session = make_session(&harness, LocalCache::in_memory());

        let outcome = session.research(&make_request("K")).await.unwrap();
        assert_eq!(outcome.artifact.image, None);
        outcome.background.join().await;

        let image = session
            .refresh_image(&make_request("K"), 3, Duration::from_secs(2))
            .await;
        assert_eq!(image.as_deref(), Some("img-1"));

        let local = session.local().get("K", Utc::now()).unwrap();
        assert_eq!(local.artifact.unwrap().image.as_deref(), Some("img-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_image_gives_up() {
        let harness = make_harness(FakeText::new(), FakeImages::none());
        let session = make_session(&harness, LocalCache::in_memory());
        session.research(&make_request("K")).await.unwrap();

        let image = session
            .refresh_image(&make_request("K"), 2, Duration::from_millis(500))
            .await;
        assert!(image.is_none());
    }

    #[tokio::test]
    async fn test_extend_appends_locally_and_remotely() {
        let harness = make_harness(FakeText::new(), FakeImages::none());
        let session = make_session(&harness, LocalCache::in_memory());
        session.research(&make_request("K")).await.unwrap();

        let added = session.extend(&make_request("K")).await.unwrap();

        assert_eq!(added.len(), 1);
        let local = session.local().get("K", Utc::now()).unwrap().artifact.unwrap();
        assert_eq!(local.group_titles(), vec!["Form", "Surface"]);
        let remote = harness.orchestrator.peek("K").await.unwrap().artifact.unwrap();
        assert_eq!(remote.group_titles(), vec!["Form", "Surface"]);
    }
}
