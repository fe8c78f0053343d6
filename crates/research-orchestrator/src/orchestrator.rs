use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{ChatTurn, FindingsGroup, ResearchArtifact, ResearchRequest};
use llm_client::{GenerationError, ImageGenerator};
use research_cache::{CacheEntry, CacheError, CacheTier, EntryPatch};
use research_engine::{ArtifactGenerator, ResearchChat, ResearchExtender, StepNarrator};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::single_flight::KeyedLocks;

/// Generation adapters the orchestrator drives.
pub struct Generators {
    pub artifact: ArtifactGenerator,
    pub narrator: StepNarrator,
    pub chat: ResearchChat,
    pub extender: ResearchExtender,
    pub images: Arc<dyn ImageGenerator>,
}

/// Tasks spawned by a fresh generation. Nothing awaits them unless the
/// caller chooses to; dropping this detaches them.
#[derive(Debug, Default)]
pub struct BackgroundWork {
    pub narration: Option<JoinHandle<Vec<String>>>,
    /// Resolves to whether the stored entry's image was patched.
    pub image: Option<JoinHandle<bool>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackgroundReport {
    pub steps: Option<Vec<String>>,
    pub image_patched: bool,
}

impl BackgroundWork {
    pub fn is_empty(&self) -> bool {
        self.narration.is_none() && self.image.is_none()
    }

    pub async fn join(self) -> BackgroundReport {
        let steps = match self.narration {
            Some(handle) => match handle.await {
                Ok(steps) => Some(steps),
                Err(e) => {
                    warn!("Narration task failed: {}", e);
                    None
                }
            },
            None => None,
        };
        let image_patched = match self.image {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                warn!("Image task failed: {}", e);
                false
            }),
            None => false,
        };
        BackgroundReport { steps, image_patched }
    }
}

#[derive(Debug)]
pub struct ResearchOutcome {
    pub artifact: ResearchArtifact,
    pub from_cache: bool,
    pub created_at: DateTime<Utc>,
    pub validity_hours: u32,
    pub background: BackgroundWork,
}

impl ResearchOutcome {
    fn served(entry: CacheEntry) -> Option<Self> {
        Some(Self {
            artifact: entry.artifact?,
            from_cache: true,
            created_at: entry.created_at,
            validity_hours: entry.validity_hours,
            background: BackgroundWork::default(),
        })
    }

    /// The entry a client tier should hold for this outcome.
    pub fn to_entry(&self, key: &str) -> CacheEntry {
        CacheEntry::for_artifact(key, self.artifact.clone(), self.validity_hours, self.created_at)
    }
}

pub struct Orchestrator {
    store: Arc<dyn CacheTier>,
    artifact: ArtifactGenerator,
    narrator: Arc<StepNarrator>,
    responder: ResearchChat,
    extender: ResearchExtender,
    images: Arc<dyn ImageGenerator>,
    placeholder_ttl_hours: u32,
    in_flight: KeyedLocks,
    narrations: Arc<KeyedLocks>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn CacheTier>, generators: Generators, placeholder_ttl_hours: u32) -> Self {
        Self {
            store,
            artifact: generators.artifact,
            narrator: Arc::new(generators.narrator),
            responder: generators.chat,
            extender: generators.extender,
            images: generators.images,
            placeholder_ttl_hours,
            in_flight: KeyedLocks::new(),
            narrations: Arc::new(KeyedLocks::new()),
        }
    }

    /// Live authoritative entry for `key`. Read errors count as a miss.
    pub async fn peek(&self, key: &str) -> Option<CacheEntry> {
        let owned = key.to_string();
        match on_store(&self.store, move |store| store.lookup(&owned, Utc::now())).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(tier = self.store.name(), "Authoritative lookup failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Serves a live cached artifact, or generates, stores and returns a
    /// fresh one. Image synthesis and narration continue in the background.
    #[instrument(skip(self, request), fields(key = %request.key))]
    pub async fn get_research(&self, request: &ResearchRequest) -> Result<ResearchOutcome, GenerationError> {
        if let Some(outcome) = self.peek(&request.key).await.and_then(ResearchOutcome::served) {
            debug!("Authoritative cache hit");
            return Ok(outcome);
        }

        let _claim = self.in_flight.acquire(&request.key).await;
        if let Some(outcome) = self.peek(&request.key).await.and_then(ResearchOutcome::served) {
            debug!("Served by a concurrent generation");
            return Ok(outcome);
        }

        let narration = self.spawn_narration(request).await;
        let generated = self.artifact.generate(request).await.map_err(|e| {
            warn!(code = e.code(), "Research generation failed: {}", e);
            e
        })?;

        let created_at = Utc::now();
        let entry = CacheEntry::for_artifact(
            &request.key,
            generated.artifact.clone(),
            generated.validity_hours,
            created_at,
        );
        match on_store(&self.store, move |store| store.put(entry)).await {
            Ok(()) => info!(validity_hours = generated.validity_hours, "Research artifact stored"),
            Err(e) => warn!(tier = self.store.name(), "Failed to store research artifact: {}", e),
        }

        let image = generated
            .image_description
            .map(|description| self.spawn_image_patch(&request.key, description));

        Ok(ResearchOutcome {
            artifact: generated.artifact,
            from_cache: false,
            created_at,
            validity_hours: generated.validity_hours,
            background: BackgroundWork { narration, image },
        })
    }

    /// Cached steps when present, otherwise a fresh narration which is
    /// written back. Never fails.
    #[instrument(skip(self, request), fields(key = %request.key))]
    pub async fn get_steps(&self, request: &ResearchRequest) -> Vec<String> {
        narrate_once(
            &self.store,
            &self.narrator,
            &self.narrations,
            request,
            self.placeholder_ttl_hours,
        )
        .await
    }

    /// Answers a question about the request, generating research first if
    /// none is cached.
    pub async fn chat(
        &self,
        request: &ResearchRequest,
        prior_turns: &[ChatTurn],
        question: &str,
    ) -> Result<String, GenerationError> {
        let artifact = match self.peek(&request.key).await.and_then(|e| e.artifact) {
            Some(artifact) => artifact,
            None => self.get_research(request).await?.artifact,
        };
        self.chat_about(request, &artifact, prior_turns, question).await
    }

    pub async fn chat_about(
        &self,
        request: &ResearchRequest,
        artifact: &ResearchArtifact,
        prior_turns: &[ChatTurn],
        question: &str,
    ) -> Result<String, GenerationError> {
        self.responder.ask(request, artifact, prior_turns, question).await
    }

    pub async fn extend_research(
        &self,
        request: &ResearchRequest,
        existing_titles: &[String],
    ) -> Result<Vec<FindingsGroup>, GenerationError> {
        self.extender.extend(request, existing_titles).await
    }

    /// Appends groups to the authoritative row. Returns whether a row changed.
    pub async fn append_groups(&self, key: &str, groups: Vec<FindingsGroup>) -> bool {
        let owned = key.to_string();
        let patch = EntryPatch::AppendGroups(groups);
        match on_store(&self.store, move |store| store.patch(&owned, &patch)).await {
            Ok(changed) => changed,
            Err(e) => {
                warn!("Failed to append groups for {}: {}", key, e);
                false
            }
        }
    }

    async fn spawn_narration(&self, request: &ResearchRequest) -> Option<JoinHandle<Vec<String>>> {
        if cached_steps(&self.store, &request.key).await.is_some() {
            return None;
        }

        let store = self.store.clone();
        let narrator = self.narrator.clone();
        let narrations = self.narrations.clone();
        let request = request.clone();
        let ttl = self.placeholder_ttl_hours;
        Some(tokio::spawn(async move {
            narrate_once(&store, &narrator, &narrations, &request, ttl).await
        }))
    }

    fn spawn_image_patch(&self, key: &str, description: String) -> JoinHandle<bool> {
        let store = self.store.clone();
        let images = self.images.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            let image = match images.generate_image(&description).await {
                Ok(Some(image)) => image,
                Ok(None) => {
                    debug!(key = %key, "Image synthesis returned no image");
                    return false;
                }
                Err(e) => {
                    debug!(key = %key, "Image synthesis failed: {}", e);
                    return false;
                }
            };
            let patch_key = key.clone();
            let patch = EntryPatch::Image(image);
            match on_store(&store, move |store| store.patch(&patch_key, &patch)).await {
                Ok(true) => {
                    info!(key = %key, "Research image patched");
                    true
                }
                Ok(false) => {
                    debug!(key = %key, "No stored artifact to patch");
                    false
                }
                Err(e) => {
                    warn!(key = %key, "Image patch failed: {}", e);
                    false
                }
            }
        })
    }
}

/// Runs a store call on the blocking pool.
async fn on_store<T, F>(store: &Arc<dyn CacheTier>, op: F) -> Result<T, CacheError>
where
    T: Send + 'static,
    F: FnOnce(&dyn CacheTier) -> Result<T, CacheError> + Send + 'static,
{
    let store = store.clone();
    match tokio::task::spawn_blocking(move || op(store.as_ref())).await {
        Ok(result) => result,
        Err(e) => Err(CacheError::Task(e.to_string())),
    }
}

async fn cached_steps(store: &Arc<dyn CacheTier>, key: &str) -> Option<Vec<String>> {
    let owned = key.to_string();
    match on_store(store, move |store| store.lookup_steps(&owned)).await {
        Ok(steps) => steps.filter(|s| !s.is_empty()),
        Err(e) => {
            warn!(tier = store.name(), "Steps lookup failed for {}: {}", key, e);
            None
        }
    }
}

/// One narration per key at a time; a waiter reuses the steps the holder
/// stored. Steps go into the existing row, or a short-lived placeholder
/// when the artifact has not been stored yet. Fallback steps are returned
/// but never stored.
async fn narrate_once(
    store: &Arc<dyn CacheTier>,
    narrator: &StepNarrator,
    narrations: &KeyedLocks,
    request: &ResearchRequest,
    ttl_hours: u32,
) -> Vec<String> {
    let _claim = narrations.acquire(&request.key).await;
    if let Some(steps) = cached_steps(store, &request.key).await {
        return steps;
    }

    let narration = narrator.narrate(request).await;
    if narration.fallback {
        return narration.steps;
    }
    let placeholder = CacheEntry::placeholder(&request.key, narration.steps.clone(), ttl_hours, Utc::now());
    if let Err(e) = on_store(store, move |store| store.put_steps(placeholder)).await {
        warn!(tier = store.name(), "Failed to store narration steps for {}: {}", request.key, e);
    }
    narration.steps
}
