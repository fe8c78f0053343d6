use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{Confidence, FindingsGroup, Outcome, ProbabilityEstimate, ResearchArtifact, ResearchRequest};
use llm_client::{CompletionRequest, GenerationError, ImageGenerator, TextGenerator};
use research_cache::{CacheEntry, CacheError, CacheTier, EntryPatch, SqliteTier};
use research_engine::{ArtifactGenerator, ResearchChat, ResearchExtender, StepNarrator, ValidityWindow};

use crate::orchestrator::{Generators, Orchestrator};

pub const CANDIDATE_REPLY: &str = r#"```json
{
  "categories": [
    {"title": "Form", "icon": "trending", "confidence": "high",
     "bullets": ["X has won **14 straight matches** on hard courts."]}
  ],
  "candidates": [
    {"name": "X", "probability": 0.6},
    {"name": "Y", "probability": 0.4}
  ],
  "probability": {"estimate": 0.5, "factors": [], "reasoning": "X is in form.", "confidence": "medium"},
  "imagePrompt": "A packed tennis stadium at night",
  "validityHours": 6
}
```"#;

const STEPS_REPLY: &str = r#"["Head-to-head record", "Recent injuries"]"#;
const CHAT_REPLY: &str = "Sinner leads the head-to-head.";
const EXTEND_REPLY: &str = r#"{"categories": [
  {"title": "form", "confidence": "low", "bullets": []},
  {"title": "Surface", "icon": "map", "confidence": "medium", "bullets": ["Hard courts favour **X**."]}
]}"#;

/// Text generator keyed on the model name of each call.
pub struct FakeText {
    research_reply: Mutex<Result<String, GenerationError>>,
    steps_reply: Result<String, GenerationError>,
    research_delay: Option<Duration>,
    research_calls: AtomicUsize,
    steps_calls: AtomicUsize,
}

impl FakeText {
    pub fn new() -> Self {
        Self {
            research_reply: Mutex::new(Ok(CANDIDATE_REPLY.to_string())),
            steps_reply: Ok(STEPS_REPLY.to_string()),
            research_delay: None,
            research_calls: AtomicUsize::new(0),
            steps_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_research_reply(self, reply: &str) -> Self {
        self.set_research_reply(Ok(reply.to_string()));
        self
    }

    pub fn with_research_error(self, error: GenerationError) -> Self {
        self.set_research_reply(Err(error));
        self
    }

    pub fn with_research_delay(mut self, delay: Duration) -> Self {
        self.research_delay = Some(delay);
        self
    }

    pub fn with_steps_error(mut self, error: GenerationError) -> Self {
        self.steps_reply = Err(error);
        self
    }

    pub fn set_research_reply(&self, reply: Result<String, GenerationError>) {
        *self.research_reply.lock().unwrap() = reply;
    }

    pub fn research_calls(&self) -> usize {
        self.research_calls.load(Ordering::SeqCst)
    }

    pub fn steps_calls(&self) -> usize {
        self.steps_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FakeText {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GenerationError> {
        match request.model.as_str() {
            "research-model" => {
                self.research_calls.fetch_add(1, Ordering::SeqCst);
                if let Some(delay) = self.research_delay {
                    tokio::time::sleep(delay).await;
                }
                self.research_reply.lock().unwrap().clone()
            }
            "steps-model" => {
                self.steps_calls.fetch_add(1, Ordering::SeqCst);
                self.steps_reply.clone()
            }
            "chat-model" => Ok(CHAT_REPLY.to_string()),
            "extend-model" => Ok(EXTEND_REPLY.to_string()),
            other => Err(GenerationError::Configuration(format!("unknown model {}", other))),
        }
    }
}

pub struct FakeImages {
    reply: Result<Option<String>, GenerationError>,
    pub calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeImages {
    fn with_reply(reply: Result<Option<String>, GenerationError>) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(image: &str) -> Self {
        Self::with_reply(Ok(Some(image.to_string())))
    }

    pub fn none() -> Self {
        Self::with_reply(Ok(None))
    }

    pub fn err(error: GenerationError) -> Self {
        Self::with_reply(Err(error))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate_image(&self, description: &str) -> Result<Option<String>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(description.to_string());
        self.reply.clone()
    }
}

/// Every operation fails, as an unreachable store would.
pub struct FailingStore;

impl CacheTier for FailingStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn get(&self, _key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Err(CacheError::Poisoned)
    }

    fn put(&self, _entry: CacheEntry) -> Result<(), CacheError> {
        Err(CacheError::Poisoned)
    }

    fn put_steps(&self, _placeholder: CacheEntry) -> Result<(), CacheError> {
        Err(CacheError::Poisoned)
    }

    fn patch(&self, _key: &str, _patch: &EntryPatch) -> Result<bool, CacheError> {
        Err(CacheError::Poisoned)
    }
}

/// Records the thread of every call before delegating to SQLite.
pub struct ThreadTrackingStore {
    inner: SqliteTier,
    threads: Mutex<Vec<std::thread::ThreadId>>,
}

impl ThreadTrackingStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteTier::open_in_memory().unwrap(),
            threads: Mutex::new(Vec::new()),
        }
    }

    pub fn threads(&self) -> Vec<std::thread::ThreadId> {
        self.threads.lock().unwrap().clone()
    }

    fn record(&self) {
        self.threads.lock().unwrap().push(std::thread::current().id());
    }
}

impl CacheTier for ThreadTrackingStore {
    fn name(&self) -> &'static str {
        "tracking"
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        self.record();
        self.inner.get(key)
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.record();
        self.inner.put(entry)
    }

    fn put_steps(&self, placeholder: CacheEntry) -> Result<(), CacheError> {
        self.record();
        self.inner.put_steps(placeholder)
    }

    fn patch(&self, key: &str, patch: &EntryPatch) -> Result<bool, CacheError> {
        self.record();
        self.inner.patch(key, patch)
    }
}

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn CacheTier>,
    pub text: Arc<FakeText>,
    pub images: Arc<FakeImages>,
}

pub fn make_harness(text: FakeText, images: FakeImages) -> Harness {
    make_harness_with_store(Arc::new(SqliteTier::open_in_memory().unwrap()), text, images)
}

pub fn make_harness_with_store(store: Arc<dyn CacheTier>, text: FakeText, images: FakeImages) -> Harness {
    let text = Arc::new(text);
    let images = Arc::new(images);
    let generators = Generators {
        artifact: ArtifactGenerator::new(text.clone(), "research-model", ValidityWindow::default()),
        narrator: StepNarrator::new(text.clone(), "steps-model"),
        chat: ResearchChat::new(text.clone(), "chat-model"),
        extender: ResearchExtender::new(text.clone(), "extend-model"),
        images: images.clone(),
    };
    Harness {
        orchestrator: Arc::new(Orchestrator::new(store.clone(), generators, 1)),
        store,
        text,
        images,
    }
}

pub fn make_request(key: &str) -> ResearchRequest {
    ResearchRequest::new(key, "Who will win the Australian Open?", "Sports")
}

pub fn make_stored_artifact(estimate: f64) -> ResearchArtifact {
    ResearchArtifact::new(
        vec![FindingsGroup {
            title: "History".into(),
            icon: Default::default(),
            confidence: Confidence::High,
            bullets: vec!["Won **4 of 5** finals.".into()],
        }],
        ProbabilityEstimate {
            estimate,
            factors: vec![],
            reasoning: "Stored.".into(),
            confidence: Confidence::Medium,
        },
        Outcome::Binary,
    )
}
