//! Research artifact generation.
//!
//! One text-generation call produces findings, a probability estimate, an
//! optional candidate or threshold breakdown, an image description and the
//! generator's own validity window. Everything is validated here so the
//! rest of the system only ever sees a well-formed `ResearchArtifact`.

use std::sync::Arc;

use common::{
    Candidate, FindingsGroup, Outcome, ProbabilityEstimate, QuestionKind, ResearchArtifact,
    ResearchRequest, Threshold,
};
use llm_client::{parse_structured, ChatMessage, CompletionRequest, GenerationError, TextGenerator};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::prompts::{research_system_prompt, research_user_prompt};

const VAGUE_CANDIDATE_NAMES: [&str; 7] = [
    "other",
    "others",
    "none",
    "no one",
    "unknown",
    "status quo",
    "no clear successor",
];

/// Bounds applied to the generator-supplied validity window, in hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityWindow {
    pub default_hours: u32,
    pub min_hours: u32,
    pub max_hours: u32,
}

impl Default for ValidityWindow {
    fn default() -> Self {
        Self {
            default_hours: 24,
            min_hours: 1,
            max_hours: 168,
        }
    }
}

impl ValidityWindow {
    fn resolve(&self, requested: Option<f64>) -> u32 {
        match requested {
            Some(hours) if hours.is_finite() => {
                (hours.round().max(0.0) as u32).clamp(self.min_hours, self.max_hours)
            }
            _ => self.default_hours,
        }
    }
}

/// Wire shape requested from the model.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RawResearch {
    pub categories: Vec<FindingsGroup>,
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    pub thresholds: Option<Vec<Threshold>>,
    pub probability: ProbabilityEstimate,
    #[serde(default)]
    pub image_prompt: Option<String>,
    #[serde(default)]
    pub validity_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedArtifact {
    /// Always carries `image: None`; the image is patched in later.
    pub artifact: ResearchArtifact,
    pub image_description: Option<String>,
    pub validity_hours: u32,
}

pub struct ArtifactGenerator {
    text: Arc<dyn TextGenerator>,
    model: String,
    validity: ValidityWindow,
}

impl ArtifactGenerator {
    pub fn new(text: Arc<dyn TextGenerator>, model: impl Into<String>, validity: ValidityWindow) -> Self {
        Self {
            text,
            model: model.into(),
            validity,
        }
    }

    fn build_request(&self, request: &ResearchRequest) -> Result<CompletionRequest, GenerationError> {
        let schema = schemars::schema_for!(RawResearch);
        let schema_json = serde_json::to_string_pretty(&schema)
            .map_err(|e| GenerationError::Configuration(format!("schema rendering failed: {}", e)))?;

        Ok(CompletionRequest::new(&self.model)
            .system(research_system_prompt(&schema_json))
            .message(ChatMessage::user(research_user_prompt(request))))
    }

    #[instrument(skip(self, request), fields(key = %request.key))]
    pub async fn generate(&self, request: &ResearchRequest) -> Result<GeneratedArtifact, GenerationError> {
        if request.title.trim().is_empty() {
            return Err(GenerationError::Configuration("event title is required".into()));
        }

        let completion = self.build_request(request)?;
        let text = self.text.complete(completion).await?;
        let raw: RawResearch = parse_structured(&text)?;
        let generated = assemble(raw, request.question_kind(), &self.validity)?;

        debug!(
            groups = generated.artifact.groups.len(),
            validity_hours = generated.validity_hours,
            "Research artifact generated"
        );
        Ok(generated)
    }
}

fn check_probability(label: &str, value: f64) -> Result<(), GenerationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(GenerationError::MalformedOutput(format!(
            "{} probability out of range: {}",
            label, value
        )))
    }
}

fn is_vague(name: &str) -> bool {
    let normalized = name.trim().to_lowercase();
    normalized.is_empty() || VAGUE_CANDIDATE_NAMES.contains(&normalized.as_str())
}

/// Validates the wire payload and resolves the outcome variant.
pub fn assemble(
    raw: RawResearch,
    kind: QuestionKind,
    validity: &ValidityWindow,
) -> Result<GeneratedArtifact, GenerationError> {
    check_probability("estimate", raw.probability.estimate)?;

    let mut candidates = raw.candidates.unwrap_or_default();
    for candidate in &candidates {
        check_probability(&candidate.name, candidate.probability)?;
    }
    let before = candidates.len();
    candidates.retain(|c| !is_vague(&c.name));
    if candidates.len() != before {
        warn!("Dropped {} vague candidate(s)", before - candidates.len());
    }

    let thresholds = raw.thresholds.unwrap_or_default();
    for threshold in &thresholds {
        check_probability(&threshold.level, threshold.probability)?;
    }

    let outcome = match (candidates.is_empty(), thresholds.is_empty()) {
        (true, true) => Outcome::Binary,
        (false, true) => Outcome::Candidates { candidates },
        (true, false) => Outcome::Thresholds { thresholds },
        (false, false) => match kind {
            QuestionKind::MultiCandidate => Outcome::Candidates { candidates },
            QuestionKind::Threshold => Outcome::Thresholds { thresholds },
            QuestionKind::Binary => {
                return Err(GenerationError::MalformedOutput(
                    "both candidates and thresholds returned for a yes/no question".into(),
                ))
            }
        },
    };

    let image_description = raw
        .image_prompt
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    Ok(GeneratedArtifact {
        artifact: ResearchArtifact::new(raw.categories, raw.probability, outcome),
        image_description,
        validity_hours: validity.resolve(raw.validity_hours),
    })
}
