//! Research request and artifact data model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::market::{KalshiEvent, KalshiMarket};

/// An outcome name and its observed market price, fed to the generator as a
/// starting point for multi-candidate questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCandidate {
    pub name: String,
    pub price: f64,
}

/// Immutable description of a prediction-market question to research.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchRequest {
    /// Stable cache partition key (the event ticker).
    pub key: String,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub market_price: Option<f64>,
    #[serde(default)]
    pub market_candidates: Vec<MarketCandidate>,
}

impl ResearchRequest {
    pub fn new(key: impl Into<String>, title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            category: category.into(),
            details: String::new(),
            market_price: None,
            market_candidates: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_market_price(mut self, price: f64) -> Self {
        self.market_price = Some(price);
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<MarketCandidate>) -> Self {
        self.market_candidates = candidates;
        self
    }

    /// Builds a request from an event and its markets.
    ///
    /// A single market contributes its yes price; several markets become the
    /// candidate list.
    pub fn from_event(event: &KalshiEvent, markets: &[KalshiMarket]) -> Self {
        let category = if event.category.trim().is_empty() {
            "General".to_string()
        } else {
            event.category.clone()
        };
        let mut request = Self::new(&event.event_ticker, &event.title, category)
            .with_details(&event.sub_title);

        match markets {
            [] => {}
            [only] => request.market_price = only.yes_probability(),
            many => {
                request.market_candidates = many
                    .iter()
                    .filter_map(|m| {
                        m.yes_probability().map(|price| MarketCandidate {
                            name: m.outcome_name().to_string(),
                            price,
                        })
                    })
                    .collect();
            }
        }
        request
    }

    /// Classifies the question by its phrasing.
    pub fn question_kind(&self) -> QuestionKind {
        let title = self.title.to_lowercase();
        const THRESHOLD_PHRASES: [&str; 5] = ["how high", "how much", "how many", "how low", "how far"];
        const CANDIDATE_PHRASES: [&str; 5] = ["who will", "which ", "what will", "winner", "nominee"];

        if THRESHOLD_PHRASES.iter().any(|p| title.contains(p)) {
            return QuestionKind::Threshold;
        }
        if !self.market_candidates.is_empty()
            || title.starts_with("who ")
            || CANDIDATE_PHRASES.iter().any(|p| title.contains(p))
        {
            return QuestionKind::MultiCandidate;
        }
        QuestionKind::Binary
    }
}

/// How a question resolves, which decides the artifact's outcome shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Binary,
    MultiCandidate,
    Threshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FindingIcon {
    History,
    Trending,
    Stats,
    Health,
    Clock,
    Map,
    Trophy,
    Cloud,
    Brain,
    Users,
    News,
    Alert,
    #[default]
    #[serde(other)]
    General,
}

/// A titled, confidence-tagged cluster of bullets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FindingsGroup {
    pub title: String,
    #[serde(default)]
    pub icon: FindingIcon,
    pub confidence: Confidence,
    /// Each bullet carries at most one `**emphasis**` run.
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityFactor {
    pub name: String,
    pub suggested_probability: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProbabilityEstimate {
    /// Probability of YES, or of the top candidate.
    pub estimate: f64,
    #[serde(default)]
    pub factors: Vec<ProbabilityFactor>,
    pub reasoning: String,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Candidate {
    pub name: String,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Threshold {
    pub level: String,
    pub probability: f64,
}

/// Outcome breakdown. Candidates and thresholds never coexist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Binary,
    Candidates { candidates: Vec<Candidate> },
    Thresholds { thresholds: Vec<Threshold> },
}

/// The expensive research payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchArtifact {
    pub groups: Vec<FindingsGroup>,
    pub probability: ProbabilityEstimate,
    pub outcome: Outcome,
    /// Filled in by the background image patch; `None` is a valid final state.
    #[serde(default)]
    pub image: Option<String>,
}

impl ResearchArtifact {
    /// Assembles an artifact, collapsing empty breakdowns to `Binary` and
    /// pinning the estimate to the top candidate when candidates exist.
    pub fn new(groups: Vec<FindingsGroup>, mut probability: ProbabilityEstimate, outcome: Outcome) -> Self {
        let outcome = match outcome {
            Outcome::Candidates { candidates } if candidates.is_empty() => Outcome::Binary,
            Outcome::Thresholds { thresholds } if thresholds.is_empty() => Outcome::Binary,
            other => other,
        };
        if let Outcome::Candidates { candidates } = &outcome {
            if let Some(top) = candidates.iter().map(|c| c.probability).reduce(f64::max) {
                probability.estimate = top;
            }
        }
        Self {
            groups,
            probability,
            outcome,
            image: None,
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        match &self.outcome {
            Outcome::Candidates { candidates } => candidates,
            _ => &[],
        }
    }

    pub fn thresholds(&self) -> &[Threshold] {
        match &self.outcome {
            Outcome::Thresholds { thresholds } => thresholds,
            _ => &[],
        }
    }

    pub fn group_titles(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.title.clone()).collect()
    }
}

/// One prior turn of a research chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_estimate(estimate: f64) -> ProbabilityEstimate {
        ProbabilityEstimate {
            estimate,
            factors: vec![],
            reasoning: "test".into(),
            confidence: Confidence::Medium,
        }
    }

    fn make_market(ticker: &str, yes_bid: Option<f64>, sub_title: &str) -> KalshiMarket {
        KalshiMarket {
            ticker: ticker.into(),
            event_ticker: "EVT".into(),
            title: format!("Market {}", ticker),
            subtitle: String::new(),
            yes_bid,
            yes_ask: None,
            no_bid: None,
            no_ask: None,
            last_price: None,
            volume: Some(10),
            open_interest: None,
            status: "open".into(),
            close_time: None,
            yes_sub_title: sub_title.into(),
            no_sub_title: String::new(),
        }
    }

    fn make_event(category: &str) -> KalshiEvent {
        KalshiEvent {
            event_ticker: "EVT".into(),
            title: "Who will win?".into(),
            category: category.into(),
            sub_title: "Resolves in June".into(),
            mutually_exclusive: true,
            strike_date: None,
            markets: vec![],
            total_volume: None,
        }
    }

    #[test]
    fn test_top_candidate_pins_estimate() {
        let artifact = ResearchArtifact::new(
            vec![],
            make_estimate(0.2),
            Outcome::Candidates {
                candidates: vec![
                    Candidate { name: "X".into(), probability: 0.6 },
                    Candidate { name: "Y".into(), probability: 0.4 },
                ],
            },
        );
        assert_eq!(artifact.probability.estimate, 0.6);
        assert_eq!(artifact.candidates().len(), 2);
        assert!(artifact.thresholds().is_empty());
    }

    #[test]
    fn test_thresholds_keep_independent_estimate() {
        let artifact = ResearchArtifact::new(
            vec![],
            make_estimate(0.35),
            Outcome::Thresholds {
                thresholds: vec![Threshold { level: "Above 5%".into(), probability: 0.9 }],
            },
        );
        assert_eq!(artifact.probability.estimate, 0.35);
        assert!(artifact.candidates().is_empty());
    }

    #[test]
    fn test_empty_breakdown_collapses_to_binary() {
        let artifact = ResearchArtifact::new(
            vec![],
            make_estimate(0.5),
            Outcome::Candidates { candidates: vec![] },
        );
        assert_eq!(artifact.outcome, Outcome::Binary);
    }

    #[test]
    fn test_from_event_single_market_sets_price() {
        let event = make_event("");
        let request = ResearchRequest::from_event(&event, &[make_market("A", Some(42.0), "")]);
        assert_eq!(request.category, "General");
        assert_eq!(request.details, "Resolves in June");
        assert!((request.market_price.unwrap() - 0.42).abs() < 1e-9);
        assert!(request.market_candidates.is_empty());
    }

    #[test]
    fn test_from_event_many_markets_become_candidates() {
        let event = make_event("Politics");
        let markets = vec![
            make_market("A", Some(60.0), "Alice"),
            make_market("B", Some(0.3), ""),
            make_market("C", None, "Carol"),
        ];
        let request = ResearchRequest::from_event(&event, &markets);
        assert_eq!(request.market_price, None);
        assert_eq!(request.market_candidates.len(), 2);
        assert_eq!(request.market_candidates[0].name, "Alice");
        assert_eq!(request.market_candidates[1].name, "Market B");
        assert_eq!(request.question_kind(), QuestionKind::MultiCandidate);
    }

    #[test]
    fn test_question_kind_from_phrasing() {
        let kind = |title: &str| ResearchRequest::new("K", title, "Economics").question_kind();
        assert_eq!(kind("How high will unemployment get?"), QuestionKind::Threshold);
        assert_eq!(kind("Who will be the next pope?"), QuestionKind::MultiCandidate);
        assert_eq!(kind("Will the Fed cut rates in March?"), QuestionKind::Binary);
    }

    #[test]
    fn test_unknown_icon_maps_to_general() {
        let group: FindingsGroup = serde_json::from_str(
            r#"{"title": "Form", "icon": "rocket", "confidence": "high", "bullets": []}"#,
        )
        .unwrap();
        assert_eq!(group.icon, FindingIcon::General);
    }

    #[test]
    fn test_unknown_confidence_is_rejected() {
        let parsed: Result<FindingsGroup, _> = serde_json::from_str(
            r#"{"title": "Form", "confidence": "certain", "bullets": []}"#,
        );
        assert!(parsed.is_err());
    }
}
