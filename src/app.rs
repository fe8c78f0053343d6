use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use common::{emphasis_spans, FindingsGroup, Outcome, ResearchArtifact, ResearchRequest, Span};
use kalshi_client::{EventFilter, KalshiRestClient};
use llm_client::{GatewayClient, GatewaySettings, GenerationError};
use progress_sim::{ProgressTicker, ProgressView};
use research_cache::{LocalCache, SqliteTier};
use research_engine::{ArtifactGenerator, ResearchChat, ResearchExtender, StepNarrator};
use research_orchestrator::{Generators, Orchestrator, ResearchOutcome, ResearchSession};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::journal::{resolve_journal_dir, ResearchJournal};

pub struct App {
    config: AppConfig,
    kalshi: KalshiRestClient,
    session: ResearchSession,
    journal: ResearchJournal,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let api_base = Some(config.kalshi.api_base.as_str()).filter(|b| !b.trim().is_empty());
        let kalshi = KalshiRestClient::new(api_base, config.kalshi.use_demo, config.kalshi.reads_per_sec)
            .context("building Kalshi client")?;

        let api_key = config.gateway.api_key();
        if api_key.is_none() {
            warn!(
                "{} is not set; research generation will fail with a configuration error",
                config.gateway.api_key_env
            );
        }
        let gateway = Arc::new(
            GatewayClient::new(GatewaySettings {
                base_url: config.gateway.base_url.clone(),
                api_key,
                image_model: config.models.image.clone(),
                timeout_ms: config.gateway.timeout_ms,
                max_retries: config.gateway.max_retries,
            })
            .context("building gateway client")?,
        );

        let store = Arc::new(
            SqliteTier::open(&config.cache.sqlite_path)
                .with_context(|| format!("opening {}", config.cache.sqlite_path.display()))?,
        );
        let generators = Generators {
            artifact: ArtifactGenerator::new(
                gateway.clone(),
                config.models.research.clone(),
                config.cache.validity_window(),
            ),
            narrator: StepNarrator::new(gateway.clone(), config.models.steps.clone()),
            chat: ResearchChat::new(gateway.clone(), config.models.chat.clone()),
            extender: ResearchExtender::new(gateway.clone(), config.models.extend.clone()),
            images: gateway,
        };
        let orchestrator = Arc::new(Orchestrator::new(
            store,
            generators,
            config.cache.placeholder_ttl_hours,
        ));

        let local = match &config.cache.durable_dir {
            Some(dir) => LocalCache::with_durable_dir(dir)
                .with_context(|| format!("opening client cache in {}", dir.display()))?,
            None => LocalCache::in_memory(),
        };

        let journal = ResearchJournal::open(resolve_journal_dir()).context("opening research journal")?;
        info!(run_id = %journal.run_id(), "Research journal path: {}", journal.dir().display());

        Ok(Self {
            config,
            kalshi,
            session: ResearchSession::new(orchestrator, local),
            journal,
        })
    }

    async fn request_for(&self, ticker: &str) -> Result<ResearchRequest> {
        let detail = self
            .kalshi
            .get_event(ticker)
            .await
            .with_context(|| format!("fetching event {}", ticker))?;
        Ok(ResearchRequest::from_event(&detail.event, &detail.markets))
    }

    pub async fn events(&self, limit: u32, cursor: Option<&str>) -> Result<()> {
        let filter = EventFilter { limit, ..EventFilter::default() };
        let page = self.kalshi.list_events(cursor, &filter).await?;
        for event in &page.events {
            println!("{:<28} {} [{}]", event.event_ticker, event.title, event.category);
        }
        if let Some(next) = page.cursor {
            println!("\nnext cursor: {}", next);
        }
        Ok(())
    }

    pub async fn hot(&self, limit: usize) -> Result<()> {
        for event in self.kalshi.hot_events(limit).await? {
            println!(
                "{:<28} {} [{}] volume {}",
                event.event_ticker,
                event.title,
                event.category,
                event.total_volume.unwrap_or_default()
            );
        }
        Ok(())
    }

    pub async fn research(&mut self, ticker: &str) -> Result<()> {
        let request = self.request_for(ticker).await?;
        self.journal.requested(&request.key);
        let step_interval = Duration::from_millis(self.config.progress.step_interval_ms);

        let progress = ProgressTicker::spawn(Vec::new(), step_interval);
        let printer = spawn_progress_printer(progress.subscribe());
        let result = {
            let research = self.session.research(&request);
            let steps = self.session.steps(&request);
            tokio::pin!(research, steps);
            let mut steps_pending = true;
            loop {
                tokio::select! {
                    steps = &mut steps, if steps_pending => {
                        steps_pending = false;
                        progress.reset(steps);
                    }
                    result = &mut research => break result,
                }
            }
        };
        progress.complete();
        if let Err(e) = printer.await {
            warn!("Progress display failed: {}", e);
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.record_failure(&request, e)),
        };
        self.journal.served(&request.key, outcome.from_cache, outcome.validity_hours);
        print_artifact(&request, &outcome.artifact, outcome.from_cache);

        if let Some(image) = self.wait_for_image(&request, outcome).await {
            println!("\nImage: {}", describe_image(&image));
        }
        Ok(())
    }

    async fn wait_for_image(&mut self, request: &ResearchRequest, outcome: ResearchOutcome) -> Option<String> {
        if outcome.artifact.image.is_some() {
            return outcome.artifact.image;
        }
        if outcome.background.image.is_some() {
            let report = outcome.background.join().await;
            if !report.image_patched {
                return None;
            }
            self.journal.image_patched(&request.key);
            return self.session.refresh_image(request, 1, Duration::ZERO).await;
        }
        let progress = &self.config.progress;
        self.session
            .refresh_image(
                request,
                progress.image_poll_attempts,
                Duration::from_millis(progress.image_poll_interval_ms),
            )
            .await
    }

    pub async fn steps(&self, ticker: &str) -> Result<()> {
        let request = self.request_for(ticker).await?;
        for (i, step) in self.session.steps(&request).await.iter().enumerate() {
            println!("{}. {}", i + 1, step);
        }
        Ok(())
    }

    pub async fn more(&mut self, ticker: &str) -> Result<()> {
        let request = self.request_for(ticker).await?;
        let groups = match self.session.extend(&request).await {
            Ok(groups) => groups,
            Err(e) => return Err(self.record_failure(&request, e)),
        };
        if groups.is_empty() {
            println!("No new angles found.");
        }
        for group in &groups {
            print_group(group);
        }
        Ok(())
    }

    pub async fn chat(&mut self, ticker: &str, question: &str) -> Result<()> {
        let request = self.request_for(ticker).await?;
        match self.session.chat(&request, &[], question).await {
            Ok(answer) => {
                println!("{}", answer);
                Ok(())
            }
            Err(e) => Err(self.record_failure(&request, e)),
        }
    }

    fn record_failure(&mut self, request: &ResearchRequest, error: GenerationError) -> anyhow::Error {
        self.journal.failed(&request.key, error.code(), &error.to_string());
        let hint = match &error {
            GenerationError::RateLimited { retry_after_ms } => {
                format!("rate limited, retry in {}s", retry_after_ms / 1_000)
            }
            e if e.is_retryable() => "temporary failure, try again".to_string(),
            _ => "research failed".to_string(),
        };
        anyhow::Error::new(error).context(format!("{} ({})", hint, request.key))
    }
}

/// Prints each step once it is done. Returns when the view completes or
/// the ticker goes away.
fn spawn_progress_printer(mut views: watch::Receiver<ProgressView>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut printed = 0usize;
        loop {
            let view = views.borrow_and_update().clone();
            printed = printed.min(view.completed);
            while printed < view.completed.min(view.steps.len()) {
                println!("  ✓ {}", view.steps[printed]);
                printed += 1;
            }
            if view.complete || views.changed().await.is_err() {
                break;
            }
        }
    })
}

fn render_bullet(text: &str) -> String {
    emphasis_spans(text)
        .into_iter()
        .map(|span| match span {
            Span::Plain(s) => s.to_string(),
            Span::Emphasis(s) => format!("\x1b[1m{}\x1b[0m", s),
        })
        .collect()
}

fn print_group(group: &FindingsGroup) {
    println!("\n{} ({:?}, {:?} confidence)", group.title, group.icon, group.confidence);
    for bullet in &group.bullets {
        println!("  - {}", render_bullet(bullet));
    }
}

fn percent(probability: f64) -> String {
    format!("{:.0}%", probability * 100.0)
}

fn print_artifact(request: &ResearchRequest, artifact: &ResearchArtifact, from_cache: bool) {
    println!("\n{}{}", request.title, if from_cache { " (cached)" } else { "" });
    for group in &artifact.groups {
        print_group(group);
    }

    let probability = &artifact.probability;
    println!(
        "\nEstimate: {} ({:?} confidence)\n{}",
        percent(probability.estimate),
        probability.confidence,
        probability.reasoning
    );
    match &artifact.outcome {
        Outcome::Binary => {}
        Outcome::Candidates { candidates } => {
            for candidate in candidates {
                println!("  {:<32} {}", candidate.name, percent(candidate.probability));
            }
        }
        Outcome::Thresholds { thresholds } => {
            for threshold in thresholds {
                println!("  {:<32} {}", threshold.level, percent(threshold.probability));
            }
        }
    }
}

fn describe_image(image: &str) -> String {
    if image.starts_with("data:") {
        format!("inline data ({} bytes)", image.len())
    } else {
        image.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_bullet_bolds_emphasis() {
        assert_eq!(
            render_bullet("Won **3 of 4** finals"),
            "Won \x1b[1m3 of 4\x1b[0m finals"
        );
        assert_eq!(render_bullet("no markers"), "no markers");
    }

    #[test]
    fn test_describe_image() {
        assert_eq!(describe_image("data:image/png;base64,AAAA"), "inline data (26 bytes)");
        assert_eq!(describe_image("https://img.test/a.png"), "https://img.test/a.png");
    }

    #[test]
    fn test_percent_rounds() {
        assert_eq!(percent(0.314), "31%");
        assert_eq!(percent(1.0), "100%");
    }
}
