use std::path::PathBuf;

use anyhow::Context;
use progress_sim::STEP_INTERVAL;
use research_engine::ValidityWindow;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub kalshi: KalshiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the gateway key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_gateway_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_gateway_retries")]
    pub max_retries: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_base_url(),
            api_key_env: default_api_key_env(),
            timeout_ms: default_gateway_timeout(),
            max_retries: default_gateway_retries(),
        }
    }
}

impl GatewayConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_research_model")]
    pub research: String,
    #[serde(default = "default_steps_model")]
    pub steps: String,
    #[serde(default = "default_chat_model")]
    pub chat: String,
    #[serde(default = "default_research_model")]
    pub extend: String,
    #[serde(default = "default_image_model")]
    pub image: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            research: default_research_model(),
            steps: default_steps_model(),
            chat: default_chat_model(),
            extend: default_research_model(),
            image: default_image_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KalshiConfig {
    #[serde(default)]
    pub use_demo: bool,
    /// Empty means the public production endpoint.
    #[serde(default)]
    pub api_base: String,
    #[serde(default = "default_reads_per_sec")]
    pub reads_per_sec: u32,
}

impl Default for KalshiConfig {
    fn default() -> Self {
        Self {
            use_demo: false,
            api_base: String::new(),
            reads_per_sec: default_reads_per_sec(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
    /// Client-durable tier directory; unset keeps the client cache in memory.
    #[serde(default)]
    pub durable_dir: Option<PathBuf>,
    #[serde(default = "default_placeholder_ttl")]
    pub placeholder_ttl_hours: u32,
    #[serde(default = "default_validity_hours")]
    pub default_validity_hours: u32,
    #[serde(default = "default_min_validity")]
    pub min_validity_hours: u32,
    #[serde(default = "default_max_validity")]
    pub max_validity_hours: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
            durable_dir: None,
            placeholder_ttl_hours: default_placeholder_ttl(),
            default_validity_hours: default_validity_hours(),
            min_validity_hours: default_min_validity(),
            max_validity_hours: default_max_validity(),
        }
    }
}

impl CacheConfig {
    pub fn validity_window(&self) -> ValidityWindow {
        ValidityWindow {
            default_hours: self.default_validity_hours,
            min_hours: self.min_validity_hours,
            max_hours: self.max_validity_hours,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_step_interval")]
    pub step_interval_ms: u64,
    /// Authoritative re-reads while waiting for the background image.
    #[serde(default = "default_image_poll_attempts")]
    pub image_poll_attempts: u32,
    #[serde(default = "default_image_poll_interval")]
    pub image_poll_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            step_interval_ms: default_step_interval(),
            image_poll_attempts: default_image_poll_attempts(),
            image_poll_interval_ms: default_image_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

fn default_gateway_base_url() -> String {
    "https://ai.gateway.lovable.dev".into()
}

fn default_api_key_env() -> String {
    "LOVABLE_API_KEY".into()
}

fn default_gateway_timeout() -> u64 {
    60_000
}

fn default_gateway_retries() -> u32 {
    2
}

fn default_research_model() -> String {
    "google/gemini-2.5-flash".into()
}

fn default_steps_model() -> String {
    "google/gemini-2.5-flash-lite".into()
}

fn default_chat_model() -> String {
    "openai/gpt-5-mini".into()
}

fn default_image_model() -> String {
    "google/gemini-2.5-flash-image".into()
}

fn default_reads_per_sec() -> u32 {
    20
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("data/research-cache.sqlite")
}

fn default_placeholder_ttl() -> u32 {
    1
}

fn default_validity_hours() -> u32 {
    24
}

fn default_min_validity() -> u32 {
    1
}

fn default_max_validity() -> u32 {
    168
}

fn default_step_interval() -> u64 {
    STEP_INTERVAL.as_millis() as u64
}

fn default_image_poll_attempts() -> u32 {
    3
}

fn default_image_poll_interval() -> u64 {
    2_000
}

impl AppConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        let cache = &config.cache;
        if cache.min_validity_hours == 0 || cache.min_validity_hours > cache.max_validity_hours {
            anyhow::bail!(
                "invalid validity bounds: min {} max {}",
                cache.min_validity_hours,
                cache.max_validity_hours
            );
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.progress.step_interval_ms, 1_800);
        assert_eq!(
            std::time::Duration::from_millis(config.progress.step_interval_ms),
            STEP_INTERVAL
        );
        assert_eq!(config.cache.placeholder_ttl_hours, 1);
        assert_eq!(config.cache.validity_window(), ValidityWindow::default());
        assert_eq!(config.models.extend, config.models.research);
        assert!(!config.logging.json);
        assert!(config.cache.durable_dir.is_none());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = AppConfig::parse(
            r#"
[gateway]
base_url = "http://127.0.0.1:8080"

[cache]
sqlite_path = "/tmp/cache.sqlite"
durable_dir = "/tmp/client"
max_validity_hours = 72

[logging]
json = true
"#,
        )
        .unwrap();
        assert_eq!(config.gateway.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.gateway.api_key_env, "LOVABLE_API_KEY");
        assert_eq!(config.cache.validity_window().max_hours, 72);
        assert_eq!(config.cache.durable_dir, Some(PathBuf::from("/tmp/client")));
        assert!(config.logging.json);
    }

    #[test]
    fn test_rejects_inverted_validity_bounds() {
        let err = AppConfig::parse("[cache]\nmin_validity_hours = 10\nmax_validity_hours = 5\n").unwrap_err();
        assert!(err.to_string().contains("invalid validity bounds"));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[kalshi]\nuse_demo = true\n").unwrap();
        let config = AppConfig::load(path.to_str().unwrap()).unwrap();
        assert!(config.kalshi.use_demo);
        assert_eq!(config.kalshi.reads_per_sec, 20);
    }
}
