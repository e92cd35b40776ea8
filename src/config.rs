use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone, Debug)]
pub struct EvaluatorConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub min_interval: Duration,
    pub max_chars: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.5,
            max_tokens: 1000,
            timeout: Duration::from_secs(60),
            min_interval: Duration::from_millis(100),
            max_chars: 24_000,
        }
    }
}

impl EvaluatorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unparsable values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup("EVALUATOR_API_KEY") {
            if !v.trim().is_empty() {
                cfg.api_key = Some(v.trim().to_string());
            }
        }
        if let Some(v) = lookup("EVALUATOR_BASE_URL") {
            cfg.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("EVALUATOR_MODEL") {
            cfg.model = v;
        }
        if let Some(v) = lookup("EVALUATOR_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                cfg.timeout = Duration::from_secs(n);
            }
        }
        if let Some(v) = lookup("EVALUATOR_MIN_INTERVAL_MS") {
            if let Ok(n) = v.parse() {
                cfg.min_interval = Duration::from_millis(n);
            }
        }
        if let Some(v) = lookup("EVALUATOR_MAX_CHARS") {
            if let Ok(n) = v.parse() {
                cfg.max_chars = n;
            }
        }
        cfg
    }
}
