use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::config::EvaluatorConfig;
use crate::error::{ConnectionError, EvalError};
use crate::models::{Evaluation, SCORE_FIELDS};
use crate::throttle::RateLimit;

const TRUNCATION_MARKER: &str = "\n[conversation truncated]";

#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Scores one conversation. Exactly one outbound call per invocation.
    async fn evaluate(&self, conversation_text: &str) -> Result<Evaluation, EvalError>;
}

#[async_trait]
impl<T: Evaluator + ?Sized> Evaluator for &T {
    async fn evaluate(&self, conversation_text: &str) -> Result<Evaluation, EvalError> {
        (**self).evaluate(conversation_text).await
    }
}

pub fn build_prompt(conversation_text: &str) -> String {
    format!(
        r#"Please analyze the following conversation and provide:
1. A brief summary
2. A satisfaction score (1-5)
3. An accuracy score (1-5)
4. A relevancy score (1-5)
5. A containment score (1-5)

Conversation:
{conversation_text}

Respond with only a JSON object with exactly these fields:
{{
    "summary": "brief summary here",
    "satisfaction_score": number,
    "accuracy_score": number,
    "relevancy_score": number,
    "containment_score": number
}}"#
    )
}

/// Decodes the evaluator's completion text into a fully populated evaluation.
///
/// Surrounding whitespace and one Markdown code fence are tolerated. Anything
/// else that is not a JSON object with `summary` and four integer scores is
/// `MalformedResponse`; an integer score outside 1..=5 is `Validation`.
pub fn decode_evaluation(raw: &str) -> Result<Evaluation, EvalError> {
    let body = strip_code_fence(raw.trim());
    let value: Value = serde_json::from_str(body)
        .map_err(|e| EvalError::malformed(format!("response is not JSON: {e}")))?;
    let Value::Object(object) = value else {
        return Err(EvalError::malformed("response is not a JSON object"));
    };

    let summary = object
        .get("summary")
        .ok_or_else(|| EvalError::malformed("missing field 'summary'"))?
        .as_str()
        .ok_or_else(|| EvalError::malformed("field 'summary' is not a string"))?
        .to_string();

    let mut scores = [0u8; 4];
    for (slot, field) in scores.iter_mut().zip(SCORE_FIELDS) {
        *slot = score_field(&object, field)?;
    }

    Ok(Evaluation {
        summary,
        satisfaction_score: scores[0],
        accuracy_score: scores[1],
        relevancy_score: scores[2],
        containment_score: scores[3],
    })
}

fn score_field(object: &Map<String, Value>, field: &str) -> Result<u8, EvalError> {
    let value = object
        .get(field)
        .ok_or_else(|| EvalError::malformed(format!("missing field '{field}'")))?;
    let score = value
        .as_i64()
        .ok_or_else(|| EvalError::malformed(format!("field '{field}' is not an integer")))?;
    if !(1..=5).contains(&score) {
        return Err(EvalError::validation(field, score));
    }
    Ok(score as u8)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence line.
    match inner.find('\n') {
        Some(newline) => inner[newline + 1..].trim(),
        None => inner.trim(),
    }
}

/// Cuts `text` to at most `max_chars` characters, appending a marker when cut.
pub fn truncate_conversation(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => {
            let mut truncated = text[..byte_index].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            (truncated, true)
        }
        None => (text.to_string(), false),
    }
}

/// Evaluator backed by an OpenAI-compatible chat-completions endpoint.
pub struct HttpEvaluator {
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    max_chars: usize,
    rate_limit: RateLimit,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEvaluator")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("max_chars", &self.max_chars)
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}

impl HttpEvaluator {
    pub fn connect(config: &EvaluatorConfig, rate_limit: RateLimit) -> Result<Self, ConnectionError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ConnectionError::new("EVALUATOR_API_KEY must be set"))?;

        let base = reqwest::Url::parse(&config.base_url).map_err(|e| {
            ConnectionError::new(format!("invalid evaluator base url '{}': {e}", config.base_url))
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConnectionError::new(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: format!("{}/chat/completions", base.as_str().trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_chars: config.max_chars,
            rate_limit,
            client,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, EvalError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        self.rate_limit.acquire().await;

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EvalError::transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| EvalError::transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(EvalError::transport(format!("HTTP {status}: {text}")));
        }

        let envelope: Value = serde_json::from_str(&text)
            .map_err(|e| EvalError::malformed(format!("response envelope is not JSON: {e}")))?;

        envelope
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| EvalError::malformed("response envelope missing message content"))
    }
}

#[async_trait]
impl Evaluator for HttpEvaluator {
    async fn evaluate(&self, conversation_text: &str) -> Result<Evaluation, EvalError> {
        let (text, truncated) = truncate_conversation(conversation_text, self.max_chars);
        if truncated {
            tracing::warn!(
                max_chars = self.max_chars,
                original_chars = conversation_text.chars().count(),
                "conversation text truncated before scoring"
            );
        }

        let completion = self.complete(&build_prompt(&text)).await?;
        decode_evaluation(&completion)
    }
}
