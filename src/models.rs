use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const REQUIRED_COLUMNS: [&str; 6] = [
    "bot_name",
    "conversation_id",
    "mid",
    "utterance",
    "response",
    "datetime",
];

pub const SCORE_FIELDS: [&str; 4] = [
    "satisfaction_score",
    "accuracy_score",
    "relevancy_score",
    "containment_score",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRow {
    pub bot_name: String,
    pub conversation_id: String,
    #[serde(rename = "mid")]
    pub message_id: String,
    pub utterance: String,
    pub response: String,
    #[serde(rename = "datetime", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub conversation_id: String,
    pub bot_name: String,
    pub timestamp: DateTime<Utc>,
    pub utterance_text: String,
    pub response_text: String,
}

impl Conversation {
    /// Text handed to the evaluator for this conversation.
    pub fn transcript_text(&self) -> String {
        format!(
            "Bot: {}\nUser: {}\nBot: {}",
            self.bot_name, self.utterance_text, self.response_text
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub summary: String,
    pub satisfaction_score: u8,
    pub accuracy_score: u8,
    pub relevancy_score: u8,
    pub containment_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub conversation_id: String,
    pub bot_name: String,
    #[serde(rename = "datetime", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub satisfaction_score: u8,
    pub accuracy_score: u8,
    pub relevancy_score: u8,
    pub containment_score: u8,
}

impl ScoreRecord {
    pub fn new(conversation: &Conversation, evaluation: Evaluation) -> Self {
        Self {
            conversation_id: conversation.conversation_id.clone(),
            bot_name: conversation.bot_name.clone(),
            timestamp: conversation.timestamp,
            summary: evaluation.summary,
            satisfaction_score: evaluation.satisfaction_score,
            accuracy_score: evaluation.accuracy_score,
            relevancy_score: evaluation.relevancy_score,
            containment_score: evaluation.containment_score,
        }
    }

    /// Scores in `SCORE_FIELDS` order.
    pub fn scores(&self) -> [u8; 4] {
        [
            self.satisfaction_score,
            self.accuracy_score,
            self.relevancy_score,
            self.containment_score,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ScoreMeans {
    pub satisfaction: f64,
    pub accuracy: f64,
    pub relevancy: f64,
    pub containment: f64,
}

impl ScoreMeans {
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.satisfaction,
            self.accuracy,
            self.relevancy,
            self.containment,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct BotSummary {
    pub bot_name: String,
    pub conversation_count: usize,
    pub means: ScoreMeans,
}

#[derive(Debug, Clone)]
pub struct DailyTrend {
    pub day: NaiveDate,
    pub conversation_count: usize,
    pub means: ScoreMeans,
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Some(value.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(value) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(value.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|value| value.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised datetime '{raw}'")))
}
