use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};

use crate::models::{TranscriptRow, REQUIRED_COLUMNS};

pub fn load_transcripts(path: &Path) -> anyhow::Result<Vec<TranscriptRow>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("csv") => load_csv(path),
        Some("json") => load_json(path),
        _ => bail!(
            "unsupported transcript file {} (expected .csv or .json)",
            path.display()
        ),
    }
}

pub fn load_csv(path: &Path) -> anyhow::Result<Vec<TranscriptRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|header| header == *column))
        .collect();
    if !missing.is_empty() {
        bail!(
            "CSV file must contain all required columns: {} (missing {})",
            REQUIRED_COLUMNS.join(", "),
            missing.join(", ")
        );
    }

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<TranscriptRow>().enumerate() {
        let row = result.with_context(|| format!("invalid transcript on data line {}", index + 1))?;
        rows.push(row);
    }

    Ok(rows)
}

pub fn load_json(path: &Path) -> anyhow::Result<Vec<TranscriptRow>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let document: serde_json::Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    parse_json_rows(document)
}

fn parse_json_rows(document: serde_json::Value) -> anyhow::Result<Vec<TranscriptRow>> {
    let serde_json::Value::Array(items) = document else {
        bail!("JSON file must contain a list of transcript objects");
    };

    let mut rows = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Some(object) = item.as_object() else {
            bail!("transcript entry {index} is not an object");
        };
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|column| !object.contains_key(*column))
            .collect();
        if !missing.is_empty() {
            bail!(
                "JSON file must contain all required columns: {} (entry {index} is missing {})",
                REQUIRED_COLUMNS.join(", "),
                missing.join(", ")
            );
        }
        let row: TranscriptRow = serde_json::from_value(item)
            .with_context(|| format!("invalid transcript entry {index}"))?;
        rows.push(row);
    }

    Ok(rows)
}

pub fn save_transcripts(path: &Path, rows: &[TranscriptRow]) -> anyhow::Result<()> {
    let body = serde_json::to_vec_pretty(rows)?;
    std::fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Demo transcripts for running without a warehouse.
pub fn sample_rows(now: DateTime<Utc>) -> Vec<TranscriptRow> {
    let rows = vec![
        (
            "SupportBot",
            "conv1",
            "m1",
            "How can I help you?",
            "I can help you with that.",
            Duration::hours(2),
        ),
        (
            "SupportBot",
            "conv1",
            "m2",
            "I need help with my order",
            "Could you provide your order number?",
            Duration::minutes(115),
        ),
        (
            "SupportBot",
            "conv2",
            "m3",
            "What seems to be the problem?",
            "I understand. Let me check that for you.",
            Duration::minutes(110),
        ),
        (
            "SalesBot",
            "conv3",
            "m4",
            "Hello, I want to buy a product",
            "Welcome! I can help you with your purchase.",
            Duration::hours(1),
        ),
        (
            "SalesBot",
            "conv3",
            "m5",
            "Which product are you interested in?",
            "We have several products available.",
            Duration::minutes(55),
        ),
    ];

    rows.into_iter()
        .map(
            |(bot_name, conversation_id, message_id, utterance, response, age)| TranscriptRow {
                bot_name: bot_name.to_string(),
                conversation_id: conversation_id.to_string(),
                message_id: message_id.to_string(),
                utterance: utterance.to_string(),
                response: response.to_string(),
                timestamp: now - age,
            },
        )
        .collect()
}
