use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};

use crate::models::{ScoreRecord, SCORE_FIELDS};

/// Destination for an exported score blob.
pub trait ScoreSink {
    /// Stores `body` under `key` and returns where it landed.
    fn put(&self, key: &str, body: &[u8]) -> anyhow::Result<String>;
}

pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ScoreSink for DirectorySink {
    fn put(&self, key: &str, body: &[u8]) -> anyhow::Result<String> {
        validate_key(key)?;
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path.display().to_string())
    }
}

fn validate_key(key: &str) -> anyhow::Result<()> {
    if key.trim().is_empty() {
        bail!("export key must not be empty");
    }
    let path = Path::new(key);
    if path
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        bail!("export key '{key}' must be a relative name without '..'");
    }
    Ok(())
}

pub fn default_export_key(now: DateTime<Utc>) -> String {
    format!("conversation_scores_{}.json", now.format("%Y%m%d_%H%M%S"))
}

/// JSON array of score objects with ISO-8601 `datetime` values.
pub fn scores_to_json(records: &[ScoreRecord]) -> anyhow::Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(records)?)
}

pub fn scores_from_json(body: &[u8]) -> anyhow::Result<Vec<ScoreRecord>> {
    let records: Vec<ScoreRecord> =
        serde_json::from_slice(body).context("score file must be a JSON array of score records")?;
    for record in &records {
        for (field, score) in SCORE_FIELDS.iter().zip(record.scores()) {
            if !(1..=5).contains(&score) {
                bail!(
                    "conversation {} has {field} = {score}, outside the 1-5 range",
                    record.conversation_id
                );
            }
        }
    }
    Ok(records)
}

pub fn export_scores(
    sink: &dyn ScoreSink,
    key: &str,
    records: &[ScoreRecord],
) -> anyhow::Result<String> {
    let body = scores_to_json(records)?;
    let location = sink.put(key, &body)?;
    tracing::info!(records = records.len(), %location, "scores exported");
    Ok(location)
}

pub fn save_scores(path: &Path, records: &[ScoreRecord]) -> anyhow::Result<()> {
    let body = scores_to_json(records)?;
    std::fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn load_scores(path: &Path) -> anyhow::Result<Vec<ScoreRecord>> {
    let body = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    scores_from_json(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample_scores() -> Vec<ScoreRecord> {
        vec![
            ScoreRecord {
                conversation_id: "conv1".to_string(),
                bot_name: "SupportBot".to_string(),
                timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap(),
                summary: "Customer needed help with order".to_string(),
                satisfaction_score: 4,
                accuracy_score: 4,
                relevancy_score: 4,
                containment_score: 4,
            },
            ScoreRecord {
                conversation_id: "conv2".to_string(),
                bot_name: "SalesBot".to_string(),
                timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap(),
                summary: "Customer wanted to buy a product".to_string(),
                satisfaction_score: 5,
                accuracy_score: 5,
                relevancy_score: 5,
                containment_score: 5,
            },
        ]
    }

    #[test]
    fn export_format_uses_expected_keys() {
        let body = scores_to_json(&sample_scores()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let first = value.as_array().unwrap()[0].as_object().unwrap();

        let mut keys: Vec<&str> = first.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "accuracy_score",
                "bot_name",
                "containment_score",
                "conversation_id",
                "datetime",
                "relevancy_score",
                "satisfaction_score",
                "summary"
            ]
        );
        assert_eq!(first["datetime"], "2024-03-05T14:00:00Z");
    }

    #[test]
    fn export_round_trip_preserves_records() {
        let records = sample_scores();
        let parsed = scores_from_json(&scores_to_json(&records).unwrap()).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn directory_sink_writes_blob() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path());

        let location = export_scores(&sink, "exports/scores.json", &sample_scores()).unwrap();
        let written = std::fs::read(dir.path().join("exports/scores.json")).unwrap();

        assert!(location.ends_with("scores.json"));
        assert_eq!(scores_from_json(&written).unwrap().len(), 2);
    }

    #[test]
    fn directory_sink_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path());

        assert!(sink.put("../outside.json", b"[]").is_err());
        assert!(sink.put("/tmp/abs.json", b"[]").is_err());
        assert!(sink.put("  ", b"[]").is_err());
    }

    #[test]
    fn default_key_is_timestamped() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 9, 7, 3).unwrap();
        assert_eq!(default_export_key(now), "conversation_scores_20240305_090703.json");
    }

    #[test]
    fn saved_scores_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.json");
        save_scores(&path, &sample_scores()).unwrap();
        assert_eq!(load_scores(&path).unwrap(), sample_scores());
    }

    #[test]
    fn rejects_non_array_score_file() {
        assert!(scores_from_json(br#"{"conversation_id": "conv1"}"#).is_err());
    }

    #[test]
    fn rejects_out_of_range_scores_in_file() {
        let body = br#"[{
            "conversation_id": "conv1",
            "bot_name": "SupportBot",
            "datetime": "2024-03-05T14:00:00Z",
            "summary": "bad scores",
            "satisfaction_score": 9,
            "accuracy_score": 0,
            "relevancy_score": 200,
            "containment_score": 3
        }]"#;

        let error = scores_from_json(body).unwrap_err().to_string();
        assert!(error.contains("conv1"), "{error}");
        assert!(error.contains("satisfaction_score = 9"), "{error}");
    }

    #[test]
    fn saving_empty_set_replaces_previous_scores() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.json");
        save_scores(&path, &sample_scores()).unwrap();

        save_scores(&path, &[]).unwrap();
        assert!(load_scores(&path).unwrap().is_empty());
    }
}
