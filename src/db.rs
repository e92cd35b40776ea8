use anyhow::{bail, Context};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::ValueEnum;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::error::ConnectionError;
use crate::models::TranscriptRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WindowPreset {
    #[value(name = "last-24-hours")]
    Last24Hours,
    #[value(name = "last-7-days")]
    Last7Days,
    #[value(name = "last-30-days")]
    Last30Days,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn preset(preset: WindowPreset, now: DateTime<Utc>) -> Self {
        let span = match preset {
            WindowPreset::Last24Hours => Duration::days(1),
            WindowPreset::Last7Days => Duration::days(7),
            WindowPreset::Last30Days => Duration::days(30),
        };
        Self {
            start: now - span,
            end: now,
        }
    }

    /// Whole days from `start` through the end of `end`.
    pub fn custom(start: NaiveDate, end: NaiveDate) -> anyhow::Result<Self> {
        if start > end {
            bail!("start date {start} is after end date {end}");
        }
        let start = start.and_hms_opt(0, 0, 0).context("invalid start date")?;
        let end = end
            .and_hms_milli_opt(23, 59, 59, 999)
            .context("invalid end date")?;
        Ok(Self {
            start: start.and_utc(),
            end: end.and_utc(),
        })
    }
}

pub async fn connect(database_url: &str) -> Result<PgPool, ConnectionError> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|e| ConnectionError::new(format!("failed to connect to the transcript warehouse: {e}")))
}

pub async fn fetch_transcripts(
    pool: &PgPool,
    bot_name: &str,
    window: DateWindow,
) -> anyhow::Result<Vec<TranscriptRow>> {
    let records = sqlx::query(
        r#"
        SELECT bot_name, conversation_id, mid, utterance, response, datetime
        FROM transcripts
        WHERE bot_name = $1
        AND datetime BETWEEN $2 AND $3
        ORDER BY conversation_id, datetime
        "#,
    )
    .bind(bot_name)
    .bind(window.start)
    .bind(window.end)
    .fetch_all(pool)
    .await
    .context("failed to query transcripts")?;

    let mut rows = Vec::with_capacity(records.len());
    for row in records {
        rows.push(TranscriptRow {
            bot_name: row.try_get("bot_name")?,
            conversation_id: row.try_get("conversation_id")?,
            message_id: row.try_get("mid")?,
            utterance: row.try_get("utterance")?,
            response: row.try_get("response")?,
            timestamp: row.try_get("datetime")?,
        });
    }

    tracing::info!(bot_name, rows = rows.len(), start = %window.start, end = %window.end, "fetched transcripts");
    Ok(rows)
}
