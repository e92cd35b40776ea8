use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{BotSummary, DailyTrend, ScoreMeans, ScoreRecord, SCORE_FIELDS};

pub fn mean_scores(records: &[ScoreRecord]) -> Option<ScoreMeans> {
    if records.is_empty() {
        return None;
    }

    let mut totals = [0u64; 4];
    for record in records {
        for (total, score) in totals.iter_mut().zip(record.scores()) {
            *total += u64::from(score);
        }
    }

    let count = records.len() as f64;
    Some(ScoreMeans {
        satisfaction: totals[0] as f64 / count,
        accuracy: totals[1] as f64 / count,
        relevancy: totals[2] as f64 / count,
        containment: totals[3] as f64 / count,
    })
}

/// Count of each score value 1..=5, per score field.
pub fn distributions(records: &[ScoreRecord]) -> [[usize; 5]; 4] {
    let mut counts = [[0usize; 5]; 4];
    for record in records {
        for (field, score) in record.scores().into_iter().enumerate() {
            if (1..=5).contains(&score) {
                counts[field][usize::from(score) - 1] += 1;
            }
        }
    }
    counts
}

/// Pearson correlation between every pair of score fields.
///
/// `None` where either column has no variance.
pub fn correlation_matrix(records: &[ScoreRecord]) -> [[Option<f64>; 4]; 4] {
    let columns: Vec<Vec<f64>> = (0..4)
        .map(|field| {
            records
                .iter()
                .map(|record| f64::from(record.scores()[field]))
                .collect()
        })
        .collect();

    let mut matrix = [[None; 4]; 4];
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = pearson(&columns[i], &columns[j]);
        }
    }
    matrix
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() < 2 || xs.len() != ys.len() {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(covariance / (var_x.sqrt() * var_y.sqrt()))
}

pub fn summarize_by_bot(records: &[ScoreRecord]) -> Vec<BotSummary> {
    let mut groups: BTreeMap<&str, Vec<ScoreRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.bot_name.as_str())
            .or_default()
            .push(record.clone());
    }

    groups
        .into_iter()
        .filter_map(|(bot_name, group)| {
            mean_scores(&group).map(|means| BotSummary {
                bot_name: bot_name.to_string(),
                conversation_count: group.len(),
                means,
            })
        })
        .collect()
}

pub fn daily_trends(records: &[ScoreRecord]) -> Vec<DailyTrend> {
    let mut groups: BTreeMap<NaiveDate, Vec<ScoreRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.timestamp.date_naive())
            .or_default()
            .push(record.clone());
    }

    groups
        .into_iter()
        .filter_map(|(day, group)| {
            mean_scores(&group).map(|means| DailyTrend {
                day,
                conversation_count: group.len(),
                means,
            })
        })
        .collect()
}

fn label(field: &str) -> String {
    let mut words = Vec::new();
    for word in field.split('_') {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            words.push(first.to_uppercase().collect::<String>() + chars.as_str());
        }
    }
    words.join(" ")
}

fn means_row(means: &ScoreMeans) -> String {
    means
        .as_array()
        .iter()
        .map(|value| format!("{value:.2}"))
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn build_report(records: &[ScoreRecord]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Conversation Score Dashboard");
    let _ = writeln!(output);

    let Some(means) = mean_scores(records) else {
        let _ = writeln!(
            output,
            "No scores available. Score transcripts before building the dashboard."
        );
        return output;
    };

    let unique_bots: HashSet<&str> = records.iter().map(|r| r.bot_name.as_str()).collect();
    let _ = writeln!(output, "## Overall Statistics");
    let _ = writeln!(output, "- Total conversations: {}", records.len());
    let _ = writeln!(output, "- Unique bots: {}", unique_bots.len());
    let _ = writeln!(output, "- Average satisfaction: {:.2}", means.satisfaction);
    let _ = writeln!(output, "- Average accuracy: {:.2}", means.accuracy);
    let _ = writeln!(output);

    let _ = writeln!(output, "## Mean Scores");
    for (field, value) in SCORE_FIELDS.iter().zip(means.as_array()) {
        let _ = writeln!(output, "- {}: {:.2}", label(field), value);
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Score Distributions");
    let _ = writeln!(output, "| Score | 1 | 2 | 3 | 4 | 5 |");
    let _ = writeln!(output, "|---|---|---|---|---|---|");
    for (field, counts) in SCORE_FIELDS.iter().zip(distributions(records)) {
        let cells: Vec<String> = counts.iter().map(|c| c.to_string()).collect();
        let _ = writeln!(output, "| {} | {} |", label(field), cells.join(" | "));
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Score Correlations");
    let headers: Vec<String> = SCORE_FIELDS.iter().map(|f| label(f)).collect();
    let _ = writeln!(output, "| | {} |", headers.join(" | "));
    let _ = writeln!(output, "|---|---|---|---|---|");
    for (header, row) in headers.iter().zip(correlation_matrix(records)) {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                Some(value) => format!("{value:.2}"),
                None => "n/a".to_string(),
            })
            .collect();
        let _ = writeln!(output, "| {} | {} |", header, cells.join(" | "));
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Bot Performance Comparison");
    let _ = writeln!(output, "| Bot | Conversations | {} |", headers.join(" | "));
    let _ = writeln!(output, "|---|---|---|---|---|---|");
    for summary in summarize_by_bot(records) {
        let _ = writeln!(
            output,
            "| {} | {} | {} |",
            summary.bot_name,
            summary.conversation_count,
            means_row(&summary.means)
        );
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Score Trends Over Time");
    let _ = writeln!(output, "| Day | Conversations | {} |", headers.join(" | "));
    let _ = writeln!(output, "|---|---|---|---|---|---|");
    for trend in daily_trends(records) {
        let _ = writeln!(
            output,
            "| {} | {} | {} |",
            trend.day,
            trend.conversation_count,
            means_row(&trend.means)
        );
    }

    output
}
