use crate::aggregate::group_conversations;
use crate::error::{ConnectionError, EvalError};
use crate::evaluator::Evaluator;
use crate::models::{ScoreRecord, TranscriptRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// Receives progress and skip notifications while a run is in flight.
pub trait ScoreObserver {
    fn on_progress(&mut self, _progress: Progress) {}

    fn on_skipped(&mut self, _conversation_id: &str, _error: &EvalError) {}
}

#[derive(Debug, Clone)]
pub struct SkippedConversation {
    pub conversation_id: String,
    pub error: EvalError,
}

#[derive(Debug, Clone, Default)]
pub struct ScoreRun {
    pub records: Vec<ScoreRecord>,
    pub attempted: usize,
    pub skipped: Vec<SkippedConversation>,
}

impl ScoreRun {
    pub fn scored(&self) -> usize {
        self.records.len()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Scored {} of {} conversations ({} skipped).",
            self.scored(),
            self.attempted,
            self.skipped.len()
        )
    }
}

/// Scores every conversation in `rows`, one evaluator call at a time.
///
/// `connect` is invoked once up front; if it fails nothing is evaluated and the
/// connection error is returned. Per-conversation failures are recorded in
/// `ScoreRun::skipped` and reported to the observer, and the run carries on.
pub async fn score_transcripts<E, F>(
    rows: &[TranscriptRow],
    connect: F,
    observer: &mut dyn ScoreObserver,
) -> Result<ScoreRun, ConnectionError>
where
    E: Evaluator,
    F: FnOnce() -> Result<E, ConnectionError>,
{
    let evaluator = connect()?;
    let conversations = group_conversations(rows);
    let total = conversations.len();

    tracing::info!(rows = rows.len(), conversations = total, "scoring run started");

    let mut run = ScoreRun {
        attempted: total,
        ..ScoreRun::default()
    };

    for (index, conversation) in conversations.iter().enumerate() {
        match evaluator.evaluate(&conversation.transcript_text()).await {
            Ok(evaluation) => run.records.push(ScoreRecord::new(conversation, evaluation)),
            Err(error) => {
                tracing::warn!(
                    conversation_id = %conversation.conversation_id,
                    kind = error.kind(),
                    error = %error,
                    "skipping conversation"
                );
                observer.on_skipped(&conversation.conversation_id, &error);
                run.skipped.push(SkippedConversation {
                    conversation_id: conversation.conversation_id.clone(),
                    error,
                });
            }
        }

        observer.on_progress(Progress {
            processed: index + 1,
            total,
        });
    }

    tracing::info!(
        attempted = run.attempted,
        scored = run.scored(),
        skipped = run.skipped.len(),
        "scoring run finished"
    );

    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Evaluation;
    use crate::transcripts::sample_rows;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers from a script keyed on a substring of the conversation text.
    struct ScriptedEvaluator {
        failures: Vec<(&'static str, EvalError)>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedEvaluator {
        fn new(failures: Vec<(&'static str, EvalError)>) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Evaluator for ScriptedEvaluator {
        async fn evaluate(&self, conversation_text: &str) -> Result<Evaluation, EvalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(conversation_text.to_string());
            for (needle, error) in &self.failures {
                if conversation_text.contains(needle) {
                    return Err(error.clone());
                }
            }
            Ok(Evaluation {
                summary: "fine".to_string(),
                satisfaction_score: 4,
                accuracy_score: 4,
                relevancy_score: 5,
                containment_score: 3,
            })
        }
    }

    struct NoopObserver;

    impl ScoreObserver for NoopObserver {}

    #[derive(Default)]
    struct RecordingObserver {
        progress: Vec<Progress>,
        skipped: Vec<String>,
    }

    impl ScoreObserver for RecordingObserver {
        fn on_progress(&mut self, progress: Progress) {
            self.progress.push(progress);
        }

        fn on_skipped(&mut self, conversation_id: &str, _error: &EvalError) {
            self.skipped.push(conversation_id.to_string());
        }
    }

    #[tokio::test]
    async fn scores_every_conversation_in_order() {
        let rows = sample_rows(Utc::now());
        let mut observer = RecordingObserver::default();

        let run = score_transcripts(&rows, || Ok(ScriptedEvaluator::new(vec![])), &mut observer)
            .await
            .unwrap();

        let ids: Vec<&str> = run.records.iter().map(|r| r.conversation_id.as_str()).collect();
        assert_eq!(ids, vec!["conv1", "conv2", "conv3"]);
        assert_eq!(run.attempted, 3);
        assert!(run.skipped.is_empty());
        assert_eq!(run.records[2].bot_name, "SalesBot");
        assert_eq!(run.records[0].timestamp, rows[0].timestamp);
        for record in &run.records {
            assert!(record.scores().iter().all(|s| (1..=5).contains(s)));
        }
    }

    #[tokio::test]
    async fn one_failure_skips_only_that_conversation() {
        let rows = sample_rows(Utc::now());
        let mut observer = RecordingObserver::default();

        let run = score_transcripts(
            &rows,
            || {
                Ok(ScriptedEvaluator::new(vec![(
                    "What seems to be the problem?",
                    EvalError::transport("timed out"),
                )]))
            },
            &mut observer,
        )
        .await
        .unwrap();

        assert_eq!(run.scored(), 2);
        assert_eq!(run.skipped.len(), 1);
        assert_eq!(run.skipped[0].conversation_id, "conv2");
        assert_eq!(run.skipped[0].error.kind(), "transport");
        assert_eq!(observer.skipped, vec!["conv2".to_string()]);
        assert_eq!(run.summary_line(), "Scored 2 of 3 conversations (1 skipped).");
    }

    #[tokio::test]
    async fn progress_reaches_one_monotonically() {
        let rows = sample_rows(Utc::now());
        let mut observer = RecordingObserver::default();

        score_transcripts(
            &rows,
            || {
                Ok(ScriptedEvaluator::new(vec![(
                    "SalesBot",
                    EvalError::malformed("not JSON"),
                )]))
            },
            &mut observer,
        )
        .await
        .unwrap();

        let processed: Vec<usize> = observer.progress.iter().map(|p| p.processed).collect();
        assert_eq!(processed, vec![1, 2, 3]);
        assert!(observer.progress.iter().all(|p| p.total == 3));
        assert_eq!(observer.progress.last().unwrap().fraction(), 1.0);
    }

    #[tokio::test]
    async fn every_failure_yields_empty_result() {
        let rows = sample_rows(Utc::now());
        let run = score_transcripts(
            &rows,
            || Ok(ScriptedEvaluator::new(vec![("Bot", EvalError::validation("accuracy_score", 9))])),
            &mut NoopObserver,
        )
        .await
        .unwrap();

        assert!(run.records.is_empty());
        assert_eq!(run.skipped.len(), 3);
        assert_eq!(run.attempted, 3);
    }

    #[tokio::test]
    async fn connection_failure_aborts_before_any_call() {
        let rows = sample_rows(Utc::now());
        let mut observer = RecordingObserver::default();

        let result = score_transcripts::<ScriptedEvaluator, _>(
            &rows,
            || Err(ConnectionError::new("EVALUATOR_API_KEY must be set")),
            &mut observer,
        )
        .await;

        let error = result.unwrap_err();
        assert!(error.to_string().contains("EVALUATOR_API_KEY"));
        assert!(observer.progress.is_empty());
        assert!(observer.skipped.is_empty());
    }

    #[tokio::test]
    async fn empty_rows_make_no_calls() {
        let evaluator = ScriptedEvaluator::new(vec![]);
        let mut observer = RecordingObserver::default();

        let run = score_transcripts(&[], || Ok(&evaluator), &mut observer)
            .await
            .unwrap();

        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(run.attempted, 0);
        assert!(run.records.is_empty());
        assert!(observer.progress.is_empty());
    }

    #[tokio::test]
    async fn evaluator_receives_labelled_conversation_text() {
        let rows = sample_rows(Utc::now());
        let evaluator = ScriptedEvaluator::new(vec![]);

        score_transcripts(&rows, || Ok(&evaluator), &mut NoopObserver)
            .await
            .unwrap();

        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 3);
        let seen = evaluator.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            "Bot: SupportBot\nUser: How can I help you?\nI need help with my order\n\
             Bot: I can help you with that.\nCould you provide your order number?"
        );
    }
}
