//! Batch classification pipeline.
//!
//! [`BatchRunner`] drives a [`ClassificationClient`] over the rows of a table
//! strictly in order, one call in flight, pausing between calls. A run of
//! consecutive failures trips a circuit breaker; the output is then the
//! attempted prefix of the input, never padded.
//!
//! Progress leaves through an mpsc channel of [`BatchEvent`]s so the caller
//! decides how to render it. Send errors are ignored: a dropped receiver does
//! not stop the batch. Per-record events are dropped when the channel is full;
//! milestone events wait at most [`MILESTONE_SEND_TIMEOUT`] for capacity, so a
//! receiver that is never drained cannot stall the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::classify::{ClassificationClient, ClassificationResult};
use crate::error::SetupError;
use crate::table::Table;
use crate::taxonomy::Taxonomy;

/// Longest wait for channel capacity when sending a milestone event.
pub const MILESTONE_SEND_TIMEOUT: Duration = Duration::from_millis(500);

/// One input text and its position in the source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub index: usize,
    pub text: String,
}

impl Record {
    /// Records from one column of a table, in row order.
    pub fn from_column(table: &Table, column: usize) -> Vec<Self> {
        table
            .column_values(column)
            .enumerate()
            .map(|(index, text)| Record {
                index,
                text: text.into_owned(),
            })
            .collect()
    }
}

/// Whether to wait the pacing delay after a hard failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureDelay {
    #[default]
    Always,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Pause between consecutive calls. Zero disables pacing.
    pub delay: Duration,
    /// Consecutive failures that stop the run. Must be at least 1.
    pub failure_threshold: u32,
    pub failure_delay: FailureDelay,
    /// Count an Ok reply without a label line toward the failure streak.
    pub empty_label_is_failure: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            failure_threshold: 20,
            failure_delay: FailureDelay::Always,
            empty_label_is_failure: true,
        }
    }
}

impl BatchOptions {
    fn validate(&self) -> Result<(), SetupError> {
        if self.failure_threshold == 0 {
            return Err(SetupError::InvalidThreshold);
        }
        Ok(())
    }
}

/// Names of the two columns appended to the output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumns {
    pub label: String,
    pub justification: String,
}

impl OutputColumns {
    /// "Clasificacion-Gemini" / "Razon-Gemini"
    pub fn for_backend(backend: &str) -> Self {
        Self {
            label: format!("Clasificacion-{}", backend),
            justification: format!("Razon-{}", backend),
        }
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    Completed,
    CircuitBreaker { consecutive_failures: u32 },
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub attempted: usize,
    pub total: usize,
}

impl Progress {
    /// Completed fraction in `[0, 1]`. An empty batch is complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.attempted as f64 / self.total as f64
        }
    }

    pub fn message(&self) -> String {
        format!("Classifying row {} of {}", self.attempted, self.total)
    }
}

/// Events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started {
        total: usize,
    },
    RecordStarted {
        index: usize,
        total: usize,
        message: String,
    },
    RecordFinished {
        progress: Progress,
        result: ClassificationResult,
    },
    CircuitOpen {
        consecutive_failures: u32,
        attempted: usize,
    },
    Cancelled {
        attempted: usize,
    },
    Finished {
        attempted: usize,
        total: usize,
        failed: usize,
    },
}

/// Cooperative cancellation shared between the runner and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Results of [`BatchRunner::run_records`], aligned with the input prefix.
#[derive(Debug, Clone)]
pub struct RunResults {
    pub results: Vec<ClassificationResult>,
    pub total: usize,
    pub termination: Termination,
}

impl RunResults {
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }
}

/// Annotated output of a table run.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Input rows `0..attempted` with the label and justification columns set.
    pub table: Table,
    pub results: Vec<ClassificationResult>,
    pub attempted: usize,
    pub total: usize,
    pub termination: Termination,
}

impl BatchOutcome {
    /// True when the run stopped before the last row.
    pub fn is_truncated(&self) -> bool {
        self.termination != Termination::Completed
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    /// Label frequencies in order of first appearance.
    pub fn label_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for result in &self.results {
            match counts.iter_mut().find(|(label, _)| *label == result.label) {
                Some((_, n)) => *n += 1,
                None => counts.push((result.label.clone(), 1)),
            }
        }
        counts
    }
}

pub struct BatchRunner {
    client: ClassificationClient,
    options: BatchOptions,
    columns: OutputColumns,
}

impl BatchRunner {
    pub fn new(client: ClassificationClient, options: BatchOptions) -> Self {
        let columns = OutputColumns::for_backend(client.backend().name());
        Self {
            client,
            options,
            columns,
        }
    }

    pub fn with_output_columns(mut self, columns: OutputColumns) -> Self {
        self.columns = columns;
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn output_columns(&self) -> &OutputColumns {
        &self.columns
    }

    pub fn client(&self) -> &ClassificationClient {
        &self.client
    }

    /// Classify every row of `column` and return the annotated prefix.
    pub async fn run(
        &self,
        mut table: Table,
        column: &str,
        taxonomy: &Taxonomy,
        events: mpsc::Sender<BatchEvent>,
        cancel: &CancelFlag,
    ) -> Result<BatchOutcome, SetupError> {
        self.options.validate()?;
        let index = table
            .column_index(column)
            .ok_or_else(|| SetupError::MissingColumn {
                column: column.to_string(),
                available: table.columns().to_vec(),
            })?;

        let records = Record::from_column(&table, index);
        let run = self.run_records(records, taxonomy, events, cancel).await?;

        table.truncate(run.attempted());
        table.set_column(
            &self.columns.label,
            run.results.iter().map(|r| r.label.as_str()),
        );
        table.set_column(
            &self.columns.justification,
            run.results.iter().map(|r| r.justification.as_str()),
        );

        Ok(BatchOutcome {
            table,
            attempted: run.attempted(),
            total: run.total,
            termination: run.termination,
            results: run.results,
        })
    }

    /// Classify records in order, pacing calls and watching the failure streak.
    pub async fn run_records(
        &self,
        records: Vec<Record>,
        taxonomy: &Taxonomy,
        events: mpsc::Sender<BatchEvent>,
        cancel: &CancelFlag,
    ) -> Result<RunResults, SetupError> {
        self.options.validate()?;

        let total = records.len();
        let threshold = self.options.failure_threshold;
        send_milestone(&events, BatchEvent::Started { total }).await;
        info!(
            "Classifying {} records with {} ({})",
            total,
            self.client.backend().name(),
            self.client.backend().model()
        );

        let mut results: Vec<ClassificationResult> = Vec::with_capacity(total);
        let mut consecutive_failures: u32 = 0;
        let mut termination = Termination::Completed;

        for (position, record) in records.iter().enumerate() {
            if cancel.is_cancelled() {
                termination = Termination::Cancelled;
                break;
            }

            let current = Progress {
                attempted: position + 1,
                total,
            };
            send_progress(
                &events,
                BatchEvent::RecordStarted {
                    index: record.index,
                    total,
                    message: current.message(),
                },
            );
            debug!("{}", current.message());

            let result = self.client.classify(&record.text, taxonomy).await;
            let hard_failure = result.is_failed();
            let counts_as_failure =
                hard_failure || (self.options.empty_label_is_failure && result.is_empty_label());
            consecutive_failures = if counts_as_failure {
                consecutive_failures + 1
            } else {
                0
            };

            results.push(result.clone());
            send_progress(
                &events,
                BatchEvent::RecordFinished {
                    progress: current,
                    result,
                },
            );

            if consecutive_failures >= threshold {
                warn!(
                    "Stopping after {} consecutive failures ({} of {} rows attempted)",
                    consecutive_failures,
                    results.len(),
                    total
                );
                send_milestone(
                    &events,
                    BatchEvent::CircuitOpen {
                        consecutive_failures,
                        attempted: results.len(),
                    },
                )
                .await;
                termination = Termination::CircuitBreaker {
                    consecutive_failures,
                };
                break;
            }

            if position + 1 == total {
                break;
            }
            if hard_failure && self.options.failure_delay == FailureDelay::Skip {
                continue;
            }
            if self.options.delay.is_zero() {
                continue;
            }
            if cancel.is_cancelled() {
                termination = Termination::Cancelled;
                break;
            }
            tokio::time::sleep(self.options.delay).await;
        }

        let run = RunResults {
            results,
            total,
            termination,
        };

        if run.termination == Termination::Cancelled {
            info!("Cancelled after {} of {} rows", run.attempted(), total);
            send_milestone(
                &events,
                BatchEvent::Cancelled {
                    attempted: run.attempted(),
                },
            )
            .await;
        }

        send_milestone(
            &events,
            BatchEvent::Finished {
                attempted: run.attempted(),
                total,
                failed: run.failed(),
            },
        )
        .await;
        info!(
            "Batch finished: {} of {} rows attempted, {} failed",
            run.attempted(),
            total,
            run.failed()
        );

        Ok(run)
    }
}

/// Drop the event when the channel is full or closed.
fn send_progress(events: &mpsc::Sender<BatchEvent>, event: BatchEvent) {
    if let Err(mpsc::error::TrySendError::Full(_)) = events.try_send(event) {
        debug!("Progress channel full, dropping event");
    }
}

async fn send_milestone(events: &mpsc::Sender<BatchEvent>, event: BatchEvent) {
    if let Err(mpsc::error::SendTimeoutError::Timeout(_)) =
        events.send_timeout(event, MILESTONE_SEND_TIMEOUT).await
    {
        debug!("Progress channel full, dropping milestone event");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::classify::ClassificationStatus;
    use crate::llm::scripted::{Scripted, ScriptedBackend};

    const OK: &str = "Categoría: Otros\nRazón: sin detalle";

    fn ok() -> Scripted {
        Scripted::Reply(OK.to_string())
    }

    fn fail() -> Scripted {
        Scripted::Fail("HTTP 500: boom".to_string())
    }

    fn options(threshold: u32) -> BatchOptions {
        BatchOptions {
            delay: Duration::ZERO,
            failure_threshold: threshold,
            ..Default::default()
        }
    }

    fn runner(backend: &Arc<ScriptedBackend>, options: BatchOptions) -> BatchRunner {
        BatchRunner::new(ClassificationClient::new(backend.clone()), options)
    }

    fn table(n: usize) -> Table {
        Table::from_rows(
            vec!["id".to_string(), "texto".to_string()],
            (0..n)
                .map(|i| vec![i.to_string(), format!("reporte {}", i)])
                .collect::<Vec<_>>(),
        )
        .unwrap()
    }

    fn taxonomy() -> Taxonomy {
        Taxonomy::preset("incidentes-leves").unwrap()
    }

    async fn run(
        runner: &BatchRunner,
        input: Table,
        cancel: &CancelFlag,
    ) -> (Result<BatchOutcome, SetupError>, Vec<BatchEvent>) {
        let (tx, mut rx) = mpsc::channel(1024);
        let outcome = runner.run(input, "texto", &taxonomy(), tx, cancel).await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (outcome, events)
    }

    #[tokio::test]
    async fn test_all_rows_classified() {
        let backend = Arc::new(ScriptedBackend::always(OK));
        let (outcome, events) = run(&runner(&backend, options(20)), table(3), &CancelFlag::new()).await;
        let outcome = outcome.unwrap();

        assert_eq!(outcome.termination, Termination::Completed);
        assert!(!outcome.is_truncated());
        assert_eq!((outcome.attempted, outcome.total), (3, 3));
        assert_eq!(backend.calls(), 3);
        assert_eq!(
            outcome.table.columns(),
            ["id", "texto", "Clasificacion-Scripted", "Razon-Scripted"]
        );
        assert_eq!(outcome.table.rows()[2], ["2", "reporte 2", "Otros", "sin detalle"]);

        let progress: Vec<Progress> = events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::RecordFinished { progress, .. } => Some(*progress),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 3);
        assert_eq!(progress[0].message(), "Classifying row 1 of 3");
        assert_eq!(progress[2].fraction(), 1.0);
        assert!(matches!(events[0], BatchEvent::Started { total: 3 }));
        assert!(matches!(
            events.last(),
            Some(BatchEvent::Finished { attempted: 3, total: 3, failed: 0 })
        ));
    }

    #[tokio::test]
    async fn test_rows_processed_in_order() {
        let backend = Arc::new(ScriptedBackend::always(OK));
        run(&runner(&backend, options(20)), table(4), &CancelFlag::new()).await.0.unwrap();
        let prompts = backend.prompts();
        for (i, prompt) in prompts.iter().enumerate() {
            assert!(prompt.contains(&format!("Texto: reporte {}\n", i)));
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_truncates_to_prefix() {
        let (k, threshold) = (2, 3);
        let mut script = vec![ok(); k];
        script.extend(std::iter::repeat(fail()).take(threshold as usize));
        script.extend(vec![ok(); 5]);
        let backend = Arc::new(ScriptedBackend::new(script));

        let (outcome, events) =
            run(&runner(&backend, options(threshold)), table(10), &CancelFlag::new()).await;
        let outcome = outcome.unwrap();

        let attempted = k + threshold as usize;
        assert_eq!(outcome.attempted, attempted);
        assert_eq!(outcome.table.len(), attempted);
        assert_eq!(backend.calls(), attempted);
        assert_eq!(
            outcome.termination,
            Termination::CircuitBreaker {
                consecutive_failures: threshold
            }
        );
        assert!(outcome.is_truncated());
        assert_eq!(outcome.failed(), 3);
        assert_eq!(outcome.table.rows()[attempted - 1][2], "ERROR");
        assert!(outcome.table.rows()[attempted - 1][3].as_text().contains("HTTP 500"));
        assert!(events.iter().any(|e| matches!(
            e,
            BatchEvent::CircuitOpen { consecutive_failures: 3, attempted: 5 }
        )));
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let script = vec![fail(), fail(), ok(), fail(), fail(), ok()];
        let backend = Arc::new(ScriptedBackend::new(script));
        let (outcome, _) = run(&runner(&backend, options(3)), table(6), &CancelFlag::new()).await;
        let outcome = outcome.unwrap();

        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.attempted, 6);
        assert_eq!(outcome.failed(), 4);
    }

    #[tokio::test]
    async fn test_threshold_one_stops_on_first_failure() {
        let backend = Arc::new(ScriptedBackend::new(vec![ok(), fail(), ok()]));
        let (outcome, _) = run(&runner(&backend, options(1)), table(3), &CancelFlag::new()).await;
        let outcome = outcome.unwrap();

        assert_eq!(outcome.attempted, 2);
        assert_eq!(
            outcome.termination,
            Termination::CircuitBreaker {
                consecutive_failures: 1
            }
        );
    }

    #[tokio::test]
    async fn test_failure_on_last_row_below_threshold_completes() {
        let backend = Arc::new(ScriptedBackend::new(vec![ok(), ok(), fail()]));
        let (outcome, _) = run(&runner(&backend, options(2)), table(3), &CancelFlag::new()).await;
        let outcome = outcome.unwrap();
        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.results[2].label, "ERROR");
    }

    #[tokio::test]
    async fn test_zero_threshold_rejected_before_any_call() {
        let backend = Arc::new(ScriptedBackend::always(OK));
        let (outcome, events) = run(&runner(&backend, options(0)), table(3), &CancelFlag::new()).await;
        assert!(matches!(outcome, Err(SetupError::InvalidThreshold)));
        assert_eq!(backend.calls(), 0);
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_missing_column() {
        let backend = Arc::new(ScriptedBackend::always(OK));
        let (tx, _rx) = mpsc::channel(16);
        let err = runner(&backend, options(5))
            .run(table(2), "Detalle", &taxonomy(), tx, &CancelFlag::new())
            .await
            .unwrap_err();
        match err {
            SetupError::MissingColumn { column, available } => {
                assert_eq!(column, "Detalle");
                assert_eq!(available, ["id", "texto"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_table() {
        let backend = Arc::new(ScriptedBackend::always(OK));
        let (outcome, events) = run(&runner(&backend, options(5)), table(0), &CancelFlag::new()).await;
        let outcome = outcome.unwrap();
        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.attempted, 0);
        assert_eq!(outcome.table.columns().len(), 4);
        assert_eq!(backend.calls(), 0);
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_text_row_still_classified() {
        let backend = Arc::new(ScriptedBackend::always(
            "Tipo de Incidente: BARRERA ROTA\nRazón: brazo roto",
        ));
        let texts = ["brazo descendente roto en PAN Rivadavia", "tren llegó a horario", ""];
        let input = Table::from_rows(
            vec!["texto".to_string()],
            texts.iter().map(|t| vec![*t]).collect::<Vec<_>>(),
        )
        .unwrap();
        let taxonomy = Taxonomy::preset("ferroviario").unwrap();
        let (tx, _rx) = mpsc::channel(64);

        let outcome = runner(&backend, options(5))
            .run(input, "texto", &taxonomy, tx, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome.termination, Termination::Completed);
        assert!(!outcome.is_truncated());
        assert_eq!(outcome.table.len(), 3);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.status == ClassificationStatus::Ok && r.label == "BARRERA ROTA"));
        assert_eq!(backend.calls(), 3);
        assert!(backend.prompts()[2].ends_with("\nTexto: \n"));
    }

    #[tokio::test]
    async fn test_undrained_receiver_does_not_stall() {
        let backend = Arc::new(ScriptedBackend::always(OK));
        let (tx, rx) = mpsc::channel(1);

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            runner(&backend, options(5)).run(table(10), "texto", &taxonomy(), tx, &CancelFlag::new()),
        )
        .await
        .expect("batch stalled on a full progress channel")
        .unwrap();

        assert_eq!(outcome.attempted, 10);
        assert_eq!(backend.calls(), 10);
        drop(rx);
    }

    #[tokio::test]
    async fn test_empty_label_policy() {
        let unlabeled = || Scripted::Reply("no entiendo".to_string());

        let backend = Arc::new(ScriptedBackend::new(vec![unlabeled(), unlabeled(), ok()]));
        let (outcome, _) = run(&runner(&backend, options(2)), table(3), &CancelFlag::new()).await;
        let outcome = outcome.unwrap();
        assert_eq!(outcome.attempted, 2);
        assert!(outcome.is_truncated());
        assert_eq!(outcome.failed(), 0);

        let lenient = BatchOptions {
            empty_label_is_failure: false,
            ..options(2)
        };
        let backend = Arc::new(ScriptedBackend::new(vec![unlabeled(), unlabeled(), ok()]));
        let (outcome, _) = run(&runner(&backend, lenient), table(3), &CancelFlag::new()).await;
        let outcome = outcome.unwrap();
        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.results[0].label, "");
    }

    #[tokio::test]
    async fn test_delay_between_calls_not_after_last() {
        let backend = Arc::new(ScriptedBackend::always(OK));
        let opts = BatchOptions {
            delay: Duration::from_millis(40),
            ..options(5)
        };
        let start = Instant::now();
        run(&runner(&backend, opts), table(3), &CancelFlag::new()).await.0.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(80), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(120 + 500), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_skip_delay_after_failure() {
        let delay = Duration::from_millis(200);
        let backend = Arc::new(ScriptedBackend::failing("down"));
        let opts = BatchOptions {
            delay,
            failure_delay: FailureDelay::Skip,
            ..options(10)
        };
        let start = Instant::now();
        let (outcome, _) = run(&runner(&backend, opts), table(4), &CancelFlag::new()).await;
        assert_eq!(outcome.unwrap().attempted, 4);
        assert!(start.elapsed() < delay);
    }

    #[tokio::test]
    async fn test_no_delay_after_circuit_opens() {
        let delay = Duration::from_millis(300);
        let backend = Arc::new(ScriptedBackend::failing("down"));
        let opts = BatchOptions { delay, ..options(1) };
        let start = Instant::now();
        let (outcome, _) = run(&runner(&backend, opts), table(5), &CancelFlag::new()).await;
        assert_eq!(outcome.unwrap().attempted, 1);
        assert!(start.elapsed() < delay);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let backend = Arc::new(ScriptedBackend::always(OK));
        let cancel = CancelFlag::new();
        cancel.cancel();
        let (outcome, events) = run(&runner(&backend, options(5)), table(3), &cancel).await;
        let outcome = outcome.unwrap();

        assert_eq!(outcome.termination, Termination::Cancelled);
        assert!(outcome.is_truncated());
        assert_eq!(outcome.attempted, 0);
        assert_eq!(outcome.table.len(), 0);
        assert!(events
            .iter()
            .any(|e| matches!(e, BatchEvent::Cancelled { attempted: 0 })));
    }

    #[tokio::test]
    async fn test_cancel_mid_run_keeps_prefix() {
        let backend = Arc::new(ScriptedBackend::always(OK));
        // the pause yields so the watcher sees progress between records
        let opts = BatchOptions {
            delay: Duration::from_millis(20),
            ..options(5)
        };
        let runner = runner(&backend, opts);
        let cancel = CancelFlag::new();
        let (tx, mut rx) = mpsc::channel(1024);

        let watcher_cancel = cancel.clone();
        let records = Record::from_column(&table(6), 1);
        let taxonomy = taxonomy();
        let run = runner.run_records(records, &taxonomy, tx, &cancel);
        let watch = async move {
            while let Some(event) = rx.recv().await {
                if let BatchEvent::RecordFinished { progress, .. } = event {
                    if progress.attempted == 2 {
                        watcher_cancel.cancel();
                    }
                }
            }
        };
        let (results, ()) = tokio::join!(run, watch);
        let results = results.unwrap();

        assert_eq!(results.termination, Termination::Cancelled);
        assert!(results.attempted() >= 2 && results.attempted() < 6);
        assert_eq!(results.total, 6);
    }

    #[tokio::test]
    async fn test_custom_output_columns() {
        let backend = Arc::new(ScriptedBackend::always(OK));
        let runner = runner(&backend, options(5)).with_output_columns(OutputColumns {
            label: "Categoría".to_string(),
            justification: "Razón".to_string(),
        });
        let (outcome, _) = run(&runner, table(1), &CancelFlag::new()).await;
        assert_eq!(outcome.unwrap().table.columns(), ["id", "texto", "Categoría", "Razón"]);
    }

    #[test]
    fn test_label_counts() {
        let outcome = BatchOutcome {
            table: Table::default(),
            results: vec![
                ClassificationResult::ok("A", ""),
                ClassificationResult::failed("x"),
                ClassificationResult::ok("A", ""),
            ],
            attempted: 3,
            total: 3,
            termination: Termination::Completed,
        };
        assert_eq!(
            outcome.label_counts(),
            vec![("A".to_string(), 2), ("ERROR".to_string(), 1)]
        );
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(Progress { attempted: 0, total: 0 }.fraction(), 1.0);
        assert_eq!(Progress { attempted: 1, total: 4 }.fraction(), 0.25);
    }
}
