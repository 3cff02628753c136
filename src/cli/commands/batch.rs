//! Batch classification command.

use std::path::PathBuf;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use railclass::batch::{BatchEvent, BatchRunner, CancelFlag, FailureDelay, Termination};
use railclass::classify::ClassificationClient;
use railclass::config::Config;
use railclass::error::SetupError;
use railclass::table::{default_output_path, Table};
use railclass::utils::truncate;

use crate::cli::helpers::{print_columns, resolve_taxonomy};

pub struct BatchArgs {
    pub input: PathBuf,
    pub column: Option<String>,
    pub output: Option<PathBuf>,
    pub delay_ms: Option<u64>,
    pub threshold: Option<u32>,
    pub skip_delay_on_error: bool,
    pub empty_label_ok: bool,
    pub taxonomy: Option<String>,
    pub label_column: Option<String>,
    pub justification_column: Option<String>,
}

pub async fn cmd_batch(config: &Config, args: BatchArgs) -> anyhow::Result<()> {
    let taxonomy = resolve_taxonomy(args.taxonomy.as_deref(), config)?;
    let table = Table::read(&args.input).map_err(SetupError::from)?;

    let Some(column) = args.column.as_deref() else {
        println!(
            "{} Choose the column with the report text using --column",
            style("!").yellow()
        );
        print_columns(&table);
        anyhow::bail!("no text column selected");
    };
    if table.column_index(column).is_none() {
        println!(
            "{} Column '{}' not found in {}",
            style("✗").red(),
            column,
            args.input.display()
        );
        print_columns(&table);
        anyhow::bail!("column '{}' not found", column);
    }

    let client = ClassificationClient::from_config(&config.llm).map_err(SetupError::from)?;

    let mut options = config.batch.to_options();
    if let Some(ms) = args.delay_ms {
        options.delay = Duration::from_millis(ms);
    }
    if let Some(threshold) = args.threshold {
        options.failure_threshold = threshold;
    }
    if args.skip_delay_on_error {
        options.failure_delay = FailureDelay::Skip;
    }
    if args.empty_label_ok {
        options.empty_label_is_failure = false;
    }

    let mut columns = config.output.columns_for(client.backend().name());
    if let Some(label) = args.label_column {
        columns.label = label;
    }
    if let Some(justification) = args.justification_column {
        columns.justification = justification;
    }

    println!(
        "{} Classifying {} rows from '{}' with {} ({}), taxonomy {}",
        style("→").cyan(),
        table.len(),
        column,
        client.backend().name(),
        client.backend().model(),
        taxonomy.name
    );
    println!(
        "  {} {}ms between calls, stop after {} consecutive failures",
        style("→").dim(),
        options.delay.as_millis(),
        options.failure_threshold
    );

    let runner = BatchRunner::new(client, options).with_output_columns(columns);

    let cancel = CancelFlag::new();
    let ctrl_c_cancel = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    // Create event channel for progress tracking
    let (event_tx, mut event_rx) = mpsc::channel::<BatchEvent>(100);

    // Spawn event handler for UI
    let event_handler = tokio::spawn(async move {
        let mut progress: Option<ProgressBar> = None;
        while let Some(event) = event_rx.recv().await {
            match event {
                BatchEvent::Started { total } => {
                    let bar = ProgressBar::new(total as u64);
                    bar.set_style(
                        ProgressStyle::default_bar()
                            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_bar())
                            .progress_chars("█▓░"),
                    );
                    progress = Some(bar);
                }
                BatchEvent::RecordStarted { message, .. } => {
                    if let Some(ref bar) = progress {
                        bar.set_message(message);
                    }
                }
                BatchEvent::RecordFinished {
                    progress: row,
                    result,
                } => {
                    if let Some(ref bar) = progress {
                        if result.is_failed() {
                            bar.println(format!(
                                "{} Row {}: {}",
                                style("✗").red(),
                                row.attempted,
                                truncate(&result.justification, 100)
                            ));
                        } else if result.label.is_empty() {
                            bar.println(format!(
                                "{} Row {}: reply had no label",
                                style("!").yellow(),
                                row.attempted
                            ));
                        }
                        // per-record events may be dropped, so track the position
                        bar.set_position(row.attempted as u64);
                    }
                }
                BatchEvent::CircuitOpen {
                    consecutive_failures,
                    ..
                } => {
                    if let Some(ref bar) = progress {
                        bar.println(format!(
                            "{} {} consecutive failures, stopping",
                            style("✗").red(),
                            consecutive_failures
                        ));
                    }
                }
                BatchEvent::Cancelled { .. } => {
                    if let Some(ref bar) = progress {
                        bar.println(format!("{} Cancelled", style("!").yellow()));
                    }
                }
                BatchEvent::Finished { .. } => {
                    if let Some(bar) = progress.take() {
                        bar.finish_and_clear();
                    }
                }
            }
        }
    });

    let outcome = runner
        .run(table, column, &taxonomy, event_tx, &cancel)
        .await;
    let _ = event_handler.await;
    ctrl_c.abort();
    let outcome = outcome?;

    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));
    outcome.table.write(&output)?;
    println!(
        "{} Saved {} rows to {}",
        style("✓").green(),
        outcome.attempted,
        output.display()
    );

    if !outcome.results.is_empty() {
        println!("\n{}", style("Labels:").cyan());
        for (label, count) in outcome.label_counts() {
            let label = if label.is_empty() {
                "(empty)".to_string()
            } else {
                label
            };
            println!("  {:>5}  {}", count, label);
        }
    }

    match outcome.termination {
        Termination::Completed => {
            if outcome.failed() > 0 {
                println!(
                    "\n{} {} rows failed and are labeled ERROR",
                    style("!").yellow(),
                    outcome.failed()
                );
            }
            Ok(())
        }
        Termination::CircuitBreaker {
            consecutive_failures,
        } => {
            eprintln!(
                "\n{} Stopped after {} consecutive failures: {} of {} rows classified",
                style("✗").red(),
                consecutive_failures,
                outcome.attempted,
                outcome.total
            );
            anyhow::bail!("batch incomplete")
        }
        Termination::Cancelled => {
            eprintln!(
                "\n{} Cancelled: {} of {} rows classified",
                style("!").yellow(),
                outcome.attempted,
                outcome.total
            );
            anyhow::bail!("batch incomplete")
        }
    }
}
