//! Single-text classification command.

use console::style;

use railclass::classify::ClassificationClient;
use railclass::config::Config;
use railclass::error::SetupError;

use crate::cli::helpers::resolve_taxonomy;

pub async fn cmd_classify(
    config: &Config,
    text: &str,
    taxonomy: Option<&str>,
) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        println!("{} Enter a text to classify", style("!").yellow());
        return Ok(());
    }

    let taxonomy = resolve_taxonomy(taxonomy, config)?;
    let client = ClassificationClient::from_config(&config.llm).map_err(SetupError::from)?;

    println!(
        "{} Classifying with {} ({}), taxonomy {}",
        style("→").cyan(),
        client.backend().name(),
        client.backend().model(),
        taxonomy.name
    );

    let result = client.classify(text, &taxonomy).await;
    if result.is_failed() {
        eprintln!(
            "{} Classification failed: {}",
            style("✗").red(),
            result.justification
        );
        anyhow::bail!("classification failed");
    }

    let label = if result.label.is_empty() {
        style("(no label in reply)".to_string()).yellow()
    } else if result.is_reserved(&taxonomy) {
        style(result.label.clone()).yellow().bold()
    } else {
        style(result.label.clone()).green().bold()
    };

    println!("{}: {}", taxonomy.fields.label_prompt(), label);
    println!(
        "{}: {}",
        taxonomy.fields.justification_prompt(),
        result.justification
    );

    if !result.label.is_empty()
        && !result.is_reserved(&taxonomy)
        && !taxonomy.contains_label(&result.label)
    {
        println!(
            "{} '{}' is not a category of {}",
            style("!").yellow(),
            result.label,
            taxonomy.name
        );
    }
    Ok(())
}
