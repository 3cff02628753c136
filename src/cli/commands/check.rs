//! Backend availability check command.

use console::style;

use railclass::classify::ClassificationClient;
use railclass::config::Config;
use railclass::llm::LlmProvider;

use crate::cli::helpers::resolve_taxonomy;

pub async fn cmd_check(config: &Config) -> anyhow::Result<()> {
    let llm = &config.llm;

    println!("\n{}", style("LLM Backend Status").bold());
    println!("{}", "-".repeat(50));
    println!("  {:<12} {}", "Provider:", llm.provider.display_name());
    println!("  {:<12} {}", "Endpoint:", llm.effective_endpoint());
    println!("  {:<12} {}", "Model:", llm.effective_model());
    if let Some(ref path) = config.source_path {
        println!("  {:<12} {}", "Config:", path.display());
    }

    match resolve_taxonomy(None, config) {
        Ok(taxonomy) => println!(
            "  {:<12} {} ({} categories)",
            "Taxonomy:",
            taxonomy.name,
            taxonomy.categories.len()
        ),
        Err(e) => println!("  {:<12} {} {}", "Taxonomy:", style("✗").red(), e),
    }

    let client = match ClassificationClient::from_config(llm) {
        Ok(client) => client,
        Err(e) => {
            println!("\n{} {}", style("✗").red(), e);
            return Ok(());
        }
    };

    println!();
    if client.is_available().await {
        println!(
            "{} {} is reachable and serves {}",
            style("✓").green(),
            llm.provider.display_name(),
            llm.effective_model()
        );
    } else {
        println!(
            "{} {} not available at {}",
            style("✗").red(),
            llm.provider.display_name(),
            llm.effective_endpoint()
        );
        if llm.provider == LlmProvider::Ollama {
            println!("  Make sure Ollama is running: ollama serve");
            println!("  and the model is pulled: ollama pull {}", llm.effective_model());
        }
    }
    Ok(())
}
