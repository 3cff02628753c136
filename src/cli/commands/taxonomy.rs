//! Taxonomy inspection commands.

use console::style;

use railclass::classify::build_prompt;
use railclass::taxonomy::{preset_names, Taxonomy};

pub fn cmd_taxonomy_list() -> anyhow::Result<()> {
    println!("\n{}", style("Built-in taxonomies").bold());
    println!("{}", "-".repeat(50));
    for name in preset_names() {
        let taxonomy = Taxonomy::preset(name)?;
        println!(
            "  {:<20} {:>3} categories  {}",
            style(name).cyan(),
            taxonomy.categories.len(),
            style(taxonomy.description.as_deref().unwrap_or("")).dim()
        );
    }
    println!(
        "\n{}",
        style("Custom taxonomies: pass the path to a .toml file with the same schema").dim()
    );
    Ok(())
}

pub fn cmd_taxonomy_show(name: &str) -> anyhow::Result<()> {
    let taxonomy = Taxonomy::resolve(name)?;

    println!("\n{}", style(&taxonomy.name).bold());
    if let Some(ref description) = taxonomy.description {
        println!("{}", style(description).dim());
    }
    println!("{}", "-".repeat(50));
    println!(
        "  {:<16} {}",
        "Label field:",
        taxonomy.fields.label.join(" | ")
    );
    println!(
        "  {:<16} {}",
        "Reason field:",
        taxonomy.fields.justification.join(" | ")
    );
    for reserved in taxonomy.reserved_labels() {
        println!("  {:<16} {}", "Reserved:", style(reserved).yellow());
    }

    println!("\n{}", style("Categories:").cyan());
    for (i, category) in taxonomy.categories.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, style(&category.name).bold());
        if let Some(ref definition) = category.definition {
            println!("      {}", definition);
        }
        if !category.examples.is_empty() {
            println!(
                "      {}",
                style(format!("{} example(s)", category.examples.len())).dim()
            );
        }
    }
    Ok(())
}

pub fn cmd_taxonomy_prompt(name: &str, text: &str) -> anyhow::Result<()> {
    let taxonomy = Taxonomy::resolve(name)?;
    print!("{}", build_prompt(&taxonomy, text));
    Ok(())
}
