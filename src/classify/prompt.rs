//! Prompt construction from a taxonomy.

use crate::taxonomy::{Category, Taxonomy};

/// Build the classification prompt for one text.
///
/// The prompt lists every category (with definition, context and examples when
/// the taxonomy provides them), asks for exactly two labeled fields, and adds
/// the reserved-label instructions when the taxonomy defines them.
pub fn build_prompt(taxonomy: &Taxonomy, text: &str) -> String {
    let label_field = taxonomy.fields.label_prompt();
    let justification_field = taxonomy.fields.justification_prompt();
    let detailed = taxonomy.categories.iter().any(Category::has_details);

    let mut prompt = format!(
        "Leé la siguiente {} y devolvé SOLO:\n\n",
        taxonomy.subject
    );

    if detailed {
        prompt.push_str(&format!(
            "1. El {} más adecuado según la siguiente lista, basada en la definición, contexto y ejemplos proporcionados:\n",
            label_field
        ));
        for category in &taxonomy.categories {
            push_detailed(&mut prompt, category);
        }
    } else {
        prompt.push_str(&format!(
            "1. El valor de {} más adecuado según esta lista:\n",
            label_field
        ));
        for category in &taxonomy.categories {
            prompt.push_str(&format!("- {}\n", category.name));
        }
    }

    prompt.push_str(&format!("\n2. {}\n\n", taxonomy.justification_hint));
    prompt.push_str(&format!(
        "Formato de salida:\n{}: <nombre de la categoría>\n{}: <explicación>\n",
        label_field, justification_field
    ));

    let reserved = &taxonomy.reserved;
    if reserved.review.is_some() || reserved.no_event.is_some() {
        prompt.push('\n');
    }
    if let Some(review) = &reserved.review {
        prompt.push_str(&format!(
            "En caso de dudas sobre la clasificación, devolvé '{}' como {} y una breve explicación.\n",
            review, label_field
        ));
    }
    if let Some(no_event) = &reserved.no_event {
        prompt.push_str(&format!(
            "Si no hay dudas y el texto no se corresponde con ninguna de las categorías proporcionadas, devolvé '{}' como {} y una breve explicación.\n",
            no_event, label_field
        ));
    }

    prompt.push_str(&format!("\nTexto: {}\n", text));
    prompt
}

fn push_detailed(prompt: &mut String, category: &Category) {
    prompt.push_str(&format!("   - {}:\n", category.name));
    if let Some(definition) = &category.definition {
        prompt.push_str(&format!("     - Definición: {}\n", definition));
    }
    if let Some(context) = &category.context {
        prompt.push_str(&format!("     - Contexto: {}\n", context));
    }
    if !category.examples.is_empty() {
        prompt.push_str(&format!("     - Ejemplos: {}\n", category.examples.join(" | ")));
    }
    prompt.push('\n');
}
