//! Classification taxonomies.
//!
//! A taxonomy is the ordered set of categories a run may assign, plus the
//! spelling of the two reply fields the model is asked to produce and the
//! optional reserved labels ("needs review", "no relevant event").
//!
//! Built-in presets ship as TOML under `taxonomies/`; custom taxonomies use the
//! same schema and are loaded by path.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::fold_key;

/// Built-in presets: (name, TOML source).
const PRESETS: &[(&str, &str)] = &[
    (
        "ferroviario",
        include_str!("../../taxonomies/ferroviario.toml"),
    ),
    (
        "incidentes-leves",
        include_str!("../../taxonomies/incidentes-leves.toml"),
    ),
];

/// Preset used when nothing is configured.
pub const DEFAULT_TAXONOMY: &str = "ferroviario";

/// Errors loading or validating a taxonomy.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Unknown taxonomy '{0}' (built-in: {presets})", presets = preset_names().join(", "))]
    Unknown(String),

    #[error("Failed to read taxonomy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse taxonomy: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid taxonomy '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

/// One category a text may be assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Label the model should return verbatim.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    /// Contextual cues (abbreviations, typical phrasing).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: None,
            context: None,
            examples: Vec::new(),
        }
    }

    /// Whether the prompt needs the detailed (definition/context/examples) layout.
    pub fn has_details(&self) -> bool {
        self.definition.is_some() || self.context.is_some() || !self.examples.is_empty()
    }
}

/// Accepted spellings of the two reply fields.
///
/// The first entry of each list is the spelling requested in the prompt. Matching
/// is case- and accent-insensitive, so "Razón" also accepts "razon:".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldNames {
    #[serde(default = "default_label_fields")]
    pub label: Vec<String>,
    #[serde(default = "default_justification_fields")]
    pub justification: Vec<String>,
}

fn default_label_fields() -> Vec<String> {
    vec!["Categoría".to_string()]
}

fn default_justification_fields() -> Vec<String> {
    vec!["Razón".to_string()]
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            label: default_label_fields(),
            justification: default_justification_fields(),
        }
    }
}

impl FieldNames {
    /// Spelling of the label field used in the prompt.
    pub fn label_prompt(&self) -> &str {
        self.label.first().map(String::as_str).unwrap_or("Categoría")
    }

    /// Spelling of the justification field used in the prompt.
    pub fn justification_prompt(&self) -> &str {
        self.justification
            .first()
            .map(String::as_str)
            .unwrap_or("Razón")
    }
}

/// Reserved outputs beyond the domain categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReservedLabels {
    /// Ambiguous: needs human review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    /// The text describes no relevant event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_event: Option<String>,
}

/// An ordered set of categories for one classification task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// What each input text is, as phrased in the prompt ("queja de un pasajero").
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Instruction for the justification field.
    #[serde(default = "default_justification_hint")]
    pub justification_hint: String,
    #[serde(default)]
    pub fields: FieldNames,
    #[serde(default)]
    pub reserved: ReservedLabels,
    pub categories: Vec<Category>,
}

fn default_subject() -> String {
    "texto".to_string()
}

fn default_justification_hint() -> String {
    "Una breve razón de por qué fue clasificado así.".to_string()
}

/// Names of the built-in presets.
pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|(name, _)| *name).collect()
}

impl Taxonomy {
    /// Build a taxonomy with default field names and no reserved labels.
    pub fn new<I, S>(name: impl Into<String>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: None,
            subject: default_subject(),
            justification_hint: default_justification_hint(),
            fields: FieldNames::default(),
            reserved: ReservedLabels::default(),
            categories: categories.into_iter().map(Category::new).collect(),
        }
    }

    /// Parse and validate a taxonomy from TOML.
    pub fn from_toml_str(source: &str) -> Result<Self, TaxonomyError> {
        let taxonomy: Taxonomy = toml::from_str(source)?;
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    /// Load a built-in preset by name.
    pub fn preset(name: &str) -> Result<Self, TaxonomyError> {
        let (_, source) = PRESETS
            .iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
            .ok_or_else(|| TaxonomyError::Unknown(name.to_string()))?;
        Self::from_toml_str(source)
    }

    /// Load a taxonomy file.
    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let source = std::fs::read_to_string(path).map_err(|source| TaxonomyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Resolve a preset name or a path to a TOML file.
    pub fn resolve(name_or_path: &str) -> Result<Self, TaxonomyError> {
        let path = Path::new(name_or_path);
        let looks_like_path = path.extension().is_some_and(|ext| ext == "toml")
            || name_or_path.contains(std::path::MAIN_SEPARATOR)
            || name_or_path.contains('/');
        if looks_like_path || path.is_file() {
            Self::load(path)
        } else {
            Self::preset(name_or_path)
        }
    }

    fn validate(&self) -> Result<(), TaxonomyError> {
        let invalid = |reason: &str| TaxonomyError::Invalid {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.categories.is_empty() {
            return Err(invalid("at least one category is required"));
        }
        if self.fields.label.iter().all(|f| f.trim().is_empty()) {
            return Err(invalid("fields.label must name at least one spelling"));
        }
        if self
            .fields
            .justification
            .iter()
            .all(|f| f.trim().is_empty())
        {
            return Err(invalid("fields.justification must name at least one spelling"));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(invalid("category names must not be empty"));
            }
            if !seen.insert(fold_key(category.name.trim())) {
                return Err(TaxonomyError::Invalid {
                    name: self.name.clone(),
                    reason: format!("duplicate category '{}'", category.name),
                });
            }
        }
        Ok(())
    }

    /// Category labels in order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Reserved labels that are defined.
    pub fn reserved_labels(&self) -> impl Iterator<Item = &str> {
        self.reserved
            .review
            .as_deref()
            .into_iter()
            .chain(self.reserved.no_event.as_deref())
    }

    /// Whether `label` names a category (case- and accent-insensitive).
    pub fn contains_label(&self, label: &str) -> bool {
        let key = fold_key(label.trim());
        self.labels().any(|l| fold_key(l) == key)
    }

    /// Whether `label` is one of the reserved outputs.
    pub fn is_reserved(&self, label: &str) -> bool {
        let key = fold_key(label.trim());
        self.reserved_labels().any(|l| fold_key(l) == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_parse() {
        for name in preset_names() {
            let taxonomy = Taxonomy::preset(name).unwrap();
            assert_eq!(taxonomy.name, name);
            assert!(!taxonomy.categories.is_empty());
        }
    }

    #[test]
    fn test_ferroviario_preset() {
        let taxonomy = Taxonomy::preset("ferroviario").unwrap();
        assert_eq!(taxonomy.categories.len(), 6);
        assert_eq!(taxonomy.fields.label_prompt(), "Tipo de Incidente");
        assert_eq!(taxonomy.reserved.review.as_deref(), Some("REVISAR"));
        assert_eq!(taxonomy.reserved.no_event.as_deref(), Some("FILA SIN EVENTOS"));
        assert!(taxonomy.categories[0].has_details());
        assert!(taxonomy.contains_label("barrera rota"));
        assert!(taxonomy.contains_label("INVASION DE VIA"));
        assert!(taxonomy.is_reserved("revisar"));
        assert!(!taxonomy.contains_label("REVISAR"));
    }

    #[test]
    fn test_incidentes_leves_preset() {
        let taxonomy = Taxonomy::preset("INCIDENTES-LEVES").unwrap();
        assert_eq!(taxonomy.categories.len(), 11);
        assert_eq!(taxonomy.fields.label_prompt(), "Categoría");
        assert_eq!(taxonomy.reserved_labels().count(), 0);
        assert!(!taxonomy.categories[0].has_details());
    }

    #[test]
    fn test_unknown_preset() {
        let err = Taxonomy::preset("metro").unwrap_err();
        assert!(matches!(err, TaxonomyError::Unknown(_)));
        assert!(err.to_string().contains("ferroviario"));
    }

    #[test]
    fn test_custom_taxonomy_defaults() {
        let taxonomy = Taxonomy::from_toml_str(
            r#"
name = "custom"
[[categories]]
name = "A"
[[categories]]
name = "B"
"#,
        )
        .unwrap();
        assert_eq!(taxonomy.fields, FieldNames::default());
        assert_eq!(taxonomy.subject, "texto");
        assert_eq!(taxonomy.labels().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_validation_rejects_bad_taxonomies() {
        let empty = "name = \"x\"\ncategories = []";
        assert!(matches!(
            Taxonomy::from_toml_str(empty),
            Err(TaxonomyError::Invalid { .. })
        ));

        let duplicate = r#"
name = "x"
[[categories]]
name = "Vía"
[[categories]]
name = "VIA"
"#;
        let err = Taxonomy::from_toml_str(duplicate).unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        let no_fields = r#"
name = "x"
[fields]
label = []
[[categories]]
name = "A"
"#;
        assert!(Taxonomy::from_toml_str(no_fields).is_err());
    }

    #[test]
    fn test_resolve_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mine.toml");
        std::fs::write(&path, "name = \"mine\"\n[[categories]]\nname = \"Uno\"\n").unwrap();
        let taxonomy = Taxonomy::resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(taxonomy.name, "mine");

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Taxonomy::resolve(missing.to_str().unwrap()),
            Err(TaxonomyError::Io { .. })
        ));
    }
}
