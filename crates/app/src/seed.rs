//! `app seed`: load question sets from a JSON file.

use std::collections::BTreeMap;
use std::path::Path;

use assess_core::model::{FormName, Question};
use services::{CatalogError, FormCatalog};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed question file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown form in question file: {0}")]
    UnknownForm(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Parse `{"HowGard": [{"id": 1, "question": "..."}], ...}` into per-form sets.
///
/// # Errors
///
/// Returns `SeedError` for malformed JSON or an unknown form name.
pub fn parse_question_sets(raw: &str) -> Result<Vec<(FormName, Vec<Question>)>, SeedError> {
    let sets: BTreeMap<String, Vec<Question>> = serde_json::from_str(raw)?;
    sets.into_iter()
        .map(|(name, questions)| {
            let form: FormName = name.parse().map_err(|_| SeedError::UnknownForm(name))?;
            Ok((form, questions))
        })
        .collect()
}

/// Replace every form listed in the file. Forms not in the file are untouched.
///
/// # Errors
///
/// Returns `SeedError` if the file cannot be read or parsed, or a write fails.
pub async fn seed_questions(catalog: &FormCatalog, path: &Path) -> Result<usize, SeedError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let sets = parse_question_sets(&raw)?;
    for (form, questions) in &sets {
        catalog.replace_questions(*form, questions).await?;
    }
    Ok(sets.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_forms_case_insensitively() {
        let sets = parse_question_sets(
            r#"{"howgard": [{"id": 1, "question": "Q1"}], "Attitude": []}"#,
        )
        .unwrap();
        assert_eq!(sets.len(), 2);
        assert!(sets.contains(&(FormName::HowGard, vec![Question::new(1, "Q1")])));
        assert!(sets.contains(&(FormName::Attitude, Vec::new())));
    }

    #[test]
    fn rejects_unknown_forms() {
        let err = parse_question_sets(r#"{"Foo": []}"#).unwrap_err();
        assert!(matches!(err, SeedError::UnknownForm(ref name) if name == "Foo"));
    }
}
