//! File-based Case Content Adapter
//!
//! Loads case content, chat options and persona overrides from YAML files.
//! Stands in for the content collaborator when running from the terminal.

use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;
use tokio::fs;

use crate::domain::case::CaseData;
use crate::domain::conversation::ChatOptions;
use crate::domain::foundation::ValidationError;
use crate::domain::persona::PersonaOverride;

/// Errors raised while loading content files.
#[derive(Debug, Error)]
pub enum CaseFileError {
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Yaml { path: String, message: String },

    #[error("Invalid content in {path}: {source}")]
    Invalid {
        path: String,
        #[source]
        source: ValidationError,
    },
}

/// Loads and validates a case file.
pub async fn load_case(path: impl AsRef<Path>) -> Result<CaseData, CaseFileError> {
    let path = path.as_ref();
    let case: CaseData = read_yaml(path).await?;
    case.validate().map_err(|source| CaseFileError::Invalid {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(case_id = %case.case_id, path = %path.display(), "Case loaded");
    Ok(case)
}

/// Loads chat options. Missing fields take their defaults.
pub async fn load_options(path: impl AsRef<Path>) -> Result<ChatOptions, CaseFileError> {
    let path = path.as_ref();
    let options: ChatOptions = read_yaml(path).await?;
    if options.free_hints > options.hints_allowed {
        tracing::warn!(
            free_hints = options.free_hints,
            hints_allowed = options.hints_allowed,
            "More free hints than hints allowed"
        );
    }
    Ok(options)
}

/// Loads a persona override row.
pub async fn load_persona_override(
    path: impl AsRef<Path>,
) -> Result<PersonaOverride, CaseFileError> {
    let path = path.as_ref();
    let row: PersonaOverride = read_yaml(path).await?;
    if row.instructions.trim().is_empty() {
        return Err(CaseFileError::Invalid {
            path: path.display().to_string(),
            source: ValidationError::empty_field("instructions"),
        });
    }
    Ok(row)
}

async fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, CaseFileError> {
    let yaml = fs::read_to_string(path).await.map_err(|e| CaseFileError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    serde_yaml::from_str(&yaml).map_err(|e| CaseFileError::Yaml {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::persona::PersonaId;
    use tempfile::TempDir;

    const CASE_YAML: &str = r#"
case_id: malawis-pizza
title: Malawi's Pizza Catering
protagonist:
  name: Kent Beck
  initials: KB
  role: CEO of Malawi's Pizza
chat_question: Should we stay in the catering business?
case_text: Malawi's Pizza started a catering line in 2019.
teaching_note: Weigh margins against focus.
argument_framework:
  arguments_for:
    - Higher margins
  arguments_against:
    - Distracts the team
"#;

    async fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).await.unwrap();
        path
    }

    mod cases {
        use super::*;

        #[tokio::test]
        async fn loads_a_complete_case() {
            let dir = TempDir::new().unwrap();
            let path = write(&dir, "case.yaml", CASE_YAML).await;

            let case = load_case(&path).await.unwrap();

            assert_eq!(case.case_id, "malawis-pizza");
            assert_eq!(case.protagonist.initials, "KB");
            assert!(case.supplementary_materials.is_none());
            assert_eq!(case.arguments().unwrap().arguments_for, vec!["Higher margins"]);
        }

        #[tokio::test]
        async fn rejects_a_case_without_body() {
            let dir = TempDir::new().unwrap();
            let yaml = CASE_YAML.replace(
                "case_text: Malawi's Pizza started a catering line in 2019.",
                "case_text: \"  \"",
            );
            let path = write(&dir, "case.yaml", &yaml).await;

            let err = load_case(&path).await.unwrap_err();

            assert!(matches!(err, CaseFileError::Invalid { .. }));
        }

        #[tokio::test]
        async fn missing_file_is_an_io_error() {
            let dir = TempDir::new().unwrap();
            let err = load_case(dir.path().join("absent.yaml")).await.unwrap_err();
            assert!(matches!(err, CaseFileError::Io { .. }));
        }

        #[tokio::test]
        async fn malformed_yaml_is_a_parse_error() {
            let dir = TempDir::new().unwrap();
            let path = write(&dir, "case.yaml", "case_id: [unclosed").await;
            let err = load_case(&path).await.unwrap_err();
            assert!(matches!(err, CaseFileError::Yaml { .. }));
        }
    }

    mod options {
        use super::*;

        #[tokio::test]
        async fn partial_options_take_defaults() {
            let dir = TempDir::new().unwrap();
            let path = write(&dir, "options.yaml", "hints_allowed: 5\nask_for_feedback: false\n").await;

            let options = load_options(&path).await.unwrap();

            assert_eq!(options.hints_allowed, 5);
            assert!(!options.ask_for_feedback);
            assert_eq!(options.free_hints, ChatOptions::default().free_hints);
            assert!(options.run_evaluation);
        }

        #[tokio::test]
        async fn loads_persona_override() {
            let dir = TempDir::new().unwrap();
            let path = write(
                &dir,
                "persona.yaml",
                "persona: strict\ninstructions: Press {student_name} hard.\n",
            )
            .await;

            let row = load_persona_override(&path).await.unwrap();

            assert_eq!(row.persona, PersonaId::Strict);
            assert_eq!(row.instructions, "Press {student_name} hard.");
        }

        #[tokio::test]
        async fn blank_override_is_invalid() {
            let dir = TempDir::new().unwrap();
            let path = write(&dir, "persona.yaml", "persona: strict\ninstructions: \"\"\n").await;
            let err = load_persona_override(&path).await.unwrap_err();
            assert!(matches!(err, CaseFileError::Invalid { .. }));
        }
    }
}
