//! Question Bank: the fixed, ordered question list, loaded once at startup.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuestionLoadError {
    #[error("failed to read question file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("question file {path} is not a JSON array of {{\"text\": string}}: {source}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("question file {0} contains no questions")]
    Empty(String),

    #[error("question {index} in {path} has blank text")]
    BlankText { path: String, index: usize },
}

/// One interview question. `id` is its zero-based position in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: usize,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct QuestionRecord {
    text: String,
}

/// Immutable after loading; shared as `Arc<QuestionBank>`.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Reads `[{"text": "..."}, ...]` from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, QuestionLoadError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| QuestionLoadError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_json(&raw, &display)
    }

    /// Parses the question file format. `origin` only labels errors.
    pub fn from_json(raw: &str, origin: &str) -> Result<Self, QuestionLoadError> {
        let records: Vec<QuestionRecord> =
            serde_json::from_str(raw).map_err(|source| QuestionLoadError::Format {
                path: origin.to_string(),
                source,
            })?;

        if records.is_empty() {
            return Err(QuestionLoadError::Empty(origin.to_string()));
        }

        let questions = records
            .into_iter()
            .enumerate()
            .map(|(id, record)| {
                if record.text.trim().is_empty() {
                    Err(QuestionLoadError::BlankText {
                        path: origin.to_string(),
                        index: id,
                    })
                } else {
                    Ok(Question {
                        id,
                        text: record.text,
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { questions })
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Never `None` for a loaded bank; the loader rejects empty files.
    pub fn first(&self) -> Option<&Question> {
        self.questions.first()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
