//! Question repository for the application conversation.
//!
//! Questions live in an externally editable JSON file (an ordered array of
//! `{ "id": ..., "text": ... }` objects). The file order is the presentation
//! order. The repository supports reloading on demand so an operator can
//! edit the file without restarting the bot.

use crate::errors::{AppError, AppResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A single application question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
}

/// Ordered, reloadable question list backed by a JSON file
pub struct QuestionRepository {
    path: PathBuf,
    questions: RwLock<Vec<Question>>,
}

impl QuestionRepository {
    /// Load the repository from `path`.
    ///
    /// A missing file is not an error at startup (the bot may be configured
    /// later); the repository starts empty and `/apply` attempts trigger a
    /// reload. An unparsable file is an error.
    pub fn load(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let questions = match Self::read_file(&path) {
            Ok(questions) => questions,
            Err(AppError::FileSystem(_)) => {
                warn!(path = %path.display(), "Questions file not found, starting with an empty list");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        info!(path = %path.display(), count = questions.len(), "Loaded questions");
        Ok(Self {
            path,
            questions: RwLock::new(questions),
        })
    }

    fn read_file(path: &Path) -> AppResult<Vec<Question>> {
        let content = fs::read_to_string(path)?;
        let questions: Vec<Question> = serde_json::from_str(&content).map_err(|e| {
            AppError::Validation(format!(
                "Questions file {} is not a valid question list: {e}",
                path.display()
            ))
        })?;
        Ok(questions)
    }

    /// Re-read the questions file, replacing the in-memory list on success
    pub fn reload(&self) -> AppResult<usize> {
        let questions = Self::read_file(&self.path)?;
        let count = questions.len();
        *self.questions.write() = questions;
        info!(path = %self.path.display(), count, "Reloaded questions");
        Ok(count)
    }

    /// Clone the current question list for one message-handling step
    pub fn snapshot(&self) -> Vec<Question> {
        self.questions.read().clone()
    }

    pub fn len(&self) -> usize {
        self.questions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.read().is_empty()
    }
}
