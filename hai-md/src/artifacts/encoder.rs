//! Label encoder: string categories to integer codes and back

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::ArtifactError;

/// Fitted label encoder
///
/// The code of a category is its index in `classes`, matching how the
/// training pipeline encoded the column.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Code for a category, `None` if the encoder never saw it
    pub fn transform(&self, value: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == value)
    }

    /// Category for a code
    pub fn inverse_transform(&self, code: i64) -> Result<&str, ArtifactError> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.classes.get(idx))
            .map(String::as_str)
            .ok_or(ArtifactError::CodeOutOfRange(code))
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.classes.is_empty() {
            return Err(ArtifactError::InvalidParameters(
                "label encoder has no classes".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for class in &self.classes {
            if !seen.insert(class.as_str()) {
                return Err(ArtifactError::InvalidParameters(format!(
                    "label encoder class '{}' is duplicated",
                    class
                )));
            }
        }
        Ok(())
    }
}
