use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::QuestionId;

/// The keyed answer for a question, as authored by the content source.
///
/// The serialized form is untagged so content JSON can carry a bare number
/// (option index), an array of indices, or a numeric literal string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Index(u32),
    Indices(Vec<u32>),
    Numeric(String),
}

impl CorrectAnswer {
    /// Coerces the answer to a sorted collection of option indices.
    ///
    /// Numeric answers have no option indices and coerce to empty.
    #[must_use]
    pub fn selection(&self) -> Vec<u32> {
        match self {
            CorrectAnswer::Index(i) => vec![*i],
            CorrectAnswer::Indices(is) => {
                let mut out = is.clone();
                out.sort_unstable();
                out
            }
            CorrectAnswer::Numeric(_) => Vec::new(),
        }
    }

    /// Normalized string form, used for exact numerical comparison.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            CorrectAnswer::Index(i) => i.to_string(),
            CorrectAnswer::Indices(is) => is
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            CorrectAnswer::Numeric(s) => s.trim().to_owned(),
        }
    }
}

/// Immutable question reference data, written once via bulk upsert from the
/// content source and never mutated by the test engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub subject: String,
    pub topic: String,
    /// Ordered option texts; empty for numerical-entry questions.
    pub options: Vec<String>,
    pub correct_answer: CorrectAnswer,
    /// Marks awarded for a correct answer; grading applies type defaults
    /// when absent.
    pub marks: Option<f64>,
    pub tags: BTreeSet<String>,
}

impl Question {
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Pure classifier over a question record, deciding which grading rule
/// applies. Consumed as a capability so the host application can substitute
/// its own inference.
pub trait AnswerClassifier: Send + Sync {
    fn is_numerical(&self, question: &Question) -> bool;
    fn is_multiple_selection(&self, question: &Question) -> bool;
}

/// Default classifier inferring the answer type from tags, falling back to
/// the shape of the question itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagClassifier;

impl AnswerClassifier for TagClassifier {
    fn is_numerical(&self, question: &Question) -> bool {
        question.has_tag("numerical")
            || (question.options.is_empty()
                && matches!(question.correct_answer, CorrectAnswer::Numeric(_)))
    }

    fn is_multiple_selection(&self, question: &Question) -> bool {
        question.has_tag("multi-select")
            || matches!(&question.correct_answer, CorrectAnswer::Indices(is) if is.len() > 1)
    }
}
