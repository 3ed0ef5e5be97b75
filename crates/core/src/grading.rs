//! Pure grading over a finalized set of attempts and their questions.
//!
//! Deterministic and side-effect free: callers persist the outcome in a
//! single atomic write together with the session status transition.

use std::collections::HashMap;

use crate::model::{AnswerClassifier, Attempt, AttemptStatus, Question, QuestionId};

/// Marks awarded for a correct numerical answer when the question carries
/// none of its own.
pub const DEFAULT_NUMERICAL_MARKS: f64 = 1.0;
/// Marks awarded for a correct selection answer when the question carries
/// none of its own.
pub const DEFAULT_SELECTION_MARKS: f64 = 2.0;

/// Aggregate statistics over one graded session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTotals {
    /// Sum of all attempt scores, including negative marking.
    pub total_score: f64,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub unattempted_count: u32,
    /// Attempts that were answered at all (correct + incorrect).
    pub attempted_count: u32,
    /// `correct / (correct + incorrect)`, or 0 when nothing was answered.
    pub accuracy: f64,
}

/// Graded attempts plus session totals.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeOutcome {
    pub attempts: Vec<Attempt>,
    pub totals: SessionTotals,
}

/// Grades every attempt against its question.
///
/// Rules, in priority order:
/// 1. no answer: skipped, score 0, counts as unattempted;
/// 2. numerical: exact string equality of the normalized answer text, with
///    no tolerance;
/// 3. single-select: sorted deep equality of the index collections; wrong
///    answers take the negative-marking penalty of -marks/3;
/// 4. multi-select: same comparison, but wrong answers score 0.
///
/// The penalty applies to single-select only; multi-select has no negative
/// marking.
///
/// An attempt whose question is missing from `questions` passes through
/// unscored rather than failing the batch. Attempt input order is preserved.
#[must_use]
pub fn grade(
    attempts: &[Attempt],
    questions: &[Question],
    classifier: &dyn AnswerClassifier,
) -> GradeOutcome {
    let by_id: HashMap<&QuestionId, &Question> =
        questions.iter().map(|q| (&q.id, q)).collect();

    let mut graded = Vec::with_capacity(attempts.len());
    let mut correct_count = 0_u32;
    let mut incorrect_count = 0_u32;
    let mut unattempted_count = 0_u32;
    let mut total_score = 0.0_f64;

    for attempt in attempts {
        let mut attempt = attempt.clone();

        let Some(question) = by_id.get(&attempt.question_id) else {
            // Dangling reference: pass through unscored.
            graded.push(attempt);
            continue;
        };

        match &attempt.user_answer {
            None => {
                attempt.status = AttemptStatus::Skipped;
                attempt.score = 0.0;
                attempt.is_correct = None;
                unattempted_count += 1;
            }
            Some(answer) => {
                let (correct, score) = if classifier.is_numerical(question) {
                    let marks = question.marks.unwrap_or(DEFAULT_NUMERICAL_MARKS);
                    let correct = answer.text() == question.correct_answer.text();
                    (correct, if correct { marks } else { 0.0 })
                } else {
                    let marks = question.marks.unwrap_or(DEFAULT_SELECTION_MARKS);
                    let correct = answer.selection() == question.correct_answer.selection();
                    let score = if correct {
                        marks
                    } else if classifier.is_multiple_selection(question) {
                        0.0
                    } else {
                        -marks / 3.0
                    };
                    (correct, score)
                };

                attempt.is_correct = Some(correct);
                attempt.score = score;
                if correct {
                    attempt.status = AttemptStatus::Correct;
                    correct_count += 1;
                } else {
                    attempt.status = AttemptStatus::Incorrect;
                    incorrect_count += 1;
                }
            }
        }

        total_score += attempt.score;
        attempt.is_synced = false;
        graded.push(attempt);
    }

    let answered = correct_count + incorrect_count;
    let accuracy = if answered > 0 {
        f64::from(correct_count) / f64::from(answered)
    } else {
        0.0
    };

    GradeOutcome {
        attempts: graded,
        totals: SessionTotals {
            total_score,
            correct_count,
            incorrect_count,
            unattempted_count,
            attempted_count: answered,
            accuracy,
        },
    }
}
