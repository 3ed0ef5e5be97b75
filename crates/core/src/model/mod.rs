mod attempt;
mod ids;
mod question;
mod session;

pub use attempt::{Attempt, AttemptStatus, UserAnswer, attempt_order};
pub use ids::{AttemptKey, ParseIdError, QuestionId, SessionId};
pub use question::{AnswerClassifier, CorrectAnswer, Question, TagClassifier};
pub use session::{SessionStatus, TestSession};
