pub mod answer;
pub mod attempt;
pub mod practice;
pub mod question;
pub mod session;

use core::num::NonZeroI32;

pub use answer::{Answer, AnswerSheet, Answers, AttemptSnapshot, RawAnswers};
pub use attempt::{Attempt, Scorecard, Submission};
pub use chrono::{DateTime, Utc};
pub use practice::{DraftError, Practice, PracticeDraft};
pub use question::{AnswerType, PublicQuestion, Question, QuestionBody, QuestionError, QuestionKind, QuestionType};
pub use session::{Role, Session};

/// Serial identifier of a practice.
pub type PracticeId = NonZeroI32;
/// Serial identifier of a question. Stable for the lifetime of its practice.
pub type QuestionId = NonZeroI32;
/// Serial identifier of an attempt.
pub type AttemptId = NonZeroI32;
