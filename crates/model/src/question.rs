use crate::QuestionId;
use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuestionError {
    #[error("unknown question type `{0}`")]
    UnknownQuestionType(Box<str>),
    #[error("unknown answer type `{0}`")]
    UnknownAnswerType(Box<str>),
    #[error("single-answer questions require a `correctAnswer`")]
    MissingCorrectAnswer,
    #[error("question is missing its `id`")]
    MissingId,
}

/// Whether the participant picks from options or types an answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[default]
    #[serde(rename = "option")]
    Choice,
    #[serde(rename = "text")]
    Text,
}

impl QuestionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Choice => "option",
            Self::Text => "text",
        }
    }
}

impl FromStr for QuestionType {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "option" => Ok(Self::Choice),
            "text" => Ok(Self::Text),
            other => Err(QuestionError::UnknownQuestionType(other.into())),
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many options an option question accepts. Meaningless for text questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerType {
    #[default]
    Single,
    Multiple,
}

impl AnswerType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multiple => "multiple",
        }
    }
}

impl FromStr for AnswerType {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "multiple" => Ok(Self::Multiple),
            other => Err(QuestionError::UnknownAnswerType(other.into())),
        }
    }
}

impl fmt::Display for AnswerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three gradable shapes of a question, along with what counts as correct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    /// Exactly one option must be picked. Compared verbatim.
    SingleChoice { options: Vec<String>, correct: String },
    /// The picked options must equal the correct set. Compared verbatim.
    MultipleChoice { options: Vec<String>, correct: Vec<String> },
    /// Free text, matched after normalization against any accepted literal.
    Text { accepted: Vec<String> },
}

impl QuestionKind {
    /// Rebuilds the variant from the flat, persisted column layout.
    ///
    /// Missing lists are read as empty. An option question with a single answer
    /// cannot exist without its correct answer, so that case is rejected.
    pub fn from_columns(
        question_type: QuestionType,
        answer_type: AnswerType,
        options: Option<Vec<String>>,
        correct_answer: Option<String>,
        correct_answers: Option<Vec<String>>,
    ) -> Result<Self, QuestionError> {
        Ok(match (question_type, answer_type) {
            (QuestionType::Text, _) => Self::Text { accepted: correct_answers.unwrap_or_default() },
            (QuestionType::Choice, AnswerType::Single) => Self::SingleChoice {
                options: options.unwrap_or_default(),
                correct: correct_answer.ok_or(QuestionError::MissingCorrectAnswer)?,
            },
            (QuestionType::Choice, AnswerType::Multiple) => Self::MultipleChoice {
                options: options.unwrap_or_default(),
                correct: correct_answers.unwrap_or_default(),
            },
        })
    }

    pub const fn question_type(&self) -> QuestionType {
        match self {
            Self::SingleChoice { .. } | Self::MultipleChoice { .. } => QuestionType::Choice,
            Self::Text { .. } => QuestionType::Text,
        }
    }

    pub const fn answer_type(&self) -> AnswerType {
        match self {
            Self::MultipleChoice { .. } => AnswerType::Multiple,
            Self::SingleChoice { .. } | Self::Text { .. } => AnswerType::Single,
        }
    }

    /// Options to display. Always empty for text questions.
    pub fn options(&self) -> &[String] {
        match self {
            Self::SingleChoice { options, .. } | Self::MultipleChoice { options, .. } => options,
            Self::Text { .. } => &[],
        }
    }

    /// The `correctAnswer` column. Only single-choice questions populate it.
    pub fn correct_answer(&self) -> Option<&str> {
        match self {
            Self::SingleChoice { correct, .. } => Some(correct),
            _ => None,
        }
    }

    /// The `correctAnswers` column: the correct set, or the accepted literals.
    pub fn correct_answers(&self) -> Option<&[String]> {
        match self {
            Self::MultipleChoice { correct, .. } => Some(correct),
            Self::Text { accepted } => Some(accepted),
            Self::SingleChoice { .. } => None,
        }
    }
}

/// Everything about a question except its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuestion", into = "RawQuestion")]
pub struct QuestionBody {
    /// Markdown prompt.
    pub content: String,
    /// Markdown shown on the results page.
    pub explanation: Option<String>,
    /// Position within the practice.
    pub order: i32,
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuestion", into = "RawQuestion")]
pub struct Question {
    pub id: QuestionId,
    pub body: QuestionBody,
}

/// Flat JSON layout shared with the admin tooling and the results page.
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<QuestionId>,
    content: String,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    order: i32,
    #[serde(default)]
    question_type: Option<QuestionType>,
    #[serde(default)]
    answer_type: Option<AnswerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correct_answers: Option<Vec<String>>,
}

impl TryFrom<RawQuestion> for QuestionBody {
    type Error = QuestionError;

    fn try_from(raw: RawQuestion) -> Result<Self, Self::Error> {
        let RawQuestion {
            content,
            explanation,
            order,
            question_type,
            answer_type,
            options,
            correct_answer,
            correct_answers,
            ..
        } = raw;
        let kind = QuestionKind::from_columns(
            question_type.unwrap_or_default(),
            answer_type.unwrap_or_default(),
            options,
            correct_answer,
            correct_answers,
        )?;
        Ok(Self { content, explanation, order, kind })
    }
}

impl TryFrom<RawQuestion> for Question {
    type Error = QuestionError;

    fn try_from(raw: RawQuestion) -> Result<Self, Self::Error> {
        let id = raw.id.ok_or(QuestionError::MissingId)?;
        let body = QuestionBody::try_from(raw)?;
        Ok(Self { id, body })
    }
}

impl From<QuestionBody> for RawQuestion {
    fn from(body: QuestionBody) -> Self {
        let QuestionBody { content, explanation, order, kind } = body;
        let question_type = Some(kind.question_type());
        let answer_type = Some(kind.answer_type());
        let (options, correct_answer, correct_answers) = match kind {
            QuestionKind::SingleChoice { options, correct } => (Some(options), Some(correct), None),
            QuestionKind::MultipleChoice { options, correct } => (Some(options), None, Some(correct)),
            QuestionKind::Text { accepted } => (None, None, Some(accepted)),
        };
        Self { id: None, content, explanation, order, question_type, answer_type, options, correct_answer, correct_answers }
    }
}

impl From<Question> for RawQuestion {
    fn from(Question { id, body }: Question) -> Self {
        Self { id: Some(id), ..Self::from(body) }
    }
}

/// A question as shown to a participant while the timer runs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion<'q> {
    pub id: QuestionId,
    pub content: &'q str,
    pub options: &'q [String],
    pub question_type: QuestionType,
    pub answer_type: AnswerType,
    pub order: i32,
}

impl<'q> From<&'q Question> for PublicQuestion<'q> {
    fn from(question: &'q Question) -> Self {
        let QuestionBody { content, order, kind, .. } = &question.body;
        Self {
            id: question.id,
            content,
            options: kind.options(),
            question_type: kind.question_type(),
            answer_type: kind.answer_type(),
            order: *order,
        }
    }
}
