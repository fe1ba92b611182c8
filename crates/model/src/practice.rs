use crate::{PracticeId, QuestionBody, QuestionKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Practice {
    pub id: PracticeId,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    /// Markdown shown before the timer starts.
    pub content: String,
    /// Minutes allowed for one attempt.
    pub time_limit: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Authoring errors. Question numbers are 1-based, as shown to the author.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("Title is required")]
    TitleRequired,
    #[error("Slug is required")]
    SlugRequired,
    #[error("Time limit must be greater than 0")]
    TimeLimit,
    #[error("At least one question is required")]
    NoQuestions,
    #[error("Question {0} content is required")]
    ContentRequired(usize),
    #[error("Question {0} must have at least 2 options")]
    TooFewOptions(usize),
    #[error("Question {0} needs a correct answer")]
    MissingCorrectAnswer(usize),
    #[error("Question {0}'s correct answer must be one of the options")]
    AnswerNotAnOption(usize),
    #[error("Question {0} needs at least one correct answer")]
    MissingCorrectAnswers(usize),
    #[error("Question {0}'s correct answers must all be in the options list")]
    AnswersNotOptions(usize),
    #[error("Question {0} needs at least one acceptable answer")]
    MissingAcceptedAnswers(usize),
}

/// A practice as submitted by an admin, before it has an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeDraft {
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: String,
    pub time_limit: u32,
    pub questions: Vec<QuestionBody>,
}

impl PracticeDraft {
    /// Tidies then validates the draft, yielding what may be persisted.
    pub fn prepare(mut self) -> Result<Self, DraftError> {
        self.tidy();
        self.validate()?;
        Ok(self)
    }

    /// Drops empty options and derives a missing slug from the title.
    pub fn tidy(&mut self) {
        if self.slug.trim().is_empty() {
            self.slug = slugify(&self.title);
        }
        for question in &mut self.questions {
            if let QuestionKind::SingleChoice { options, .. } | QuestionKind::MultipleChoice { options, .. } =
                &mut question.kind
            {
                options.retain(|option| !option.is_empty());
            }
        }
    }

    pub fn validate(&self) -> Result<(), DraftError> {
        if self.title.trim().is_empty() {
            return Err(DraftError::TitleRequired);
        }
        if self.slug.trim().is_empty() {
            return Err(DraftError::SlugRequired);
        }
        if self.time_limit == 0 {
            return Err(DraftError::TimeLimit);
        }
        if self.questions.is_empty() {
            return Err(DraftError::NoQuestions);
        }
        for (index, question) in self.questions.iter().enumerate() {
            validate_question(index + 1, question)?;
        }
        Ok(())
    }
}

fn validate_question(number: usize, question: &QuestionBody) -> Result<(), DraftError> {
    if question.content.trim().is_empty() {
        return Err(DraftError::ContentRequired(number));
    }

    let options = question.kind.options();
    let has_option = |answer: &String| options.contains(answer);
    match &question.kind {
        QuestionKind::Text { accepted } => {
            if accepted.is_empty() {
                return Err(DraftError::MissingAcceptedAnswers(number));
            }
            return Ok(());
        }
        _ if options.iter().filter(|option| !option.trim().is_empty()).count() < 2 => {
            return Err(DraftError::TooFewOptions(number));
        }
        QuestionKind::SingleChoice { correct, .. } => {
            if correct.trim().is_empty() {
                return Err(DraftError::MissingCorrectAnswer(number));
            }
            if !has_option(correct) {
                return Err(DraftError::AnswerNotAnOption(number));
            }
        }
        QuestionKind::MultipleChoice { correct, .. } => {
            if correct.is_empty() {
                return Err(DraftError::MissingCorrectAnswers(number));
            }
            if !correct.iter().all(has_option) {
                return Err(DraftError::AnswersNotOptions(number));
            }
        }
    }
    Ok(())
}

/// Derives a URL slug: lowercase ASCII word characters separated by single hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.trim().chars().flat_map(char::to_lowercase) {
        let c = match c {
            c if c.is_whitespace() => '-',
            c if c == '-' || c == '_' || c.is_ascii_alphanumeric() => c,
            _ => continue,
        };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(questions: serde_json::Value) -> PracticeDraft {
        serde_json::from_value(json!({
            "title": "Week 1: Linear Equations!",
            "timeLimit": 15,
            "questions": questions,
        }))
        .unwrap()
    }

    #[test]
    fn slugs_drop_punctuation_and_collapse_hyphens() {
        assert_eq!(slugify("Week 1: Linear Equations!"), "week-1-linear-equations");
        assert_eq!(slugify("  a - b & c  "), "a-b-c");
        assert_eq!(slugify("snake_case stays"), "snake_case-stays");
        assert_eq!(slugify("Ünïcode"), "ncode");
    }

    #[test]
    fn prepare_derives_slug_and_drops_empty_options() {
        let prepared = draft(json!([{
            "content": "Solve 2x = 10",
            "options": ["5", "", "10"],
            "correctAnswer": "5",
        }]))
        .prepare()
        .unwrap();
        assert_eq!(prepared.slug, "week-1-linear-equations");
        assert_eq!(prepared.questions[0].kind.options(), ["5", "10"]);
    }

    #[test]
    fn explicit_slug_is_kept() {
        let mut draft = draft(json!([{ "content": "?", "questionType": "text", "correctAnswers": ["1"] }]));
        draft.slug = "custom".into();
        assert_eq!(draft.prepare().unwrap().slug, "custom");
    }

    #[test]
    fn rejects_each_authoring_mistake() {
        let cases = [
            (json!([]), DraftError::NoQuestions),
            (json!([{ "content": " ", "questionType": "text", "correctAnswers": ["1"] }]), DraftError::ContentRequired(1)),
            (json!([{ "content": "q", "options": ["A", " "], "correctAnswer": "A" }]), DraftError::TooFewOptions(1)),
            (json!([{ "content": "q", "options": ["A", "B"], "correctAnswer": " " }]), DraftError::MissingCorrectAnswer(1)),
            (json!([{ "content": "q", "options": ["A", "B"], "correctAnswer": "C" }]), DraftError::AnswerNotAnOption(1)),
            (
                json!([{ "content": "q", "answerType": "multiple", "options": ["A", "B"], "correctAnswers": [] }]),
                DraftError::MissingCorrectAnswers(1),
            ),
            (
                json!([{ "content": "q", "answerType": "multiple", "options": ["A", "B"], "correctAnswers": ["A", "Z"] }]),
                DraftError::AnswersNotOptions(1),
            ),
            (
                json!([
                    { "content": "ok", "questionType": "text", "correctAnswers": ["1"] },
                    { "content": "q", "questionType": "text" },
                ]),
                DraftError::MissingAcceptedAnswers(2),
            ),
        ];
        for (questions, expected) in cases {
            assert_eq!(draft(questions).prepare().unwrap_err(), expected);
        }
    }

    #[test]
    fn rejects_bad_details() {
        let mut untitled = draft(json!([{ "content": "q", "questionType": "text", "correctAnswers": ["1"] }]));
        untitled.title = "   ".into();
        assert_eq!(untitled.prepare().unwrap_err(), DraftError::TitleRequired);

        let mut punctuation = draft(json!([{ "content": "q", "questionType": "text", "correctAnswers": ["1"] }]));
        punctuation.title = "?!".into();
        assert_eq!(punctuation.prepare().unwrap_err(), DraftError::SlugRequired);

        let mut untimed = draft(json!([{ "content": "q", "questionType": "text", "correctAnswers": ["1"] }]));
        untimed.time_limit = 0;
        assert_eq!(untimed.prepare().unwrap_err(), DraftError::TimeLimit);
        assert_eq!(DraftError::TimeLimit.to_string(), "Time limit must be greater than 0");
    }
}
