use crate::{Answers, AttemptId, PracticeId, QuestionId, RawAnswers};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One participant's timed run through a practice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: AttemptId,
    pub user_id: Box<str>,
    pub practice_id: PracticeId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds on the clock when the attempt was submitted.
    pub time_spent: Option<u32>,
    pub score: Option<u32>,
    /// The submitted answers, exactly as sent.
    pub answers: Option<RawAnswers>,
    /// Verdicts recorded at submission, keyed by the question ids of that moment.
    pub per_question: Option<BTreeMap<QuestionId, bool>>,
}

impl Attempt {
    pub const fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Request body of a submission. Both fields are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub answers: RawAnswers,
    pub time_spent: u32,
}

impl Submission {
    pub fn graded_answers(&self) -> Answers {
        Answers::from(&self.answers)
    }
}

/// Outcome of grading one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scorecard {
    /// Number of questions answered correctly.
    pub total: u32,
    pub per_question: BTreeMap<QuestionId, bool>,
}

impl Scorecard {
    pub fn is_correct(&self, question: QuestionId) -> bool {
        self.per_question.get(&question).copied().unwrap_or(false)
    }

    /// Share of correct answers as a whole percent, rounded half up.
    pub fn percentage(&self, question_count: usize) -> u32 {
        percentage(self.total, question_count)
    }
}

/// Rounds `score / count` to a whole percent. An empty practice scores zero.
pub fn percentage(score: u32, question_count: usize) -> u32 {
    let Ok(count) = u64::try_from(question_count) else {
        return 0;
    };
    if count == 0 {
        return 0;
    }
    let rounded = (u64::from(score) * 200 + count) / (count * 2);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn percentages_round_half_up() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(3, 5), 60);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(4, 4), 100);
    }

    #[test]
    fn submission_needs_both_fields() {
        assert!(serde_json::from_value::<Submission>(json!({ "answers": {} })).is_err());
        assert!(serde_json::from_value::<Submission>(json!({ "timeSpent": 12 })).is_err());
        assert!(serde_json::from_value::<Submission>(json!({ "answers": {}, "timeSpent": -1 })).is_err());

        let submission: Submission =
            serde_json::from_value(json!({ "answers": { "3": "A" }, "timeSpent": 42 })).unwrap();
        assert_eq!(submission.time_spent, 42);
        assert_eq!(submission.answers.len(), 1);
        assert_eq!(submission.graded_answers().len(), 1);

        assert!(serde_json::from_value::<Submission>(json!({ "answers": ["A"], "timeSpent": 1 })).is_err());
    }

    #[test]
    fn submission_keeps_what_was_sent() {
        let submission: Submission = serde_json::from_value(json!({
            "answers": { "1": { "pick": "A" }, "2": 7, "3": "ok", "x": "A" },
            "timeSpent": 5,
        }))
        .unwrap();
        assert_eq!(
            serde_json::to_value(&submission.answers).unwrap(),
            json!({ "1": { "pick": "A" }, "2": 7, "3": "ok", "x": "A" })
        );
        assert_eq!(submission.graded_answers().len(), 3);
    }

    #[test]
    fn scorecard_serializes_per_question_verdicts() {
        let card = Scorecard {
            total: 1,
            per_question: [(QuestionId::new(1).unwrap(), true), (QuestionId::new(2).unwrap(), false)]
                .into_iter()
                .collect(),
        };
        assert!(card.is_correct(QuestionId::new(1).unwrap()));
        assert!(!card.is_correct(QuestionId::new(9).unwrap()));
        assert_eq!(
            serde_json::to_value(&card).unwrap(),
            json!({ "total": 1, "perQuestion": { "1": true, "2": false } })
        );
    }
}
