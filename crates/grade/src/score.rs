use crate::normalize;
use alloc::{
    collections::{btree_map::Entry, BTreeSet},
    string::String,
};
use core::slice;
use model::{Answer, Answers, Question, QuestionKind, Scorecard};

/// Decides one question. Absent, mistyped and unreadable answers are simply wrong.
///
/// Option answers are compared exactly as authored. Only text answers are normalized.
pub fn is_correct(kind: &QuestionKind, answer: Option<&Answer>) -> bool {
    let Some(answer) = answer else {
        return false;
    };
    match (kind, answer) {
        (QuestionKind::SingleChoice { correct, .. }, Answer::One(picked)) => picked == correct,
        (QuestionKind::MultipleChoice { correct, .. }, Answer::One(picked)) => {
            same_set(slice::from_ref(picked), correct)
        }
        (QuestionKind::MultipleChoice { correct, .. }, Answer::Many(picked)) => same_set(picked, correct),
        (QuestionKind::Text { accepted }, Answer::One(typed)) => {
            let typed = normalize(typed.as_str());
            !typed.is_empty() && accepted.iter().any(|literal| normalize(literal.as_str()) == typed)
        }
        _ => false,
    }
}

/// Symmetric set equality with the same number of picks, so repeated picks never pass.
///
/// An empty pick list means the question was left unanswered. It is never correct, even
/// against an empty correct set.
fn same_set(picked: &[String], correct: &[String]) -> bool {
    if picked.is_empty() || picked.len() != correct.len() {
        return false;
    }
    let picked: BTreeSet<_> = picked.iter().map(String::as_str).collect();
    let correct: BTreeSet<_> = correct.iter().map(String::as_str).collect();
    picked == correct
}

/// Grades every question against the submitted answers in one pass.
///
/// A repeated question id is graded once.
pub fn score<'q, I>(questions: I, answers: &Answers) -> Scorecard
where
    I: IntoIterator<Item = &'q Question>,
{
    let mut card = Scorecard::default();
    for question in questions {
        let Entry::Vacant(slot) = card.per_question.entry(question.id) else {
            continue;
        };
        let verdict = is_correct(&question.body.kind, answers.get(question.id));
        slot.insert(verdict);
        card.total += u32::from(verdict);
    }
    card
}
