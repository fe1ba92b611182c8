use crate::{AttemptId, QuestionId};
use core::fmt::{self, Formatter};
use serde::{
    de::{IgnoredAny, MapAccess, SeqAccess, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::{Map, Value};
use std::collections::{btree_map, BTreeMap};

/// Answers exactly as the client sent them. This is what gets stored with an attempt.
pub type RawAnswers = Map<String, Value>;

/// What a participant submitted for a single question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// A picked option or a typed answer.
    One(String),
    /// The picked options of a multi-select question.
    Many(Vec<String>),
    /// Anything else the client sent. Never correct.
    Unreadable,
}

impl Answer {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::One(text) => text.trim().is_empty(),
            Self::Many(picks) => picks.is_empty(),
            Self::Unreadable => true,
        }
    }
}

impl Serialize for Answer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::One(text) => serializer.serialize_str(text),
            Self::Many(picks) => picks.serialize(serializer),
            Self::Unreadable => serializer.serialize_unit(),
        }
    }
}

struct AnswerVisitor;

impl<'de> Visitor<'de> for AnswerVisitor {
    type Value = Answer;

    fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
        formatter.write_str("a string or a list of strings")
    }

    fn visit_str<E>(self, text: &str) -> Result<Self::Value, E> {
        Ok(Answer::One(text.into()))
    }

    fn visit_string<E>(self, text: String) -> Result<Self::Value, E> {
        Ok(Answer::One(text))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        // Elements are still drained after a bad one so the outer document stays in sync.
        let mut picks = Some(Vec::new());
        while let Some(item) = seq.next_element::<Answer>()? {
            match (item, picks.as_mut()) {
                (Answer::One(text), Some(list)) => list.push(text),
                _ => picks = None,
            }
        }
        Ok(picks.map_or(Answer::Unreadable, Answer::Many))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(Answer::Unreadable)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Answer::deserialize(deserializer)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(Answer::Unreadable)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(Answer::Unreadable)
    }

    fn visit_bool<E>(self, _: bool) -> Result<Self::Value, E> {
        Ok(Answer::Unreadable)
    }

    fn visit_i64<E>(self, _: i64) -> Result<Self::Value, E> {
        Ok(Answer::Unreadable)
    }

    fn visit_u64<E>(self, _: u64) -> Result<Self::Value, E> {
        Ok(Answer::Unreadable)
    }

    fn visit_f64<E>(self, _: f64) -> Result<Self::Value, E> {
        Ok(Answer::Unreadable)
    }
}

impl<'de> Deserialize<'de> for Answer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AnswerVisitor)
    }
}

/// Submitted answers keyed by question. Absent entries are unanswered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Answers(BTreeMap<QuestionId, Answer>);

impl Answers {
    pub fn get(&self, question: QuestionId) -> Option<&Answer> {
        self.0.get(&question)
    }

    pub fn insert(&mut self, question: QuestionId, answer: Answer) -> Option<Answer> {
        self.0.insert(question, answer)
    }

    pub fn remove(&mut self, question: QuestionId) -> Option<Answer> {
        self.0.remove(&question)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, QuestionId, Answer> {
        self.0.iter()
    }
}

impl FromIterator<(QuestionId, Answer)> for Answers {
    fn from_iter<I: IntoIterator<Item = (QuestionId, Answer)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Reads the gradable answers out of a raw submission. Nothing here can fail: odd values
/// become [`Answer::Unreadable`] and keys that are not question ids are skipped.
impl From<&RawAnswers> for Answers {
    fn from(raw: &RawAnswers) -> Self {
        raw.iter()
            .filter_map(|(key, value)| {
                let id = key.trim().parse().ok().and_then(QuestionId::new)?;
                Some((id, Answer::deserialize(value).unwrap_or(Answer::Unreadable)))
            })
            .collect()
    }
}

struct AnswersVisitor;

impl<'de> Visitor<'de> for AnswersVisitor {
    type Value = Answers;

    fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
        formatter.write_str("a map of question ids to answers")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut answers = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            let Some(id) = key.trim().parse().ok().and_then(QuestionId::new) else {
                map.next_value::<IgnoredAny>()?;
                continue;
            };
            answers.insert(id, map.next_value()?);
        }
        Ok(Answers(answers))
    }
}

impl<'de> Deserialize<'de> for Answers {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(AnswersVisitor)
    }
}

/// In-progress answers for a timed session, edited the way the question widgets do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSheet {
    answers: Answers,
}

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks the only option of a single-choice question.
    pub fn choose(&mut self, question: QuestionId, option: impl Into<String>) {
        self.answers.insert(question, Answer::One(option.into()));
    }

    /// Checks or unchecks one option of a multi-select question.
    pub fn toggle(&mut self, question: QuestionId, option: &str, checked: bool) {
        let mut picks = match self.answers.remove(question) {
            Some(Answer::Many(picks)) => picks,
            _ => Vec::new(),
        };
        if checked {
            if !picks.iter().any(|pick| pick == option) {
                picks.push(option.into());
            }
        } else {
            picks.retain(|pick| pick != option);
        }
        self.answers.insert(question, Answer::Many(picks));
    }

    /// Replaces the typed answer of a text question.
    pub fn write(&mut self, question: QuestionId, text: impl Into<String>) {
        self.answers.insert(question, Answer::One(text.into()));
    }

    pub fn clear(&mut self, question: QuestionId) {
        self.answers.remove(question);
    }

    /// Number of questions with a non-blank answer.
    pub fn answered(&self) -> usize {
        self.answers.iter().filter(|(_, answer)| !answer.is_blank()).count()
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    pub fn into_answers(self) -> Answers {
        self.answers
    }
}

impl From<Answers> for AnswerSheet {
    fn from(answers: Answers) -> Self {
        Self { answers }
    }
}

/// Caller-persisted state that lets a participant resume a timed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSnapshot {
    pub attempt_id: AttemptId,
    /// Seconds left on the countdown when the snapshot was taken.
    pub time_remaining: u32,
    #[serde(default)]
    pub user_answers: Answers,
}

impl AttemptSnapshot {
    pub fn capture(attempt_id: AttemptId, time_remaining: u32, sheet: &AnswerSheet) -> Self {
        Self { attempt_id, time_remaining, user_answers: sheet.answers().clone() }
    }

    /// An expired countdown cannot be resumed; the attempt must be submitted or restarted.
    pub const fn is_resumable(&self) -> bool {
        self.time_remaining > 0
    }

    pub fn restore(self) -> AnswerSheet {
        self.user_answers.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn qid(id: i32) -> QuestionId {
        QuestionId::new(id).unwrap()
    }

    #[test]
    fn decodes_strings_and_lists() {
        let answers: Answers = serde_json::from_value(json!({
            "1": "x = 5",
            "2": ["A", "C"],
        }))
        .unwrap();
        assert_eq!(answers.get(qid(1)), Some(&Answer::One("x = 5".into())));
        assert_eq!(answers.get(qid(2)), Some(&Answer::Many(vec!["A".into(), "C".into()])));
        assert_eq!(answers.get(qid(3)), None);
    }

    #[test]
    fn odd_values_are_unreadable_not_errors() {
        let answers: Answers = serde_json::from_value(json!({
            "1": 42,
            "2": null,
            "3": { "nested": ["A"] },
            "4": ["A", 7, ["B"]],
            "5": true,
            "6": "fine",
        }))
        .unwrap();
        for id in 1..=5 {
            assert_eq!(answers.get(qid(id)), Some(&Answer::Unreadable), "question {id}");
        }
        assert_eq!(answers.get(qid(6)), Some(&Answer::One("fine".into())));
    }

    #[test]
    fn keys_that_are_not_question_ids_are_dropped() {
        let answers: Answers = serde_json::from_value(json!({
            "abc": "A",
            "0": "B",
            "-1": "C",
            "9": "D",
        }))
        .unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers.get(qid(9)), Some(&Answer::One("D".into())));
    }

    #[test]
    fn raw_submission_is_read_like_a_decoded_one() {
        let raw = json!({ "1": { "pick": "A" }, "2": 7, "3": "ok", "4": ["A", "B"], "x": "A" });
        let Value::Object(raw) = raw else { unreachable!() };
        let answers = Answers::from(&raw);
        assert_eq!(answers, serde_json::from_value::<Answers>(Value::Object(raw.clone())).unwrap());
        assert_eq!(answers.len(), 4);
        assert_eq!(answers.get(qid(1)), Some(&Answer::Unreadable));
        assert_eq!(answers.get(qid(2)), Some(&Answer::Unreadable));
        assert_eq!(answers.get(qid(3)), Some(&Answer::One("ok".into())));
        assert_eq!(answers.get(qid(4)), Some(&Answer::Many(vec!["A".into(), "B".into()])));

        // The raw map itself is untouched
        assert_eq!(raw["x"], "A");
        assert_eq!(raw["1"], json!({ "pick": "A" }));
    }

    #[test]
    fn answers_must_be_a_map() {
        assert!(serde_json::from_value::<Answers>(json!(["A"])).is_err());
        assert!(serde_json::from_value::<Answers>(json!(null)).is_err());
    }

    #[test]
    fn serializes_with_string_keys() {
        let answers: Answers =
            [(qid(1), Answer::One("B".into())), (qid(2), Answer::Many(vec!["A".into()]))].into_iter().collect();
        assert_eq!(serde_json::to_value(&answers).unwrap(), json!({ "1": "B", "2": ["A"] }));
    }

    #[test]
    fn sheet_toggles_multi_select_options() {
        let mut sheet = AnswerSheet::new();
        sheet.toggle(qid(1), "A", true);
        sheet.toggle(qid(1), "C", true);
        sheet.toggle(qid(1), "A", true);
        sheet.toggle(qid(1), "C", false);
        assert_eq!(sheet.answers().get(qid(1)), Some(&Answer::Many(vec!["A".into()])));

        sheet.choose(qid(2), "B");
        sheet.write(qid(3), "   ");
        assert_eq!(sheet.answered(), 2);

        sheet.clear(qid(2));
        assert_eq!(sheet.answered(), 1);
    }

    #[test]
    fn snapshot_restores_the_same_sheet() {
        let mut sheet = AnswerSheet::new();
        sheet.choose(qid(1), "B");
        sheet.write(qid(2), "x=5");

        let snapshot = AttemptSnapshot::capture(AttemptId::new(11).unwrap(), 90, &sheet);
        let text = serde_json::to_string(&snapshot).unwrap();
        let restored: AttemptSnapshot = serde_json::from_str(&text).unwrap();
        assert!(restored.is_resumable());
        assert_eq!(restored.restore(), sheet);
    }

    #[test]
    fn expired_snapshot_is_not_resumable() {
        let snapshot: AttemptSnapshot = serde_json::from_value(json!({
            "attemptId": 4,
            "timeRemaining": 0,
        }))
        .unwrap();
        assert!(!snapshot.is_resumable());
        assert!(snapshot.user_answers.is_empty());
    }
}
