use crate::{error, PracticeOrder, Store};
use async_trait::async_trait;
use chrono::Utc;
use core::num::NonZeroI32;
use model::{
    Attempt, AttemptId, Practice, PracticeDraft, PracticeId, Question, QuestionBody, Scorecard, Session, Submission,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard},
};

#[derive(Default)]
struct Tables {
    sessions: HashMap<Box<str>, Session>,
    practices: BTreeMap<PracticeId, Practice>,
    questions: BTreeMap<PracticeId, Vec<Question>>,
    attempts: BTreeMap<AttemptId, Attempt>,
    serial: i32,
}

impl Tables {
    fn next_id(&mut self) -> error::Result<NonZeroI32> {
        self.serial = self.serial.checked_add(1).ok_or(error::Error::Fatal)?;
        NonZeroI32::new(self.serial).ok_or(error::Error::Fatal)
    }

    fn slug_taken(&self, slug: &str, owner: Option<PracticeId>) -> bool {
        self.practices.values().any(|practice| practice.slug == slug && Some(practice.id) != owner)
    }

    fn replace_questions(&mut self, practice: PracticeId, bodies: &[QuestionBody]) -> error::Result<()> {
        let mut questions = Vec::with_capacity(bodies.len());
        for body in bodies {
            questions.push(Question { id: self.next_id()?, body: body.clone() });
        }
        questions.sort_by_key(|question| (question.body.order, question.id));
        self.questions.insert(practice, questions);
        Ok(())
    }

    fn latest_completed(&self, user: &str, practice: PracticeId) -> Option<&Attempt> {
        self.attempts
            .values()
            .filter(|attempt| &*attempt.user_id == user && attempt.practice_id == practice && attempt.is_completed())
            .max_by_key(|attempt| (attempt.completed_at, attempt.id))
    }
}

/// Mirrors the constraints of the practice tables.
fn check_draft(draft: &PracticeDraft) -> error::Result<u32> {
    if draft.title.trim().is_empty() || draft.slug.trim().is_empty() {
        return Err(error::Error::BadInput);
    }
    match i32::try_from(draft.time_limit) {
        Ok(limit) if limit > 0 => Ok(draft.time_limit),
        _ => Err(error::Error::BadInput),
    }
}

/// Process-local [`Store`] with the same rules as the PostgreSQL one.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session token, standing in for the auth framework.
    pub fn insert_session(&self, token: impl Into<Box<str>>, session: Session) -> error::Result<()> {
        self.lock()?.sessions.insert(token.into(), session);
        Ok(())
    }

    fn lock(&self) -> error::Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| error::Error::Fatal)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_session(&self, token: &str) -> error::Result<Session> {
        self.lock()?.sessions.get(token).cloned().ok_or(error::Error::NotFound)
    }

    async fn list_practices(&self, order: PracticeOrder) -> error::Result<Vec<Practice>> {
        let mut practices: Vec<_> = self.lock()?.practices.values().cloned().collect();
        match order {
            PracticeOrder::Newest => practices.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id))),
            PracticeOrder::RecentlyUpdated => practices.sort_by(|a, b| (b.updated_at, b.id).cmp(&(a.updated_at, a.id))),
        }
        Ok(practices)
    }

    async fn get_practice(&self, id: PracticeId) -> error::Result<Practice> {
        self.lock()?.practices.get(&id).cloned().ok_or(error::Error::NotFound)
    }

    async fn get_practice_by_slug(&self, slug: &str) -> error::Result<Practice> {
        self.lock()?.practices.values().find(|practice| practice.slug == slug).cloned().ok_or(error::Error::NotFound)
    }

    async fn get_questions(&self, practice: PracticeId) -> error::Result<Vec<Question>> {
        Ok(self.lock()?.questions.get(&practice).cloned().unwrap_or_default())
    }

    async fn create_practice(&self, draft: &PracticeDraft) -> error::Result<Practice> {
        let time_limit = check_draft(draft)?;
        let mut tables = self.lock()?;
        if tables.slug_taken(&draft.slug, None) {
            return Err(error::Error::AlreadyExists);
        }

        let now = Utc::now();
        let practice = Practice {
            id: tables.next_id()?,
            title: draft.title.clone(),
            slug: draft.slug.clone(),
            description: draft.description.clone(),
            content: draft.content.clone(),
            time_limit,
            created_at: now,
            updated_at: now,
        };
        tables.replace_questions(practice.id, &draft.questions)?;
        tables.practices.insert(practice.id, practice.clone());
        Ok(practice)
    }

    async fn update_practice(&self, id: PracticeId, draft: &PracticeDraft) -> error::Result<Practice> {
        let time_limit = check_draft(draft)?;
        let mut tables = self.lock()?;
        if !tables.practices.contains_key(&id) {
            return Err(error::Error::NotFound);
        }
        if tables.slug_taken(&draft.slug, Some(id)) {
            return Err(error::Error::AlreadyExists);
        }

        tables.replace_questions(id, &draft.questions)?;
        let practice = tables.practices.get_mut(&id).ok_or(error::Error::NotFound)?;
        practice.title.clone_from(&draft.title);
        practice.slug.clone_from(&draft.slug);
        practice.description.clone_from(&draft.description);
        practice.content.clone_from(&draft.content);
        practice.time_limit = time_limit;
        practice.updated_at = Utc::now();
        Ok(practice.clone())
    }

    async fn delete_practice(&self, id: PracticeId) -> error::Result<()> {
        let mut tables = self.lock()?;
        tables.practices.remove(&id).ok_or(error::Error::NotFound)?;
        tables.questions.remove(&id);
        tables.attempts.retain(|_, attempt| attempt.practice_id != id);
        Ok(())
    }

    async fn start_attempt(&self, user: &str, practice: PracticeId) -> error::Result<Attempt> {
        let mut tables = self.lock()?;
        if tables.latest_completed(user, practice).is_some() {
            return Err(error::Error::AlreadyExists);
        }
        if !tables.practices.contains_key(&practice) {
            return Err(error::Error::NotFound);
        }

        let attempt = Attempt {
            id: tables.next_id()?,
            user_id: user.into(),
            practice_id: practice,
            started_at: Utc::now(),
            completed_at: None,
            time_spent: None,
            score: None,
            answers: None,
            per_question: None,
        };
        tables.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn get_attempt(&self, user: &str, id: AttemptId) -> error::Result<Attempt> {
        self.lock()?
            .attempts
            .get(&id)
            .filter(|attempt| &*attempt.user_id == user)
            .cloned()
            .ok_or(error::Error::NotFound)
    }

    async fn complete_attempt(
        &self,
        user: &str,
        id: AttemptId,
        submission: &Submission,
        card: &Scorecard,
    ) -> error::Result<Attempt> {
        let mut tables = self.lock()?;
        let practice = match tables.attempts.get(&id) {
            Some(attempt) if &*attempt.user_id == user => attempt.practice_id,
            _ => return Err(error::Error::NotFound),
        };
        if tables.latest_completed(user, practice).is_some() {
            return Err(error::Error::AlreadyExists);
        }

        let attempt = tables.attempts.get_mut(&id).ok_or(error::Error::NotFound)?;
        attempt.completed_at = Some(Utc::now());
        attempt.time_spent = Some(submission.time_spent);
        attempt.score = Some(card.total);
        attempt.answers = Some(submission.answers.clone());
        attempt.per_question = Some(card.per_question.clone());
        Ok(attempt.clone())
    }

    async fn latest_completed_attempt(&self, user: &str, practice: PracticeId) -> error::Result<Option<Attempt>> {
        Ok(self.lock()?.latest_completed(user, practice).cloned())
    }

    async fn list_attempts_by_user(&self, user: &str) -> error::Result<Vec<Attempt>> {
        let mut attempts: Vec<_> =
            self.lock()?.attempts.values().filter(|attempt| &*attempt.user_id == user).cloned().collect();
        attempts.sort_by(|a, b| (b.started_at, b.id).cmp(&(a.started_at, a.id)));
        Ok(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{QuestionId, QuestionKind, RawAnswers};
    use serde_json::json;

    fn draft(slug: &str) -> PracticeDraft {
        serde_json::from_value(json!({
            "title": "Fractions",
            "slug": slug,
            "timeLimit": 5,
            "questions": [
                { "content": "1/2 + 1/2", "questionType": "text", "correctAnswers": ["1"], "order": 2 },
                { "content": "Half of 4", "options": ["2", "3"], "correctAnswer": "2", "order": 1 },
            ],
        }))
        .unwrap()
    }

    fn submission() -> Submission {
        Submission { answers: RawAnswers::new(), time_spent: 12 }
    }

    fn card(total: u32) -> Scorecard {
        Scorecard { total, ..Scorecard::default() }
    }

    #[tokio::test]
    async fn questions_come_back_in_order() {
        let store = MemoryStore::new();
        let practice = store.create_practice(&draft("fractions")).await.unwrap();
        let questions = store.get_questions(practice.id).await.unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].body.content, "Half of 4");
        assert!(matches!(questions[1].body.kind, QuestionKind::Text { .. }));
    }

    #[tokio::test]
    async fn slugs_are_unique() {
        let store = MemoryStore::new();
        let first = store.create_practice(&draft("fractions")).await.unwrap();
        let second = store.create_practice(&draft("decimals")).await.unwrap();
        assert!(matches!(store.create_practice(&draft("fractions")).await, Err(error::Error::AlreadyExists)));
        assert!(matches!(store.update_practice(second.id, &draft("fractions")).await, Err(error::Error::AlreadyExists)));

        // Keeping one's own slug is fine
        let updated = store.update_practice(first.id, &draft("fractions")).await.unwrap();
        assert_eq!(updated.created_at, first.created_at);
        assert!(updated.updated_at >= first.updated_at);
        assert_eq!(store.list_practices(PracticeOrder::Newest).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_replaces_questions() {
        let store = MemoryStore::new();
        let practice = store.create_practice(&draft("fractions")).await.unwrap();
        let before = store.get_questions(practice.id).await.unwrap();

        let mut edited = draft("fractions");
        edited.questions.truncate(1);
        store.update_practice(practice.id, &edited).await.unwrap();

        let after = store.get_questions(practice.id).await.unwrap();
        assert_eq!(after.len(), 1);
        assert!(before.iter().all(|old| after.iter().all(|new| new.id != old.id)));
    }

    #[tokio::test]
    async fn rejects_what_the_schema_rejects() {
        let store = MemoryStore::new();
        let mut broken = draft("fractions");
        broken.time_limit = 0;
        assert!(matches!(store.create_practice(&broken).await, Err(error::Error::BadInput)));
        assert!(matches!(store.update_practice(PracticeId::new(9).unwrap(), &draft("x")).await, Err(error::Error::NotFound)));
        assert!(matches!(store.delete_practice(PracticeId::new(9).unwrap()).await, Err(error::Error::NotFound)));
    }

    #[tokio::test]
    async fn attempts_are_scored_once() {
        let store = MemoryStore::new();
        let practice = store.create_practice(&draft("fractions")).await.unwrap();
        let first = store.start_attempt("ana", practice.id).await.unwrap();
        let second = store.start_attempt("ana", practice.id).await.unwrap();

        // Strangers cannot see or submit the attempt
        assert!(matches!(store.get_attempt("bo", first.id).await, Err(error::Error::NotFound)));
        assert!(matches!(store.complete_attempt("bo", first.id, &submission(), &card(0)).await, Err(error::Error::NotFound)));

        let done = store.complete_attempt("ana", first.id, &submission(), &card(1)).await.unwrap();
        assert_eq!(done.score, Some(1));
        assert_eq!(done.time_spent, Some(12));
        assert!(done.is_completed());

        assert!(matches!(store.complete_attempt("ana", first.id, &submission(), &card(2)).await, Err(error::Error::AlreadyExists)));
        assert!(matches!(store.complete_attempt("ana", second.id, &submission(), &card(2)).await, Err(error::Error::AlreadyExists)));
        assert!(matches!(store.start_attempt("ana", practice.id).await, Err(error::Error::AlreadyExists)));
        assert_eq!(store.latest_completed_attempt("ana", practice.id).await.unwrap(), Some(done));

        // Other users are unaffected
        store.start_attempt("bo", practice.id).await.unwrap();
        assert_eq!(store.list_attempts_by_user("ana").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn completion_keeps_raw_answers_and_verdicts() {
        let store = MemoryStore::new();
        let practice = store.create_practice(&draft("fractions")).await.unwrap();
        let attempt = store.start_attempt("ana", practice.id).await.unwrap();

        let serde_json::Value::Object(answers) = json!({ "1": { "pick": "A" }, "2": 7, "x": "A" }) else {
            unreachable!()
        };
        let submission = Submission { answers, time_spent: 3 };
        let id = QuestionId::new(1).unwrap();
        let card = Scorecard { total: 0, per_question: [(id, false)].into_iter().collect() };
        let done = store.complete_attempt("ana", attempt.id, &submission, &card).await.unwrap();
        assert_eq!(done.answers.as_ref(), Some(&submission.answers));
        assert_eq!(done.per_question, Some(card.per_question.clone()));

        // Replacing the questions leaves the recorded verdicts alone
        store.update_practice(practice.id, &draft("fractions")).await.unwrap();
        let kept = store.get_attempt("ana", attempt.id).await.unwrap();
        assert_eq!(kept.per_question, Some(card.per_question));
    }

    #[tokio::test]
    async fn deleting_a_practice_cascades() {
        let store = MemoryStore::new();
        let practice = store.create_practice(&draft("fractions")).await.unwrap();
        store.start_attempt("ana", practice.id).await.unwrap();
        store.delete_practice(practice.id).await.unwrap();

        assert!(store.get_questions(practice.id).await.unwrap().is_empty());
        assert!(store.list_attempts_by_user("ana").await.unwrap().is_empty());
        assert!(matches!(store.start_attempt("ana", practice.id).await, Err(error::Error::NotFound)));
    }

    #[tokio::test]
    async fn sessions_resolve_by_token() {
        let store = MemoryStore::new();
        let session = Session { user: "ana".into(), role: model::Role::Admin };
        store.insert_session("token", session.clone()).unwrap();
        assert_eq!(store.get_session("token").await.unwrap(), session);
        assert!(matches!(store.get_session("other").await, Err(error::Error::NotFound)));
    }
}
