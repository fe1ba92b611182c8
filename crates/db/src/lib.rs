pub mod error;
mod memory;

use async_trait::async_trait;
use core::num::NonZeroI32;
use futures_util::TryStreamExt;
use model::{
    AnswerType, Attempt, AttemptId, Practice, PracticeDraft, PracticeId, Question, QuestionBody, QuestionId,
    QuestionKind, QuestionType, RawAnswers, Role, Scorecard, Session, Submission,
};
use std::collections::BTreeMap;
use tokio_postgres::{types::Json, Row};

pub use memory::MemoryStore;
pub use tokio_postgres::{tls::NoTls, Client, Config};

/// Sort order of practice listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticeOrder {
    /// Most recently created first.
    Newest,
    /// Most recently edited first.
    RecentlyUpdated,
}

/// Everything the service persists. Attempts are always scoped to their owner.
#[async_trait]
pub trait Store: Send + Sync {
    /// Resolves an unexpired session token issued by the auth framework.
    async fn get_session(&self, token: &str) -> error::Result<Session>;

    async fn list_practices(&self, order: PracticeOrder) -> error::Result<Vec<Practice>>;
    async fn get_practice(&self, id: PracticeId) -> error::Result<Practice>;
    async fn get_practice_by_slug(&self, slug: &str) -> error::Result<Practice>;
    /// Questions of a practice, by `order` and then by id.
    async fn get_questions(&self, practice: PracticeId) -> error::Result<Vec<Question>>;
    async fn create_practice(&self, draft: &PracticeDraft) -> error::Result<Practice>;
    /// Replaces the practice details along with its whole question set.
    async fn update_practice(&self, id: PracticeId, draft: &PracticeDraft) -> error::Result<Practice>;
    /// Also removes the questions and attempts of the practice.
    async fn delete_practice(&self, id: PracticeId) -> error::Result<()>;

    /// Fails with [`AlreadyExists`](error::Error::AlreadyExists) once the user has a scored attempt.
    async fn start_attempt(&self, user: &str, practice: PracticeId) -> error::Result<Attempt>;
    async fn get_attempt(&self, user: &str, id: AttemptId) -> error::Result<Attempt>;
    /// Records the submission along with its grades. An attempt can only be completed once.
    async fn complete_attempt(
        &self,
        user: &str,
        id: AttemptId,
        submission: &Submission,
        card: &Scorecard,
    ) -> error::Result<Attempt>;
    async fn latest_completed_attempt(&self, user: &str, practice: PracticeId) -> error::Result<Option<Attempt>>;
    /// Newest attempt first.
    async fn list_attempts_by_user(&self, user: &str) -> error::Result<Vec<Attempt>>;
}

pub struct Database(Client);

impl From<Client> for Database {
    fn from(client: Client) -> Self {
        Self(client)
    }
}

impl Database {
    /// Applies the embedded schema. Safe to run on every start.
    pub async fn migrate(&self) -> error::Result<()> {
        self.0.batch_execute(include_str!("../schema.sql")).await?;
        Ok(())
    }
}

fn deserialize_id(row: &Row, column: &str) -> error::Result<NonZeroI32> {
    let id: i32 = row.try_get(column)?;
    NonZeroI32::new(id).ok_or(error::Error::Fatal)
}

fn deserialize_count(row: &Row, column: &str) -> error::Result<Option<u32>> {
    let count: Option<i32> = row.try_get(column)?;
    count.map(u32::try_from).transpose().map_err(|_| error::Error::Fatal)
}

fn deserialize_practice_from_row(row: &Row) -> error::Result<Practice> {
    let time_limit: i32 = row.try_get("time_limit")?;
    Ok(Practice {
        id: deserialize_id(row, "id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        content: row.try_get("content")?,
        time_limit: u32::try_from(time_limit).map_err(|_| error::Error::Fatal)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn deserialize_question_from_row(row: &Row) -> error::Result<Question> {
    let id = deserialize_id(row, "id")?;
    let question_type: &str = row.try_get("question_type")?;
    let answer_type: &str = row.try_get("answer_type")?;
    let options: Option<Vec<String>> = row.try_get("options")?;
    let correct_answer: Option<String> = row.try_get("correct_answer")?;
    let correct_answers: Option<Vec<String>> = row.try_get("correct_answers")?;
    let kind = question_type
        .parse::<QuestionType>()
        .and_then(|question_type| {
            let answer_type = answer_type.parse::<AnswerType>()?;
            QuestionKind::from_columns(question_type, answer_type, options, correct_answer, correct_answers)
        })
        .map_err(|err| {
            log::error!("question {id} is malformed: {err}");
            error::Error::Fatal
        })?;
    let body = QuestionBody {
        content: row.try_get("content")?,
        explanation: row.try_get("explanation")?,
        order: row.try_get("order")?,
        kind,
    };
    Ok(Question { id, body })
}

fn deserialize_attempt_from_row(row: &Row) -> error::Result<Attempt> {
    let user: String = row.try_get("user_id")?;
    let answers: Option<Json<RawAnswers>> = row.try_get("answers")?;
    let verdicts: Option<Json<BTreeMap<QuestionId, bool>>> = row.try_get("per_question")?;
    Ok(Attempt {
        id: deserialize_id(row, "id")?,
        user_id: user.into_boxed_str(),
        practice_id: deserialize_id(row, "practice_id")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        time_spent: deserialize_count(row, "time_spent")?,
        score: deserialize_count(row, "score")?,
        answers: answers.map(|Json(answers)| answers),
        per_question: verdicts.map(|Json(verdicts)| verdicts),
    })
}

const CREATE_PRACTICE: &str = r#"
WITH p AS (
    INSERT INTO practice (title, slug, description, content, time_limit)
    VALUES ($1, $2, $3, $4, $5)
    RETURNING id, title, slug, description, content, time_limit, created_at, updated_at
), inserted AS (
    INSERT INTO question (practice_id, content, explanation, "order", question_type, answer_type, options, correct_answer, correct_answers)
    SELECT p.id, q.content, q.explanation, COALESCE(q."order", 0), COALESCE(q."questionType", 'option'),
        COALESCE(q."answerType", 'single'), q.options, q."correctAnswer", q."correctAnswers"
    FROM p, jsonb_to_recordset($6::jsonb) AS q(
        content text, explanation text, "order" int, "questionType" text, "answerType" text,
        options text[], "correctAnswer" text, "correctAnswers" text[]
    )
)
SELECT id, title, slug, description, content, time_limit, created_at, updated_at FROM p"#;

const UPDATE_PRACTICE: &str = r#"
WITH p AS (
    UPDATE practice
    SET title = $2, slug = $3, description = $4, content = $5, time_limit = $6, updated_at = now()
    WHERE id = $1
    RETURNING id, title, slug, description, content, time_limit, created_at, updated_at
), old AS (
    DELETE FROM question USING p WHERE question.practice_id = p.id
), inserted AS (
    INSERT INTO question (practice_id, content, explanation, "order", question_type, answer_type, options, correct_answer, correct_answers)
    SELECT p.id, q.content, q.explanation, COALESCE(q."order", 0), COALESCE(q."questionType", 'option'),
        COALESCE(q."answerType", 'single'), q.options, q."correctAnswer", q."correctAnswers"
    FROM p, jsonb_to_recordset($7::jsonb) AS q(
        content text, explanation text, "order" int, "questionType" text, "answerType" text,
        options text[], "correctAnswer" text, "correctAnswers" text[]
    )
)
SELECT id, title, slug, description, content, time_limit, created_at, updated_at FROM p"#;

#[async_trait]
impl Store for Database {
    async fn get_session(&self, token: &str) -> error::Result<Session> {
        let row = self
            .0
            .query_opt(
                r#"SELECT u.id, u.role FROM session AS s JOIN "user" AS u ON u.id = s.user_id WHERE s.token = $1 AND s.expires_at > now()"#,
                &[&token],
            )
            .await?
            .ok_or(error::Error::NotFound)?;
        let user: String = row.try_get("id")?;
        let role: Option<&str> = row.try_get("role")?;
        Ok(Session { user: user.into_boxed_str(), role: Role::from_column(role) })
    }

    async fn list_practices(&self, order: PracticeOrder) -> error::Result<Vec<Practice>> {
        let query = match order {
            PracticeOrder::Newest => {
                "SELECT id, title, slug, description, content, time_limit, created_at, updated_at FROM practice ORDER BY created_at DESC, id DESC"
            }
            PracticeOrder::RecentlyUpdated => {
                "SELECT id, title, slug, description, content, time_limit, created_at, updated_at FROM practice ORDER BY updated_at DESC, id DESC"
            }
        };
        self.0.query(query, &[]).await?.iter().map(deserialize_practice_from_row).collect()
    }

    async fn get_practice(&self, id: PracticeId) -> error::Result<Practice> {
        let pid = id.get();
        let row = self
            .0
            .query_opt(
                "SELECT id, title, slug, description, content, time_limit, created_at, updated_at FROM practice WHERE id = $1",
                &[&pid],
            )
            .await?
            .ok_or(error::Error::NotFound)?;
        deserialize_practice_from_row(&row)
    }

    async fn get_practice_by_slug(&self, slug: &str) -> error::Result<Practice> {
        let row = self
            .0
            .query_opt(
                "SELECT id, title, slug, description, content, time_limit, created_at, updated_at FROM practice WHERE slug = $1",
                &[&slug],
            )
            .await?
            .ok_or(error::Error::NotFound)?;
        deserialize_practice_from_row(&row)
    }

    async fn get_questions(&self, practice: PracticeId) -> error::Result<Vec<Question>> {
        let pid = practice.get();
        self.0
            .query_raw(
                r#"SELECT id, content, explanation, "order", question_type, answer_type, options, correct_answer, correct_answers FROM question WHERE practice_id = $1 ORDER BY "order", id"#,
                [pid],
            )
            .await?
            .map_err(error::Error::from)
            .and_then(|row| core::future::ready(deserialize_question_from_row(&row)))
            .try_collect()
            .await
    }

    async fn create_practice(&self, draft: &PracticeDraft) -> error::Result<Practice> {
        let time_limit = i32::try_from(draft.time_limit).map_err(|_| error::Error::BadInput)?;
        let row = self
            .0
            .query_one(
                CREATE_PRACTICE,
                &[&draft.title, &draft.slug, &draft.description, &draft.content, &time_limit, &Json(&draft.questions)],
            )
            .await?;
        deserialize_practice_from_row(&row)
    }

    async fn update_practice(&self, id: PracticeId, draft: &PracticeDraft) -> error::Result<Practice> {
        let pid = id.get();
        let time_limit = i32::try_from(draft.time_limit).map_err(|_| error::Error::BadInput)?;
        let row = self
            .0
            .query_opt(
                UPDATE_PRACTICE,
                &[
                    &pid,
                    &draft.title,
                    &draft.slug,
                    &draft.description,
                    &draft.content,
                    &time_limit,
                    &Json(&draft.questions),
                ],
            )
            .await?
            .ok_or(error::Error::NotFound)?;
        deserialize_practice_from_row(&row)
    }

    async fn delete_practice(&self, id: PracticeId) -> error::Result<()> {
        let pid = id.get();
        match self.0.execute("DELETE FROM practice WHERE id = $1", &[&pid]).await? {
            0 => Err(error::Error::NotFound),
            _ => Ok(()),
        }
    }

    async fn start_attempt(&self, user: &str, practice: PracticeId) -> error::Result<Attempt> {
        if self.latest_completed_attempt(user, practice).await?.is_some() {
            return Err(error::Error::AlreadyExists);
        }

        let pid = practice.get();
        let row = self
            .0
            .query_one(
                "INSERT INTO practice_attempt (user_id, practice_id) VALUES ($1, $2) \
                 RETURNING id, user_id, practice_id, started_at, completed_at, time_spent, score, answers, per_question",
                &[&user, &pid],
            )
            .await?;
        deserialize_attempt_from_row(&row)
    }

    async fn get_attempt(&self, user: &str, id: AttemptId) -> error::Result<Attempt> {
        let aid = id.get();
        let row = self
            .0
            .query_opt(
                "SELECT id, user_id, practice_id, started_at, completed_at, time_spent, score, answers, per_question \
                 FROM practice_attempt WHERE id = $1 AND user_id = $2",
                &[&aid, &user],
            )
            .await?
            .ok_or(error::Error::NotFound)?;
        deserialize_attempt_from_row(&row)
    }

    async fn complete_attempt(
        &self,
        user: &str,
        id: AttemptId,
        submission: &Submission,
        card: &Scorecard,
    ) -> error::Result<Attempt> {
        let aid = id.get();
        let time_spent = i32::try_from(submission.time_spent).map_err(|_| error::Error::BadInput)?;
        let score = i32::try_from(card.total).map_err(|_| error::Error::BadInput)?;
        let maybe_row = self
            .0
            .query_opt(
                "UPDATE practice_attempt SET completed_at = now(), time_spent = $3, score = $4, answers = $5, per_question = $6 \
                 WHERE id = $1 AND user_id = $2 AND completed_at IS NULL \
                 RETURNING id, user_id, practice_id, started_at, completed_at, time_spent, score, answers, per_question",
                &[&aid, &user, &time_spent, &score, &Json(&submission.answers), &Json(&card.per_question)],
            )
            .await?;

        if let Some(row) = maybe_row {
            return deserialize_attempt_from_row(&row);
        }

        // Nothing updated: either someone else's attempt or one that was already scored.
        self.get_attempt(user, id).await?;
        Err(error::Error::AlreadyExists)
    }

    async fn latest_completed_attempt(&self, user: &str, practice: PracticeId) -> error::Result<Option<Attempt>> {
        let pid = practice.get();
        self.0
            .query_opt(
                "SELECT id, user_id, practice_id, started_at, completed_at, time_spent, score, answers, per_question \
                 FROM practice_attempt WHERE user_id = $1 AND practice_id = $2 AND completed_at IS NOT NULL \
                 ORDER BY completed_at DESC LIMIT 1",
                &[&user, &pid],
            )
            .await?
            .as_ref()
            .map(deserialize_attempt_from_row)
            .transpose()
    }

    async fn list_attempts_by_user(&self, user: &str) -> error::Result<Vec<Attempt>> {
        self.0
            .query_raw(
                "SELECT id, user_id, practice_id, started_at, completed_at, time_spent, score, answers, per_question \
                 FROM practice_attempt WHERE user_id = $1 ORDER BY started_at DESC, id DESC",
                [user],
            )
            .await?
            .map_err(error::Error::from)
            .and_then(|row| core::future::ready(deserialize_attempt_from_row(&row)))
            .try_collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, Database, NoTls, PracticeOrder, Store};
    use model::{PracticeDraft, QuestionKind, RawAnswers, Scorecard, Submission};

    fn draft(slug: &str) -> PracticeDraft {
        serde_json::from_value(serde_json::json!({
            "title": "Warm-up",
            "slug": slug,
            "timeLimit": 10,
            "questions": [
                { "content": "1 + 1", "questionType": "text", "correctAnswers": ["2"], "order": 2 },
                { "content": "Pick A", "options": ["A", "B"], "correctAnswer": "A", "order": 1 },
            ],
        }))
        .unwrap()
    }

    #[tokio::test(flavor = "current_thread")]
    #[ignore = "needs a live PostgreSQL database"]
    async fn database_test() {
        use std::env::var;
        let user = var("PG_USERNAME").unwrap();
        let pass = var("PG_PASSWORD").unwrap();
        let host = var("PG_HOSTNAME").unwrap();
        let data = var("PG_DATABASE").unwrap();

        let (client, conn) = Config::new()
            .user(&user)
            .password(&pass)
            .host(&host)
            .dbname(&data)
            .port(5432)
            .connect(NoTls)
            .await
            .expect("cannot connect to database");
        let handle = tokio::spawn(conn);
        let db = Database::from(client);
        db.migrate().await.unwrap();

        // Practice creation stores the questions in one go
        let slug = format!("db-test-{}", std::process::id());
        let practice = db.create_practice(&draft(&slug)).await.unwrap();
        assert!(matches!(db.create_practice(&draft(&slug)).await, Err(super::error::Error::AlreadyExists)));
        assert_eq!(db.get_practice_by_slug(&slug).await.unwrap(), practice);
        assert!(db.list_practices(PracticeOrder::Newest).await.unwrap().contains(&practice));

        let questions = db.get_questions(practice.id).await.unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].body.content, "Pick A");
        assert!(matches!(questions[1].body.kind, QuestionKind::Text { .. }));

        // One scored attempt per user
        let attempt = db.start_attempt("db-test-user", practice.id).await.unwrap();
        let mut answers = RawAnswers::new();
        answers.insert(questions[0].id.to_string(), "A".into());
        answers.insert("stray".into(), serde_json::json!({ "kept": true }));
        let submission = Submission { answers, time_spent: 30 };
        let card = Scorecard { total: 1, per_question: [(questions[0].id, true), (questions[1].id, false)].into_iter().collect() };
        let done = db.complete_attempt("db-test-user", attempt.id, &submission, &card).await.unwrap();
        assert_eq!(done.score, Some(1));
        assert_eq!(done.answers.as_ref(), Some(&submission.answers));
        assert_eq!(done.per_question.as_ref(), Some(&card.per_question));
        assert!(matches!(
            db.complete_attempt("db-test-user", attempt.id, &submission, &card).await,
            Err(super::error::Error::AlreadyExists)
        ));
        assert!(matches!(
            db.start_attempt("db-test-user", practice.id).await,
            Err(super::error::Error::AlreadyExists)
        ));
        assert_eq!(db.latest_completed_attempt("db-test-user", practice.id).await.unwrap(), Some(done));

        // Deleting cascades
        db.delete_practice(practice.id).await.unwrap();
        assert!(db.list_attempts_by_user("db-test-user").await.unwrap().is_empty());
        assert!(matches!(db.get_practice(practice.id).await, Err(super::error::Error::NotFound)));

        drop(db);
        handle.await.unwrap().unwrap();
    }
}
