use crate::{
    error::{missing, Error, Result},
    json, Response,
};
use db::Store;
use model::{AttemptId, DateTime, PracticeId, Question, QuestionId, RawAnswers, Session, Submission, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const NOT_FOUND: &str = "Practice attempt not found";
const ALREADY_SUBMITTED: &str = "Practice attempt has already been submitted";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Start {
    #[serde(default)]
    pub practice_id: Option<PracticeId>,
}

#[derive(Serialize)]
struct Verification {
    exists: bool,
    completed: bool,
}

/// The caller's latest scored attempt at a practice, if any.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Check {
    exists: bool,
    completed: bool,
    attempt_id: Option<AttemptId>,
}

#[derive(Serialize)]
struct PracticeSummary<'p> {
    title: &'p str,
    slug: &'p str,
    description: Option<&'p str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Results<'a> {
    id: AttemptId,
    score: u32,
    total_questions: usize,
    percentage: u32,
    time_spent: u32,
    completed_at: Option<DateTime<Utc>>,
    answers: &'a RawAnswers,
    practice: PracticeSummary<'a>,
    questions: &'a [Question],
    per_question: &'a BTreeMap<QuestionId, bool>,
}

/// Parses the attempt segment of the path. Garbage can never name an attempt.
pub fn parse_id(raw: &str) -> Option<AttemptId> {
    raw.parse().ok().and_then(AttemptId::new)
}

pub async fn start(store: &dyn Store, session: &Session, Start { practice_id }: Start) -> Result<Response> {
    let practice = practice_id.ok_or(Error::BadRequest("Practice ID is required"))?;
    let attempt = store.start_attempt(&session.user, practice).await.map_err(|err| match err {
        db::error::Error::AlreadyExists => Error::Conflict("Practice has already been completed"),
        other => missing("Practice not found")(other),
    })?;
    log::info!("User {} started attempt {} on practice {practice}", session.user, attempt.id);
    json(&attempt)
}

/// Grades the submission against the current questions and records it. Only the first submission counts.
pub async fn submit(store: &dyn Store, session: &Session, id: AttemptId, submission: Submission) -> Result<Response> {
    let attempt = store.get_attempt(&session.user, id).await.map_err(missing(NOT_FOUND))?;
    if attempt.is_completed() {
        return Err(Error::Conflict(ALREADY_SUBMITTED));
    }

    let questions = store.get_questions(attempt.practice_id).await?;
    let card = grade::score(&questions, &submission.graded_answers());
    let attempt = store.complete_attempt(&session.user, id, &submission, &card).await.map_err(|err| match err {
        db::error::Error::AlreadyExists => Error::Conflict(ALREADY_SUBMITTED),
        other => missing(NOT_FOUND)(other),
    })?;

    log::info!("User {} scored {}/{} on attempt {id}", session.user, card.total, questions.len());
    json(&attempt)
}

pub async fn result(store: &dyn Store, session: &Session, id: AttemptId) -> Result<Response> {
    let attempt = store.get_attempt(&session.user, id).await.map_err(missing(NOT_FOUND))?;
    if !attempt.is_completed() {
        return Err(Error::BadRequest("Practice attempt has not been completed"));
    }
    json(&attempt)
}

/// Everything the results page needs. The verdicts are the ones recorded at submission.
pub async fn results(store: &dyn Store, session: &Session, id: AttemptId) -> Result<Response> {
    let attempt = store.get_attempt(&session.user, id).await.map_err(missing(NOT_FOUND))?;
    if !attempt.is_completed() {
        return Err(Error::BadRequest("Practice attempt has not been completed"));
    }

    let practice = store.get_practice(attempt.practice_id).await.map_err(missing("Practice not found"))?;
    let questions = store.get_questions(practice.id).await?;
    let answers = attempt.answers.unwrap_or_default();
    let per_question = attempt.per_question.unwrap_or_default();
    let score = attempt.score.unwrap_or_default();

    json(&Results {
        id: attempt.id,
        score,
        total_questions: questions.len(),
        percentage: model::attempt::percentage(score, questions.len()),
        time_spent: attempt.time_spent.unwrap_or_default(),
        completed_at: attempt.completed_at,
        answers: &answers,
        practice: PracticeSummary {
            title: &practice.title,
            slug: &practice.slug,
            description: practice.description.as_deref(),
        },
        questions: &questions,
        per_question: &per_question,
    })
}

pub async fn verify(store: &dyn Store, session: &Session, id: Option<AttemptId>) -> Result<Response> {
    let attempt = match id {
        Some(id) => match store.get_attempt(&session.user, id).await {
            Ok(attempt) => Some(attempt),
            Err(db::error::Error::NotFound) => None,
            Err(err) => return Err(err.into()),
        },
        None => None,
    };

    json(&Verification {
        exists: attempt.is_some(),
        completed: attempt.as_ref().is_some_and(|attempt| attempt.is_completed()),
    })
}

pub async fn check(store: &dyn Store, session: &Session, slug: &str) -> Result<Response> {
    let practice = store.get_practice_by_slug(slug).await.map_err(missing("Practice not found"))?;
    let attempt = store.latest_completed_attempt(&session.user, practice.id).await?;
    json(&Check {
        exists: attempt.is_some(),
        completed: attempt.as_ref().is_some_and(|attempt| attempt.is_completed()),
        attempt_id: attempt.map(|attempt| attempt.id),
    })
}

pub async fn list(store: &dyn Store, session: &Session) -> Result<Response> {
    let attempts = store.list_attempts_by_user(&session.user).await?;
    json(&attempts)
}
