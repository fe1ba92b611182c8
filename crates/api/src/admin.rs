use crate::{
    error::{missing, Error, Result},
    json,
    practices::PracticeView,
    util::query,
    Response,
};
use db::{PracticeOrder, Store};
use model::{PracticeDraft, PracticeId};
use serde::Deserialize;

const SLUG_TAKEN: &str = "A practice with this slug already exists";

#[derive(Deserialize)]
pub struct Replacement {
    pub id: PracticeId,
    #[serde(flatten)]
    pub draft: PracticeDraft,
}

fn slug_taken_or(what: &'static str) -> impl FnOnce(db::error::Error) -> Error {
    move |err| match err {
        db::error::Error::AlreadyExists => Error::Conflict(SLUG_TAKEN),
        other => missing(what)(other),
    }
}

/// Lists every practice, or shows one practice in full when `slug` is given.
pub async fn get(store: &dyn Store, query: &str) -> Result<Response> {
    let Some(slug) = query::find(query, "slug").filter(|slug| !slug.is_empty()) else {
        let practices = store.list_practices(PracticeOrder::RecentlyUpdated).await?;
        return json(&practices);
    };

    let practice = store.get_practice_by_slug(slug).await.map_err(missing("Practice not found"))?;
    let questions = store.get_questions(practice.id).await?;
    json(&PracticeView { practice: &practice, questions: &questions })
}

pub async fn create(store: &dyn Store, draft: PracticeDraft) -> Result<Response> {
    let draft = draft.prepare()?;
    let practice = store.create_practice(&draft).await.map_err(slug_taken_or("Practice not found"))?;
    log::info!("Created practice {} ({}) with {} questions", practice.id, practice.slug, draft.questions.len());
    json(&practice)
}

pub async fn update(store: &dyn Store, Replacement { id, draft }: Replacement) -> Result<Response> {
    let draft = draft.prepare()?;
    let practice = store.update_practice(id, &draft).await.map_err(slug_taken_or("Practice not found"))?;
    log::info!("Replaced practice {} ({}) with {} questions", practice.id, practice.slug, draft.questions.len());
    json(&practice)
}

pub async fn delete(store: &dyn Store, query: &str) -> Result<Response> {
    let id = query::find(query, "id").filter(|id| !id.is_empty()).ok_or(Error::BadRequest("Practice ID is required"))?;
    let id = id.parse().ok().and_then(PracticeId::new).ok_or(Error::NotFound("Practice not found"))?;
    store.delete_practice(id).await.map_err(missing("Practice not found"))?;
    log::info!("Deleted practice {id}");
    json(&serde_json::json!({ "success": true }))
}
