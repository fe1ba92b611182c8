use crate::{
    error::{missing, Result},
    json, Response,
};
use db::{PracticeOrder, Store};
use model::{Practice, PublicQuestion};
use serde::Serialize;

/// A practice along with its questions, in whichever view the caller may see.
#[derive(Serialize)]
pub struct PracticeView<'p, Q> {
    #[serde(flatten)]
    pub practice: &'p Practice,
    pub questions: Q,
}

pub async fn list(store: &dyn Store) -> Result<Response> {
    let practices = store.list_practices(PracticeOrder::Newest).await?;
    json(&practices)
}

/// Participants never see the correct answers nor the explanations.
pub async fn get_by_slug(store: &dyn Store, slug: &str) -> Result<Response> {
    let practice = store.get_practice_by_slug(slug).await.map_err(missing("Practice not found"))?;
    let questions = store.get_questions(practice.id).await?;
    let questions: Vec<_> = questions.iter().map(PublicQuestion::from).collect();
    json(&PracticeView { practice: &practice, questions })
}
