mod admin;
mod attempts;
mod error;
mod practices;

mod util {
    pub mod query;
    pub mod session;
}

use db::Store;
use error::{Error, Result};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::{
    body::{Body, Bytes},
    header::{HeaderValue, CONTENT_TYPE},
    HeaderMap, Method, Request,
};
use model::Session;
use serde::{de::DeserializeOwned, Serialize};
use std::{error::Error as StdError, sync::Arc};

pub type Response = hyper::Response<Full<Bytes>>;

/// Request bodies beyond this many bytes are rejected outright.
const MAX_BODY: usize = 1 << 20;

fn json<T: Serialize + ?Sized>(value: &T) -> Result<Response> {
    let bytes = serde_json::to_vec(value).map_err(|err| {
        log::error!("cannot serialize response: {err}");
        Error::Fatal
    })?;
    let mut res = Response::new(Full::new(Bytes::from(bytes)));
    assert!(res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json")).is_none());
    Ok(res)
}

async fn read_json<T, B>(body: B) -> Result<T>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let bytes = match Limited::new(body, MAX_BODY).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => return Err(Error::PayloadTooLarge),
        Err(_) => return Err(Error::MalformedBody),
    };
    serde_json::from_slice(&bytes).map_err(|_| Error::MalformedBody)
}

#[derive(Clone)]
pub struct App {
    store: Arc<dyn Store>,
}

impl App {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Answers a request. Failures are rendered as `{"error": ...}` bodies.
    pub async fn respond<B>(&self, req: Request<B>) -> Response
    where
        B: Body,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let method = req.method().clone();
        let path: Box<str> = req.uri().path().into();
        match self.try_respond(req).await {
            Ok(res) => res,
            Err(err) => {
                if err.status().is_server_error() {
                    log::error!("{method} {path} failed: {err}");
                } else {
                    log::warn!("{method} {path} rejected with {}: {err}", err.status());
                }
                err.into_response()
            }
        }
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<Session> {
        let token = util::session::extract_session(headers)?;
        self.store.get_session(token).await.map_err(|err| match err {
            db::error::Error::NotFound => Error::Unauthorized,
            other => other.into(),
        })
    }

    async fn authenticate_admin(&self, headers: &HeaderMap) -> Result<Session> {
        let session = self.authenticate(headers).await?;
        if session.is_admin() {
            Ok(session)
        } else {
            Err(Error::Forbidden)
        }
    }

    async fn try_respond<B>(&self, req: Request<B>) -> Result<Response>
    where
        B: Body,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let store = &*self.store;
        let query = parts.uri.query().unwrap_or_default();
        let segments: Vec<_> = parts.uri.path().trim_matches('/').split('/').collect();

        match (&parts.method, segments.as_slice()) {
            (&Method::GET, ["api", "practices"]) => practices::list(store).await,
            (&Method::GET, ["api", "practices", slug]) => practices::get_by_slug(store, slug).await,
            (_, ["api", "practices"] | ["api", "practices", _]) => Err(Error::MethodNotAllowed),
            (method, ["api", "admin", "practices"]) => {
                if ![Method::GET, Method::POST, Method::PUT, Method::DELETE].contains(method) {
                    return Err(Error::MethodNotAllowed);
                }
                self.authenticate_admin(&parts.headers).await?;
                match *method {
                    Method::GET => admin::get(store, query).await,
                    Method::POST => admin::create(store, read_json(body).await?).await,
                    Method::PUT => admin::update(store, read_json(body).await?).await,
                    _ => admin::delete(store, query).await,
                }
            }
            (&Method::POST, ["api", "practice-attempts"]) => {
                let session = self.authenticate(&parts.headers).await?;
                attempts::start(store, &session, read_json(body).await?).await
            }
            (&Method::GET, ["api", "practice-attempts", "user"]) => {
                let session = self.authenticate(&parts.headers).await?;
                attempts::list(store, &session).await
            }
            (&Method::GET, ["api", "practice-attempts", "check", slug]) => {
                let session = self.authenticate(&parts.headers).await?;
                attempts::check(store, &session, slug).await
            }
            (&Method::PUT, ["api", "practice-attempts", id]) => {
                let session = self.authenticate(&parts.headers).await?;
                let id = attempts::parse_id(id).ok_or(Error::NotFound("Practice attempt not found"))?;
                attempts::submit(store, &session, id, read_json(body).await?).await
            }
            (&Method::GET, ["api", "practice-attempts", id, "result"]) => {
                let session = self.authenticate(&parts.headers).await?;
                let id = attempts::parse_id(id).ok_or(Error::NotFound("Practice attempt not found"))?;
                attempts::result(store, &session, id).await
            }
            (&Method::GET, ["api", "practice-attempts", id, "results"]) => {
                let session = self.authenticate(&parts.headers).await?;
                let id = attempts::parse_id(id).ok_or(Error::NotFound("Practice attempt not found"))?;
                attempts::results(store, &session, id).await
            }
            (&Method::GET, ["api", "practice-attempts", id, "verify"]) => {
                let session = self.authenticate(&parts.headers).await?;
                attempts::verify(store, &session, attempts::parse_id(id)).await
            }
            (
                _,
                ["api", "practice-attempts"]
                | ["api", "practice-attempts", _]
                | ["api", "practice-attempts", "check", _]
                | ["api", "practice-attempts", _, "result" | "results" | "verify"],
            ) => Err(Error::MethodNotAllowed),
            _ => Err(Error::NotFound("Not found")),
        }
    }
}
