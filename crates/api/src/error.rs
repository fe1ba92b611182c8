use http_body_util::Full;
use hyper::{
    body::Bytes,
    header::{HeaderValue, CONTENT_TYPE},
    Response, StatusCode,
};
use model::DraftError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Invalid request body")]
    MalformedBody,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error("Request body is too large")]
    PayloadTooLarge,
    #[error("{0}")]
    Conflict(&'static str),
    #[error("Internal server error")]
    Fatal,
}

impl From<db::error::Error> for Error {
    fn from(err: db::error::Error) -> Self {
        use db::error::Error as Db;
        match err {
            Db::NotFound => Self::NotFound("Not found"),
            Db::AlreadyExists => Self::Conflict("Already exists"),
            Db::BadInput => Self::BadRequest("Invalid input"),
            _ => Self::Fatal,
        }
    }
}

/// Maps a storage failure, naming the record when it is missing.
pub fn missing(what: &'static str) -> impl FnOnce(db::error::Error) -> Error {
    move |err| match err {
        db::error::Error::NotFound => Error::NotFound(what),
        other => other.into(),
    }
}

impl Error {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::MalformedBody | Self::BadRequest(_) | Self::Draft(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Renders the error as `{"error": "..."}`.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let body = serde_json::json!({ "error": self.to_string() });
        let mut res = Response::new(Full::new(Bytes::from(body.to_string())));
        *res.status_mut() = self.status();
        assert!(res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json")).is_none());
        res
    }
}

pub type Result<T> = core::result::Result<T, Error>;
