//! JSON body extractors whose failures use the `AppError` response shape.

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;

use crate::errors::{AppError, AppResult};

/// Required JSON body. Type and shape errors become `validation:<path>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

/// JSON body that may be left out entirely. A body that is present must be
/// valid JSON sent as `application/json`; it is never silently dropped.
#[derive(Debug, Clone, Default)]
pub struct OptionalJson<T>(pub Option<T>);

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false)
}

async fn read_body<S: Send + Sync>(req: Request, state: &S) -> AppResult<(bool, Bytes)> {
    let json = is_json(req.headers());
    let bytes = Bytes::from_request(req, state)
        .await
        .map_err(|e| AppError::bad_request(format!("failed to read request body: {e}")))?;
    Ok((json, bytes))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> AppResult<T> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut de).map_err(|err| {
        let path = err.path().to_string();
        let inner = err.into_inner();
        match inner.classify() {
            serde_json::error::Category::Data => {
                let field = if path == "." { "body".to_string() } else { path };
                AppError::validation(field, inner.to_string())
            }
            _ => AppError::bad_request(format!("malformed JSON body: {inner}")),
        }
    })?;
    de.end()
        .map_err(|e| AppError::bad_request(format!("malformed JSON body: {e}")))?;
    Ok(value)
}

fn missing_content_type() -> AppError {
    AppError::bad_request("expected `Content-Type: application/json`")
}

#[async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (json, bytes) = read_body(req, state).await?;
        if !json {
            return Err(missing_content_type());
        }
        decode(&bytes).map(AppJson)
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (json, bytes) = read_body(req, state).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(None));
        }
        if !json {
            return Err(missing_content_type());
        }
        decode(&bytes).map(|value| OptionalJson(Some(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Notes {
        #[allow(dead_code)]
        review_notes: Option<String>,
        #[allow(dead_code)]
        count: Option<u32>,
    }

    #[test]
    fn syntax_errors_are_bad_requests() {
        let err = decode::<Notes>(b"{\"review_notes\": ").unwrap_err();
        assert_eq!(err.kind(), "bad_request");
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let err = decode::<Notes>(br#"{"count": 3} trailing"#).unwrap_err();
        assert_eq!(err.kind(), "bad_request");
    }

    #[test]
    fn type_errors_name_the_field() {
        let err = decode::<Notes>(br#"{"count": "three"}"#).unwrap_err();
        assert_eq!(err.kind(), "validation:count");
    }

    #[test]
    fn content_type_with_charset_is_json() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        assert!(is_json(&headers));

        headers.insert(CONTENT_TYPE, "text/plain".parse().unwrap());
        assert!(!is_json(&headers));
        assert!(!is_json(&HeaderMap::new()));
    }
}
