//! # Request Handlers Module
//!
//! Maps HTTP requests onto the three store operations and serializes the
//! results:
//!
//! | Operation | Request                         | Success body        |
//! |-----------|---------------------------------|---------------------|
//! | submit    | `POST /hash` with `password`    | decimal key         |
//! | fetch     | `GET /hash/{key}`               | encoded digest      |
//! | stats     | `GET /stats`                    | JSON statistics     |
//!
//! A digest that is absent or not visible yet is answered with `404` and an
//! empty body.

use crate::error::{HashWebError, Result};
use crate::store::Store;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{CACHE_CONTROL, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const PASSWORD_FIELD: &str = "password";

/// First `password` value among urlencoded pairs
fn first_password(encoded: &[u8]) -> Result<Option<String>> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(encoded)?;
    Ok(pairs
        .into_iter()
        .find_map(|(name, value)| (name == PASSWORD_FIELD).then_some(value)))
}

/// Lowercased media type of a `Content-Type` value, parameters stripped
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Handler for the digest endpoints
///
/// Owns a shared reference to the [`Store`] plus the request limits from the
/// server configuration.
#[derive(Debug, Clone)]
pub struct HashHandler {
    /// Shared digest store
    pub store: Arc<Store>,
    max_payload_size: usize,
    request_timeout: Duration,
}

impl HashHandler {
    /// Create a new hash handler
    #[must_use]
    pub fn new(store: Arc<Store>, max_payload_size: usize, request_timeout: Duration) -> Self {
        Self {
            store,
            max_payload_size,
            request_timeout,
        }
    }

    /// Handle `POST /hash`
    ///
    /// The `password` field is read from the body first and from the query
    /// string second; in each source the first occurrence wins. Bodies may
    /// be `application/x-www-form-urlencoded` or `multipart/form-data`. A
    /// request without the field digests the empty string.
    ///
    /// ## Errors
    /// - `HashWebError::RequestError`: body too large, unreadable, too slow,
    ///   malformed, or non-empty with any other content type
    /// - `HashWebError::InternalError`: the digest task was cancelled
    #[instrument(level = "debug", name = "hash_create", skip_all)]
    pub async fn handle_create<B>(&self, request: Request<B>) -> Result<Response<Full<Bytes>>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let query_password = match request.uri().query() {
            Some(query) => first_password(query.as_bytes())?,
            None => None,
        };

        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .map(|value| {
                value.to_str().map(str::to_owned).map_err(|e| {
                    HashWebError::request_error(format!("Unreadable content type: {e}"))
                })
            })
            .transpose()?;

        let body = self.read_body(request.into_body()).await?;
        let body_password = Self::body_password(content_type.as_deref(), body).await?;

        let password = body_password.or(query_password).unwrap_or_default();

        // Submission holds the store's write lock while hashing; keep it off
        // the async worker threads.
        let store = Arc::clone(&self.store);
        let key = tokio::task::spawn_blocking(move || store.submit(&password))
            .await
            .map_err(|e| {
                HashWebError::internal_error(format!("Digest task failed: {e}"), Some(Box::new(e)))
            })?;

        debug!(key, "Created digest");

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
            .header(CACHE_CONTROL, "no-cache")
            .body(Full::new(Bytes::from(key.to_string())))?)
    }

    /// Extract the `password` field from a submitted body
    async fn body_password(content_type: Option<&str>, body: Bytes) -> Result<Option<String>> {
        let Some(content_type) = content_type else {
            if body.is_empty() {
                return Ok(None);
            }
            return Err(HashWebError::request_error(format!(
                "{} byte body without a content type",
                body.len()
            )));
        };

        match media_type(content_type).as_str() {
            FORM_CONTENT_TYPE => first_password(&body),
            MULTIPART_CONTENT_TYPE => {
                let boundary = multer::parse_boundary(content_type)?;
                let stream = futures_util::stream::once(async move {
                    Ok::<Bytes, std::convert::Infallible>(body)
                });
                let mut multipart = multer::Multipart::new(stream, boundary);

                while let Some(field) = multipart.next_field().await? {
                    if field.name() == Some(PASSWORD_FIELD) {
                        return Ok(Some(field.text().await?));
                    }
                }
                Ok(None)
            }
            _ if body.is_empty() => Ok(None),
            other => {
                warn!("Rejecting {} byte body of type {}", body.len(), other);
                Err(HashWebError::request_error(format!(
                    "Unsupported content type '{other}'"
                )))
            }
        }
    }

    /// Handle `GET /hash/{key}`
    ///
    /// ## Errors
    /// - `HashWebError::RequestError`: `key_segment` is not an unsigned integer
    #[instrument(level = "debug", name = "hash_fetch", skip(self))]
    pub fn handle_fetch(&self, key_segment: &str) -> Result<Response<Full<Bytes>>> {
        if key_segment.is_empty() || !key_segment.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HashWebError::request_error(format!(
                "Invalid key '{key_segment}': expected decimal digits"
            )));
        }
        let key: u64 = key_segment.parse().map_err(|e| {
            HashWebError::request_error(format!("Invalid key '{key_segment}': {e}"))
        })?;

        let response = match self.store.fetch(key) {
            Some(digest) => Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
                .header(CACHE_CONTROL, "no-cache")
                .body(Full::new(Bytes::from(digest)))?,
            None => {
                debug!(key, "No visible digest");
                Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .header(CACHE_CONTROL, "no-cache")
                    .body(Full::new(Bytes::new()))?
            }
        };

        Ok(response)
    }

    /// Handle `GET /stats`
    ///
    /// Body is `{"RequestCounts": N, "Average": A}` with the average in
    /// microseconds.
    pub fn handle_stats(&self) -> Result<Response<Full<Bytes>>> {
        let body = serde_json::to_string(&self.store.stats())?;

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/json")
            .header(CACHE_CONTROL, "no-cache")
            .body(Full::new(Bytes::from(body)))?)
    }

    /// Read a request body within the configured size and time limits
    async fn read_body<B>(&self, body: B) -> Result<Bytes>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let collected = tokio::time::timeout(
            self.request_timeout,
            Limited::new(body, self.max_payload_size).collect(),
        )
        .await
        .map_err(|_| {
            warn!("Request body not received within {:?}", self.request_timeout);
            HashWebError::request_error(format!(
                "Request body not received within {:?}",
                self.request_timeout
            ))
        })?
        .map_err(|e| {
            HashWebError::request_error(format!(
                "Failed to read request body (max {} bytes): {e}",
                self.max_payload_size
            ))
        })?;

        Ok(collected.to_bytes())
    }
}
