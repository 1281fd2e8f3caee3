//! HTTP client for the access-control backend.

use crate::models::{
    AccessLog, Document, DocumentAccess, DocumentUpload, HealthStatus, LevelCatalog, NewUser,
    Stats, User, UserAccess, UserUpdate,
};
use faceaccess_core::access::{error_detail, lockout_remaining_secs};
use faceaccess_core::{interpret_check_response, normalize_lockout, CheckResponseError, LockSignal};
use faceaccess_core::AccessAttemptResult;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// File name the still is uploaded under.
pub const CAPTURE_FILE_NAME: &str = "camera-capture.jpg";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid request: {0}")]
    InvalidArgument(&'static str),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("access temporarily blocked ({remaining_secs}s remaining)")]
    LockedOut { remaining_secs: u64 },
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<CheckResponseError> for ApiError {
    fn from(err: CheckResponseError) -> Self {
        match err {
            CheckResponseError::Status { status, detail } => Self::Status { status, detail },
            CheckResponseError::Malformed(e) => Self::Decode(e),
        }
    }
}

/// Client for every backend endpoint the front end consumes.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, None)
    }

    /// `timeout` bounds each whole request; `None` leaves the transport default.
    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }

        let mut builder =
            reqwest::Client::builder().user_agent(concat!("faceaccess/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request; 429 becomes `LockedOut`, other non-2xx become `Status`.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let parsed = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);

        if status == StatusCode::TOO_MANY_REQUESTS {
            let remaining_secs = lockout_remaining_secs(&parsed);
            tracing::warn!(remaining_secs, "backend reported lockout");
            return Err(ApiError::LockedOut { remaining_secs });
        }

        let detail = error_detail(&parsed)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string());
        Err(ApiError::Status {
            status: status.as_u16(),
            detail,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send(request).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.send_json(self.http.get(self.endpoint(&["health"]))).await
    }

    /// Submit one still to `POST /access/check` and interpret the outcome.
    ///
    /// Lockouts come back as `Ok` with `locked == true`, including when the
    /// transport itself surfaces the 429.
    pub async fn check_access(&self, image: Vec<u8>) -> Result<AccessAttemptResult, ApiError> {
        let part = Part::bytes(image)
            .file_name(CAPTURE_FILE_NAME)
            .mime_str("image/jpeg")?;
        let form = Form::new().part("image", part);

        let response = match self
            .http
            .post(self.endpoint(&["access", "check"]))
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return lockout_from_transport(&e).ok_or_else(|| e.into()),
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) if status == StatusCode::TOO_MANY_REQUESTS => {
                tracing::debug!(error = %e, "unreadable 429 body");
                Default::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(interpret_check_response(status.as_u16(), &body)?)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.send_json(self.http.get(self.endpoint(&["users"]))).await
    }

    pub async fn user_by_email(&self, email: &str) -> Result<UserAccess, ApiError> {
        if email.is_empty() {
            return Err(ApiError::InvalidArgument("user email is empty"));
        }
        self.send_json(self.http.get(self.endpoint(&["users", "email", email])))
            .await
    }

    /// Enroll a user together with a reference face image.
    pub async fn register_user(
        &self,
        user: &NewUser,
        image: Vec<u8>,
        file_name: &str,
    ) -> Result<User, ApiError> {
        let form = Form::new()
            .text("name", user.name.clone())
            .text("email", user.email.clone())
            .text("access_level", user.access_level.as_wire())
            .part("image", image_part(image, file_name)?);
        self.send_json(self.http.post(self.endpoint(&["users", "register"])).multipart(form))
            .await
    }

    pub async fn update_user(&self, user_id: i64, update: &UserUpdate) -> Result<User, ApiError> {
        if update.is_empty() {
            return Err(ApiError::InvalidArgument("user update has no fields"));
        }
        let id = user_id.to_string();
        self.send_json(self.http.put(self.endpoint(&["users", &id])).json(update))
            .await
    }

    pub async fn delete_user(&self, user_id: i64) -> Result<(), ApiError> {
        let id = user_id.to_string();
        self.send(self.http.delete(self.endpoint(&["users", &id])))
            .await?;
        Ok(())
    }

    /// Documents the given user may see.
    pub async fn list_documents(&self, user_email: &str) -> Result<DocumentAccess, ApiError> {
        if user_email.is_empty() {
            return Err(ApiError::InvalidArgument("user email is empty"));
        }
        let request = self
            .http
            .get(self.endpoint(&["documents"]))
            .query(&[("user_email", user_email)]);
        self.send_json(request).await
    }

    pub async fn upload_document(
        &self,
        upload: &DocumentUpload,
        file: Vec<u8>,
        file_name: &str,
    ) -> Result<Document, ApiError> {
        let part = Part::bytes(file).file_name(file_name.to_string());
        let form = Form::new()
            .text("title", upload.title.clone())
            .text("description", upload.description.clone())
            .text("document_level", upload.document_level.as_wire())
            .text("uploader_email", upload.uploader_email.clone())
            .part("file", part);
        self.send_json(self.http.post(self.endpoint(&["documents", "upload"])).multipart(form))
            .await
    }

    /// Raw document contents, if the backend lets `user_email` read it.
    pub async fn download_document(
        &self,
        document_id: i64,
        user_email: &str,
    ) -> Result<Vec<u8>, ApiError> {
        let id = document_id.to_string();
        let request = self
            .http
            .get(self.endpoint(&["documents", &id, "download"]))
            .query(&[("user_email", user_email)]);
        let body = self.send(request).await?.bytes().await?;
        Ok(body.to_vec())
    }

    pub async fn document_levels(&self) -> Result<LevelCatalog, ApiError> {
        self.send_json(self.http.get(self.endpoint(&["documents", "levels"])))
            .await
    }

    /// Most recent access attempts, newest first.
    pub async fn access_logs(&self, limit: u32) -> Result<Vec<AccessLog>, ApiError> {
        let request = self
            .http
            .get(self.endpoint(&["access", "logs"]))
            .query(&[("limit", limit)]);
        self.send_json(request).await
    }

    pub async fn stats(&self) -> Result<Stats, ApiError> {
        self.send_json(self.http.get(self.endpoint(&["stats"]))).await
    }
}

/// Lockout for a transport error that carries HTTP 429.
///
/// reqwest attaches a status to an error only on status-checking paths
/// (`error_for_status`); plain `send` hands a 429 back as a response.
fn lockout_from_transport(err: &reqwest::Error) -> Option<AccessAttemptResult> {
    if err.status() != Some(StatusCode::TOO_MANY_REQUESTS) {
        return None;
    }
    tracing::warn!(error = %err, "transport raised 429; treating as lockout");
    Some(normalize_lockout(&Value::Null, LockSignal::TooManyRequests))
}

fn image_part(image: Vec<u8>, file_name: &str) -> Result<Part, ApiError> {
    let mime = match file_name.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        _ => "image/jpeg",
    };
    Ok(Part::bytes(image).file_name(file_name.to_string()).mime_str(mime)?)
}
