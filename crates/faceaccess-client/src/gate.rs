use crate::api::{ApiClient, ApiError};
use crate::capture::{spawn_capture, CaptureError, CaptureHandle};
use faceaccess_core::AccessAttemptResult;
use faceaccess_hw::CaptureSource;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("no active capture source; start the camera first")]
    CaptureUnavailable,
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("access check failed: {0}")]
    RequestFailed(#[from] ApiError),
}

/// Result of one recognition attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    pub result: AccessAttemptResult,
    recognized: Option<String>,
}

impl AttemptOutcome {
    fn new(result: AccessAttemptResult) -> Self {
        let recognized = result.recognized_email().map(str::to_string);
        Self { result, recognized }
    }

    /// Email of the identity this attempt recognized. Set only when access
    /// was granted to a named subject.
    pub fn recognized(&self) -> Option<&str> {
        self.recognized.as_deref()
    }

    pub fn is_locked(&self) -> bool {
        self.result.locked
    }
}

/// Camera-based verification: capture a still, submit it, interpret the
/// answer.
///
/// Attempt methods take `&mut self`, so a gate never has two attempts in
/// flight. No retries are made.
pub struct AccessGate {
    api: ApiClient,
    capture: Option<CaptureHandle>,
    lockout_until: Option<Instant>,
}

impl AccessGate {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            capture: None,
            lockout_until: None,
        }
    }

    /// Take exclusive ownership of `source`, replacing any active one.
    pub fn start_capture<S>(&mut self, source: S, warmup_frames: usize) -> Result<(), GateError>
    where
        S: CaptureSource + 'static,
    {
        self.stop_capture();
        self.capture = Some(spawn_capture(source, warmup_frames)?);
        Ok(())
    }

    /// Release the active source. Returns false if none was active.
    pub fn stop_capture(&mut self) -> bool {
        match self.capture.take() {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    pub fn capture_description(&self) -> Option<&str> {
        self.capture.as_ref().map(CaptureHandle::description)
    }

    /// Capture a still from the active source and submit it.
    pub async fn check_access(&mut self) -> Result<AttemptOutcome, GateError> {
        let handle = self.capture.as_ref().ok_or(GateError::CaptureUnavailable)?;
        let image = handle.capture().await?;
        self.submit_attempt(image).await
    }

    /// Submit an already-captured still.
    ///
    /// Requires an active capture source; without one, no request is sent.
    /// Lockouts are returned as `Ok` outcomes with `is_locked() == true`.
    pub async fn submit_attempt(&mut self, image: Vec<u8>) -> Result<AttemptOutcome, GateError> {
        if self.capture.is_none() {
            return Err(GateError::CaptureUnavailable);
        }

        let bytes = image.len();
        let result = match self.api.check_access(image).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "access check request failed");
                return Err(e.into());
            }
        };

        if let Some(lockout) = result.lockout() {
            tracing::warn!(
                remaining_secs = lockout.remaining.as_secs(),
                message = %lockout.message,
                "access temporarily blocked"
            );
            self.lockout_until = Some(Instant::now() + lockout.remaining);
        } else if result.granted {
            tracing::info!(
                user = result.user_name.as_deref().unwrap_or("-"),
                email = result.subject_email.as_deref().unwrap_or("-"),
                confidence = ?result.confidence_score,
                bytes,
                "access granted"
            );
            self.lockout_until = None;
        } else {
            tracing::info!(message = %result.message, bytes, "access denied");
        }

        Ok(AttemptOutcome::new(result))
    }

    /// Time left on the last lockout the backend reported, if any.
    /// Informational only; the gate does not refuse attempts on its own.
    pub fn lockout_remaining(&self) -> Option<Duration> {
        self.lockout_until
            .and_then(|until| until.checked_duration_since(Instant::now()))
            .filter(|remaining| !remaining.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::FakeSource;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn gate(server: &MockServer) -> AccessGate {
        AccessGate::new(ApiClient::new(&format!("{}/api", server.uri())).unwrap())
    }

    async fn mount_check(server: &MockServer, template: ResponseTemplate, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/api/access/check"))
            .respond_with(template)
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_submit_without_capture_sends_nothing() {
        let server = MockServer::start().await;
        mount_check(&server, ResponseTemplate::new(200), 0).await;

        let mut gate = gate(&server).await;
        let err = gate.submit_attempt(b"img".to_vec()).await.unwrap_err();
        assert!(matches!(err, GateError::CaptureUnavailable));
        assert!(matches!(gate.check_access().await, Err(GateError::CaptureUnavailable)));
    }

    #[tokio::test]
    async fn test_granted_attempt_reports_identity_once() {
        let server = MockServer::start().await;
        let body = json!({
            "access_granted": true,
            "user_email": "a@b.com",
            "confidence_score": 92.3,
            "message": "ok"
        });
        mount_check(&server, ResponseTemplate::new(200).set_body_json(body), 1).await;

        let mut gate = gate(&server).await;
        gate.start_capture(FakeSource::new(b"img"), 0).unwrap();
        let outcome = gate.submit_attempt(b"img".to_vec()).await.unwrap();

        assert_eq!(outcome.recognized(), Some("a@b.com"));
        assert!(outcome.result.granted);
        assert_eq!(outcome.result.subject_email.as_deref(), Some("a@b.com"));
        assert_eq!(outcome.result.confidence_score, Some(92.3));
        assert_eq!(outcome.result.message, "ok");
        assert!(!outcome.is_locked());
    }

    #[tokio::test]
    async fn test_denied_attempt_has_no_identity() {
        let server = MockServer::start().await;
        let body = json!({"access_granted": false, "message": "Acesso negado"});
        mount_check(&server, ResponseTemplate::new(200).set_body_json(body), 1).await;

        let mut gate = gate(&server).await;
        gate.start_capture(FakeSource::new(b"img"), 0).unwrap();
        let outcome = gate.submit_attempt(b"img".to_vec()).await.unwrap();
        assert_eq!(outcome.recognized(), None);
        assert_eq!(outcome.result.message, "Acesso negado");
    }

    #[tokio::test]
    async fn test_server_error_is_request_failed() {
        let server = MockServer::start().await;
        mount_check(&server, ResponseTemplate::new(500), 1).await;

        let mut gate = gate(&server).await;
        gate.start_capture(FakeSource::new(b"img"), 0).unwrap();
        let err = gate.submit_attempt(b"img".to_vec()).await.unwrap_err();
        assert!(matches!(err, GateError::RequestFailed(ApiError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_rate_limited_attempt_is_locked_outcome() {
        let server = MockServer::start().await;
        let body = json!({"detail": "too many"});
        mount_check(&server, ResponseTemplate::new(429).set_body_json(body), 1).await;

        let mut gate = gate(&server).await;
        gate.start_capture(FakeSource::new(b"img"), 0).unwrap();
        let outcome = gate.submit_attempt(b"img".to_vec()).await.unwrap();

        assert!(outcome.is_locked());
        assert!(!outcome.result.granted);
        assert_eq!(outcome.result.message, "too many");
        assert_eq!(outcome.result.lock_remaining_seconds, Some(60));
        assert_eq!(outcome.recognized(), None);
        let remaining = gate.lockout_remaining().unwrap();
        assert!(remaining > Duration::from_secs(55) && remaining <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_body_lock_flag_on_success_status() {
        let server = MockServer::start().await;
        let body = json!({"locked": true, "lock_remaining_seconds": 5});
        mount_check(&server, ResponseTemplate::new(200).set_body_json(body), 1).await;

        let mut gate = gate(&server).await;
        gate.start_capture(FakeSource::new(b"img"), 0).unwrap();
        let outcome = gate.submit_attempt(b"img".to_vec()).await.unwrap();
        assert!(outcome.is_locked());
        assert!(outcome.result.message.contains("temporarily blocked"));
        assert_eq!(outcome.result.lock_remaining_seconds, Some(5));
    }

    #[tokio::test]
    async fn test_check_access_uses_captured_still() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/access/check"))
            .and(body_string_contains("captured-still"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_granted": true,
                "user_email": "a@b.com",
                "message": "ok"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = FakeSource::new(b"captured-still");
        let captures = source.captures.clone();
        let released = source.released.clone();

        let mut gate = gate(&server).await;
        gate.start_capture(source, 0).unwrap();
        assert!(gate.is_capturing());
        let outcome = gate.check_access().await.unwrap();
        assert_eq!(outcome.recognized(), Some("a@b.com"));
        assert_eq!(captures.load(Ordering::SeqCst), 1);

        assert!(gate.stop_capture());
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!gate.stop_capture());
        assert!(matches!(gate.check_access().await, Err(GateError::CaptureUnavailable)));
    }

    #[tokio::test]
    async fn test_replacing_source_releases_previous() {
        let server = MockServer::start().await;
        let first = FakeSource::new(b"a");
        let released = first.released.clone();

        let mut gate = gate(&server).await;
        gate.start_capture(first, 0).unwrap();
        gate.start_capture(FakeSource::new(b"b"), 0).unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);

        drop(gate);
    }

    #[tokio::test]
    async fn test_restart_after_stop_captures_again() {
        let server = MockServer::start().await;
        mount_check(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({"access_granted": false, "message": "no"})),
            1,
        )
        .await;

        let first = FakeSource::new(b"a");
        let released = first.released.clone();
        let mut gate = gate(&server).await;
        gate.start_capture(first, 0).unwrap();
        assert!(gate.stop_capture());
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(matches!(gate.check_access().await, Err(GateError::CaptureUnavailable)));

        let second = FakeSource::new(b"b");
        let captures = second.captures.clone();
        gate.start_capture(second, 0).unwrap();
        assert!(gate.check_access().await.is_ok());
        assert_eq!(captures.load(Ordering::SeqCst), 1);
    }
}
