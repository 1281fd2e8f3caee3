use crate::api::{ApiClient, ApiError};
use crate::gate::AttemptOutcome;
use faceaccess_core::{AuthorizationLevel, SessionEvent, SessionRouter, SessionView};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("authorization lookup for {email} failed: {source}")]
    LevelLookupFailed {
        email: String,
        #[source]
        source: ApiError,
    },
}

/// Drives a [`SessionRouter`] from recognition results, resolving each
/// recognized identity's authorization level with the backend.
pub struct Session {
    api: ApiClient,
    router: SessionRouter,
}

impl Session {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            router: SessionRouter::new(),
        }
    }

    pub fn router(&self) -> &SessionRouter {
        &self.router
    }

    pub fn views(&self) -> &'static [SessionView] {
        self.router.views()
    }

    pub fn active_view(&self) -> SessionView {
        self.router.active_view()
    }

    pub fn email(&self) -> Option<&str> {
        self.router.identity().map(|id| id.email.as_str())
    }

    pub fn level(&self) -> Option<AuthorizationLevel> {
        self.router.identity().and_then(|id| id.level)
    }

    /// Select a view by index. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) -> Option<SessionView> {
        let view = self.router.views().get(index).copied();
        self.router.apply(SessionEvent::Selected(index));
        view
    }

    /// Feed a gate outcome into the session. Outcomes without a recognized
    /// identity leave the session untouched.
    pub async fn observe(
        &mut self,
        outcome: &AttemptOutcome,
    ) -> Result<Option<AuthorizationLevel>, SessionError> {
        match outcome.recognized() {
            Some(email) => self.recognize(email).await,
            None => Ok(self.level()),
        }
    }

    /// Resolve `email`'s level, then mark it recognized.
    ///
    /// The view set is recomputed once, after the lookup settles. On lookup
    /// failure the identity is still recognized, with the fallback view
    /// set, and the error is returned for display.
    pub async fn recognize(&mut self, email: &str) -> Result<Option<AuthorizationLevel>, SessionError> {
        let lookup = self.api.user_by_email(email).await;
        let level = lookup.as_ref().ok().and_then(|access| access.access_level);
        let views = self.router.apply(SessionEvent::Authorized {
            email: email.to_string(),
            level,
        });

        match lookup {
            Ok(_) => {
                tracing::info!(email, ?level, views = views.len(), "session authorized");
                Ok(level)
            }
            Err(source) => {
                tracing::warn!(email, error = %source, "authorization lookup failed");
                Err(SessionError::LevelLookupFailed {
                    email: email.to_string(),
                    source,
                })
            }
        }
    }
}
