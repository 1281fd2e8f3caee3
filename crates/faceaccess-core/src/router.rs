//! Session view gating.
//!
//! Maps the recognized identity (if any) to the ordered list of views the
//! session exposes, and keeps the active selection inside that list.

use crate::types::AuthorizationLevel;
use std::fmt;

/// A functional view of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionView {
    AccessControl,
    Documents,
    UserAdmin,
    Dashboard,
}

impl SessionView {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessControl => "access-control",
            Self::Documents => "documents",
            Self::UserAdmin => "user-admin",
            Self::Dashboard => "dashboard",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::AccessControl => "Access control",
            Self::Documents => "Documents",
            Self::UserAdmin => "User management",
            Self::Dashboard => "Dashboard",
        }
    }
}

impl fmt::Display for SessionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const MINIMAL_VIEWS: &[SessionView] = &[SessionView::AccessControl];
const STANDARD_VIEWS: &[SessionView] = &[SessionView::AccessControl, SessionView::Documents];
const FULL_VIEWS: &[SessionView] = &[
    SessionView::Dashboard,
    SessionView::AccessControl,
    SessionView::UserAdmin,
    SessionView::Documents,
];

/// A recognized identity. `level` is `None` until a lookup succeeds, or
/// when the backend omitted or sent an unrecognized level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub level: Option<AuthorizationLevel>,
}

/// Views for a level. Total: an unknown level gets the minimal set.
pub fn views_for_level(level: Option<AuthorizationLevel>) -> &'static [SessionView] {
    match level {
        Some(AuthorizationLevel::Basic | AuthorizationLevel::Intermediate) => STANDARD_VIEWS,
        Some(AuthorizationLevel::Full) => FULL_VIEWS,
        None => MINIMAL_VIEWS,
    }
}

/// Ordered views for the current identity. Never empty.
pub fn visible_views(identity: Option<&Identity>) -> &'static [SessionView] {
    match identity {
        None => MINIMAL_VIEWS,
        Some(id) => views_for_level(id.level),
    }
}

/// Reset the active index to the first view when it falls outside the list.
pub fn correct_index(active: usize, len: usize) -> usize {
    if active >= len {
        0
    } else {
        active
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Recognized(Identity),
}

/// Inputs to [`SessionRouter::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The access gate recognized `email` and its level lookup settled.
    /// Replaces any previous identity. `level` is `None` when the lookup
    /// failed, or the backend omitted the level or sent one we don't know.
    Authorized {
        email: String,
        level: Option<AuthorizationLevel>,
    },
    /// The user picked the view at this index.
    Selected(usize),
}

/// Session context: who is recognized and which view is active.
#[derive(Debug, Clone, Default)]
pub struct SessionRouter {
    state: SessionState,
    active: usize,
}

impl SessionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            SessionState::Anonymous => None,
            SessionState::Recognized(identity) => Some(identity),
        }
    }

    pub fn views(&self) -> &'static [SessionView] {
        visible_views(self.identity())
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_view(&self) -> SessionView {
        self.views()
            .get(self.active)
            .copied()
            .unwrap_or(SessionView::AccessControl)
    }

    /// Select a view by index. Out-of-range indices leave the selection
    /// unchanged and return `None`.
    pub fn select(&mut self, index: usize) -> Option<SessionView> {
        let view = self.views().get(index).copied()?;
        self.active = index;
        Some(view)
    }

    /// Apply one event, then re-validate the active index against the
    /// recomputed view list. Returns the new list.
    pub fn apply(&mut self, event: SessionEvent) -> &'static [SessionView] {
        match event {
            SessionEvent::Authorized { email, level } => {
                tracing::debug!(%email, ?level, "identity authorized");
                self.state = SessionState::Recognized(Identity { email, level });
            }
            SessionEvent::Selected(index) => {
                if self.select(index).is_none() {
                    tracing::debug!(index, "ignoring out-of-range view selection");
                }
            }
        }
        self.active = correct_index(self.active, self.views().len());
        self.views()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionView::*;

    fn identity(level: Option<AuthorizationLevel>) -> Identity {
        Identity { email: "x".into(), level }
    }

    fn authorize(router: &mut SessionRouter, email: &str, level: Option<AuthorizationLevel>) {
        router.apply(SessionEvent::Authorized { email: email.into(), level });
    }

    #[test]
    fn test_visible_views_table() {
        assert_eq!(visible_views(None), &[AccessControl]);
        assert_eq!(
            visible_views(Some(&identity(Some(AuthorizationLevel::Basic)))),
            &[AccessControl, Documents]
        );
        assert_eq!(
            visible_views(Some(&identity(Some(AuthorizationLevel::Intermediate)))),
            &[AccessControl, Documents]
        );
        assert_eq!(
            visible_views(Some(&identity(Some(AuthorizationLevel::Full)))),
            &[Dashboard, AccessControl, UserAdmin, Documents]
        );
        assert_eq!(
            visible_views(Some(&identity(AuthorizationLevel::from_wire("UNKNOWN")))),
            &[AccessControl]
        );
    }

    #[test]
    fn test_every_level_has_views() {
        for level in AuthorizationLevel::ALL.into_iter().map(Some).chain([None]) {
            assert!(!views_for_level(level).is_empty());
        }
    }

    #[test]
    fn test_view_names() {
        let names: Vec<_> = FULL_VIEWS.iter().map(|v| v.as_str()).collect();
        assert_eq!(names, ["dashboard", "access-control", "user-admin", "documents"]);
    }

    #[test]
    fn test_correct_index() {
        assert_eq!(correct_index(3, 1), 0);
        assert_eq!(correct_index(1, 2), 1);
        assert_eq!(correct_index(2, 2), 0);
    }

    #[test]
    fn test_active_index_resets_when_views_shrink() {
        let mut router = SessionRouter::new();
        authorize(&mut router, "admin@x", Some(AuthorizationLevel::Full));
        assert_eq!(router.select(3), Some(Documents));
        assert_eq!(router.active_index(), 3);

        let views = router.apply(SessionEvent::Authorized { email: "admin@x".into(), level: None });
        assert_eq!(views.len(), 1);
        assert_eq!(router.active_index(), 0);
        assert_eq!(router.active_view(), AccessControl);
    }

    #[test]
    fn test_active_index_kept_when_still_valid() {
        let mut router = SessionRouter::new();
        authorize(&mut router, "a@x", Some(AuthorizationLevel::Full));
        router.apply(SessionEvent::Selected(1));
        authorize(&mut router, "b@x", Some(AuthorizationLevel::Basic));
        assert_eq!(router.active_index(), 1);
        assert_eq!(router.active_view(), Documents);
    }

    #[test]
    fn test_same_user_reverifying_keeps_view() {
        let mut router = SessionRouter::new();
        authorize(&mut router, "a@x", Some(AuthorizationLevel::Full));
        assert_eq!(router.select(2), Some(UserAdmin));
        authorize(&mut router, "a@x", Some(AuthorizationLevel::Full));
        assert_eq!(router.active_index(), 2);
        assert_eq!(router.active_view(), UserAdmin);
    }

    #[test]
    fn test_lookup_failure_stays_recognized() {
        let mut router = SessionRouter::new();
        authorize(&mut router, "a@x", None);
        assert_eq!(
            router.state(),
            &SessionState::Recognized(Identity { email: "a@x".into(), level: None })
        );
        assert_eq!(router.views(), &[AccessControl]);
    }

    #[test]
    fn test_new_identity_replaces_previous_level() {
        let mut router = SessionRouter::new();
        authorize(&mut router, "a@x", Some(AuthorizationLevel::Full));
        authorize(&mut router, "b@x", None);
        let identity = router.identity().unwrap();
        assert_eq!(identity.email, "b@x");
        assert_eq!(identity.level, None);
        assert_eq!(router.views(), &[AccessControl]);
    }

    #[test]
    fn test_out_of_range_selection_is_ignored() {
        let mut router = SessionRouter::new();
        assert_eq!(router.select(1), None);
        router.apply(SessionEvent::Selected(5));
        assert_eq!(router.active_index(), 0);
    }
}
