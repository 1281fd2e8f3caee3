//! faceaccess-core — Access-check outcomes and session view gating.
//!
//! Interprets the backend's access-check responses (granted, denied, or
//! locked out) and maps a recognized identity's authorization level to the
//! set of views a session exposes. Nothing in this crate performs I/O.

pub mod access;
pub mod router;
pub mod types;

pub use access::{interpret_check_response, normalize_lockout, CheckResponseError, LockSignal};
pub use router::{visible_views, Identity, SessionEvent, SessionRouter, SessionState, SessionView};
pub use types::{AccessAttemptResult, AuthorizationLevel, Lockout};
