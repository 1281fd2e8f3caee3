//! faceaccess-client — Backend API client, access gate, and session.
//!
//! The gate owns the capture source on a dedicated thread and submits one
//! still per attempt. The session turns recognized identities into the
//! set of views the front end may show.

pub mod api;
pub mod capture;
pub mod config;
pub mod dashboard;
pub mod gate;
pub mod models;
pub mod session;

pub use api::{ApiClient, ApiError};
pub use capture::{spawn_capture, CaptureError, CaptureHandle};
pub use config::{Config, ConfigError};
pub use dashboard::DashboardSnapshot;
pub use gate::{AccessGate, AttemptOutcome, GateError};
pub use session::{Session, SessionError};
