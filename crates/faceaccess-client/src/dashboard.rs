use crate::api::{ApiClient, ApiError};
use crate::models::{AccessLog, Stats};
use chrono::{Local, NaiveDateTime};

/// Aggregate stats plus the most recent access attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub stats: Stats,
    pub logs: Vec<AccessLog>,
    pub fetched_at: NaiveDateTime,
}

impl DashboardSnapshot {
    /// Fetch stats and logs concurrently. Either failing fails the snapshot.
    pub async fn fetch(api: &ApiClient, log_limit: u32) -> Result<Self, ApiError> {
        let (stats, logs) = tokio::try_join!(api.stats(), api.access_logs(log_limit))?;
        tracing::debug!(
            attempts = stats.total_access_attempts,
            logs = logs.len(),
            "dashboard refreshed"
        );
        Ok(Self {
            stats,
            logs,
            fetched_at: Local::now().naive_local(),
        })
    }

    pub fn granted_in_window(&self) -> usize {
        self.logs.iter().filter(|log| log.access_granted).count()
    }
}
