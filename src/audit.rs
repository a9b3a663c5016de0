/// Audit trail for session events
///
/// Each session start, rotation and logout produces one `AuditLog` entry,
/// emitted through `tracing` so it lands in the same JSON log stream as
/// everything else.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const STATUS_SUCCESS: &str = "SUCCESS";
pub const STATUS_FAILURE: &str = "FAILURE";

#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    pub log_id: String,
    pub timestamp: DateTime<Utc>,
    /// SESSION_START, SESSION_ROTATE, SESSION_END, ...
    pub action: String,
    pub resource_type: String,
    pub user_id: Option<String>,
    /// SUCCESS or FAILURE
    pub status: String,
    pub message: String,
}

impl AuditLog {
    pub fn new(action: &str, status: &str, message: impl Into<String>) -> Self {
        Self {
            log_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action: action.to_string(),
            resource_type: "session".to_string(),
            user_id: None,
            status: status.to_string(),
            message: message.into(),
        }
    }

    pub fn success(action: &str, message: impl Into<String>) -> Self {
        Self::new(action, STATUS_SUCCESS, message)
    }

    pub fn failure(action: &str, message: impl Into<String>) -> Self {
        Self::new(action, STATUS_FAILURE, message)
    }

    pub fn with_user_id(mut self, user_id: impl ToString) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status == STATUS_FAILURE
    }

    /// Write the entry: failures at `warn`, everything else at `info`
    pub fn emit(&self) {
        if self.is_failure() {
            tracing::warn!(
                log_id = %self.log_id,
                action = %self.action,
                resource_type = %self.resource_type,
                user_id = ?self.user_id,
                status = %self.status,
                message = %self.message,
                "Audit log entry"
            );
        } else {
            tracing::info!(
                log_id = %self.log_id,
                action = %self.action,
                resource_type = %self.resource_type,
                user_id = ?self.user_id,
                status = %self.status,
                message = %self.message,
                "Audit log entry"
            );
        }
    }
}
