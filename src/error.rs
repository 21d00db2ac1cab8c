use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{DependentId, MedicineId};

pub type Result<T> = std::result::Result<T, MedError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MedError {
    #[error("invalid schedule format '{0}' (expected HH:MM or HH:MM AM/PM)")]
    InvalidScheduleFormat(String),
    #[error("not authenticated: {0}")]
    Auth(String),
    #[error("notification permission denied: {0}")]
    NotificationPermissionDenied(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("medicine {medicine} already marked as taken on {date}")]
    DuplicateDoseEvent { medicine: MedicineId, date: NaiveDate },
    #[error("medicine '{0}' not found")]
    MedicineNotFound(String),
    #[error("dependent {0} not found")]
    DependentNotFound(DependentId),
    #[error("{0}")]
    InvalidInput(String),
    #[error("reminder for {medicine} is out of sync (wanted enabled={enabled}): {reason}")]
    ReminderOutOfSync {
        medicine: MedicineId,
        enabled: bool,
        reason: String,
    },
}

impl MedError {
    /// Informational errors are reported to the user but are not failures
    /// of the requested operation.
    pub fn is_informational(&self) -> bool {
        matches!(self, MedError::DuplicateDoseEvent { .. })
    }
}

impl From<std::io::Error> for MedError {
    fn from(err: std::io::Error) -> Self {
        MedError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for MedError {
    fn from(err: serde_json::Error) -> Self {
        MedError::Storage(err.to_string())
    }
}
