use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::time::ScheduleTime;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_type!(MedicineId);
id_type!(DependentId);
id_type!(DoseEventId);

/// The account holder a record belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationStatus {
    #[default]
    Disabled,
    Enabled,
}

impl NotificationStatus {
    pub fn enable(self) -> Self {
        NotificationStatus::Enabled
    }

    pub fn disable(self) -> Self {
        NotificationStatus::Disabled
    }

    pub fn is_enabled(self) -> bool {
        self == NotificationStatus::Enabled
    }
}

impl From<bool> for NotificationStatus {
    fn from(enabled: bool) -> Self {
        if enabled {
            NotificationStatus::Enabled
        } else {
            NotificationStatus::Disabled
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Medicine {
    pub id: MedicineId,
    pub name: String,
    pub dose: String,
    /// Time of day, e.g. "08:00" or "8:00 PM". Always parseable by `ScheduleTime::parse`.
    pub schedule: String,
    pub notes: Option<String>,
    pub user_id: UserId,
    #[serde(default)]
    pub dependent_id: Option<DependentId>,
    #[serde(default)]
    pub notifications: NotificationStatus,
    pub created_on: NaiveDate,
}

impl Medicine {
    /// A new medicine starts with reminders disabled.
    pub fn new(
        user_id: UserId,
        name: impl Into<String>,
        dose: impl Into<String>,
        schedule: impl Into<String>,
        created_on: NaiveDate,
    ) -> Self {
        Medicine {
            id: MedicineId::new(),
            name: name.into(),
            dose: dose.into(),
            schedule: schedule.into(),
            notes: None,
            user_id,
            dependent_id: None,
            notifications: NotificationStatus::Disabled,
            created_on,
        }
    }

    pub fn scheduled_at(&self) -> Result<ScheduleTime> {
        ScheduleTime::parse(&self.schedule)
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications.is_enabled()
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }
}

/// Someone other than the account holder whose medicines are managed by it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Dependent {
    pub id: DependentId,
    pub name: String,
    pub relationship: String,
    pub email: String,
    pub user_id: UserId,
}

/// A medicine marked as taken on one calendar day.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DoseEvent {
    pub id: DoseEventId,
    pub user_id: UserId,
    pub medicine_id: MedicineId,
    pub date: NaiveDate,
}

impl DoseEvent {
    pub fn new(user_id: UserId, medicine_id: MedicineId, date: NaiveDate) -> Self {
        DoseEvent {
            id: DoseEventId::new(),
            user_id,
            medicine_id,
            date,
        }
    }

    pub fn same_key(&self, other: &DoseEvent) -> bool {
        self.user_id == other.user_id
            && self.medicine_id == other.medicine_id
            && self.date == other.date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_medicine_starts_disabled() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let med = Medicine::new(UserId::new("ana"), "Aspirin", "100mg", "08:00", day);
        assert_eq!(med.notifications, NotificationStatus::Disabled);
        assert!(!med.notifications_enabled());
        assert_eq!(med.scheduled_at().unwrap().minutes(), 480);
    }

    #[test]
    fn test_notification_transitions() {
        let status = NotificationStatus::default();
        assert!(status.enable().is_enabled());
        assert!(!status.enable().disable().is_enabled());
        assert_eq!(NotificationStatus::from(true), NotificationStatus::Enabled);
    }

    #[test]
    fn test_matches_name_case_insensitive() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let med = Medicine::new(UserId::new("ana"), "Vitamin D", "1 cap", "09:00", day);
        assert!(med.matches_name("vitamin d"));
        assert!(med.matches_name("  VITAMIN D "));
        assert!(!med.matches_name("vitamin"));
    }

    #[test]
    fn test_missing_optional_fields_deserialize() {
        let json = r#"{
            "id": "6f1c1b8e-8a56-4c1c-9b7e-3f0f4f1f2a10",
            "name": "Ibuprofen",
            "dose": "200mg",
            "schedule": "8:00 PM",
            "notes": null,
            "user_id": "ana",
            "created_on": "2025-01-10"
        }"#;
        let med: Medicine = serde_json::from_str(json).unwrap();
        assert_eq!(med.dependent_id, None);
        assert_eq!(med.notifications, NotificationStatus::Disabled);
        assert_eq!(med.user_id, UserId::new("ana"));
    }
}
