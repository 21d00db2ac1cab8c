use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use notify_rust::Notification;
use tracing::{info, warn};

use crate::error::{MedError, Result};
use crate::reminder::{DailyTrigger, NotificationDispatcher, ReminderContent, ReminderHandle};

/// Holds daily triggers in-process and shows them as desktop notifications
/// when the daemon reports that their time has come.
#[derive(Debug)]
pub struct DesktopDispatcher {
    allowed: bool,
    next_id: u64,
    entries: BTreeMap<ReminderHandle, (ReminderContent, DailyTrigger)>,
}

impl DesktopDispatcher {
    /// With `allowed == false` every registration is refused, as if the user
    /// had turned notifications off for the app.
    pub fn new(allowed: bool) -> Self {
        DesktopDispatcher {
            allowed,
            next_id: 0,
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registrations with an occurrence in `(since, until]`. Each is listed
    /// at most once even if the window spans several days.
    pub fn due_between(
        &self,
        since: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Vec<(&ReminderHandle, &ReminderContent)> {
        if until <= since {
            return Vec::new();
        }
        let whole_day = until - since >= Duration::days(1);

        self.entries
            .iter()
            .filter(|(_, (_, trigger))| whole_day || occurs_within(trigger, since, until))
            .map(|(handle, (content, _))| (handle, content))
            .collect()
    }

    /// Shows one reminder on the desktop. Returns false if the notification
    /// server refused it.
    pub fn show(handle: &ReminderHandle, content: &ReminderContent) -> bool {
        let result = Notification::new()
            .summary(&format!("Medication Reminder: {}", content.title))
            .body(&content.body)
            .icon("medication")
            .timeout(0) // stay until dismissed
            .show();

        match result {
            Ok(_) => {
                info!(handle = %handle.0, title = %content.title, "reminder shown");
                true
            }
            Err(err) => {
                warn!(handle = %handle.0, title = %content.title, %err, "failed to show reminder");
                false
            }
        }
    }
}

impl NotificationDispatcher for DesktopDispatcher {
    fn request_registration(
        &mut self,
        content: ReminderContent,
        trigger: DailyTrigger,
    ) -> Result<ReminderHandle> {
        if !self.allowed {
            return Err(MedError::NotificationPermissionDenied(
                "desktop notifications are turned off".to_string(),
            ));
        }
        self.next_id += 1;
        let handle = ReminderHandle(format!("desktop-{}", self.next_id));
        self.entries.insert(handle.clone(), (content, trigger));
        Ok(handle)
    }

    fn cancel(&mut self, handle: &ReminderHandle) {
        self.entries.remove(handle);
    }
}

fn occurs_within(trigger: &DailyTrigger, since: NaiveDateTime, until: NaiveDateTime) -> bool {
    let time = trigger.time().to_naive_time();
    [since.date(), until.date()]
        .into_iter()
        .map(|day| day.and_time(time))
        .any(|at| since < at && at <= until)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, d)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn content(title: &str) -> ReminderContent {
        ReminderContent {
            title: title.to_string(),
            body: "Time to take: 1 tab".to_string(),
        }
    }

    fn titles(dispatcher: &DesktopDispatcher, since: NaiveDateTime, until: NaiveDateTime) -> Vec<String> {
        dispatcher
            .due_between(since, until)
            .into_iter()
            .map(|(_, c)| c.title.clone())
            .collect()
    }

    #[test]
    fn test_denied_when_not_allowed() {
        let mut dispatcher = DesktopDispatcher::new(false);
        let err = dispatcher
            .request_registration(content("a"), DailyTrigger { hour: 8, minute: 0 })
            .unwrap_err();
        assert!(matches!(err, MedError::NotificationPermissionDenied(_)));
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_due_within_minute_window() {
        let mut dispatcher = DesktopDispatcher::new(true);
        dispatcher
            .request_registration(content("morning"), DailyTrigger { hour: 8, minute: 0 })
            .unwrap();
        dispatcher
            .request_registration(content("evening"), DailyTrigger { hour: 20, minute: 0 })
            .unwrap();

        assert_eq!(titles(&dispatcher, at(1, 7, 59), at(1, 8, 0)), vec!["morning"]);
        assert!(titles(&dispatcher, at(1, 8, 0), at(1, 8, 1)).is_empty());
        assert!(titles(&dispatcher, at(1, 8, 1), at(1, 8, 1)).is_empty());
    }

    #[test]
    fn test_due_across_midnight() {
        let mut dispatcher = DesktopDispatcher::new(true);
        dispatcher
            .request_registration(content("midnight"), DailyTrigger { hour: 0, minute: 0 })
            .unwrap();
        dispatcher
            .request_registration(content("late"), DailyTrigger { hour: 23, minute: 59 })
            .unwrap();

        assert_eq!(titles(&dispatcher, at(1, 23, 58), at(2, 0, 0)), vec!["midnight", "late"]);
    }

    #[test]
    fn test_long_gap_fires_everything_once() {
        let mut dispatcher = DesktopDispatcher::new(true);
        dispatcher
            .request_registration(content("a"), DailyTrigger { hour: 9, minute: 0 })
            .unwrap();
        assert_eq!(titles(&dispatcher, at(1, 10, 0), at(4, 10, 0)), vec!["a"]);
    }

    #[test]
    fn test_cancel_removes_entry() {
        let mut dispatcher = DesktopDispatcher::new(true);
        let handle = dispatcher
            .request_registration(content("a"), DailyTrigger { hour: 9, minute: 0 })
            .unwrap();
        dispatcher.cancel(&handle);
        dispatcher.cancel(&handle);
        assert!(dispatcher.is_empty());
        assert!(titles(&dispatcher, at(1, 8, 0), at(1, 10, 0)).is_empty());
    }
}
