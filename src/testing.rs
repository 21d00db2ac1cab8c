//! Fakes shared by unit tests.

use std::collections::HashMap;

use crate::error::{MedError, Result};
use crate::reminder::{DailyTrigger, NotificationDispatcher, ReminderContent, ReminderHandle};

#[derive(Debug, Default)]
pub struct FakeDispatcher {
    pub active: HashMap<ReminderHandle, (ReminderContent, DailyTrigger)>,
    pub cancelled: Vec<ReminderHandle>,
    pub requests: usize,
    pub deny: bool,
}

impl FakeDispatcher {
    pub fn denying() -> Self {
        FakeDispatcher {
            deny: true,
            ..Self::default()
        }
    }
}

impl NotificationDispatcher for FakeDispatcher {
    fn request_registration(
        &mut self,
        content: ReminderContent,
        trigger: DailyTrigger,
    ) -> Result<ReminderHandle> {
        self.requests += 1;
        if self.deny {
            return Err(MedError::NotificationPermissionDenied("denied by fake".to_string()));
        }
        let handle = ReminderHandle(format!("fake-{}", self.requests));
        self.active.insert(handle.clone(), (content, trigger));
        Ok(handle)
    }

    fn cancel(&mut self, handle: &ReminderHandle) {
        if self.active.remove(handle).is_some() {
            self.cancelled.push(handle.clone());
        }
    }
}
