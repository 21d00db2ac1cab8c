use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{MedError, Result};
use crate::model::{Medicine, MedicineId};
use crate::time::ScheduleTime;

/// Fires every day at the given wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DailyTrigger {
    pub hour: u32,
    pub minute: u32,
}

impl DailyTrigger {
    pub fn at(time: ScheduleTime) -> Self {
        DailyTrigger {
            hour: time.hour(),
            minute: time.minute(),
        }
    }

    pub fn time(&self) -> ScheduleTime {
        ScheduleTime::from_hm(self.hour, self.minute).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderContent {
    pub title: String,
    pub body: String,
}

impl ReminderContent {
    pub fn for_medicine(medicine: &Medicine) -> Self {
        ReminderContent {
            title: medicine.name.clone(),
            body: format!("Time to take: {}", medicine.dose),
        }
    }
}

/// Opaque handle returned by a dispatcher for one recurring registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReminderHandle(pub String);

/// The notification subsystem reminders are registered with.
pub trait NotificationDispatcher {
    /// Registers a recurring daily notification. Fails with
    /// `MedError::NotificationPermissionDenied` if the host refuses.
    fn request_registration(
        &mut self,
        content: ReminderContent,
        trigger: DailyTrigger,
    ) -> Result<ReminderHandle>;

    /// Cancels a registration. Unknown handles are ignored.
    fn cancel(&mut self, handle: &ReminderHandle);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationResult {
    Registered(ReminderHandle),
    Cancelled(ReminderHandle),
    /// Disabling a medicine that had no registration.
    NotRegistered,
}

#[derive(Debug, Clone)]
struct Registration {
    handle: ReminderHandle,
    at: ScheduleTime,
    content: ReminderContent,
}

/// Keeps at most one dispatcher registration per medicine.
pub struct ReminderScheduler<D> {
    dispatcher: D,
    registrations: HashMap<MedicineId, Registration>,
}

impl<D: NotificationDispatcher> ReminderScheduler<D> {
    pub fn new(dispatcher: D) -> Self {
        ReminderScheduler {
            dispatcher,
            registrations: HashMap::new(),
        }
    }

    /// Brings the registration for `medicine` in line with `enabled`.
    ///
    /// Enabling an already registered medicine cancels the old handle and
    /// registers again, so there is never more than one. Disabling a
    /// medicine with no registration is a no-op.
    pub fn set_reminder(&mut self, medicine: &Medicine, enabled: bool) -> Result<RegistrationResult> {
        if !enabled {
            return Ok(self.forget(&medicine.id));
        }

        // must fail before anything reaches the dispatcher
        let at = medicine.scheduled_at()?;

        if let Some(prior) = self.registrations.remove(&medicine.id) {
            debug!(medicine = %medicine.id, handle = %prior.handle.0, "replacing reminder");
            self.dispatcher.cancel(&prior.handle);
        }

        let content = ReminderContent::for_medicine(medicine);
        let handle = self
            .dispatcher
            .request_registration(content.clone(), DailyTrigger::at(at))?;
        self.registrations.insert(
            medicine.id,
            Registration {
                handle: handle.clone(),
                at,
                content,
            },
        );

        info!(medicine = %medicine.id, name = %medicine.name, %at, "reminder registered");
        Ok(RegistrationResult::Registered(handle))
    }

    /// Cancels any registration for the medicine, e.g. after it was deleted.
    pub fn forget(&mut self, id: &MedicineId) -> RegistrationResult {
        match self.registrations.remove(id) {
            Some(registration) => {
                self.dispatcher.cancel(&registration.handle);
                info!(medicine = %id, "reminder cancelled");
                RegistrationResult::Cancelled(registration.handle)
            }
            None => RegistrationResult::NotRegistered,
        }
    }

    /// Reconciles registrations with the stored medicines.
    ///
    /// Enabled medicines that are unregistered, or whose time or reminder
    /// text changed, get (re)registered; disabled or vanished ones are
    /// cancelled. An enabled medicine whose schedule no longer parses loses
    /// its registration. Failures are collected per medicine and do not stop
    /// the rest of the pass.
    pub fn sync(&mut self, medicines: &[Medicine]) -> Vec<(MedicineId, MedError)> {
        let mut failures = Vec::new();

        for medicine in medicines {
            if !medicine.notifications_enabled() {
                self.forget(&medicine.id);
                continue;
            }

            let at = match medicine.scheduled_at() {
                Ok(at) => at,
                Err(err) => {
                    self.forget(&medicine.id);
                    failures.push((medicine.id, err));
                    continue;
                }
            };
            let content = ReminderContent::for_medicine(medicine);
            let up_to_date = self
                .registrations
                .get(&medicine.id)
                .is_some_and(|r| r.at == at && r.content == content);
            if up_to_date {
                continue;
            }

            if let Err(err) = self.set_reminder(medicine, true) {
                failures.push((medicine.id, err));
            }
        }

        let stale: Vec<MedicineId> = self
            .registrations
            .keys()
            .filter(|id| !medicines.iter().any(|m| m.id == **id))
            .copied()
            .collect();
        for id in stale {
            self.forget(&id);
        }

        failures
    }

    pub fn is_registered(&self, id: &MedicineId) -> bool {
        self.registrations.contains_key(id)
    }

    pub fn handle_for(&self, id: &MedicineId) -> Option<&ReminderHandle> {
        self.registrations.get(id).map(|r| &r.handle)
    }

    pub fn active_count(&self) -> usize {
        self.registrations.len()
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }
}
