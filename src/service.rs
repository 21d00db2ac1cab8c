use chrono::{Duration, NaiveDate};
use tracing::{info, warn};
use uuid::Uuid;

use crate::adherence::{adherence_summary, AdherenceSummary};
use crate::database::RecordStore;
use crate::error::{MedError, Result};
use crate::model::{Dependent, DependentId, DoseEvent, Medicine, MedicineId};
use crate::next_dose::next_dose_card;
use crate::reminder::{NotificationDispatcher, RegistrationResult, ReminderContent, ReminderScheduler};
use crate::session::Session;
use crate::time::ScheduleTime;

#[derive(Debug, Clone, Default)]
pub struct NewMedicine {
    pub name: String,
    pub dose: String,
    pub schedule: String,
    pub notes: Option<String>,
    pub dependent: Option<DependentId>,
}

/// Fields left as `None` are unchanged. `notes: Some("")` clears the notes.
#[derive(Debug, Clone, Default)]
pub struct MedicineEdit {
    pub name: Option<String>,
    pub dose: Option<String>,
    pub schedule: Option<String>,
    pub notes: Option<String>,
}

impl MedicineEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.dose.is_none() && self.schedule.is_none() && self.notes.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewDependent {
    pub name: String,
    pub relationship: String,
    pub email: String,
}

/// Owned form of the reminder card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingDose {
    pub medicine: Medicine,
    pub at: ScheduleTime,
    pub tomorrow: bool,
}

/// The user-facing operations, tying the record store to the reminder
/// scheduler and the calculators.
pub struct Tracker<S, D> {
    store: S,
    reminders: ReminderScheduler<D>,
}

impl<S: RecordStore, D: NotificationDispatcher> Tracker<S, D> {
    pub fn new(store: S, dispatcher: D) -> Self {
        Tracker {
            store,
            reminders: ReminderScheduler::new(dispatcher),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn reminders(&self) -> &ReminderScheduler<D> {
        &self.reminders
    }

    pub fn reminders_mut(&mut self) -> &mut ReminderScheduler<D> {
        &mut self.reminders
    }

    pub fn medicines(&self, session: &Session) -> Result<Vec<Medicine>> {
        self.store.medicines(&session.user)
    }

    /// Looks a medicine up by id, or else by name (case-insensitive).
    pub fn find_medicine(&self, session: &Session, key: &str) -> Result<Medicine> {
        if let Ok(uuid) = Uuid::parse_str(key.trim()) {
            return self.store.medicine(&session.user, &MedicineId(uuid));
        }
        self.medicines(session)?
            .into_iter()
            .find(|m| m.matches_name(key))
            .ok_or_else(|| MedError::MedicineNotFound(key.to_string()))
    }

    /// Validates and stores a new medicine for the session user. Reminders
    /// start disabled and `created_on` is the session's current day.
    ///
    /// # Arguments
    /// * `new` - Name, dose, schedule ("08:00" or "8:00 PM"), optional notes
    ///   and the dependent it is taken by, if any
    ///
    /// # Validation
    /// - Name and dose cannot be empty
    /// - Schedule must parse as a 24-hour or 12-hour time
    /// - The dependent, if given, must belong to the user
    /// - Name must not match another of the user's medicines (case-insensitive)
    pub fn add_medicine(&mut self, session: &Session, new: NewMedicine) -> Result<Medicine> {
        let name = required("Medicine name", &new.name)?;
        let dose = required("Dose", &new.dose)?;
        ScheduleTime::parse(&new.schedule)?;

        if let Some(dependent) = &new.dependent {
            self.store.dependent(&session.user, dependent)?;
        }
        if self.medicines(session)?.iter().any(|m| m.matches_name(&name)) {
            return Err(MedError::InvalidInput(format!("medicine '{name}' already exists")));
        }

        let mut medicine = Medicine::new(
            session.user.clone(),
            name,
            dose,
            new.schedule.trim(),
            session.today(),
        );
        medicine.notes = new.notes.filter(|n| !n.trim().is_empty());
        medicine.dependent_id = new.dependent;

        self.store.insert_medicine(medicine.clone())?;
        info!(medicine = %medicine.id, name = %medicine.name, "medicine added");
        Ok(medicine)
    }

    /// Applies an edit to one of the session user's medicines.
    ///
    /// If the medicine has reminders on and its time, name or dose changed,
    /// the reminder is registered again so the notification matches the
    /// stored row.
    ///
    /// # Arguments
    /// * `id` - Medicine to change
    /// * `edit` - Fields to replace; `None` leaves a field as it is
    ///
    /// # Validation
    /// - At least one field must be given
    /// - Name and dose cannot be empty, and the new name must not belong to
    ///   another of the user's medicines
    /// - A new schedule must parse, otherwise nothing is saved
    pub fn edit_medicine(&mut self, session: &Session, id: &MedicineId, edit: MedicineEdit) -> Result<Medicine> {
        if edit.is_empty() {
            return Err(MedError::InvalidInput("no changes specified".to_string()));
        }

        let mut medicine = self.store.medicine(&session.user, id)?;
        let announced = ReminderContent::for_medicine(&medicine);
        let mut retimed = false;

        if let Some(name) = edit.name {
            let name = required("Medicine name", &name)?;
            let taken = self
                .medicines(session)?
                .iter()
                .any(|m| m.id != medicine.id && m.matches_name(&name));
            if taken {
                return Err(MedError::InvalidInput(format!("medicine '{name}' already exists")));
            }
            medicine.name = name;
        }
        if let Some(dose) = edit.dose {
            medicine.dose = required("Dose", &dose)?;
        }
        if let Some(schedule) = edit.schedule {
            retimed = medicine.scheduled_at().ok() != Some(ScheduleTime::parse(&schedule)?);
            medicine.schedule = schedule.trim().to_string();
        }
        if let Some(notes) = edit.notes {
            medicine.notes = Some(notes).filter(|n| !n.trim().is_empty());
        }

        self.store.update_medicine(&medicine)?;
        info!(medicine = %medicine.id, "medicine updated");

        let reworded = ReminderContent::for_medicine(&medicine) != announced;
        if (retimed || reworded) && medicine.notifications_enabled() {
            self.reminders
                .set_reminder(&medicine, true)
                .map_err(|err| out_of_sync(&medicine, true, err))?;
        }
        Ok(medicine)
    }

    /// Deletes the medicine and cancels its reminder. Its dose log is kept.
    pub fn delete_medicine(&mut self, session: &Session, id: &MedicineId) -> Result<Medicine> {
        let medicine = self.store.delete_medicine(&session.user, id)?;
        self.reminders.forget(id);
        info!(medicine = %id, name = %medicine.name, "medicine deleted");
        Ok(medicine)
    }

    /// Turns the reminder for a medicine on or off.
    ///
    /// The schedule is checked first, then the dispatcher is called, then the
    /// flag is saved. If saving fails after the registration changed, the
    /// caller gets `ReminderOutOfSync`.
    pub fn set_notifications(
        &mut self,
        session: &Session,
        id: &MedicineId,
        enabled: bool,
    ) -> Result<RegistrationResult> {
        let mut medicine = self.store.medicine(&session.user, id)?;
        let result = self.reminders.set_reminder(&medicine, enabled)?;

        medicine.notifications = enabled.into();
        self.store
            .update_medicine(&medicine)
            .map_err(|err| out_of_sync(&medicine, enabled, err))?;
        Ok(result)
    }

    pub fn toggle_notifications(&mut self, session: &Session, id: &MedicineId) -> Result<RegistrationResult> {
        let enabled = self.store.medicine(&session.user, id)?.notifications_enabled();
        self.set_notifications(session, id, !enabled)
    }

    /// Marks the medicine as taken on one day.
    ///
    /// # Arguments
    /// * `id` - Medicine that was taken
    /// * `date` - Day of the dose; `None` means the session's current day
    ///
    /// # Validation
    /// - The day cannot be after today
    /// - Marking the same day twice fails with `DuplicateDoseEvent`, which
    ///   callers report as information rather than a failure
    pub fn mark_taken(&mut self, session: &Session, id: &MedicineId, date: Option<NaiveDate>) -> Result<DoseEvent> {
        let medicine = self.store.medicine(&session.user, id)?;
        let date = date.unwrap_or_else(|| session.today());
        if date > session.today() {
            return Err(MedError::InvalidInput(format!("cannot mark {date} as taken yet")));
        }

        let event = DoseEvent::new(session.user.clone(), medicine.id, date);
        self.store.insert_dose_event(event.clone())?;
        info!(medicine = %medicine.id, %date, "dose marked as taken");
        Ok(event)
    }

    /// Days on which the medicine was marked as taken, oldest first.
    pub fn calendar(&self, session: &Session, id: &MedicineId) -> Result<Vec<NaiveDate>> {
        self.store.medicine(&session.user, id)?;
        Ok(self
            .store
            .dose_events(&session.user, Some(id))?
            .into_iter()
            .map(|e| e.date)
            .collect())
    }

    pub fn next_dose(&self, session: &Session) -> Result<Option<UpcomingDose>> {
        let medicines = self.medicines(session)?;
        Ok(next_dose_card(&medicines, session.now).map(|next| UpcomingDose {
            medicine: next.medicine.clone(),
            at: next.at,
            tomorrow: next.tomorrow,
        }))
    }

    /// Adherence over the last `days` days including today, or over the whole
    /// tracked period when `days` is `None`.
    pub fn adherence(&self, session: &Session, days: Option<u32>) -> Result<AdherenceSummary> {
        let medicines = self.medicines(session)?;
        let events = self.store.dose_events(&session.user, None)?;
        let today = session.today();

        let start = match days {
            Some(0) => return Err(MedError::InvalidInput("days must be at least 1".to_string())),
            // windows reaching past the calendar cover everything
            Some(days) => today
                .checked_sub_signed(Duration::days(i64::from(days) - 1))
                .unwrap_or(NaiveDate::MIN),
            None => medicines.iter().map(|m| m.created_on).min().unwrap_or(today),
        };
        Ok(adherence_summary(&session.user, &events, &medicines, start, today))
    }

    pub fn dependents(&self, session: &Session) -> Result<Vec<Dependent>> {
        self.store.dependents(&session.user)
    }

    pub fn add_dependent(&mut self, session: &Session, new: NewDependent) -> Result<Dependent> {
        let name = required("Dependent name", &new.name)?;
        let relationship = required("Relationship", &new.relationship)?;
        let email = required("Email", &new.email)?;
        if !email.contains('@') {
            return Err(MedError::InvalidInput(format!("'{email}' is not an email address")));
        }

        let dependent = Dependent {
            id: DependentId::new(),
            name,
            relationship,
            email,
            user_id: session.user.clone(),
        };
        self.store.insert_dependent(dependent.clone())?;
        info!(dependent = %dependent.id, "dependent added");
        Ok(dependent)
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(MedError::InvalidInput(format!("{field} cannot be empty")));
    }
    Ok(value.to_string())
}

fn out_of_sync(medicine: &Medicine, enabled: bool, err: MedError) -> MedError {
    warn!(medicine = %medicine.id, enabled, %err, "reminder state and stored flag disagree");
    MedError::ReminderOutOfSync {
        medicine: medicine.id,
        enabled,
        reason: err.to_string(),
    }
}
