use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adherence::compute_adherence;
use crate::error::{MedError, Result};
use crate::model::{Dependent, DependentId, DoseEvent, Medicine, MedicineId, UserId};

/// Row storage for medicines, dependents and dose events. Every read and
/// write is scoped to the owning user.
pub trait RecordStore {
    fn medicines(&self, user: &UserId) -> Result<Vec<Medicine>>;
    fn medicine(&self, user: &UserId, id: &MedicineId) -> Result<Medicine>;
    fn insert_medicine(&mut self, medicine: Medicine) -> Result<()>;
    fn update_medicine(&mut self, medicine: &Medicine) -> Result<()>;
    fn delete_medicine(&mut self, user: &UserId, id: &MedicineId) -> Result<Medicine>;

    fn dependents(&self, user: &UserId) -> Result<Vec<Dependent>>;
    fn dependent(&self, user: &UserId, id: &DependentId) -> Result<Dependent>;
    fn insert_dependent(&mut self, dependent: Dependent) -> Result<()>;

    /// Dose events of `user`, optionally only those for one medicine, oldest first.
    fn dose_events(&self, user: &UserId, medicine: Option<&MedicineId>) -> Result<Vec<DoseEvent>>;
    /// Stores one taken dose.
    ///
    /// # Validation
    /// - A second event for the same (user, medicine, date) fails with
    ///   `MedError::DuplicateDoseEvent` and leaves the store as it was
    fn insert_dose_event(&mut self, event: DoseEvent) -> Result<()>;

    /// Aggregate adherence over the user's whole tracked period, from the
    /// day their first medicine was added through `today`.
    fn adherence_view(&self, user: &UserId, today: NaiveDate) -> Result<u8> {
        let medicines = self.medicines(user)?;
        let Some(start) = medicines.iter().map(|m| m.created_on).min() else {
            return Ok(0);
        };
        let events = self.dose_events(user, None)?;
        Ok(compute_adherence(user, &events, &medicines, start, today))
    }
}

/// Everything a store holds, in the shape it is saved to disk.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Records {
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub dependents: Vec<Dependent>,
    #[serde(default)]
    pub dose_events: Vec<DoseEvent>,
}

impl Records {
    fn medicines(&self, user: &UserId) -> Vec<Medicine> {
        self.medicines
            .iter()
            .filter(|m| &m.user_id == user)
            .cloned()
            .collect()
    }

    fn medicine(&self, user: &UserId, id: &MedicineId) -> Result<Medicine> {
        self.medicines
            .iter()
            .find(|m| &m.user_id == user && &m.id == id)
            .cloned()
            .ok_or_else(|| MedError::MedicineNotFound(id.to_string()))
    }

    fn insert_medicine(&mut self, medicine: Medicine) -> Result<()> {
        if self.medicines.iter().any(|m| m.id == medicine.id) {
            return Err(MedError::Storage(format!("medicine {} already exists", medicine.id)));
        }
        self.medicines.push(medicine);
        Ok(())
    }

    fn update_medicine(&mut self, medicine: &Medicine) -> Result<()> {
        let slot = self
            .medicines
            .iter_mut()
            .find(|m| m.user_id == medicine.user_id && m.id == medicine.id)
            .ok_or_else(|| MedError::MedicineNotFound(medicine.id.to_string()))?;
        *slot = medicine.clone();
        Ok(())
    }

    fn delete_medicine(&mut self, user: &UserId, id: &MedicineId) -> Result<Medicine> {
        let index = self
            .medicines
            .iter()
            .position(|m| &m.user_id == user && &m.id == id)
            .ok_or_else(|| MedError::MedicineNotFound(id.to_string()))?;
        Ok(self.medicines.remove(index))
    }

    fn dependents(&self, user: &UserId) -> Vec<Dependent> {
        self.dependents
            .iter()
            .filter(|d| &d.user_id == user)
            .cloned()
            .collect()
    }

    fn dependent(&self, user: &UserId, id: &DependentId) -> Result<Dependent> {
        self.dependents
            .iter()
            .find(|d| &d.user_id == user && &d.id == id)
            .cloned()
            .ok_or(MedError::DependentNotFound(*id))
    }

    fn insert_dependent(&mut self, dependent: Dependent) -> Result<()> {
        if self.dependents.iter().any(|d| d.id == dependent.id) {
            return Err(MedError::Storage(format!("dependent {} already exists", dependent.id)));
        }
        self.dependents.push(dependent);
        Ok(())
    }

    fn dose_events(&self, user: &UserId, medicine: Option<&MedicineId>) -> Vec<DoseEvent> {
        let mut events: Vec<DoseEvent> = self
            .dose_events
            .iter()
            .filter(|e| &e.user_id == user)
            .filter(|e| medicine.map_or(true, |id| &e.medicine_id == id))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.date);
        events
    }

    fn insert_dose_event(&mut self, event: DoseEvent) -> Result<()> {
        if self.dose_events.iter().any(|e| e.same_key(&event)) {
            return Err(MedError::DuplicateDoseEvent {
                medicine: event.medicine_id,
                date: event.date,
            });
        }
        self.dose_events.push(event);
        Ok(())
    }
}

/// Keeps records in memory only. Writes can be made to fail to simulate an
/// unreachable backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub records: Records,
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write<T>(&mut self, op: impl FnOnce(&mut Records) -> Result<T>) -> Result<T> {
        if self.fail_writes {
            return Err(MedError::Storage("store is unavailable".to_string()));
        }
        op(&mut self.records)
    }
}

impl RecordStore for MemoryStore {
    fn medicines(&self, user: &UserId) -> Result<Vec<Medicine>> {
        Ok(self.records.medicines(user))
    }

    fn medicine(&self, user: &UserId, id: &MedicineId) -> Result<Medicine> {
        self.records.medicine(user, id)
    }

    fn insert_medicine(&mut self, medicine: Medicine) -> Result<()> {
        self.write(|r| r.insert_medicine(medicine))
    }

    fn update_medicine(&mut self, medicine: &Medicine) -> Result<()> {
        self.write(|r| r.update_medicine(medicine))
    }

    fn delete_medicine(&mut self, user: &UserId, id: &MedicineId) -> Result<Medicine> {
        self.write(|r| r.delete_medicine(user, id))
    }

    fn dependents(&self, user: &UserId) -> Result<Vec<Dependent>> {
        Ok(self.records.dependents(user))
    }

    fn dependent(&self, user: &UserId, id: &DependentId) -> Result<Dependent> {
        self.records.dependent(user, id)
    }

    fn insert_dependent(&mut self, dependent: Dependent) -> Result<()> {
        self.write(|r| r.insert_dependent(dependent))
    }

    fn dose_events(&self, user: &UserId, medicine: Option<&MedicineId>) -> Result<Vec<DoseEvent>> {
        Ok(self.records.dose_events(user, medicine))
    }

    fn insert_dose_event(&mut self, event: DoseEvent) -> Result<()> {
        self.write(|r| r.insert_dose_event(event))
    }
}

/// Returns the default location of the records file: `~/.medtime.json`.
///
/// Falls back to `./.medtime.json` if no home directory is found.
pub fn default_data_file() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".medtime.json")
}

/// Records kept in a single JSON document on disk.
///
/// Every mutation is applied to a copy, written out atomically, and only
/// then becomes visible, so a failed write leaves both the file and the
/// in-memory state untouched.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    records: Records,
}

impl JsonStore {
    /// Opens the store at `path`.
    ///
    /// # Arguments
    /// * `path` - Records file, usually `default_data_file()` or `MEDTIME_DATA`
    ///
    /// A missing file is an empty store. A file that cannot be parsed is
    /// copied aside to `<path>.corrupted` and the store starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = load_records(&path)?;
        Ok(JsonStore { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    fn commit<T>(&mut self, op: impl FnOnce(&mut Records) -> Result<T>) -> Result<T> {
        let mut next = self.records.clone();
        let out = op(&mut next)?;
        save_records(&self.path, &next)?;
        self.records = next;
        Ok(out)
    }
}

impl RecordStore for JsonStore {
    fn medicines(&self, user: &UserId) -> Result<Vec<Medicine>> {
        Ok(self.records.medicines(user))
    }

    fn medicine(&self, user: &UserId, id: &MedicineId) -> Result<Medicine> {
        self.records.medicine(user, id)
    }

    fn insert_medicine(&mut self, medicine: Medicine) -> Result<()> {
        self.commit(|r| r.insert_medicine(medicine))
    }

    fn update_medicine(&mut self, medicine: &Medicine) -> Result<()> {
        self.commit(|r| r.update_medicine(medicine))
    }

    fn delete_medicine(&mut self, user: &UserId, id: &MedicineId) -> Result<Medicine> {
        self.commit(|r| r.delete_medicine(user, id))
    }

    fn dependents(&self, user: &UserId) -> Result<Vec<Dependent>> {
        Ok(self.records.dependents(user))
    }

    fn dependent(&self, user: &UserId, id: &DependentId) -> Result<Dependent> {
        self.records.dependent(user, id)
    }

    fn insert_dependent(&mut self, dependent: Dependent) -> Result<()> {
        self.commit(|r| r.insert_dependent(dependent))
    }

    fn dose_events(&self, user: &UserId, medicine: Option<&MedicineId>) -> Result<Vec<DoseEvent>> {
        Ok(self.records.dose_events(user, medicine))
    }

    fn insert_dose_event(&mut self, event: DoseEvent) -> Result<()> {
        self.commit(|r| r.insert_dose_event(event))
    }
}

fn load_records(path: &Path) -> Result<Records> {
    if !path.exists() {
        debug!(path = %path.display(), "no records file yet, starting empty");
        return Ok(Records::default());
    }

    let contents = fs::read_to_string(path)?;
    match serde_json::from_str::<Records>(&contents) {
        Ok(records) => Ok(records),
        Err(err) => {
            let backup_path = path.with_extension("json.corrupted");
            warn!(
                path = %path.display(),
                backup = %backup_path.display(),
                %err,
                "records file is corrupted, backing it up and starting empty"
            );
            if let Err(backup_err) = fs::copy(path, &backup_path) {
                warn!(%backup_err, "failed to back up corrupted records file");
            }
            Ok(Records::default())
        }
    }
}

/// Writes to a temp file and renames it over the target, then restricts the
/// file to its owner on Unix.
fn save_records(path: &Path, records: &Records) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    let temp_path = path.with_extension("json.tmp");

    fs::write(&temp_path, &json)?;

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    #[cfg(unix)]
    {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        if let Err(err) = fs::set_permissions(path, perms) {
            warn!(%err, "failed to restrict records file permissions");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    #[test]
    fn test_duplicate_dose_event_rejected() {
        let mut store = MemoryStore::new();
        let user = UserId::new("ana");
        let med = Medicine::new(user.clone(), "Aspirin", "100mg", "08:00", day(1));

        store.insert_dose_event(DoseEvent::new(user.clone(), med.id, day(2))).unwrap();
        let err = store
            .insert_dose_event(DoseEvent::new(user.clone(), med.id, day(2)))
            .unwrap_err();

        assert_eq!(err, MedError::DuplicateDoseEvent { medicine: med.id, date: day(2) });
        assert!(err.is_informational());
        assert_eq!(store.dose_events(&user, Some(&med.id)).unwrap().len(), 1);

        // another day, or another user on the same day, is fine
        store.insert_dose_event(DoseEvent::new(user.clone(), med.id, day(3))).unwrap();
        store
            .insert_dose_event(DoseEvent::new(UserId::new("bob"), med.id, day(2)))
            .unwrap();
    }

    #[test]
    fn test_reads_are_scoped_to_owner() {
        let mut store = MemoryStore::new();
        let ana = UserId::new("ana");
        let bob = UserId::new("bob");
        let med = Medicine::new(ana.clone(), "Aspirin", "100mg", "08:00", day(1));
        store.insert_medicine(med.clone()).unwrap();

        assert_eq!(store.medicines(&ana).unwrap().len(), 1);
        assert!(store.medicines(&bob).unwrap().is_empty());
        assert!(matches!(store.medicine(&bob, &med.id), Err(MedError::MedicineNotFound(_))));
        assert!(matches!(store.delete_medicine(&bob, &med.id), Err(MedError::MedicineNotFound(_))));
        assert_eq!(store.delete_medicine(&ana, &med.id).unwrap(), med);
    }

    #[test]
    fn test_dose_events_sorted_by_date() {
        let mut store = MemoryStore::new();
        let user = UserId::new("ana");
        let med = Medicine::new(user.clone(), "Aspirin", "100mg", "08:00", day(1));
        for d in [5, 1, 3] {
            store.insert_dose_event(DoseEvent::new(user.clone(), med.id, day(d))).unwrap();
        }
        let dates: Vec<NaiveDate> = store
            .dose_events(&user, None)
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec![day(1), day(3), day(5)]);
    }

    #[test]
    fn test_adherence_view_uses_tracked_period() {
        let mut store = MemoryStore::new();
        let user = UserId::new("ana");
        assert_eq!(store.adherence_view(&user, day(10)).unwrap(), 0);

        let med = Medicine::new(user.clone(), "Aspirin", "100mg", "08:00", day(7));
        store.insert_medicine(med.clone()).unwrap();
        for d in [7, 8, 9] {
            store.insert_dose_event(DoseEvent::new(user.clone(), med.id, day(d))).unwrap();
        }
        // 3 of 4 days (7th through 10th)
        assert_eq!(store.adherence_view(&user, day(10)).unwrap(), 75);
    }

    #[test]
    fn test_failed_write_reports_storage_error() {
        let mut store = MemoryStore {
            fail_writes: true,
            ..MemoryStore::default()
        };
        let med = Medicine::new(UserId::new("ana"), "Aspirin", "100mg", "08:00", day(1));
        assert!(matches!(store.insert_medicine(med), Err(MedError::Storage(_))));
        assert!(store.records.medicines.is_empty());
    }
}
