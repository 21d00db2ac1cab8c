use std::fs;

use chrono::NaiveDate;
use medtime::database::{JsonStore, RecordStore};
use medtime::desktop::DesktopDispatcher;
use medtime::model::UserId;
use medtime::service::{NewMedicine, Tracker};
use medtime::session::Session;
use medtime::MedError;
use tempfile::TempDir;

fn session(day: u32) -> Session {
    Session {
        user: UserId::new("ana"),
        now: NaiveDate::from_ymd_opt(2025, 10, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap(),
    }
}

fn aspirin() -> NewMedicine {
    NewMedicine {
        name: "Aspirin".to_string(),
        dose: "100mg".to_string(),
        schedule: "08:00 AM".to_string(),
        ..NewMedicine::default()
    }
}

#[test]
fn records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    let s = session(1);

    let med = {
        let store = JsonStore::open(&path).unwrap();
        let mut tracker = Tracker::new(store, DesktopDispatcher::new(true));
        let med = tracker.add_medicine(&s, aspirin()).unwrap();
        tracker.set_notifications(&s, &med.id, true).unwrap();
        tracker.mark_taken(&s, &med.id, None).unwrap();
        med
    };

    let store = JsonStore::open(&path).unwrap();
    let stored = store.medicine(&s.user, &med.id).unwrap();
    assert!(stored.notifications_enabled());
    assert_eq!(stored.name, "Aspirin");
    assert_eq!(store.dose_events(&s.user, Some(&med.id)).unwrap().len(), 1);
    assert!(!dir.path().join("records.json.tmp").exists());

    // the uniqueness of a taken day holds across processes too
    let mut tracker = Tracker::new(store, DesktopDispatcher::new(true));
    let err = tracker.mark_taken(&s, &med.id, None).unwrap_err();
    assert!(matches!(err, MedError::DuplicateDoseEvent { .. }));
}

#[test]
fn missing_file_is_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = JsonStore::open(dir.path().join("absent.json")).unwrap();
    assert!(store.medicines(&UserId::new("ana")).unwrap().is_empty());
}

#[test]
fn corrupted_file_is_backed_up() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    fs::write(&path, "{ not json").unwrap();

    let store = JsonStore::open(&path).unwrap();
    assert!(store.medicines(&UserId::new("ana")).unwrap().is_empty());

    let backup = dir.path().join("records.json.corrupted");
    assert_eq!(fs::read_to_string(backup).unwrap(), "{ not json");
}

#[test]
fn failed_write_leaves_store_unchanged() {
    let dir = TempDir::new().unwrap();
    // a directory where the file should be makes every save fail
    let path = dir.path().join("records.json");
    fs::create_dir(path.with_extension("json.tmp")).unwrap();

    let store = JsonStore::open(&path).unwrap();
    let mut tracker = Tracker::new(store, DesktopDispatcher::new(true));
    let err = tracker.add_medicine(&session(1), aspirin()).unwrap_err();

    assert!(matches!(err, MedError::Storage(_)));
    assert!(tracker.store().records().medicines.is_empty());
    assert!(!path.exists());
}

#[cfg(unix)]
#[test]
fn records_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    let mut tracker = Tracker::new(JsonStore::open(&path).unwrap(), DesktopDispatcher::new(true));
    tracker.add_medicine(&session(1), aspirin()).unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn adherence_view_reads_saved_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    let first = session(1);

    let mut tracker = Tracker::new(JsonStore::open(&path).unwrap(), DesktopDispatcher::new(true));
    let med = tracker.add_medicine(&first, aspirin()).unwrap();
    for day in [1, 2, 4] {
        tracker
            .mark_taken(&session(4), &med.id, NaiveDate::from_ymd_opt(2025, 10, day))
            .unwrap();
    }

    let store = JsonStore::open(&path).unwrap();
    assert_eq!(store.adherence_view(&first.user, session(4).today()).unwrap(), 75);
}
