use std::collections::HashSet;
use std::thread;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::{JsonStore, RecordStore};
use crate::desktop::DesktopDispatcher;
use crate::error::Result;
use crate::model::UserId;
use crate::reminder::{ReminderContent, ReminderHandle, ReminderScheduler};
use crate::session::{AuthProvider, Clock};

/// Re-syncs registrations with the stored medicines and returns the
/// reminders due in `(since, now]`.
///
/// Medicines already marked as taken on the day of the reminder are left out.
pub fn due_reminders<S: RecordStore>(
    store: &S,
    user: &UserId,
    scheduler: &mut ReminderScheduler<DesktopDispatcher>,
    since: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<Vec<(ReminderHandle, ReminderContent)>> {
    let medicines = store.medicines(user)?;
    for (medicine, err) in scheduler.sync(&medicines) {
        warn!(%medicine, %err, "could not register reminder");
    }

    let taken_today: HashSet<&ReminderHandle> = store
        .dose_events(user, None)?
        .iter()
        .filter(|event| event.date == now.date())
        .filter_map(|event| scheduler.handle_for(&event.medicine_id))
        .collect();

    Ok(scheduler
        .dispatcher()
        .due_between(since, now)
        .into_iter()
        .filter(|(handle, _)| !taken_today.contains(handle))
        .map(|(handle, content)| (handle.clone(), content.clone()))
        .collect())
}

/// Runs until the process is killed, checking the records file once per
/// poll interval.
pub fn run_daemon(config: &Config, auth: &impl AuthProvider, clock: &impl Clock) -> Result<()> {
    let user = auth.current_user()?;
    let mut scheduler = ReminderScheduler::new(DesktopDispatcher::new(config.notifications));
    let mut last_check = clock.now();

    info!(
        %user,
        data_file = %config.data_file.display(),
        poll_secs = config.poll_interval.as_secs(),
        "daemon started"
    );
    println!("Daemon started. Checking for medication reminders...");
    println!("Press Ctrl+C to stop.");

    loop {
        let now = clock.now();

        // reopened every tick so edits made from the CLI are picked up
        let tick = JsonStore::open(&config.data_file)
            .and_then(|store| due_reminders(&store, &user, &mut scheduler, last_check, now));

        match tick {
            Ok(due) => {
                debug!(registered = scheduler.dispatcher().len(), due = due.len(), "tick");
                for (handle, content) in &due {
                    DesktopDispatcher::show(handle, content);
                }
            }
            Err(err) => warn!(%err, "skipping reminder check"),
        }

        last_check = now;
        thread::sleep(config.poll_interval);
    }
}
