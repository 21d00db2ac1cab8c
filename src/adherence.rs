use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{DoseEvent, Medicine, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdherenceSummary {
    /// Whole percent in `[0, 100]`.
    pub percent: u8,
    pub expected: u64,
    pub taken: u64,
}

/// Percentage of expected doses logged as taken between `period_start` and
/// `period_end` (both inclusive).
pub fn compute_adherence(
    user: &UserId,
    dose_events: &[DoseEvent],
    medicines: &[Medicine],
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> u8 {
    adherence_summary(user, dose_events, medicines, period_start, period_end).percent
}

/// Expected doses are one per medicine per day, counted from the later of
/// `period_start` and the day the medicine was added. Taken doses are the
/// user's events in the period that belong to one of those medicines.
///
/// With nothing expected the result is 0%, never 100%.
pub fn adherence_summary(
    user: &UserId,
    dose_events: &[DoseEvent],
    medicines: &[Medicine],
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> AdherenceSummary {
    let owned: Vec<&Medicine> = medicines.iter().filter(|m| &m.user_id == user).collect();

    let expected: u64 = owned
        .iter()
        .map(|m| days_inclusive(period_start.max(m.created_on), period_end))
        .sum();

    let taken = dose_events
        .iter()
        .filter(|e| &e.user_id == user)
        .filter(|e| e.date >= period_start && e.date <= period_end)
        .filter(|e| owned.iter().any(|m| m.id == e.medicine_id))
        .count() as u64;

    let percent = if expected == 0 {
        0
    } else {
        // round half up without going through floats
        ((200 * taken + expected) / (2 * expected)).min(100) as u8
    };

    AdherenceSummary {
        percent,
        expected,
        taken,
    }
}

fn days_inclusive(from: NaiveDate, to: NaiveDate) -> u64 {
    if to < from {
        0
    } else {
        (to - from).num_days() as u64 + 1
    }
}
