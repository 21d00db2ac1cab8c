use chrono::NaiveDateTime;
use tracing::warn;

use crate::model::Medicine;
use crate::time::ScheduleTime;

/// The medicine shown on the reminder card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextDose<'a> {
    pub medicine: &'a Medicine,
    pub at: ScheduleTime,
    /// True when every dose today has passed and this is tomorrow's first one.
    pub tomorrow: bool,
}

/// Returns the medicine due next after `now`.
///
/// When every dose for today has already passed, the earliest dose is returned
/// (it is the first one tomorrow). Only an empty input yields `None`.
pub fn select_next_dose(medicines: &[Medicine], now: NaiveDateTime) -> Option<&Medicine> {
    next_dose_card(medicines, now).map(|next| next.medicine)
}

pub fn next_dose_card(medicines: &[Medicine], now: NaiveDateTime) -> Option<NextDose<'_>> {
    let mut timed: Vec<(ScheduleTime, &Medicine)> = medicines
        .iter()
        .filter_map(|med| match med.scheduled_at() {
            Ok(at) => Some((at, med)),
            Err(err) => {
                warn!(medicine = %med.id, %err, "skipping medicine with unparseable schedule");
                None
            }
        })
        .collect();

    // sort_by_key is stable, so equal times keep their input order
    timed.sort_by_key(|(at, _)| *at);

    let now = ScheduleTime::of(&now);
    if let Some(&(at, medicine)) = timed.iter().find(|(at, _)| *at > now) {
        return Some(NextDose {
            medicine,
            at,
            tomorrow: false,
        });
    }

    timed.first().map(|&(at, medicine)| NextDose {
        medicine,
        at,
        tomorrow: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;
    use chrono::NaiveDate;

    fn med(name: &str, schedule: &str) -> Medicine {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        Medicine::new(UserId::new("ana"), name, "1 tab", schedule, day)
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_picks_next_later_dose() {
        let meds = vec![med("a", "08:00"), med("b", "14:00"), med("c", "20:00")];
        assert_eq!(select_next_dose(&meds, at(10, 0)).map(|m| m.name.as_str()), Some("b"));
    }

    #[test]
    fn test_wraps_to_first_dose_tomorrow() {
        let meds = vec![med("a", "08:00"), med("b", "14:00"), med("c", "20:00")];
        let next = next_dose_card(&meds, at(23, 0)).unwrap();
        assert_eq!(next.medicine.name, "a");
        assert!(next.tomorrow);
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(select_next_dose(&[], at(10, 0)), None);
    }

    #[test]
    fn test_dose_at_exactly_now_is_not_next() {
        let meds = vec![med("a", "10:00"), med("b", "12:00")];
        assert_eq!(select_next_dose(&meds, at(10, 0)).map(|m| m.name.as_str()), Some("b"));
    }

    #[test]
    fn test_unsorted_input_and_mixed_formats() {
        let meds = vec![med("late", "9:00 PM"), med("noon", "12:00 PM"), med("early", "06:30")];
        assert_eq!(select_next_dose(&meds, at(7, 0)).map(|m| m.name.as_str()), Some("noon"));
        assert_eq!(select_next_dose(&meds, at(13, 0)).map(|m| m.name.as_str()), Some("late"));
        assert_eq!(select_next_dose(&meds, at(22, 0)).map(|m| m.name.as_str()), Some("early"));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let meds = vec![med("first", "14:00"), med("second", "2:00 PM"), med("morning", "08:00")];
        assert_eq!(select_next_dose(&meds, at(9, 0)).map(|m| m.name.as_str()), Some("first"));
        assert_eq!(select_next_dose(&meds, at(7, 0)).map(|m| m.name.as_str()), Some("morning"));
    }

    #[test]
    fn test_unparseable_schedule_is_skipped() {
        let meds = vec![med("broken", "soon"), med("ok", "08:00")];
        let next = next_dose_card(&meds, at(9, 0)).unwrap();
        assert_eq!(next.medicine.name, "ok");
        assert!(next.tomorrow);
    }
}
