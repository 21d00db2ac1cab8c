use std::fmt;

use chrono::{NaiveTime, Timelike};

use crate::error::{MedError, Result};

/// A time of day normalized to minutes since midnight, always in `[0, 1440)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduleTime(u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

impl ScheduleTime {
    /// Parse a schedule string in 24-hour or 12-hour form.
    ///
    /// Accepted formats:
    /// - 24-hour: "08:00", "8:00", "14:30", "23:59"
    /// - 12-hour: "8:00 AM", "02:30 PM", "12:15am" (meridiem is case-insensitive,
    ///   the space before it is optional)
    ///
    /// Minutes must always have two digits. "12 AM" is midnight, "12 PM" is noon.
    pub fn parse(schedule: &str) -> Result<Self> {
        let invalid = || MedError::InvalidScheduleFormat(schedule.to_string());
        let (clock, meridiem) = split_meridiem(schedule.trim());

        let (hour_str, minute_str) = clock.split_once(':').ok_or_else(invalid)?;
        if hour_str.is_empty() || hour_str.len() > 2 || minute_str.len() != 2 {
            return Err(invalid());
        }
        if !hour_str.bytes().chain(minute_str.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let hour: u16 = hour_str.parse().map_err(|_| invalid())?;
        let minute: u16 = minute_str.parse().map_err(|_| invalid())?;
        if minute >= 60 {
            return Err(invalid());
        }

        let hour = match meridiem {
            None if hour < 24 => hour,
            Some(Meridiem::Am) if hour == 12 => 0,
            Some(Meridiem::Pm) if hour == 12 => 12,
            Some(Meridiem::Am) if (1..12).contains(&hour) => hour,
            Some(Meridiem::Pm) if (1..12).contains(&hour) => hour + 12,
            _ => return Err(invalid()),
        };

        Ok(ScheduleTime(hour * 60 + minute))
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour >= 24 || minute >= 60 {
            return None;
        }
        Some(ScheduleTime((hour * 60 + minute) as u16))
    }

    /// The minute-of-day of any clock value; seconds are ignored.
    pub fn of<T: Timelike>(time: &T) -> Self {
        ScheduleTime((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u32 {
        u32::from(self.0 / 60)
    }

    pub fn minute(self) -> u32 {
        u32::from(self.0 % 60)
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Parse a schedule string into minutes since midnight.
pub fn parse_schedule_to_minutes(schedule: &str) -> Result<u16> {
    ScheduleTime::parse(schedule).map(ScheduleTime::minutes)
}

fn split_meridiem(input: &str) -> (&str, Option<Meridiem>) {
    let cut = input.len().saturating_sub(2);
    let (Some(head), Some(tail)) = (input.get(..cut), input.get(cut..)) else {
        return (input, None);
    };

    if tail.eq_ignore_ascii_case("am") {
        (head.trim_end(), Some(Meridiem::Am))
    } else if tail.eq_ignore_ascii_case("pm") {
        (head.trim_end(), Some(Meridiem::Pm))
    } else {
        (input, None)
    }
}
