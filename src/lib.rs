//! Medication reminder scheduling and adherence tracking.
//!
//! Schedules are parsed once into [`time::ScheduleTime`]; the next dose is
//! picked by [`next_dose`]; reminders are kept one-per-medicine by
//! [`reminder::ReminderScheduler`]; adherence is computed by [`adherence`].
//! [`service::Tracker`] ties them to a [`database::RecordStore`].

pub mod adherence;
pub mod config;
pub mod daemon;
pub mod database;
pub mod desktop;
pub mod error;
pub mod logging;
pub mod model;
pub mod next_dose;
pub mod reminder;
pub mod service;
pub mod session;
pub mod time;

#[cfg(test)]
mod testing;

pub use error::{MedError, Result};
