use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::error::{MedError, Result};
use crate::model::UserId;

/// Supplies the currently authenticated user.
pub trait AuthProvider {
    fn current_user(&self) -> Result<UserId>;
}

/// Uses whatever user was configured on the command line or environment.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredUser(pub Option<String>);

impl AuthProvider for ConfiguredUser {
    fn current_user(&self) -> Result<UserId> {
        match self.0.as_deref().map(str::trim) {
            Some(user) if !user.is_empty() => Ok(UserId::new(user)),
            _ => Err(MedError::Auth(
                "no user configured (pass --user or set MEDTIME_USER)".to_string(),
            )),
        }
    }
}

pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Who is acting and when, resolved once per request and passed to every
/// operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: UserId,
    pub now: NaiveDateTime,
}

impl Session {
    pub fn establish(auth: &impl AuthProvider, clock: &impl Clock) -> Result<Self> {
        Ok(Session {
            user: auth.current_user()?,
            now: clock.now(),
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }
}
