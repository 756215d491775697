use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::db::AppointmentStore;

/// Bookable grid for one day: `opens..closes` hours, one candidate every
/// `step_minutes`.
#[derive(Debug, Clone, Copy)]
pub struct ClinicHours {
    pub opens: u32,
    pub closes: u32,
    pub step_minutes: u32,
}

impl Default for ClinicHours {
    fn default() -> Self {
        Self {
            opens: 9,
            closes: 19,
            step_minutes: 30,
        }
    }
}

impl ClinicHours {
    pub fn candidates(&self, date: NaiveDate) -> Vec<NaiveDateTime> {
        if self.step_minutes == 0 || self.closes > 24 || self.opens >= self.closes {
            return vec![];
        }

        let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
            return vec![];
        };
        let step = Duration::minutes(self.step_minutes as i64);
        let (Some(mut at), Some(end)) = (
            midnight.checked_add_signed(Duration::hours(self.opens as i64)),
            midnight.checked_add_signed(Duration::hours(self.closes as i64)),
        ) else {
            return vec![];
        };

        let mut slots = vec![];
        while at < end {
            slots.push(at);
            match at.checked_add_signed(step) {
                Some(next) => at = next,
                None => break,
            }
        }
        slots
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlotAvailability {
    pub start: NaiveDateTime,
    pub available: bool,
}

#[derive(Clone)]
pub struct AvailabilityChecker {
    store: Arc<dyn AppointmentStore>,
}

impl AvailabilityChecker {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// A slot is free unless its start falls inside the one-hour window of a
    /// non-cancelled appointment other than `exclude_id`.
    pub async fn is_available(
        &self,
        candidate: NaiveDateTime,
        exclude_id: Option<&str>,
    ) -> anyhow::Result<bool> {
        let conflict = self.store.has_conflict(candidate, exclude_id).await?;
        Ok(!conflict)
    }

    pub async fn day_slots(
        &self,
        date: NaiveDate,
        hours: &ClinicHours,
    ) -> anyhow::Result<Vec<SlotAvailability>> {
        let mut slots = vec![];
        for start in hours.candidates(date) {
            let available = self.is_available(start, None).await?;
            slots.push(SlotAvailability { start, available });
        }
        Ok(slots)
    }
}
