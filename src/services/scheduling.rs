use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::db::{AppointmentStore, UpdateOutcome};
use crate::models::{
    appointment::{MAX_NOTES_LEN, MAX_TREATMENT_LEN},
    Appointment, AppointmentDraft, AppointmentStatus, StatusSummary,
};
use crate::services::availability::{AvailabilityChecker, ClinicHours, SlotAvailability};
use crate::services::clock::Clock;
use crate::services::notifications::{Notification, Notifier};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("appointments cannot be booked in the past")]
    InvalidTime,

    #[error("the selected time slot is not available")]
    SlotConflict,

    #[error("appointment not found")]
    NotFound,

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Store(#[from] anyhow::Error),
}

/// Owner- and admin-facing operations on the appointment calendar.
pub struct AppointmentLifecycle {
    store: Arc<dyn AppointmentStore>,
    availability: AvailabilityChecker,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
}

impl AppointmentLifecycle {
    pub fn new(store: Arc<dyn AppointmentStore>, clock: Arc<dyn Clock>, notifier: Notifier) -> Self {
        Self {
            availability: AvailabilityChecker::new(Arc::clone(&store)),
            store,
            clock,
            notifier,
        }
    }

    pub async fn create(
        &self,
        owner_id: i64,
        draft: AppointmentDraft,
    ) -> Result<Appointment, BookingError> {
        let now = self.clock.now();
        if draft.scheduled_at <= now {
            return Err(BookingError::InvalidTime);
        }
        let draft = validate_draft(draft)?;

        if !self.availability.is_available(draft.scheduled_at, None).await? {
            return Err(BookingError::SlotConflict);
        }

        let appointment = Appointment {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id,
            scheduled_at: draft.scheduled_at,
            treatment_type: draft.treatment_type,
            notes: draft.notes,
            status: AppointmentStatus::Pending,
            created_at: now,
        };

        // Another request may have taken the slot since the check above.
        if !self.store.insert_if_free(&appointment).await? {
            return Err(BookingError::SlotConflict);
        }

        tracing::info!(
            appointment_id = %appointment.id,
            owner_id,
            scheduled_at = %appointment.scheduled_at,
            "appointment created"
        );

        if let Some(contact) = self.contact_for(owner_id).await {
            self.notifier.send(Notification::Confirmation {
                contact,
                scheduled_at: appointment.scheduled_at,
                treatment_type: appointment.treatment_type.clone(),
            });
        }

        Ok(appointment)
    }

    pub async fn update(
        &self,
        owner_id: i64,
        appointment_id: &str,
        draft: AppointmentDraft,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self
            .store
            .find_for_owner(owner_id, appointment_id)
            .await?
            .ok_or(BookingError::NotFound)?;

        if appointment.status == AppointmentStatus::Cancelled {
            return Err(modify_cancelled());
        }
        let draft = validate_draft(draft)?;

        if !self
            .availability
            .is_available(draft.scheduled_at, Some(&appointment.id))
            .await?
        {
            return Err(BookingError::SlotConflict);
        }

        appointment.scheduled_at = draft.scheduled_at;
        appointment.treatment_type = draft.treatment_type;
        appointment.notes = draft.notes;

        match self.store.update_if_free(&appointment).await? {
            UpdateOutcome::Updated => {}
            UpdateOutcome::SlotTaken => return Err(BookingError::SlotConflict),
            UpdateOutcome::Cancelled => return Err(modify_cancelled()),
        }

        tracing::info!(
            appointment_id = %appointment.id,
            owner_id,
            scheduled_at = %appointment.scheduled_at,
            "appointment updated"
        );

        Ok(appointment)
    }

    /// Returns `false` when the owner has no such appointment.
    pub async fn cancel(&self, owner_id: i64, appointment_id: &str) -> Result<bool, BookingError> {
        let Some(mut appointment) = self.store.find_for_owner(owner_id, appointment_id).await?
        else {
            return Ok(false);
        };

        if appointment.status == AppointmentStatus::Cancelled {
            return Err(already_cancelled());
        }

        // A concurrent cancellation may have landed since the read.
        if !self
            .store
            .set_status(&appointment.id, AppointmentStatus::Cancelled)
            .await?
        {
            return Err(already_cancelled());
        }
        appointment.status = AppointmentStatus::Cancelled;

        tracing::info!(appointment_id = %appointment.id, owner_id, "appointment cancelled by owner");

        if let Some(contact) = self.contact_for(owner_id).await {
            self.notifier.send(Notification::Cancellation {
                contact,
                scheduled_at: appointment.scheduled_at,
            });
        }

        Ok(true)
    }

    /// Administrative status change. Any recognized status may be set except
    /// on a cancelled appointment.
    pub async fn set_status(
        &self,
        appointment_id: &str,
        new_status: &str,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self
            .store
            .find(appointment_id)
            .await?
            .ok_or(BookingError::NotFound)?;

        let status = AppointmentStatus::parse(new_status)
            .ok_or_else(|| BookingError::InvalidState(format!("invalid status: {new_status}")))?;

        if appointment.status == AppointmentStatus::Cancelled {
            return Err(already_cancelled());
        }

        if !self.store.set_status(&appointment.id, status).await? {
            return Err(already_cancelled());
        }
        let previous = appointment.status;
        appointment.status = status;

        tracing::info!(
            appointment_id = %appointment.id,
            from = %previous,
            to = %status,
            "appointment status changed"
        );

        if status == AppointmentStatus::Cancelled {
            if let Some(contact) = self.contact_for(appointment.owner_id).await {
                self.notifier.send(Notification::Cancellation {
                    contact,
                    scheduled_at: appointment.scheduled_at,
                });
            }
        }

        Ok(appointment)
    }

    pub async fn is_available(
        &self,
        candidate: NaiveDateTime,
        exclude_id: Option<&str>,
    ) -> Result<bool, BookingError> {
        Ok(self.availability.is_available(candidate, exclude_id).await?)
    }

    pub async fn day_slots(
        &self,
        date: NaiveDate,
        hours: &ClinicHours,
    ) -> Result<Vec<SlotAvailability>, BookingError> {
        Ok(self.availability.day_slots(date, hours).await?)
    }

    pub async fn get_for_owner(
        &self,
        owner_id: i64,
        appointment_id: &str,
    ) -> Result<Appointment, BookingError> {
        self.store
            .find_for_owner(owner_id, appointment_id)
            .await?
            .ok_or(BookingError::NotFound)
    }

    pub async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Appointment>, BookingError> {
        Ok(self.store.list_by_owner(owner_id).await?)
    }

    pub async fn list_upcoming(&self, owner_id: i64) -> Result<Vec<Appointment>, BookingError> {
        Ok(self.store.list_upcoming(owner_id, self.clock.now()).await?)
    }

    pub async fn list_for_day(&self, date: NaiveDate) -> Result<Vec<Appointment>, BookingError> {
        Ok(self.store.list_by_date(date).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<Appointment>, BookingError> {
        Ok(self.store.list_all().await?)
    }

    pub async fn status_summary(&self) -> Result<StatusSummary, BookingError> {
        Ok(self.store.status_summary().await?)
    }

    async fn contact_for(&self, owner_id: i64) -> Option<crate::models::Contact> {
        match self.store.find_contact(owner_id).await {
            Ok(Some(contact)) => Some(contact),
            Ok(None) => {
                tracing::warn!(owner_id, "no contact on file, skipping notification");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, owner_id, "failed to load contact for notification");
                None
            }
        }
    }
}

fn already_cancelled() -> BookingError {
    BookingError::InvalidState("the appointment is already cancelled".to_string())
}

fn modify_cancelled() -> BookingError {
    BookingError::InvalidState("a cancelled appointment cannot be modified".to_string())
}

fn validate_draft(draft: AppointmentDraft) -> Result<AppointmentDraft, BookingError> {
    let treatment_type = draft.treatment_type.trim().to_string();
    if treatment_type.is_empty() {
        return Err(BookingError::Validation(
            "treatment type is required".to_string(),
        ));
    }
    if treatment_type.chars().count() > MAX_TREATMENT_LEN {
        return Err(BookingError::Validation(format!(
            "treatment type must be at most {MAX_TREATMENT_LEN} characters"
        )));
    }

    let notes = draft
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if notes
        .as_deref()
        .is_some_and(|n| n.chars().count() > MAX_NOTES_LEN)
    {
        return Err(BookingError::Validation(format!(
            "notes must be at most {MAX_NOTES_LEN} characters"
        )));
    }

    Ok(AppointmentDraft {
        scheduled_at: draft.scheduled_at,
        treatment_type,
        notes,
    })
}
