use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{self, parse_datetime, Appointment, AppointmentDraft};
use crate::services::availability::SlotAvailability;
use crate::state::AppState;

const WIRE_DATETIME_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// The authenticating gateway forwards the patient's user id in this header.
fn owner_id(headers: &HeaderMap) -> Result<i64, AppError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .ok_or(AppError::Unauthorized)
}

#[derive(Serialize)]
pub struct AppointmentResponse {
    id: String,
    owner_id: i64,
    scheduled_at: String,
    treatment_type: String,
    notes: Option<String>,
    status: String,
    created_at: String,
}

impl From<Appointment> for AppointmentResponse {
    fn from(a: Appointment) -> Self {
        AppointmentResponse {
            id: a.id,
            owner_id: a.owner_id,
            scheduled_at: a.scheduled_at.format(WIRE_DATETIME_FMT).to_string(),
            treatment_type: a.treatment_type,
            notes: a.notes,
            status: a.status.as_str().to_string(),
            created_at: a.created_at.format(WIRE_DATETIME_FMT).to_string(),
        }
    }
}

pub fn to_responses(appointments: Vec<Appointment>) -> Vec<AppointmentResponse> {
    appointments.into_iter().map(AppointmentResponse::from).collect()
}

#[derive(Deserialize)]
pub struct AppointmentRequest {
    pub scheduled_at: String,
    pub treatment_type: String,
    pub notes: Option<String>,
}

impl AppointmentRequest {
    fn into_draft(self) -> Result<AppointmentDraft, AppError> {
        let scheduled_at = parse_datetime(&self.scheduled_at)
            .ok_or_else(|| AppError::BadRequest(format!("invalid date-time: {}", self.scheduled_at)))?;
        Ok(AppointmentDraft {
            scheduled_at,
            treatment_type: self.treatment_type,
            notes: self.notes,
        })
    }
}

// GET /api/appointments
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<AppointmentResponse>>, AppError> {
    let owner = owner_id(&headers)?;
    let appointments = state.appointments.list_for_owner(owner).await?;
    Ok(Json(to_responses(appointments)))
}

// GET /api/appointments/upcoming
pub async fn list_upcoming(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<AppointmentResponse>>, AppError> {
    let owner = owner_id(&headers)?;
    let appointments = state.appointments.list_upcoming(owner).await?;
    Ok(Json(to_responses(appointments)))
}

// GET /api/appointments/available?dateTime=...
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    #[serde(rename = "dateTime")]
    pub date_time: String,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    #[serde(rename = "isAvailable")]
    is_available: bool,
}

pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let candidate = parse_datetime(&query.date_time)
        .ok_or_else(|| AppError::BadRequest(format!("invalid date-time: {}", query.date_time)))?;
    let is_available = state.appointments.is_available(candidate, None).await?;
    Ok(Json(AvailabilityResponse { is_available }))
}

// GET /api/appointments/slots?date=YYYY-MM-DD
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: String,
}

#[derive(Serialize)]
pub struct SlotResponse {
    start: String,
    available: bool,
}

impl From<SlotAvailability> for SlotResponse {
    fn from(s: SlotAvailability) -> Self {
        SlotResponse {
            start: s.start.format(WIRE_DATETIME_FMT).to_string(),
            available: s.available,
        }
    }
}

pub async fn day_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Vec<SlotResponse>>, AppError> {
    let date = parse_date(&query.date)?;
    let slots = state
        .appointments
        .day_slots(date, &state.config.clinic_hours)
        .await?;
    Ok(Json(slots.into_iter().map(SlotResponse::from).collect()))
}

// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AppointmentResponse>, AppError> {
    let owner = owner_id(&headers)?;
    let appointment = state.appointments.get_for_owner(owner, &id).await?;
    Ok(Json(appointment.into()))
}

// POST /api/appointments
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<AppointmentRequest>,
) -> Result<(StatusCode, Json<AppointmentResponse>), AppError> {
    let owner = owner_id(&headers)?;
    let appointment = state
        .appointments
        .create(owner, body.into_draft()?)
        .await?;
    Ok((StatusCode::CREATED, Json(appointment.into())))
}

// PUT /api/appointments/:id
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AppointmentRequest>,
) -> Result<Json<AppointmentResponse>, AppError> {
    let owner = owner_id(&headers)?;
    let appointment = state
        .appointments
        .update(owner, &id, body.into_draft()?)
        .await?;
    Ok(Json(appointment.into()))
}

// DELETE /api/appointments/:id
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let owner = owner_id(&headers)?;
    if state.appointments.cancel(owner, &id).await? {
        Ok(Json(serde_json::json!({"ok": true})))
    } else {
        Err(crate::services::scheduling::BookingError::NotFound.into())
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    models::parse_date(s).ok_or_else(|| AppError::BadRequest(format!("invalid date: {s}")))
}
