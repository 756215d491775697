use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::appointments::{parse_date, to_responses, AppointmentResponse};
use crate::errors::AppError;
use crate::models::StatusSummary;
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/appointments
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<AppointmentResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let appointments = state.appointments.list_all().await?;
    Ok(Json(to_responses(appointments)))
}

// GET /api/admin/appointments/daily/:date
pub async fn list_daily(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(date): Path<String>,
) -> Result<Json<Vec<AppointmentResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let date = parse_date(&date)?;
    let appointments = state.appointments.list_for_day(date).await?;
    Ok(Json(to_responses(appointments)))
}

// PATCH /api/admin/appointments/:id/status
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<AppointmentResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let appointment = state.appointments.set_status(&id, &body.status).await?;
    Ok(Json(appointment.into()))
}

// GET /api/admin/summary
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusSummary>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let summary = state.appointments.status_summary().await?;
    Ok(Json(summary))
}
