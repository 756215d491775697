use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

/// Every appointment occupies one fixed slot of this many minutes.
pub const SLOT_MINUTES: i64 = 60;

pub const MAX_TREATMENT_LEN: usize = 100;
pub const MAX_NOTES_LEN: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub owner_id: i64,
    pub scheduled_at: NaiveDateTime,
    pub treatment_type: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: NaiveDateTime,
}

impl Appointment {
    pub fn slot_end(&self) -> NaiveDateTime {
        self.scheduled_at + chrono::Duration::minutes(SLOT_MINUTES)
    }
}

/// Fields supplied by the owner when booking or rescheduling.
#[derive(Debug, Clone)]
pub struct AppointmentDraft {
    pub scheduled_at: NaiveDateTime,
    pub treatment_type: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "En Proceso")]
    InProgress,
    #[serde(rename = "Completada")]
    Completed,
    #[serde(rename = "Cancelada")]
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pendiente",
            AppointmentStatus::InProgress => "En Proceso",
            AppointmentStatus::Completed => "Completada",
            AppointmentStatus::Cancelled => "Cancelada",
        }
    }

    /// Accepts the stored labels and the English identifiers.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        match s {
            "Pendiente" => return Some(AppointmentStatus::Pending),
            "En Proceso" => return Some(AppointmentStatus::InProgress),
            "Completada" => return Some(AppointmentStatus::Completed),
            "Cancelada" => return Some(AppointmentStatus::Cancelled),
            _ => {}
        }
        match s.to_lowercase().as_str() {
            "pending" => Some(AppointmentStatus::Pending),
            "in_progress" | "inprogress" => Some(AppointmentStatus::InProgress),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" | "canceled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StatusSummary {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
}

impl StatusSummary {
    pub fn add(&mut self, status: AppointmentStatus, count: i64) {
        match status {
            AppointmentStatus::Pending => self.pending += count,
            AppointmentStatus::InProgress => self.in_progress += count,
            AppointmentStatus::Completed => self.completed += count,
            AppointmentStatus::Cancelled => self.cancelled += count,
        }
    }
}

/// Stored timestamps only sort correctly as text for four-digit years.
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

fn in_calendar(date: NaiveDate) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&date.year())
}

/// Parses a client-supplied date-time. Offsets are converted to UTC; naive
/// values are taken as already in clinic time. Sub-second precision is
/// dropped to match what storage keeps.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    let parsed = DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_utc())
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        })?;
    in_calendar(parsed.date()).then(|| parsed.trunc_subsecs(0))
}

/// Parses a `YYYY-MM-DD` calendar day.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .filter(|d| in_calendar(*d))
}
