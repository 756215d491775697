pub mod appointment;
pub mod user;

pub use appointment::{
    parse_date, parse_datetime, Appointment, AppointmentDraft, AppointmentStatus, StatusSummary,
    SLOT_MINUTES,
};
pub use user::{Contact, User};
