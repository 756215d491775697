use anyhow::Context;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Appointment, AppointmentStatus, StatusSummary, User, SLOT_MINUTES};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

const APPOINTMENT_COLUMNS: &str =
    "id, owner_id, scheduled_at, treatment_type, notes, status, created_at";

fn fmt_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FMT).to_string()
}

// ── Users ──

pub fn create_user(
    conn: &Connection,
    email: &str,
    first_name: &str,
    last_name: &str,
    phone: Option<&str>,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO users (email, first_name, last_name, phone) VALUES (?1, ?2, ?3, ?4)",
        params![email, first_name, last_name, phone],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, id: i64) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, email, first_name, last_name, phone FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    first_name: row.get(2)?,
                    last_name: row.get(3)?,
                    phone: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

// ── Appointments ──

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO appointments (id, owner_id, scheduled_at, treatment_type, notes, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            appt.id,
            appt.owner_id,
            fmt_datetime(&appt.scheduled_at),
            appt.treatment_type,
            appt.notes,
            appt.status.as_str(),
            fmt_datetime(&appt.created_at),
        ],
    )?;
    Ok(())
}

/// Writes the owner-editable fields of a live appointment. Returns `false`
/// when the record is missing or already cancelled.
pub fn update_appointment(conn: &Connection, appt: &Appointment) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET scheduled_at = ?1, treatment_type = ?2, notes = ?3
         WHERE id = ?4 AND status != ?5",
        params![
            fmt_datetime(&appt.scheduled_at),
            appt.treatment_type,
            appt.notes,
            appt.id,
            AppointmentStatus::Cancelled.as_str(),
        ],
    )?;
    Ok(count > 0)
}

/// Returns `false` when the record is missing or already cancelled.
pub fn set_appointment_status(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?1 WHERE id = ?2 AND status != ?3",
        params![status.as_str(), id, AppointmentStatus::Cancelled.as_str()],
    )?;
    Ok(count > 0)
}

pub fn get_appointment(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
        params![id],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(appt) => Ok(Some(appt?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_appointment_for_owner(
    conn: &Connection,
    owner_id: i64,
    id: &str,
) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1 AND owner_id = ?2"),
        params![id, owner_id],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(appt) => Ok(Some(appt?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_appointments_for_owner(
    conn: &Connection,
    owner_id: i64,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE owner_id = ?1 ORDER BY scheduled_at ASC"
    ))?;

    let rows = stmt.query_map(params![owner_id], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn get_upcoming_for_owner(
    conn: &Connection,
    owner_id: i64,
    since: &NaiveDateTime,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE owner_id = ?1 AND scheduled_at >= ?2 AND status != ?3
         ORDER BY scheduled_at ASC"
    ))?;

    let rows = stmt.query_map(
        params![
            owner_id,
            fmt_datetime(since),
            AppointmentStatus::Cancelled.as_str()
        ],
        |row| Ok(parse_appointment_row(row)),
    )?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn get_appointments_on_date(
    conn: &Connection,
    date: &NaiveDate,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE date(scheduled_at) = ?1 ORDER BY scheduled_at ASC"
    ))?;

    let day = date.format("%Y-%m-%d").to_string();
    let rows = stmt.query_map(params![day], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn get_all_appointments(conn: &Connection) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY scheduled_at ASC"
    ))?;

    let rows = stmt.query_map([], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// True when `candidate` starts inside the slot of a live appointment other
/// than `exclude_id`: `existing <= candidate < existing + slot`.
pub fn has_conflict(
    conn: &Connection,
    candidate: &NaiveDateTime,
    exclude_id: Option<&str>,
) -> anyhow::Result<bool> {
    let window_start = candidate
        .checked_sub_signed(Duration::minutes(SLOT_MINUTES))
        .with_context(|| format!("date-time out of range: {candidate}"))?;
    let conflict: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM appointments
            WHERE status != ?1
              AND (?2 IS NULL OR id != ?2)
              AND scheduled_at <= ?3
              AND scheduled_at > ?4
         )",
        params![
            AppointmentStatus::Cancelled.as_str(),
            exclude_id,
            fmt_datetime(candidate),
            fmt_datetime(&window_start),
        ],
        |row| row.get(0),
    )?;
    Ok(conflict)
}

pub fn get_status_summary(conn: &Connection) -> anyhow::Result<StatusSummary> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM appointments GROUP BY status")?;
    let rows = stmt.query_map([], |row| {
        let status: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((status, count))
    })?;

    let mut summary = StatusSummary::default();
    for row in rows {
        let (status, count) = row?;
        match AppointmentStatus::parse(&status) {
            Some(status) => summary.add(status, count),
            None => tracing::warn!(status = %status, "unrecognized status in appointments table"),
        }
    }
    Ok(summary)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let id: String = row.get(0)?;
    let owner_id: i64 = row.get(1)?;
    let scheduled_at_str: String = row.get(2)?;
    let treatment_type: String = row.get(3)?;
    let notes: Option<String> = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(6)?;

    let scheduled_at = NaiveDateTime::parse_from_str(&scheduled_at_str, DATETIME_FMT)
        .with_context(|| format!("bad scheduled_at on appointment {id}: {scheduled_at_str}"))?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, DATETIME_FMT)
        .with_context(|| format!("bad created_at on appointment {id}: {created_at_str}"))?;
    let status = AppointmentStatus::parse(&status_str)
        .with_context(|| format!("bad status on appointment {id}: {status_str}"))?;

    Ok(Appointment {
        id,
        owner_id,
        scheduled_at,
        treatment_type,
        notes,
        status,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn appointment(id: &str, owner_id: i64, at: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: id.to_string(),
            owner_id,
            scheduled_at: dt(at),
            treatment_type: "Limpieza".to_string(),
            notes: None,
            status,
            created_at: dt("2025-01-01 08:00"),
        }
    }

    fn setup() -> (Connection, i64) {
        let conn = db::init_db(":memory:").unwrap();
        let owner = create_user(&conn, "ana@example.com", "Ana", "Lopez", None).unwrap();
        (conn, owner)
    }

    #[test]
    fn test_insert_and_get() {
        let (conn, owner) = setup();
        let appt = appointment("a1", owner, "2025-01-10 10:00", AppointmentStatus::Pending);
        insert_appointment(&conn, &appt).unwrap();

        assert_eq!(get_appointment(&conn, "a1").unwrap(), Some(appt.clone()));
        assert_eq!(
            get_appointment_for_owner(&conn, owner, "a1").unwrap(),
            Some(appt)
        );
        assert_eq!(get_appointment_for_owner(&conn, owner + 1, "a1").unwrap(), None);
        assert_eq!(get_appointment(&conn, "missing").unwrap(), None);
    }

    #[test]
    fn test_conflict_window_is_half_open() {
        let (conn, owner) = setup();
        insert_appointment(
            &conn,
            &appointment("a1", owner, "2025-01-10 10:00", AppointmentStatus::Pending),
        )
        .unwrap();

        assert!(has_conflict(&conn, &dt("2025-01-10 10:00"), None).unwrap());
        assert!(has_conflict(&conn, &dt("2025-01-10 10:59"), None).unwrap());
        assert!(!has_conflict(&conn, &dt("2025-01-10 11:00"), None).unwrap());
        // Only the candidate start is tested against existing windows.
        assert!(!has_conflict(&conn, &dt("2025-01-10 09:30"), None).unwrap());
        assert!(!has_conflict(&conn, &dt("2025-01-10 10:30"), Some("a1")).unwrap());
    }

    #[test]
    fn test_cancelled_appointments_never_conflict() {
        let (conn, owner) = setup();
        insert_appointment(
            &conn,
            &appointment("a1", owner, "2025-01-10 10:00", AppointmentStatus::Cancelled),
        )
        .unwrap();
        assert!(!has_conflict(&conn, &dt("2025-01-10 10:00"), None).unwrap());
    }

    #[test]
    fn test_listing_order_and_day_filter() {
        let (conn, owner) = setup();
        for (id, at) in [
            ("late", "2025-01-10 16:00"),
            ("early", "2025-01-10 09:00"),
            ("next-day", "2025-01-11 09:00"),
        ] {
            insert_appointment(&conn, &appointment(id, owner, at, AppointmentStatus::Pending))
                .unwrap();
        }

        let ids = |v: Vec<Appointment>| v.into_iter().map(|a| a.id).collect::<Vec<_>>();

        assert_eq!(
            ids(get_all_appointments(&conn).unwrap()),
            vec!["early", "late", "next-day"]
        );
        assert_eq!(
            ids(get_appointments_on_date(&conn, &dt("2025-01-10 00:00").date()).unwrap()),
            vec!["early", "late"]
        );
        assert_eq!(
            ids(get_appointments_for_owner(&conn, owner).unwrap()),
            vec!["early", "late", "next-day"]
        );
    }

    #[test]
    fn test_status_summary() {
        let (conn, owner) = setup();
        insert_appointment(&conn, &appointment("a", owner, "2025-01-10 09:00", AppointmentStatus::Pending)).unwrap();
        insert_appointment(&conn, &appointment("b", owner, "2025-01-10 10:00", AppointmentStatus::Pending)).unwrap();
        insert_appointment(&conn, &appointment("c", owner, "2025-01-10 11:00", AppointmentStatus::Cancelled)).unwrap();

        let summary = get_status_summary(&conn).unwrap();
        assert_eq!(
            summary,
            StatusSummary {
                pending: 2,
                in_progress: 0,
                completed: 0,
                cancelled: 1,
            }
        );
    }

    #[test]
    fn test_cancelled_row_rejects_writes() {
        let (conn, owner) = setup();
        let mut appt = appointment("a1", owner, "2025-01-10 10:00", AppointmentStatus::Pending);
        insert_appointment(&conn, &appt).unwrap();

        assert!(set_appointment_status(&conn, "a1", AppointmentStatus::Cancelled).unwrap());
        assert!(!set_appointment_status(&conn, "a1", AppointmentStatus::Completed).unwrap());

        appt.scheduled_at = dt("2025-01-10 15:00");
        assert!(!update_appointment(&conn, &appt).unwrap());

        let stored = get_appointment(&conn, "a1").unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Cancelled);
        assert_eq!(stored.scheduled_at, dt("2025-01-10 10:00"));
        assert!(!set_appointment_status(&conn, "missing", AppointmentStatus::Pending).unwrap());
    }

    #[test]
    fn test_conflict_scan_rejects_unrepresentable_window() {
        let (conn, owner) = setup();
        insert_appointment(
            &conn,
            &appointment("a1", owner, "2025-01-10 10:00", AppointmentStatus::Pending),
        )
        .unwrap();

        assert!(has_conflict(&conn, &NaiveDateTime::MIN, None).is_err());
        assert!(has_conflict(&conn, &dt("2025-01-10 10:30"), None).unwrap());
    }
}
