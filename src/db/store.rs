use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::models::{Appointment, AppointmentStatus, Contact, StatusSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    SlotTaken,
    /// The record was cancelled (or removed) after the caller read it.
    Cancelled,
}

/// Persistence seam for the appointment calendar.
///
/// `insert_if_free` and `update_if_free` must perform the conflict scan and
/// the write atomically and refuse to write when the appointment's start falls
/// inside another live slot. Writes to an existing record never touch a
/// cancelled one.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn find(&self, id: &str) -> anyhow::Result<Option<Appointment>>;

    async fn find_for_owner(&self, owner_id: i64, id: &str)
        -> anyhow::Result<Option<Appointment>>;

    async fn list_by_owner(&self, owner_id: i64) -> anyhow::Result<Vec<Appointment>>;

    async fn list_upcoming(
        &self,
        owner_id: i64,
        since: NaiveDateTime,
    ) -> anyhow::Result<Vec<Appointment>>;

    async fn list_by_date(&self, date: NaiveDate) -> anyhow::Result<Vec<Appointment>>;

    async fn list_all(&self) -> anyhow::Result<Vec<Appointment>>;

    async fn has_conflict(
        &self,
        candidate: NaiveDateTime,
        exclude_id: Option<&str>,
    ) -> anyhow::Result<bool>;

    async fn insert_if_free(&self, appt: &Appointment) -> anyhow::Result<bool>;

    /// Writes schedule, treatment and notes; the stored status is left as is.
    async fn update_if_free(&self, appt: &Appointment) -> anyhow::Result<UpdateOutcome>;

    /// Returns `false` when the record is missing or already cancelled.
    async fn set_status(&self, id: &str, status: AppointmentStatus) -> anyhow::Result<bool>;

    async fn find_contact(&self, owner_id: i64) -> anyhow::Result<Option<Contact>>;

    async fn status_summary(&self) -> anyhow::Result<StatusSummary>;
}

#[derive(Clone)]
pub struct SqliteAppointmentStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteAppointmentStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }
}

#[async_trait]
impl AppointmentStore for SqliteAppointmentStore {
    async fn find(&self, id: &str) -> anyhow::Result<Option<Appointment>> {
        let db = self.conn()?;
        queries::get_appointment(&db, id)
    }

    async fn find_for_owner(
        &self,
        owner_id: i64,
        id: &str,
    ) -> anyhow::Result<Option<Appointment>> {
        let db = self.conn()?;
        queries::get_appointment_for_owner(&db, owner_id, id)
    }

    async fn list_by_owner(&self, owner_id: i64) -> anyhow::Result<Vec<Appointment>> {
        let db = self.conn()?;
        queries::get_appointments_for_owner(&db, owner_id)
    }

    async fn list_upcoming(
        &self,
        owner_id: i64,
        since: NaiveDateTime,
    ) -> anyhow::Result<Vec<Appointment>> {
        let db = self.conn()?;
        queries::get_upcoming_for_owner(&db, owner_id, &since)
    }

    async fn list_by_date(&self, date: NaiveDate) -> anyhow::Result<Vec<Appointment>> {
        let db = self.conn()?;
        queries::get_appointments_on_date(&db, &date)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<Appointment>> {
        let db = self.conn()?;
        queries::get_all_appointments(&db)
    }

    async fn has_conflict(
        &self,
        candidate: NaiveDateTime,
        exclude_id: Option<&str>,
    ) -> anyhow::Result<bool> {
        let db = self.conn()?;
        queries::has_conflict(&db, &candidate, exclude_id)
    }

    async fn insert_if_free(&self, appt: &Appointment) -> anyhow::Result<bool> {
        let mut db = self.conn()?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if queries::has_conflict(&tx, &appt.scheduled_at, None)? {
            return Ok(false);
        }
        queries::insert_appointment(&tx, appt)?;

        tx.commit()?;
        Ok(true)
    }

    async fn update_if_free(&self, appt: &Appointment) -> anyhow::Result<UpdateOutcome> {
        let mut db = self.conn()?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if queries::has_conflict(&tx, &appt.scheduled_at, Some(&appt.id))? {
            return Ok(UpdateOutcome::SlotTaken);
        }
        if !queries::update_appointment(&tx, appt)? {
            return Ok(UpdateOutcome::Cancelled);
        }

        tx.commit()?;
        Ok(UpdateOutcome::Updated)
    }

    async fn set_status(&self, id: &str, status: AppointmentStatus) -> anyhow::Result<bool> {
        let db = self.conn()?;
        queries::set_appointment_status(&db, id, status)
    }

    async fn find_contact(&self, owner_id: i64) -> anyhow::Result<Option<Contact>> {
        let db = self.conn()?;
        let user = queries::get_user(&db, owner_id)?;
        Ok(user.as_ref().map(Contact::from))
    }

    async fn status_summary(&self) -> anyhow::Result<StatusSummary> {
        let db = self.conn()?;
        queries::get_status_summary(&db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn setup() -> (SqliteAppointmentStore, i64) {
        let conn = db::init_db(":memory:").unwrap();
        let owner = queries::create_user(&conn, "eva@example.com", "Eva", "Diaz", None).unwrap();
        (SqliteAppointmentStore::new(Arc::new(Mutex::new(conn))), owner)
    }

    fn appointment(id: &str, owner_id: i64, at: &str) -> Appointment {
        Appointment {
            id: id.to_string(),
            owner_id,
            scheduled_at: dt(at),
            treatment_type: "Revisión".to_string(),
            notes: None,
            status: AppointmentStatus::Pending,
            created_at: dt("2025-01-01 08:00"),
        }
    }

    #[tokio::test]
    async fn test_insert_if_free_refuses_taken_slot() {
        let (store, owner) = setup();
        assert!(store
            .insert_if_free(&appointment("a", owner, "2025-01-10 10:00"))
            .await
            .unwrap());
        assert!(!store
            .insert_if_free(&appointment("b", owner, "2025-01-10 10:20"))
            .await
            .unwrap());

        assert_eq!(store.find("b").await.unwrap(), None);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_for_one_slot() {
        let (store, owner) = setup();
        let mut handles = vec![];
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert_if_free(&appointment(&format!("c{i}"), owner, "2025-01-10 10:00"))
                    .await
                    .unwrap()
            }));
        }

        let mut written = 0;
        for handle in handles {
            if handle.await.unwrap() {
                written += 1;
            }
        }
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_update_if_free_ignores_own_slot() {
        let (store, owner) = setup();
        let mut a = appointment("a", owner, "2025-01-10 10:00");
        store.insert_if_free(&a).await.unwrap();
        store
            .insert_if_free(&appointment("b", owner, "2025-01-10 12:00"))
            .await
            .unwrap();

        a.scheduled_at = dt("2025-01-10 10:30");
        assert_eq!(store.update_if_free(&a).await.unwrap(), UpdateOutcome::Updated);

        a.scheduled_at = dt("2025-01-10 12:30");
        assert_eq!(store.update_if_free(&a).await.unwrap(), UpdateOutcome::SlotTaken);
        assert_eq!(
            store.find("a").await.unwrap().unwrap().scheduled_at,
            dt("2025-01-10 10:30")
        );
    }

    #[tokio::test]
    async fn test_contact_lookup() {
        let (store, owner) = setup();
        let contact = store.find_contact(owner).await.unwrap().unwrap();
        assert_eq!(contact.email, "eva@example.com");
        assert_eq!(contact.name, "Eva");
        assert_eq!(store.find_contact(owner + 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stale_update_cannot_revive_cancelled() {
        let (store, owner) = setup();
        store
            .insert_if_free(&appointment("a", owner, "2025-01-10 10:00"))
            .await
            .unwrap();

        let mut stale = store.find_for_owner(owner, "a").await.unwrap().unwrap();
        assert!(store.set_status("a", AppointmentStatus::Cancelled).await.unwrap());

        stale.scheduled_at = dt("2025-01-10 15:00");
        assert_eq!(
            store.update_if_free(&stale).await.unwrap(),
            UpdateOutcome::Cancelled
        );

        let stored = store.find("a").await.unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Cancelled);
        assert_eq!(stored.scheduled_at, dt("2025-01-10 10:00"));
    }

    #[tokio::test]
    async fn test_status_write_refused_once_cancelled() {
        let (store, owner) = setup();
        store
            .insert_if_free(&appointment("a", owner, "2025-01-10 10:00"))
            .await
            .unwrap();

        assert!(store.set_status("a", AppointmentStatus::Cancelled).await.unwrap());
        assert!(!store.set_status("a", AppointmentStatus::Completed).await.unwrap());
        assert!(!store.set_status("a", AppointmentStatus::Cancelled).await.unwrap());
        assert_eq!(
            store.find("a").await.unwrap().unwrap().status,
            AppointmentStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_out_of_range_candidate_leaves_store_usable() {
        let (store, owner) = setup();
        store
            .insert_if_free(&appointment("a", owner, "2025-01-10 10:00"))
            .await
            .unwrap();

        assert!(store.has_conflict(NaiveDateTime::MIN, None).await.is_err());
        assert!(store
            .has_conflict(dt("2025-01-10 10:30"), None)
            .await
            .unwrap());
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}
