mod availability;
mod booking;
mod error;
mod slots;
mod store;

pub use booking::BookingRequest;
pub use error::BookingError;
pub use slots::{expand_window, slot_at, SlotMismatch};
pub use store::{BookingStore, SharedConsultantState};

use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::config::ScheduleConfig;
use crate::limits::{MAX_CONSULTANTS, MAX_NAME_LEN};
use crate::model::{AvailabilityWindow, Booking, ConsultantState};
use crate::notify::NotifyHub;

/// The booking core. Owns the injected store and the notify hub; every
/// operation is request-scoped — no background state of its own.
pub struct Engine {
    store: BookingStore,
    pub notify: Arc<NotifyHub>,
    schedule: ScheduleConfig,
}

impl Engine {
    pub fn new(store: BookingStore, notify: Arc<NotifyHub>, schedule: ScheduleConfig) -> Self {
        Self {
            store,
            notify,
            schedule: schedule.sanitized(),
        }
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    pub fn store(&self) -> &BookingStore {
        &self.store
    }

    pub fn get_booking(&self, id: &Ulid) -> Option<Booking> {
        self.store.get_booking(id)
    }

    // ── Administration entry points ──────────────────────────
    //
    // Profile and window administration are external collaborators; these
    // are the operations they call. The request path only reads this state.

    pub async fn upsert_consultant(
        &self,
        id: Ulid,
        name: String,
        active: bool,
    ) -> Result<(), BookingError> {
        if name.trim().is_empty() {
            return Err(BookingError::EmptyField("name"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(BookingError::FieldTooLong("name"));
        }

        if let Some(existing) = self.store.get_consultant(&id) {
            let mut guard = existing.write().await;
            guard.name = name;
            guard.active = active;
            return Ok(());
        }
        if self.store.consultant_count() >= MAX_CONSULTANTS {
            return Err(BookingError::LimitExceeded("too many consultants"));
        }
        self.store
            .insert_consultant(id, Arc::new(RwLock::new(ConsultantState::new(id, name, active))));
        Ok(())
    }

    /// Replace (or clear, with `None`) the availability window for one
    /// weekday. The per-weekday storage slot is what guarantees at most one
    /// window per (consultant, weekday).
    pub async fn set_window(
        &self,
        consultant_id: Ulid,
        weekday: usize,
        window: Option<AvailabilityWindow>,
    ) -> Result<(), BookingError> {
        if weekday > 6 {
            return Err(BookingError::InvalidWeekday(weekday));
        }
        let cs = self
            .store
            .get_consultant(&consultant_id)
            .ok_or(BookingError::UnknownConsultant(consultant_id))?;
        let mut guard = cs.write().await;
        guard.windows[weekday] = window;
        Ok(())
    }
}
