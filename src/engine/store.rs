use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::{Booking, BookingStatus, ConsultantState, SlotKey};

pub type SharedConsultantState = Arc<RwLock<ConsultantState>>;

/// Shared booking/availability store. Injected into the engine at
/// construction; nothing reaches it through ambient lookup.
pub struct BookingStore {
    consultants: DashMap<Ulid, SharedConsultantState>,
    bookings: DashMap<Ulid, Booking>,
    /// Partial unique index over non-cancelled bookings, keyed by
    /// (consultant, date, time). Claiming a key is a single atomic map
    /// operation; this is what makes concurrent booking creation admit
    /// exactly one winner per slot. Cancelled bookings are not members.
    active_slots: DashMap<SlotKey, Ulid>,
    /// Cached active-booking counts per (consultant, date). Invalidated on
    /// every write, recomputed lazily.
    day_counts: DashMap<(Ulid, NaiveDate), u64>,
}

impl Default for BookingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingStore {
    pub fn new() -> Self {
        Self {
            consultants: DashMap::new(),
            bookings: DashMap::new(),
            active_slots: DashMap::new(),
            day_counts: DashMap::new(),
        }
    }

    // ── Consultants ──────────────────────────────────────────

    pub fn consultant_count(&self) -> usize {
        self.consultants.len()
    }

    pub fn contains_consultant(&self, id: &Ulid) -> bool {
        self.consultants.contains_key(id)
    }

    pub fn get_consultant(&self, id: &Ulid) -> Option<SharedConsultantState> {
        self.consultants.get(id).map(|e| e.value().clone())
    }

    pub fn insert_consultant(&self, id: Ulid, state: SharedConsultantState) {
        self.consultants.insert(id, state);
    }

    // ── Bookings ─────────────────────────────────────────────

    pub fn get_booking(&self, id: &Ulid) -> Option<Booking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    /// Insert a booking by claiming its slot in the active-slot index.
    ///
    /// The claim is one atomic entry operation: of N concurrent callers for
    /// the same key, exactly one gets the vacant entry. The booking row is
    /// stored before the index entry becomes visible, so an observed claim
    /// always resolves to a stored booking. Returns the holder on conflict.
    pub fn try_claim_slot(&self, booking: Booking) -> Result<(), Ulid> {
        let key = SlotKey {
            consultant_id: booking.consultant_id,
            date: booking.date,
            time: booking.time,
        };
        match self.active_slots.entry(key) {
            Entry::Occupied(e) => Err(*e.get()),
            Entry::Vacant(v) => {
                let id = booking.id;
                let count_key = (booking.consultant_id, booking.date);
                self.bookings.insert(id, booking);
                v.insert(id);
                self.day_counts.remove(&count_key);
                Ok(())
            }
        }
    }

    /// Drop an index claim, but only if it is still held by `id` — a slot
    /// re-booked after cancellation must not lose its new holder's claim.
    pub fn release_slot(&self, key: &SlotKey, id: Ulid) {
        self.active_slots.remove_if(key, |_, holder| *holder == id);
    }

    pub fn is_blocked(&self, key: &SlotKey) -> bool {
        self.active_slots.contains_key(key)
    }

    /// Update a booking's status, returning the updated row. Transition
    /// legality is the engine's concern; index maintenance is the caller's.
    pub fn update_status(&self, id: &Ulid, status: BookingStatus) -> Option<Booking> {
        let mut entry = self.bookings.get_mut(id)?;
        entry.status = status;
        Some(entry.value().clone())
    }

    // ── Aggregate counts ─────────────────────────────────────

    /// Active (blocking) bookings for a consultant on a date, from the cache
    /// when warm, recomputed by a scan otherwise.
    pub fn active_count(&self, consultant_id: Ulid, date: NaiveDate) -> u64 {
        if let Some(cached) = self.day_counts.get(&(consultant_id, date)) {
            return *cached;
        }
        let count = self
            .bookings
            .iter()
            .filter(|b| {
                b.consultant_id == consultant_id && b.date == date && b.status.is_blocking()
            })
            .count() as u64;
        self.day_counts.insert((consultant_id, date), count);
        count
    }

    pub fn invalidate_count(&self, consultant_id: Ulid, date: NaiveDate) {
        self.day_counts.remove(&(consultant_id, date));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::now_ms;

    fn booking(consultant_id: Ulid, date: NaiveDate, time: i64) -> Booking {
        Booking {
            id: Ulid::new(),
            consultant_id,
            customer_name: "Ada".into(),
            customer_email: "ada@example.com".into(),
            date,
            time,
            status: BookingStatus::Pending,
            created_at: now_ms(),
        }
    }

    fn key(b: &Booking) -> SlotKey {
        SlotKey {
            consultant_id: b.consultant_id,
            date: b.date,
            time: b.time,
        }
    }

    #[test]
    fn claim_then_conflict() {
        let store = BookingStore::new();
        let cid = Ulid::new();
        let date = NaiveDate::from_ymd_opt(2027, 1, 4).unwrap();

        let first = booking(cid, date, 9 * 3600);
        let first_id = first.id;
        store.try_claim_slot(first).unwrap();

        let second = booking(cid, date, 9 * 3600);
        assert_eq!(store.try_claim_slot(second), Err(first_id));

        // a different time on the same day is free
        store.try_claim_slot(booking(cid, date, 10 * 3600)).unwrap();
    }

    #[test]
    fn release_frees_the_slot() {
        let store = BookingStore::new();
        let cid = Ulid::new();
        let date = NaiveDate::from_ymd_opt(2027, 1, 4).unwrap();

        let b = booking(cid, date, 9 * 3600);
        let k = key(&b);
        let id = b.id;
        store.try_claim_slot(b).unwrap();
        assert!(store.is_blocked(&k));

        store.release_slot(&k, id);
        assert!(!store.is_blocked(&k));

        store.try_claim_slot(booking(cid, date, 9 * 3600)).unwrap();
    }

    #[test]
    fn release_ignores_stale_holder() {
        let store = BookingStore::new();
        let cid = Ulid::new();
        let date = NaiveDate::from_ymd_opt(2027, 1, 4).unwrap();

        let b = booking(cid, date, 9 * 3600);
        let k = key(&b);
        store.try_claim_slot(b).unwrap();

        // a stale id must not evict the current holder
        store.release_slot(&k, Ulid::new());
        assert!(store.is_blocked(&k));
    }

    #[test]
    fn day_count_tracks_claims() {
        let store = BookingStore::new();
        let cid = Ulid::new();
        let date = NaiveDate::from_ymd_opt(2027, 1, 4).unwrap();

        assert_eq!(store.active_count(cid, date), 0);

        let b = booking(cid, date, 9 * 3600);
        let (k, id) = (key(&b), b.id);
        store.try_claim_slot(b).unwrap();
        assert_eq!(store.active_count(cid, date), 1);

        // cancellation stops the row from blocking and invalidates the cache
        store.update_status(&id, BookingStatus::Cancelled);
        store.release_slot(&k, id);
        store.invalidate_count(cid, date);
        assert_eq!(store.active_count(cid, date), 0);
    }

    #[test]
    fn update_status_unknown_booking() {
        let store = BookingStore::new();
        assert!(store.update_status(&Ulid::new(), BookingStatus::Confirmed).is_none());
    }
}
