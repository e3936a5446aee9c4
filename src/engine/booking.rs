use chrono::{Days, NaiveDate};
use ulid::Ulid;

use crate::limits::{MAX_EMAIL_LEN, MAX_NAME_LEN};
use crate::model::{
    now_ms, today, weekday_index, Booking, BookingEvent, BookingStatus, Secs, SlotKey,
};

use super::slots::{slot_at, SlotMismatch};
use super::{BookingError, Engine};

/// A complete, shape-validated booking request. Field-format checks (email
/// syntax, date/time parsing) happen at the boundary; the guard enforces
/// business rules and the uniqueness invariant.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub consultant_id: Ulid,
    pub customer_name: String,
    pub customer_email: String,
    pub date: NaiveDate,
    pub time: Secs,
}

impl Engine {
    /// Booking Conflict Guard: validate against business rules, then insert
    /// by claiming the active-slot index directly. There is no
    /// check-then-insert — the index claim itself is the constraint, so N
    /// simultaneous writers admit exactly one winner without any
    /// application-level locking. Conflicts are terminal; retrying the same
    /// slot is guaranteed to fail again.
    pub async fn create_booking(&self, req: BookingRequest) -> Result<Booking, BookingError> {
        if req.customer_name.trim().is_empty() {
            return Err(BookingError::EmptyField("customerName"));
        }
        if req.customer_name.len() > MAX_NAME_LEN {
            return Err(BookingError::FieldTooLong("customerName"));
        }
        if req.customer_email.trim().is_empty() {
            return Err(BookingError::EmptyField("customerEmail"));
        }
        if req.customer_email.len() > MAX_EMAIL_LEN {
            return Err(BookingError::FieldTooLong("customerEmail"));
        }

        let today = today();
        if req.date < today {
            return Err(BookingError::PastDate(req.date));
        }
        let max_days = self.schedule().max_advance_days;
        if req.date > today + Days::new(max_days as u64) {
            return Err(BookingError::TooFarAhead {
                date: req.date,
                max_days,
            });
        }

        let cs = self
            .store()
            .get_consultant(&req.consultant_id)
            .ok_or(BookingError::UnknownConsultant(req.consultant_id))?;
        let guard = cs.read().await;
        if !guard.active {
            return Err(BookingError::InactiveConsultant(req.consultant_id));
        }
        // No window that weekday: every time is outside availability hours.
        let Some(window) = guard.window_for(weekday_index(req.date)).copied() else {
            return Err(BookingError::OutsideHours(req.time));
        };
        drop(guard);

        let schedule = self.schedule();
        slot_at(&window, schedule.slot_secs(), schedule.buffer_secs(), req.time).map_err(
            |mismatch| match mismatch {
                SlotMismatch::Misaligned => BookingError::MisalignedTime(req.time),
                SlotMismatch::OutsideHours => BookingError::OutsideHours(req.time),
            },
        )?;

        let booking = Booking {
            id: Ulid::new(),
            consultant_id: req.consultant_id,
            customer_name: req.customer_name,
            customer_email: req.customer_email,
            date: req.date,
            time: req.time,
            status: BookingStatus::Pending,
            created_at: now_ms(),
        };

        if let Err(holder) = self.store().try_claim_slot(booking.clone()) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(BookingError::SlotTaken { holder });
        }
        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);

        // Post-commit side effect: delivery is fire-and-forget and must not
        // affect the outcome of an already-committed booking.
        self.notify.send(
            booking.consultant_id,
            &BookingEvent::BookingCreated {
                id: booking.id,
                consultant_id: booking.consultant_id,
                date: booking.date,
                time: booking.time,
            },
        );
        Ok(booking)
    }

    /// Administration transition: pending → confirmed. Confirming an
    /// already-confirmed booking is a no-op; a cancelled booking stays
    /// cancelled.
    pub async fn confirm_booking(&self, id: Ulid) -> Result<Booking, BookingError> {
        let existing = self
            .store()
            .get_booking(&id)
            .ok_or(BookingError::UnknownBooking(id))?;
        match existing.status {
            BookingStatus::Pending => {}
            BookingStatus::Confirmed => return Ok(existing),
            BookingStatus::Cancelled => {
                return Err(BookingError::InvalidTransition {
                    from: BookingStatus::Cancelled,
                })
            }
        }
        let updated = self
            .store()
            .update_status(&id, BookingStatus::Confirmed)
            .ok_or(BookingError::UnknownBooking(id))?;
        self.notify.send(
            updated.consultant_id,
            &BookingEvent::BookingConfirmed {
                id,
                consultant_id: updated.consultant_id,
            },
        );
        Ok(updated)
    }

    /// Administration transition: cancel a booking, freeing its slot for
    /// re-booking. Idempotent for already-cancelled bookings.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, BookingError> {
        let existing = self
            .store()
            .get_booking(&id)
            .ok_or(BookingError::UnknownBooking(id))?;
        if existing.status == BookingStatus::Cancelled {
            return Ok(existing);
        }

        // Status first, index second: releasing the claim while the row
        // still blocks could let a racing writer create a second active
        // booking for the slot.
        let updated = self
            .store()
            .update_status(&id, BookingStatus::Cancelled)
            .ok_or(BookingError::UnknownBooking(id))?;
        let key = SlotKey {
            consultant_id: existing.consultant_id,
            date: existing.date,
            time: existing.time,
        };
        self.store().release_slot(&key, id);
        self.store()
            .invalidate_count(existing.consultant_id, existing.date);
        metrics::counter!(crate::observability::BOOKINGS_CANCELLED_TOTAL).increment(1);

        self.notify.send(
            updated.consultant_id,
            &BookingEvent::BookingCancelled {
                id,
                consultant_id: updated.consultant_id,
                date: updated.date,
                time: updated.time,
            },
        );
        Ok(updated)
    }
}
