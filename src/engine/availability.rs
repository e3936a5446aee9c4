use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{weekday_index, SlotCandidate, SlotKey};

use super::slots::expand_window;
use super::{BookingError, Engine};

impl Engine {
    /// Availability Query: the date's weekday window expanded into slot
    /// candidates, each annotated with whether a blocking booking holds it.
    ///
    /// No window on that weekday is an empty list, not an error. Any date is
    /// answered deterministically — advance-window policy belongs to the
    /// write path and the caller-facing boundary, not here.
    pub async fn availability(
        &self,
        consultant_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<SlotCandidate>, BookingError> {
        let cs = self
            .store()
            .get_consultant(&consultant_id)
            .ok_or(BookingError::UnknownConsultant(consultant_id))?;
        let guard = cs.read().await;
        if !guard.active {
            return Err(BookingError::InactiveConsultant(consultant_id));
        }
        let Some(window) = guard.window_for(weekday_index(date)).copied() else {
            return Ok(Vec::new());
        };
        drop(guard);

        let schedule = self.schedule();
        let slots = expand_window(&window, schedule.slot_secs(), schedule.buffer_secs());

        // Fast path: nothing booked that day means nothing can be blocked.
        if self.store().active_count(consultant_id, date) == 0 {
            return Ok(slots
                .into_iter()
                .map(|s| SlotCandidate {
                    start: s.start,
                    end: s.end,
                    available: true,
                })
                .collect());
        }

        Ok(slots
            .into_iter()
            .map(|s| {
                let key = SlotKey {
                    consultant_id,
                    date,
                    time: s.start_tod(),
                };
                SlotCandidate {
                    start: s.start,
                    end: s.end,
                    available: !self.store().is_blocked(&key),
                }
            })
            .collect())
    }
}
