use crate::model::{AvailabilityWindow, Secs, Slot, DAY_SECS};

// ── Slot Calculator ──────────────────────────────────────────────
//
// A window is unrolled onto a single axis: overnight windows (end <= start)
// extend past DAY_SECS, and slots that cross midnight keep their unrolled
// coordinates. Callers pair slot times with the request's target date, not
// the window's nominal weekday.

/// Expand an availability window into the ordered sequence of bookable slots.
///
/// Slots are `slot_secs` long and spaced `slot_secs + buffer_secs` apart,
/// starting at the window start; the buffer itself is not bookable. A slot is
/// emitted only if it fits entirely before the window's effective end.
pub fn expand_window(window: &AvailabilityWindow, slot_secs: Secs, buffer_secs: Secs) -> Vec<Slot> {
    debug_assert!(slot_secs > 0, "slot duration must be positive");
    debug_assert!(buffer_secs >= 0, "buffer must be non-negative");

    let effective_end = window.effective_end();
    let step = slot_secs + buffer_secs;

    let mut slots = Vec::new();
    let mut cursor = window.start;
    while cursor + slot_secs <= effective_end {
        slots.push(Slot {
            start: cursor,
            end: cursor + slot_secs,
        });
        cursor += step;
    }
    slots
}

/// Why a requested time does not map to a bookable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotMismatch {
    /// The time is not on a slot boundary for this window and duration.
    Misaligned,
    /// The time is on a boundary grid but the slot does not fit in the window.
    OutsideHours,
}

/// Resolve a requested time of day (`0..DAY_SECS`) to the slot it names,
/// without materializing the full slot list.
pub fn slot_at(
    window: &AvailabilityWindow,
    slot_secs: Secs,
    buffer_secs: Secs,
    tod: Secs,
) -> Result<Slot, SlotMismatch> {
    debug_assert!((0..DAY_SECS).contains(&tod), "time of day out of range");

    let effective_end = window.effective_end();
    let step = slot_secs + buffer_secs;

    // Unroll the request onto the window's axis: times before the window
    // start belong to the post-midnight tail of an overnight window.
    let unrolled = if tod >= window.start {
        tod
    } else {
        tod + DAY_SECS
    };

    if (unrolled - window.start) % step != 0 {
        return Err(SlotMismatch::Misaligned);
    }
    if unrolled + slot_secs > effective_end {
        return Err(SlotMismatch::OutsideHours);
    }
    Ok(Slot {
        start: unrolled,
        end: unrolled + slot_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fmt_tod;

    const H: Secs = 3600;
    const M: Secs = 60;

    fn win(start: Secs, end: Secs) -> AvailabilityWindow {
        AvailabilityWindow::new(start, end)
    }

    #[test]
    fn plain_window_hourly() {
        let slots = expand_window(&win(9 * H, 17 * H), 60 * M, 0);
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0], Slot { start: 9 * H, end: 10 * H });
        assert_eq!(slots[7], Slot { start: 16 * H, end: 17 * H });
    }

    #[test]
    fn buffer_spaces_slots_without_being_bookable() {
        // duration=30, buffer=15, window 09:00–18:00 → 45-minute stride
        let slots = expand_window(&win(9 * H, 18 * H), 30 * M, 15 * M);
        assert_eq!(slots[0], Slot { start: 9 * H, end: 9 * H + 30 * M });
        assert_eq!(slots[1].start, 9 * H + 45 * M);
        // every gap between consecutive slots is exactly the buffer
        for pair in slots.windows(2) {
            assert_eq!(pair[1].start - pair[0].end, 15 * M);
        }
        // the last slot fits entirely inside the window
        assert!(slots.last().unwrap().end <= 18 * H);
    }

    #[test]
    fn final_partial_slot_is_dropped() {
        // 10:00–11:30 with 60-minute slots: only 10:00 fits
        let slots = expand_window(&win(10 * H, 11 * H + 30 * M), 60 * M, 0);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, 10 * H);
    }

    #[test]
    fn window_shorter_than_slot_yields_nothing() {
        let slots = expand_window(&win(9 * H, 9 * H + 30 * M), 60 * M, 0);
        assert!(slots.is_empty());
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        // 22:00–02:00, 60-minute slots, no buffer → 22:00, 23:00, 00:00, 01:00
        let slots = expand_window(&win(22 * H, 2 * H), 60 * M, 0);
        assert_eq!(slots.len(), 4);
        let labels: Vec<String> = slots.iter().map(|s| fmt_tod(s.start)).collect();
        assert_eq!(labels, ["22:00", "23:00", "00:00", "01:00"]);
        // unrolled coordinates keep increasing past DAY_SECS
        assert_eq!(slots[3].start, 25 * H);
    }

    #[test]
    fn overnight_slot_count_law() {
        // slot count is floor(span / stride), adjusted for the final fit
        for (start, end, dur, buf) in [
            (22 * H, 2 * H, 60 * M, 0),
            (20 * H, 4 * H, 90 * M, 30 * M),
            (23 * H, 1 * H, 30 * M, 15 * M),
        ] {
            let w = win(start, end);
            let span = w.effective_end() - w.start;
            let stride = dur + buf;
            let mut expected = span / stride;
            // one more slot fits when the remainder still holds a full slot
            if span % stride >= dur {
                expected += 1;
            }
            assert_eq!(expand_window(&w, dur, buf).len() as i64, expected);
        }
    }

    #[test]
    fn zero_width_window_is_full_day() {
        let slots = expand_window(&win(8 * H, 8 * H), 60 * M, 0);
        assert_eq!(slots.len(), 24);
        assert_eq!(slots[0].start, 8 * H);
        assert_eq!(fmt_tod(slots[23].start), "07:00");
    }

    #[test]
    fn slot_at_resolves_boundaries() {
        let w = win(9 * H, 17 * H);
        assert_eq!(
            slot_at(&w, 60 * M, 0, 9 * H),
            Ok(Slot { start: 9 * H, end: 10 * H })
        );
        assert_eq!(
            slot_at(&w, 60 * M, 0, 16 * H),
            Ok(Slot { start: 16 * H, end: 17 * H })
        );
    }

    #[test]
    fn slot_at_rejects_misaligned_time() {
        // 60-minute slots in 09:00–17:00: 09:30 is not a boundary
        let w = win(9 * H, 17 * H);
        assert_eq!(
            slot_at(&w, 60 * M, 0, 9 * H + 30 * M),
            Err(SlotMismatch::Misaligned)
        );
    }

    #[test]
    fn slot_at_rejects_time_outside_hours() {
        let w = win(9 * H, 17 * H);
        // aligned to the grid but the slot would end past the window
        assert_eq!(slot_at(&w, 60 * M, 0, 17 * H), Err(SlotMismatch::OutsideHours));
        // far outside the window entirely
        assert_eq!(slot_at(&w, 60 * M, 0, 20 * H), Err(SlotMismatch::OutsideHours));
    }

    #[test]
    fn slot_at_overnight_tail() {
        let w = win(22 * H, 2 * H);
        // 01:00 is the post-midnight tail of the window
        assert_eq!(
            slot_at(&w, 60 * M, 0, 1 * H),
            Ok(Slot { start: 25 * H, end: 26 * H })
        );
        // 02:00 no longer fits
        assert_eq!(slot_at(&w, 60 * M, 0, 2 * H), Err(SlotMismatch::OutsideHours));
        // 03:00 unrolls past the effective end
        assert_eq!(slot_at(&w, 60 * M, 0, 3 * H), Err(SlotMismatch::OutsideHours));
    }

    #[test]
    fn slot_at_agrees_with_expand_window() {
        let w = win(20 * H, 4 * H);
        let (dur, buf) = (30 * M, 15 * M);
        for slot in expand_window(&w, dur, buf) {
            assert_eq!(slot_at(&w, dur, buf, slot.start_tod()), Ok(slot));
        }
    }
}
