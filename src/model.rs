use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — used for record timestamps.
pub type Ms = i64;

/// Wall-clock seconds since midnight — the unit of all window/slot math.
/// Values may exceed `DAY_SECS` when an overnight window is unrolled past
/// midnight; `wrap_tod` maps back to a displayable time of day.
pub type Secs = i64;

pub const DAY_SECS: Secs = 86_400;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as Ms
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Day-of-week index in [0, 6], 0 = Sunday.
pub fn weekday_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_sunday() as usize
}

/// Parse `HH:MM` or `HH:MM:SS` into seconds since midnight.
pub fn parse_tod(s: &str) -> Option<Secs> {
    let t = NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()?;
    Some(t.num_seconds_from_midnight() as Secs)
}

pub fn wrap_tod(secs: Secs) -> Secs {
    secs.rem_euclid(DAY_SECS)
}

/// Render seconds since midnight as `HH:MM`, wrapping past midnight.
pub fn fmt_tod(secs: Secs) -> String {
    let s = wrap_tod(secs);
    format!("{:02}:{:02}", s / 3600, (s % 3600) / 60)
}

/// A weekly availability window on one weekday, wall-clock second precision.
///
/// `end <= start` denotes an overnight window wrapping past midnight;
/// `end == start` is the full 24h window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub start: Secs,
    pub end: Secs,
}

impl AvailabilityWindow {
    pub fn new(start: Secs, end: Secs) -> Self {
        debug_assert!((0..DAY_SECS).contains(&start), "window start out of range");
        debug_assert!((0..DAY_SECS).contains(&end), "window end out of range");
        Self { start, end }
    }

    /// End of the window on the unrolled axis: overnight (and zero-width)
    /// windows extend past `DAY_SECS`.
    pub fn effective_end(&self) -> Secs {
        if self.end <= self.start {
            self.end + DAY_SECS
        } else {
            self.end
        }
    }

    pub fn is_overnight(&self) -> bool {
        self.end <= self.start
    }
}

/// Half-open bookable interval `[start, end)` on the unrolled axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start: Secs,
    pub end: Secs,
}

impl Slot {
    /// Slot start as a time of day, for pairing with the request's target date.
    pub fn start_tod(&self) -> Secs {
        wrap_tod(self.start)
    }

    pub fn crosses_midnight(&self) -> bool {
        self.start < DAY_SECS && self.end > DAY_SECS
    }
}

/// A slot annotated with its booking state. Derived per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCandidate {
    pub start: Secs,
    pub end: Secs,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// Whether a booking in this status prevents re-booking the same slot.
    pub fn is_blocking(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: Ulid,
    pub consultant_id: Ulid,
    pub customer_name: String,
    pub customer_email: String,
    pub date: NaiveDate,
    pub time: Secs,
    pub status: BookingStatus,
    pub created_at: Ms,
}

/// Identity of a bookable slot. The active-slot index is keyed by this triple;
/// at most one non-cancelled booking may hold a given key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub consultant_id: Ulid,
    pub date: NaiveDate,
    pub time: Secs,
}

#[derive(Debug, Clone)]
pub struct ConsultantState {
    pub id: Ulid,
    pub name: String,
    pub active: bool,
    /// One window per weekday, indexed 0 = Sunday. The fixed shape enforces
    /// the at-most-one-window-per-weekday invariant structurally.
    pub windows: [Option<AvailabilityWindow>; 7],
}

impl ConsultantState {
    pub fn new(id: Ulid, name: String, active: bool) -> Self {
        Self {
            id,
            name,
            active,
            windows: [None; 7],
        }
    }

    pub fn window_for(&self, weekday: usize) -> Option<&AvailabilityWindow> {
        self.windows.get(weekday).and_then(|w| w.as_ref())
    }
}

/// Domain events emitted after a booking write commits. Consumed by external
/// notification collaborators via the notify hub; delivery is fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BookingEvent {
    BookingCreated {
        id: Ulid,
        consultant_id: Ulid,
        date: NaiveDate,
        time: Secs,
    },
    BookingConfirmed {
        id: Ulid,
        consultant_id: Ulid,
    },
    BookingCancelled {
        id: Ulid,
        consultant_id: Ulid,
        date: NaiveDate,
        time: Secs,
    },
}
