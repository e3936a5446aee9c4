use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{fmt_tod, BookingStatus, Secs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    UnknownConsultant(Ulid),
    InactiveConsultant(Ulid),
    UnknownBooking(Ulid),
    PastDate(NaiveDate),
    TooFarAhead { date: NaiveDate, max_days: u32 },
    MisalignedTime(Secs),
    OutsideHours(Secs),
    SlotTaken { holder: Ulid },
    InvalidTransition { from: BookingStatus },
    InvalidWeekday(usize),
    EmptyField(&'static str),
    FieldTooLong(&'static str),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::UnknownConsultant(id) => write!(f, "unknown consultant: {id}"),
            BookingError::InactiveConsultant(id) => write!(f, "consultant not active: {id}"),
            BookingError::UnknownBooking(id) => write!(f, "unknown booking: {id}"),
            BookingError::PastDate(date) => write!(f, "date is in the past: {date}"),
            BookingError::TooFarAhead { date, max_days } => {
                write!(f, "date {date} is beyond the {max_days}-day booking window")
            }
            BookingError::MisalignedTime(tod) => {
                write!(f, "time {} is not on a slot boundary", fmt_tod(*tod))
            }
            BookingError::OutsideHours(tod) => {
                write!(f, "time {} is outside availability hours", fmt_tod(*tod))
            }
            BookingError::SlotTaken { holder } => {
                write!(f, "slot already booked by {holder}")
            }
            BookingError::InvalidTransition { from } => {
                write!(f, "invalid status transition from {from:?}")
            }
            BookingError::InvalidWeekday(d) => write!(f, "weekday out of range: {d}"),
            BookingError::EmptyField(field) => write!(f, "{field} must not be empty"),
            BookingError::FieldTooLong(field) => write!(f, "{field} too long"),
            BookingError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for BookingError {}
