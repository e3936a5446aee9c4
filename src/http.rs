use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, MatchedPath, Path, Query, Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use ulid::Ulid;

use crate::engine::{BookingError, BookingRequest, Engine};
use crate::limits::MAX_EMAIL_LEN;
use crate::model::{fmt_tod, parse_tod, today, weekday_index, Booking, BookingStatus};
use crate::observability;
use crate::ratelimit::{EndpointClass, RateDecision, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub limiter: Arc<RateLimiter>,
    /// Header to trust for client identity when behind a proxy.
    pub proxy_header: Option<String>,
}

pub fn router(engine: Arc<Engine>, limiter: Arc<RateLimiter>, proxy_header: Option<String>) -> Router {
    let state = AppState {
        engine,
        limiter,
        proxy_header,
    };
    Router::new()
        .route("/consultants/{id}/availability", get(availability))
        .route("/bookings", post(create_booking))
        .route("/bookings/{id}", delete(cancel_booking))
        .route("/bookings/{id}/confirm", post(confirm_booking))
        .layer(middleware::from_fn_with_state(state.clone(), gate))
        .route("/healthz", get(healthz))
        .with_state(state)
}

// ── Rate-limit gate + request accounting ─────────────────────────
//
// Applied to every API route (not /healthz). Reads and writes draw from
// independent budgets; every response carries the limit metadata so clients
// can back off before hitting 429.

async fn gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let class = if req.method() == Method::GET || req.method() == Method::HEAD {
        EndpointClass::Read
    } else {
        EndpointClass::Write
    };
    let client = client_identity(&state, &req);
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let decision = state.limiter.check(class, &client).await;

    let start = Instant::now();
    let mut response = match decision {
        RateDecision::Limited { retry_after, .. } => {
            let body = json!({
                "error": { "code": "rate_limited", "message": "rate limit exceeded" },
                "retryAfter": retry_after,
            });
            let mut res = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            res.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            res
        }
        RateDecision::Allowed { .. } => next.run(req).await,
    };

    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "route" => route.clone())
        .record(start.elapsed().as_secs_f64());
    metrics::counter!(
        observability::REQUESTS_TOTAL,
        "route" => route,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);

    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(decision.limit()),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(decision.remaining()),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(decision.reset()),
    );
    response
}

/// Client identity for rate limiting: the trusted proxy header when
/// configured (first hop of a forwarded list), else the peer address.
fn client_identity(state: &AppState, req: &Request) -> String {
    if let Some(name) = &state.proxy_header
        && let Some(value) = req.headers().get(name.as_str()).and_then(|v| v.to_str().ok())
        && let Some(first) = value.split(',').next()
    {
        let first = first.trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".into())
}

// ── Error envelope ───────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    field: Option<&'static str>,
}

impl ApiError {
    fn validation(code: &'static str, message: impl Into<String>, field: Option<&'static str>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code,
            message: message.into(),
            field,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({ "code": self.code, "message": self.message });
        if let Some(field) = self.field {
            error["field"] = json!(field);
        }
        (self.status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        let message = e.to_string();
        let (status, code, field) = match &e {
            BookingError::UnknownConsultant(_) | BookingError::InactiveConsultant(_) => {
                (StatusCode::BAD_REQUEST, "invalid_consultant", Some("consultantId"))
            }
            BookingError::UnknownBooking(_) => (StatusCode::NOT_FOUND, "unknown_booking", None),
            BookingError::PastDate(_) => (StatusCode::BAD_REQUEST, "past_date", Some("date")),
            BookingError::TooFarAhead { .. } => {
                (StatusCode::BAD_REQUEST, "date_too_far", Some("date"))
            }
            BookingError::MisalignedTime(_) => {
                (StatusCode::BAD_REQUEST, "invalid_time", Some("time"))
            }
            BookingError::OutsideHours(_) => {
                (StatusCode::BAD_REQUEST, "outside_hours", Some("time"))
            }
            BookingError::SlotTaken { .. } => (StatusCode::CONFLICT, "slot_conflict", None),
            BookingError::InvalidTransition { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_transition", None)
            }
            BookingError::InvalidWeekday(_) => {
                (StatusCode::BAD_REQUEST, "invalid_weekday", Some("weekday"))
            }
            BookingError::EmptyField(f) | BookingError::FieldTooLong(f) => {
                let code = match *f {
                    "customerName" | "name" => "invalid_name",
                    "customerEmail" => "invalid_email",
                    _ => "invalid_field",
                };
                (StatusCode::BAD_REQUEST, code, Some(*f))
            }
            BookingError::LimitExceeded(_) => (StatusCode::BAD_REQUEST, "limit_exceeded", None),
        };
        Self {
            status,
            code,
            message,
            field,
        }
    }
}

// ── Field parsing ────────────────────────────────────────────────

fn parse_consultant_id(raw: &str) -> Result<Ulid, ApiError> {
    Ulid::from_string(raw).map_err(|_| {
        ApiError::validation("invalid_consultant", "malformed consultant id", Some("consultantId"))
    })
}

fn parse_booking_id(raw: &str) -> Result<Ulid, ApiError> {
    Ulid::from_string(raw)
        .map_err(|_| ApiError::validation("invalid_booking_id", "malformed booking id", None))
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ApiError::validation("invalid_date", "date must be YYYY-MM-DD", Some("date"))
    })
}

fn is_valid_email(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_EMAIL_LEN || s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

// ── Wire types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingBody {
    consultant_id: String,
    customer_name: String,
    customer_email: String,
    date: String,
    time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    id: Ulid,
    consultant_id: Ulid,
    customer_name: String,
    customer_email: String,
    date: NaiveDate,
    time: String,
    status: BookingStatus,
}

impl From<Booking> for BookingView {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            consultant_id: b.consultant_id,
            customer_name: b.customer_name,
            customer_email: b.customer_email,
            date: b.date,
            time: fmt_tod(b.time),
            status: b.status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AvailabilityParams {
    date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SlotView {
    start: String,
    end: String,
    available: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityResponse {
    date: NaiveDate,
    day_of_week: u8,
    slots: Vec<SlotView>,
}

// ── Handlers ─────────────────────────────────────────────────────

async fn availability(
    State(state): State<AppState>,
    Path(consultant_id): Path<String>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let consultant_id = parse_consultant_id(&consultant_id)?;
    let raw_date = params
        .date
        .ok_or_else(|| ApiError::validation("invalid_date", "missing date parameter", Some("date")))?;
    let date = parse_date(&raw_date)?;

    // Advance-window policy for reads lives here at the boundary; the query
    // itself answers any date.
    let max_days = state.engine.schedule().max_advance_days;
    if date > today() + Days::new(max_days as u64) {
        return Err(BookingError::TooFarAhead { date, max_days }.into());
    }

    let candidates = state.engine.availability(consultant_id, date).await?;
    Ok(Json(AvailabilityResponse {
        date,
        day_of_week: weekday_index(date) as u8,
        slots: candidates
            .into_iter()
            .map(|c| SlotView {
                start: fmt_tod(c.start),
                end: fmt_tod(c.end),
                available: c.available,
            })
            .collect(),
    }))
}

async fn create_booking(
    State(state): State<AppState>,
    body: Result<Json<CreateBookingBody>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingView>), ApiError> {
    let Json(body) =
        body.map_err(|e| ApiError::validation("invalid_json", e.to_string(), None))?;

    let consultant_id = parse_consultant_id(&body.consultant_id)?;
    let date = parse_date(&body.date)?;
    let time = parse_tod(&body.time)
        .ok_or_else(|| ApiError::validation("invalid_time", "time must be HH:MM", Some("time")))?;
    if !is_valid_email(&body.customer_email) {
        return Err(ApiError::validation(
            "invalid_email",
            "malformed email address",
            Some("customerEmail"),
        ));
    }

    let booking = state
        .engine
        .create_booking(BookingRequest {
            consultant_id,
            customer_name: body.customer_name,
            customer_email: body.customer_email,
            date,
            time,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

async fn confirm_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookingView>, ApiError> {
    let id = parse_booking_id(&id)?;
    let booking = state.engine.confirm_booking(id).await?;
    Ok(Json(booking.into()))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookingView>, ApiError> {
    let id = parse_booking_id(&id)?;
    let booking = state.engine.cancel_booking(id).await?;
    Ok(Json(booking.into()))
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@nodot"));
        assert!(!is_valid_email("ada@.example.com"));
        assert!(!is_valid_email("spaced name@example.com"));
        assert!(!is_valid_email(&format!("{}@example.com", "x".repeat(MAX_EMAIL_LEN))));
    }

    #[test]
    fn booking_error_status_mapping() {
        let conflict: ApiError = BookingError::SlotTaken { holder: Ulid::new() }.into();
        assert_eq!(conflict.status, StatusCode::CONFLICT);
        assert_eq!(conflict.code, "slot_conflict");

        let missing: ApiError = BookingError::UnknownBooking(Ulid::new()).into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let misaligned: ApiError = BookingError::MisalignedTime(9 * 3600 + 1800).into();
        assert_eq!(misaligned.status, StatusCode::BAD_REQUEST);
        assert_eq!(misaligned.code, "invalid_time");

        let inactive: ApiError = BookingError::InactiveConsultant(Ulid::new()).into();
        assert_eq!(inactive.code, "invalid_consultant");
    }

    #[test]
    fn date_parsing() {
        assert!(parse_date("2026-08-03").is_ok());
        assert!(parse_date("08/03/2026").is_err());
        assert!(parse_date("2026-13-40").is_err());
    }
}
