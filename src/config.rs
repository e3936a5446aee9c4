use std::io;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;
use ulid::Ulid;

use crate::engine::Engine;
use crate::model::{parse_tod, AvailabilityWindow, Secs};

/// Scheduling parameters. Out-of-policy values never fail a request: they are
/// replaced by safe defaults at sanitize time with a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Slot length in minutes.
    pub slot_minutes: i64,
    /// Non-bookable gap after each slot, in minutes.
    pub buffer_minutes: i64,
    /// How far ahead bookings may be placed, in days.
    pub max_advance_days: u32,
}

pub const DEFAULT_SLOT_MINUTES: i64 = 60;
pub const DEFAULT_MAX_ADVANCE_DAYS: u32 = 30;

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            slot_minutes: DEFAULT_SLOT_MINUTES,
            buffer_minutes: 0,
            max_advance_days: DEFAULT_MAX_ADVANCE_DAYS,
        }
    }
}

/// Durations up to an hour must land on clean boundaries (divide 60);
/// longer durations are a closed set of whole-slot exceptions.
fn admissible_duration(minutes: i64) -> bool {
    match minutes {
        1..=60 => 60 % minutes == 0,
        90 | 120 => true,
        _ => false,
    }
}

impl ScheduleConfig {
    /// Validate, substituting safe defaults for out-of-policy values.
    pub fn sanitized(self) -> Self {
        let mut cfg = self;
        if !admissible_duration(cfg.slot_minutes) {
            warn!(
                slot_minutes = cfg.slot_minutes,
                "invalid slot duration, falling back to {DEFAULT_SLOT_MINUTES} minutes"
            );
            cfg.slot_minutes = DEFAULT_SLOT_MINUTES;
        }
        if cfg.buffer_minutes < 0 || cfg.buffer_minutes >= cfg.slot_minutes {
            warn!(
                buffer_minutes = cfg.buffer_minutes,
                slot_minutes = cfg.slot_minutes,
                "invalid buffer, falling back to 0"
            );
            cfg.buffer_minutes = 0;
        }
        cfg
    }

    pub fn slot_secs(&self) -> Secs {
        self.slot_minutes * 60
    }

    pub fn buffer_secs(&self) -> Secs {
        self.buffer_minutes * 60
    }

    /// Distance between consecutive slot starts.
    pub fn step_secs(&self) -> Secs {
        self.slot_secs() + self.buffer_secs()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests per window for read endpoints.
    pub read_limit: u32,
    /// Requests per window for write endpoints.
    pub write_limit: u32,
    /// Fixed window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read_limit: 60,
            write_limit: 10,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn sanitized(self) -> Self {
        let mut cfg = self;
        let defaults = Self::default();
        if cfg.window_secs == 0 {
            warn!("rate-limit window of 0s, falling back to {}s", defaults.window_secs);
            cfg.window_secs = defaults.window_secs;
        }
        if cfg.read_limit == 0 {
            warn!("read rate limit of 0, falling back to {}", defaults.read_limit);
            cfg.read_limit = defaults.read_limit;
        }
        if cfg.write_limit == 0 {
            warn!("write rate limit of 0, falling back to {}", defaults.write_limit);
            cfg.write_limit = defaults.write_limit;
        }
        cfg
    }
}

/// Process-level configuration, sourced from `SLOTBOOK_*` env vars.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub port: u16,
    pub metrics_port: Option<u16>,
    pub seed_path: Option<String>,
    /// Header to trust for client identity (e.g. `x-forwarded-for`) when
    /// running behind a proxy. Unset means the peer address is the identity.
    pub proxy_header: Option<String>,
    pub schedule: ScheduleConfig,
    pub rate: RateLimitConfig,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let schedule_defaults = ScheduleConfig::default();
        let rate_defaults = RateLimitConfig::default();
        Self {
            bind: std::env::var("SLOTBOOK_BIND").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("SLOTBOOK_PORT").unwrap_or(8080),
            metrics_port: env_parse("SLOTBOOK_METRICS_PORT"),
            seed_path: std::env::var("SLOTBOOK_SEED").ok(),
            proxy_header: std::env::var("SLOTBOOK_PROXY_HEADER").ok(),
            schedule: ScheduleConfig {
                slot_minutes: env_parse("SLOTBOOK_SLOT_MINUTES")
                    .unwrap_or(schedule_defaults.slot_minutes),
                buffer_minutes: env_parse("SLOTBOOK_BUFFER_MINUTES")
                    .unwrap_or(schedule_defaults.buffer_minutes),
                max_advance_days: env_parse("SLOTBOOK_MAX_ADVANCE_DAYS")
                    .unwrap_or(schedule_defaults.max_advance_days),
            },
            rate: RateLimitConfig {
                read_limit: env_parse("SLOTBOOK_READ_LIMIT").unwrap_or(rate_defaults.read_limit),
                write_limit: env_parse("SLOTBOOK_WRITE_LIMIT")
                    .unwrap_or(rate_defaults.write_limit),
                window_secs: env_parse("SLOTBOOK_RATE_WINDOW_SECS")
                    .unwrap_or(rate_defaults.window_secs),
            },
        }
    }
}

// ── Seed file ────────────────────────────────────────────────────
//
// Consultants and their weekly windows are administered externally; the seed
// file bootstraps them at startup so a fresh process is immediately bookable.

#[derive(Debug, Deserialize)]
struct SeedWindow {
    weekday: usize,
    start: String,
    end: String,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SeedConsultant {
    id: Ulid,
    name: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    windows: Vec<SeedWindow>,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    consultants: Vec<SeedConsultant>,
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Load consultants and windows from a JSON seed file into the engine.
/// Returns the number of consultants loaded.
pub async fn load_seed(path: &Path, engine: &Engine) -> io::Result<usize> {
    let raw = std::fs::read_to_string(path)?;
    let seed: SeedFile =
        serde_json::from_str(&raw).map_err(|e| invalid_data(format!("seed parse: {e}")))?;

    for c in &seed.consultants {
        engine
            .upsert_consultant(c.id, c.name.clone(), c.active)
            .await
            .map_err(|e| invalid_data(format!("seed consultant {}: {e}", c.id)))?;
        for w in &c.windows {
            let start = parse_tod(&w.start)
                .ok_or_else(|| invalid_data(format!("seed window start {:?}", w.start)))?;
            let end = parse_tod(&w.end)
                .ok_or_else(|| invalid_data(format!("seed window end {:?}", w.end)))?;
            engine
                .set_window(c.id, w.weekday, Some(AvailabilityWindow::new(start, end)))
                .await
                .map_err(|e| invalid_data(format!("seed window for {}: {e}", c.id)))?;
        }
    }
    Ok(seed.consultants.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_defaults_are_admissible() {
        let cfg = ScheduleConfig::default().sanitized();
        assert_eq!(cfg, ScheduleConfig::default());
    }

    #[test]
    fn bad_duration_falls_back() {
        let cfg = ScheduleConfig {
            slot_minutes: 0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(cfg.slot_minutes, DEFAULT_SLOT_MINUTES);

        // 45 does not divide 60 evenly
        let cfg = ScheduleConfig {
            slot_minutes: 45,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(cfg.slot_minutes, DEFAULT_SLOT_MINUTES);

        // 75 is not one of the long-slot exceptions
        let cfg = ScheduleConfig {
            slot_minutes: 75,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(cfg.slot_minutes, DEFAULT_SLOT_MINUTES);
    }

    #[test]
    fn long_slot_exceptions_allowed() {
        for minutes in [90, 120] {
            let cfg = ScheduleConfig {
                slot_minutes: minutes,
                ..Default::default()
            }
            .sanitized();
            assert_eq!(cfg.slot_minutes, minutes);
        }
    }

    #[test]
    fn buffer_must_be_smaller_than_slot() {
        let cfg = ScheduleConfig {
            slot_minutes: 30,
            buffer_minutes: 30,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(cfg.buffer_minutes, 0);

        let cfg = ScheduleConfig {
            slot_minutes: 30,
            buffer_minutes: 15,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(cfg.buffer_minutes, 15);
        assert_eq!(cfg.step_secs(), 45 * 60);
    }

    #[test]
    fn rate_limit_zeroes_fall_back() {
        let cfg = RateLimitConfig {
            read_limit: 0,
            write_limit: 0,
            window_secs: 0,
        }
        .sanitized();
        assert_eq!(cfg, RateLimitConfig::default());
    }
}
