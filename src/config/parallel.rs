// src/config/parallel.rs

//! Resolution of concurrency directives into a [`ConcurrencyLimit`].
//!
//! Accepted directives:
//! - a positive number (floored; `< 1` is rejected)
//! - `"<n>%"` of the logical processors, with `0 < n <= 100`
//! - `"auto"`: one run per logical processor
//! - `"unbounded"`: no cap
//! - `"default"`: whatever `WSRUN_PARALLEL_MAX_DEFAULT` says, or `"auto"`
//!
//! Every invalid directive is a configuration error; nothing falls back.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::errors::{Result, WsrunError};
use crate::types::ConcurrencyLimit;

use super::PARALLEL_MAX_DEFAULT_ENV;

/// A concurrency directive as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ParallelSetting {
    Count(f64),
    Text(String),
}

impl From<i64> for ParallelSetting {
    fn from(n: i64) -> Self {
        ParallelSetting::Count(n as f64)
    }
}

impl From<i32> for ParallelSetting {
    fn from(n: i32) -> Self {
        ParallelSetting::Count(f64::from(n))
    }
}

impl From<usize> for ParallelSetting {
    fn from(n: usize) -> Self {
        ParallelSetting::Count(n as f64)
    }
}

impl From<f64> for ParallelSetting {
    fn from(n: f64) -> Self {
        ParallelSetting::Count(n)
    }
}

impl From<&str> for ParallelSetting {
    fn from(s: &str) -> Self {
        ParallelSetting::Text(s.to_string())
    }
}

impl From<String> for ParallelSetting {
    fn from(s: String) -> Self {
        ParallelSetting::Text(s)
    }
}

impl FromStr for ParallelSetting {
    type Err = std::convert::Infallible;

    /// Numeric strings become `Count`; everything else is kept as text and
    /// validated when resolved.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().parse::<f64>() {
            Ok(n) => ParallelSetting::Count(n),
            Err(_) => ParallelSetting::Text(s.trim().to_string()),
        })
    }
}

impl fmt::Display for ParallelSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParallelSetting::Count(n) => write!(f, "{n}"),
            ParallelSetting::Text(s) => f.write_str(s),
        }
    }
}

/// Number of logical processors, never less than 1.
pub fn available_processors() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Resolve a directive using the process environment and the host's
/// processor count.
pub fn determine_parallel_max(setting: impl Into<ParallelSetting>) -> Result<ConcurrencyLimit> {
    let default_override = std::env::var(PARALLEL_MAX_DEFAULT_ENV).ok();
    determine_parallel_max_with(setting, default_override.as_deref(), available_processors())
}

/// Pure form of [`determine_parallel_max`].
pub fn determine_parallel_max_with(
    setting: impl Into<ParallelSetting>,
    default_override: Option<&str>,
    processors: usize,
) -> Result<ConcurrencyLimit> {
    let processors = processors.max(1);
    let limit = match setting.into() {
        ParallelSetting::Count(n) => from_count(n)?,
        ParallelSetting::Text(s) => from_text(&s, default_override, processors)?,
    };
    debug!(%limit, processors, "resolved parallel max");
    Ok(limit)
}

fn from_text(
    raw: &str,
    default_override: Option<&str>,
    processors: usize,
) -> Result<ConcurrencyLimit> {
    let value = raw.trim();
    match value.to_lowercase().as_str() {
        "auto" => Ok(ConcurrencyLimit::limited(processors)),
        "unbounded" => Ok(ConcurrencyLimit::Unbounded),
        "default" => match default_override.map(str::trim) {
            None | Some("") => Ok(ConcurrencyLimit::limited(processors)),
            // The override itself may say "default"; with no further
            // override that resolves to "auto".
            Some(v) => from_text(v, None, processors).map_err(|e| match e {
                WsrunError::ConfigError(msg) => WsrunError::config(format!(
                    "{PARALLEL_MAX_DEFAULT_ENV}: {msg}"
                )),
                other => other,
            }),
        },
        _ => {
            if let Some(pct) = value.strip_suffix('%') {
                from_percentage(pct, processors)
            } else if let Ok(n) = value.parse::<f64>() {
                from_count(n)
            } else {
                Err(WsrunError::config(format!(
                    "invalid parallel max {value:?} (expected a positive number, \"<n>%\", \
                     \"auto\", \"unbounded\" or \"default\")"
                )))
            }
        }
    }
}

fn from_count(n: f64) -> Result<ConcurrencyLimit> {
    if !n.is_finite() {
        return Err(WsrunError::config(format!(
            "parallel max must be a finite number (got {n})"
        )));
    }
    let floored = n.floor();
    if floored < 1.0 {
        return Err(WsrunError::config(format!(
            "parallel max must be >= 1 (got {n})"
        )));
    }
    Ok(ConcurrencyLimit::limited(floored as usize))
}

fn from_percentage(raw: &str, processors: usize) -> Result<ConcurrencyLimit> {
    let pct: f64 = raw.trim().parse().map_err(|_| {
        WsrunError::config(format!("invalid parallel percentage \"{raw}%\""))
    })?;
    if !pct.is_finite() || pct <= 0.0 || pct > 100.0 {
        return Err(WsrunError::config(format!(
            "parallel percentage must be within (0, 100] (got {raw}%)"
        )));
    }
    let n = (processors as f64 * pct / 100.0).floor() as usize;
    Ok(ConcurrencyLimit::limited(n.max(1)))
}
