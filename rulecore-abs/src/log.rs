/*!

A small facade over `tracing` so the rest of the workspace never names a logging backend directly. If we ever want
to swap `tracing` for something else, this is the only file that changes.

The public surface is intentionally narrow: a global threshold and six severity macros. `critical!` is distinct
from `error!` because `tracing` has no level above `ERROR`; a critical event is an `ERROR`-level event additionally
tagged `critical = true`, which a subscriber can filter on independently (the engine emits `critical!` only
immediately before halting with `InternalError`, per `SPEC_FULL.md` §1).

*/

use std::sync::atomic::{AtomicU8, Ordering};

/// Severity levels, ordered least to most severe, matching `tracing::Level` minus the critical/error split.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
#[repr(u8)]
pub enum LogLevel {
  Trace    = 0,
  Debug    = 1,
  Info     = 2,
  Warning  = 3,
  Error    = 4,
  Critical = 5,
}

static GLOBAL_THRESHOLD: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Sets the minimum severity that will be forwarded to the `tracing` subscriber. Events below this threshold are
/// skipped before they ever reach `tracing`, so a disabled `trace!` call in a hot path costs one atomic load.
pub fn set_global_logging_threshold(level: LogLevel) {
  GLOBAL_THRESHOLD.store(level as u8, Ordering::Relaxed);
}

/// Reads the current minimum severity.
pub fn get_global_logging_threshold() -> LogLevel {
  match GLOBAL_THRESHOLD.load(Ordering::Relaxed) {
    0 => LogLevel::Trace,
    1 => LogLevel::Debug,
    2 => LogLevel::Info,
    3 => LogLevel::Warning,
    4 => LogLevel::Error,
    _ => LogLevel::Critical,
  }
}

#[doc(hidden)]
pub fn enabled(level: LogLevel) -> bool {
  level >= get_global_logging_threshold()
}

#[macro_export]
macro_rules! trace {
  ($($arg:tt)*) => {
    if $crate::log::enabled($crate::log::LogLevel::Trace) {
      $crate::tracing::trace!($($arg)*);
    }
  };
}

#[macro_export]
macro_rules! debug {
  ($($arg:tt)*) => {
    if $crate::log::enabled($crate::log::LogLevel::Debug) {
      $crate::tracing::debug!($($arg)*);
    }
  };
}

#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => {
    if $crate::log::enabled($crate::log::LogLevel::Info) {
      $crate::tracing::info!($($arg)*);
    }
  };
}

#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => {
    if $crate::log::enabled($crate::log::LogLevel::Warning) {
      $crate::tracing::warn!($($arg)*);
    }
  };
}

#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => {
    if $crate::log::enabled($crate::log::LogLevel::Error) {
      $crate::tracing::error!($($arg)*);
    }
  };
}

#[macro_export]
macro_rules! critical {
  ($($arg:tt)*) => {
    if $crate::log::enabled($crate::log::LogLevel::Critical) {
      $crate::tracing::error!(critical = true, $($arg)*);
    }
  };
}

pub use crate::{trace, debug, info, warning, error, critical};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn threshold_round_trips() {
    set_global_logging_threshold(LogLevel::Warning);
    assert_eq!(get_global_logging_threshold(), LogLevel::Warning);
    assert!(!enabled(LogLevel::Info));
    assert!(enabled(LogLevel::Error));
    set_global_logging_threshold(LogLevel::Info);
  }
}
