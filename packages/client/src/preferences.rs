//! The user's display time zone, queried rather than stored.

use chrono::{FixedOffset, Offset, Utc};

pub trait TimeZoneSource: Send + Sync {
    fn offset(&self) -> FixedOffset;
}

/// A fixed offset, UTC by default.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeZone(pub FixedOffset);

impl Default for FixedTimeZone {
    fn default() -> Self {
        Self(Utc.fix())
    }
}

impl TimeZoneSource for FixedTimeZone {
    fn offset(&self) -> FixedOffset {
        self.0
    }
}

/// The browser's current offset, re-read on every call so DST changes are picked up.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserTimeZone;

#[cfg(target_arch = "wasm32")]
impl TimeZoneSource for BrowserTimeZone {
    fn offset(&self) -> FixedOffset {
        // getTimezoneOffset() is minutes *behind* UTC.
        let minutes_behind = js_sys::Date::new_0().get_timezone_offset() as i32;
        FixedOffset::west_opt(minutes_behind * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}
