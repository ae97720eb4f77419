//! Allocation-light UTC timestamp rendering for logs and HTTP dates.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const WEEKDAYS: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Broken-down UTC time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timestamp {
    pub year: i64,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millis: u16,
    /// Days since the epoch, used for the weekday.
    days: i64,
}

impl Timestamp {
    #[inline]
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Times before the epoch clamp to the epoch.
    pub fn from_system_time(time: SystemTime) -> Self {
        Self::from_duration(time.duration_since(UNIX_EPOCH).unwrap_or_default())
    }

    /// From a duration since the UNIX epoch.
    pub fn from_duration(since_epoch: Duration) -> Self {
        let secs = since_epoch.as_secs() as i64;
        let days = secs.div_euclid(86_400);
        let day_secs = secs.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);

        Self {
            year,
            month,
            day,
            hour: (day_secs / 3600) as u8,
            minute: ((day_secs % 3600) / 60) as u8,
            second: (day_secs % 60) as u8,
            millis: since_epoch.subsec_millis() as u16,
            days,
        }
    }

    /// `2024-01-15T10:30:00.123Z`
    pub fn iso8601(&self) -> String {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.millis
        )
    }

    /// IMF-fixdate, as used by `Expires`: `Mon, 15 Jan 2024 10:30:00 GMT`
    pub fn http_date(&self) -> String {
        let weekday = WEEKDAYS[self.days.rem_euclid(7) as usize];
        let month = MONTHS[(self.month as usize).saturating_sub(1).min(11)];
        format!(
            "{}, {:02} {} {:04} {:02}:{:02}:{:02} GMT",
            weekday, self.day, month, self.year, self.hour, self.minute, self.second
        )
    }
}

/// Current time as ISO 8601.
#[inline]
pub fn iso8601_now() -> String {
    Timestamp::now().iso8601()
}

/// Gregorian date for a day count since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
