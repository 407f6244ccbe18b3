use chrono::{DateTime, SecondsFormat, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimestampMs(pub i64);

impl TimestampMs {
    pub fn to_iso8601(self) -> String {
        let datetime = DateTime::<Utc>::from_timestamp_millis(self.0)
            .unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH));
        datetime.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

pub trait Clock {
    fn now(&self) -> TimestampMs;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimestampMs {
        TimestampMs(Utc::now().timestamp_millis())
    }
}
