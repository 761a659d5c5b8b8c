use std::sync::Mutex;

/// Source of wall-clock time for state machines, in fractional seconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_seconds(&self) -> f64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_seconds(&self) -> f64 {
        #[cfg(miri)]
        {
            0.0
        }
        #[cfg(not(miri))]
        {
            chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
        }
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, seconds: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now += seconds;
        }
    }
}

impl Clock for ManualClock {
    fn now_seconds(&self) -> f64 {
        self.now.lock().map(|now| *now).unwrap_or_default()
    }
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Render an epoch-seconds timestamp as RFC 3339
pub fn format_seconds(seconds: f64) -> String {
    let micros = (seconds * 1_000_000.0) as i64;
    chrono::DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(10.0);
        clock.advance(1.5);
        assert_eq!(clock.now_seconds(), 11.5);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "1970-01-01T00:00:00+00:00");
    }
}
