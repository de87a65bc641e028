//! Log rate limiting
//!
//! Repair messages are emitted from the I/O path; a failing disk can
//! produce thousands per second. A [`LogRateLimit`] lets a burst through per
//! interval and counts what it suppresses.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Messages allowed per interval.
pub const DEFAULT_BURST: u32 = 10;

/// Length of one interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct Window {
    started: Option<Instant>,
    emitted: u32,
    suppressed: u64,
}

/// Fixed-window limiter shared by every repair session.
#[derive(Debug)]
pub struct LogRateLimit {
    burst: u32,
    interval: Duration,
    window: Mutex<Window>,
}

impl Default for LogRateLimit {
    fn default() -> Self {
        Self::new(DEFAULT_BURST, DEFAULT_INTERVAL)
    }
}

impl LogRateLimit {
    pub fn new(burst: u32, interval: Duration) -> Self {
        Self {
            burst,
            interval,
            window: Mutex::new(Window {
                started: None,
                emitted: 0,
                suppressed: 0,
            }),
        }
    }

    /// Whether a message may be logged now.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Messages dropped since the limiter was created.
    pub fn suppressed(&self) -> u64 {
        self.window.lock().suppressed
    }

    fn allow_at(&self, now: Instant) -> bool {
        let mut window = self.window.lock();
        let expired = window
            .started
            .map_or(true, |started| now.duration_since(started) >= self.interval);
        if expired {
            window.started = Some(now);
            window.emitted = 0;
        }

        if window.emitted < self.burst {
            window.emitted += 1;
            true
        } else {
            window.suppressed += 1;
            false
        }
    }
}

/// Emit a `tracing` event only if `$limit` allows it.
macro_rules! log_limited {
    ($limit:expr, $level:ident!($($arg:tt)*)) => {
        if $limit.allow() {
            tracing::$level!($($arg)*);
        }
    };
}

pub(crate) use log_limited;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_suppress() {
        let limit = LogRateLimit::new(3, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limit.allow_at(now));
        assert!(limit.allow_at(now));
        assert!(limit.allow_at(now));
        assert!(!limit.allow_at(now));
        assert!(!limit.allow_at(now + Duration::from_secs(59)));
        assert_eq!(limit.suppressed(), 2);
    }

    #[test]
    fn test_window_resets() {
        let limit = LogRateLimit::new(1, Duration::from_secs(5));
        let now = Instant::now();

        assert!(limit.allow_at(now));
        assert!(!limit.allow_at(now + Duration::from_secs(1)));
        assert!(limit.allow_at(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_default_burst() {
        let limit = LogRateLimit::default();
        let allowed = (0..20).filter(|_| limit.allow()).count();
        assert_eq!(allowed, DEFAULT_BURST as usize);
    }
}
