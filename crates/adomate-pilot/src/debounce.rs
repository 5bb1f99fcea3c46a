//! Debounced aggregation of child output into settled screens.
//!
//! The game redraws a screen with many small writes. Matching triggers on
//! each write would see half-drawn frames, so output is accumulated here
//! and only released once the child has been quiet for the debounce
//! interval. Each byte is released exactly once.

use std::time::{Duration, Instant};

/// Accumulates raw child output and releases it after a quiet interval.
#[derive(Debug)]
pub struct Debouncer {
    interval: Duration,
    buffer: Vec<u8>,
    last_activity: Instant,
}

impl Debouncer {
    /// Create an empty debouncer with the given quiet interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            buffer: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    /// Append a chunk of child output and restart the quiet interval.
    pub fn push(&mut self, chunk: &[u8], now: Instant) {
        self.buffer.extend_from_slice(chunk);
        self.last_activity = now;
    }

    /// Release the buffered text if it is non-empty and the child has been
    /// quiet for longer than the interval.
    ///
    /// The buffer is left empty after a release. Invalid UTF-8 is replaced
    /// rather than rejected.
    pub fn poll_expiry(&mut self, now: Instant) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        if now.saturating_duration_since(self.last_activity) <= self.interval {
            return None;
        }
        Some(self.take())
    }

    /// Release whatever is buffered regardless of timing.
    pub fn take(&mut self) -> String {
        let raw = std::mem::take(&mut self.buffer);
        match String::from_utf8(raw) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }

    /// Whether output is waiting for the quiet interval.
    pub fn is_pending(&self) -> bool {
        !self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(50);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn empty_buffer_never_flushes() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(INTERVAL);
        assert_eq!(debouncer.poll_expiry(start + ms(500)), None);
    }

    #[test]
    fn holds_output_within_interval() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(INTERVAL);
        debouncer.push(b"You see", start);
        assert_eq!(debouncer.poll_expiry(start + ms(10)), None);
        assert_eq!(debouncer.poll_expiry(start + INTERVAL), None);
        assert!(debouncer.is_pending());
    }

    #[test]
    fn close_chunks_flush_once_in_order() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(INTERVAL);
        debouncer.push(b"You ", start);
        debouncer.push(b"see ", start + ms(20));
        debouncer.push(b"a pool.", start + ms(40));
        assert_eq!(debouncer.poll_expiry(start + ms(80)), None);

        assert_eq!(
            debouncer.poll_expiry(start + ms(91)),
            Some("You see a pool.".to_string())
        );
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll_expiry(start + ms(500)), None);
    }

    #[test]
    fn gap_splits_into_separate_flushes() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(INTERVAL);
        let mut flushes = Vec::new();

        // Two bursts separated by a 200ms gap, polled every 10ms.
        let chunks: [(u64, &[u8]); 4] = [(0, b"a"), (30, b"b"), (230, b"c"), (260, b"d")];
        let mut next = 0;
        for t in (0..=500).step_by(10) {
            let now = start + ms(t);
            while next < chunks.len() && chunks[next].0 == t {
                debouncer.push(chunks[next].1, now);
                next += 1;
            }
            if let Some(text) = debouncer.poll_expiry(now) {
                flushes.push(text);
            }
        }

        assert_eq!(flushes, vec!["ab".to_string(), "cd".to_string()]);
    }

    #[test]
    fn split_utf8_is_reassembled() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(INTERVAL);
        let bytes = "\u{2500}".as_bytes();
        debouncer.push(&bytes[..1], start);
        debouncer.push(&bytes[1..], start);
        assert_eq!(debouncer.poll_expiry(start + ms(60)), Some("\u{2500}".into()));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(INTERVAL);
        debouncer.push(b"ok\xff", start);
        assert_eq!(debouncer.poll_expiry(start + ms(60)), Some("ok\u{fffd}".into()));
    }

    #[test]
    fn take_releases_immediately() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(INTERVAL);
        debouncer.push(b"tail", start);
        assert_eq!(debouncer.take(), "tail");
        assert!(!debouncer.is_pending());
    }
}
