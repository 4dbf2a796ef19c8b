//! In-memory batch buffer with size and age flush triggers.
//!
//! The accumulator never performs I/O. A flush hands the buffered events to
//! the caller, which owns them until they are durably written.

use std::time::Duration;

use eddy_events::EventRecord;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The buffer reached the maximum batch size.
    Size,
    /// The maximum batch age elapsed since the last flush.
    Age,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    Hold,
    Flush(FlushTrigger),
}

#[derive(Debug)]
pub struct BatchAccumulator {
    max_size: usize,
    max_age: Duration,
    buffer: Vec<EventRecord>,
    last_flush: Instant,
}

impl BatchAccumulator {
    /// Creates an empty accumulator whose age clock starts at `now`.
    pub fn new(max_size: usize, max_age: Duration, now: Instant) -> Self {
        Self {
            max_size: max_size.max(1),
            max_age,
            buffer: Vec::with_capacity(max_size),
            last_flush: now,
        }
    }

    /// Buffers `event` and evaluates both flush triggers.
    pub fn absorb(&mut self, event: EventRecord, now: Instant) -> FlushDecision {
        self.buffer.push(event);

        if self.buffer.len() >= self.max_size {
            return FlushDecision::Flush(FlushTrigger::Size);
        }

        self.tick(now)
    }

    /// Evaluates the age trigger. An empty buffer never needs a flush.
    pub fn tick(&self, now: Instant) -> FlushDecision {
        if !self.buffer.is_empty() && now >= self.deadline() {
            FlushDecision::Flush(FlushTrigger::Age)
        } else {
            FlushDecision::Hold
        }
    }

    /// Takes the buffered events and restarts the age clock.
    pub fn flush(&mut self, now: Instant) -> Vec<EventRecord> {
        self.last_flush = now;
        std::mem::replace(&mut self.buffer, Vec::with_capacity(self.max_size))
    }

    /// Takes whatever is buffered, possibly nothing.
    pub fn drain(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.buffer)
    }

    /// Puts a flushed batch back in front of the buffer.
    ///
    /// Used when a write is abandoned so the events are not lost.
    pub fn restore(&mut self, mut events: Vec<EventRecord>) {
        events.append(&mut self.buffer);
        self.buffer = events;
    }

    /// Instant at which the age trigger fires.
    pub fn deadline(&self) -> Instant {
        self.last_flush + self.max_age
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use eddy_events::normalize_at;

    use super::*;

    fn event(user: usize) -> EventRecord {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let raw = format!(r#"{{"user_id": "u{user}"}}"#);
        normalize_at(raw.as_bytes(), now).unwrap()
    }

    fn accumulator(max_size: usize, start: Instant) -> BatchAccumulator {
        BatchAccumulator::new(max_size, Duration::from_secs(10), start)
    }

    #[test]
    fn test_flushes_exactly_at_max_size() {
        let start = Instant::now();
        let mut acc = accumulator(3, start);

        assert_eq!(acc.absorb(event(0), start), FlushDecision::Hold);
        assert_eq!(acc.absorb(event(1), start), FlushDecision::Hold);
        assert_eq!(
            acc.absorb(event(2), start),
            FlushDecision::Flush(FlushTrigger::Size)
        );

        let batch = acc.flush(start);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].user_id, "u0");
        assert_eq!(batch[2].user_id, "u2");
        assert!(acc.is_empty());
    }

    #[test]
    fn test_age_trigger_on_tick() {
        let start = Instant::now();
        let mut acc = accumulator(100, start);

        assert_eq!(acc.absorb(event(0), start), FlushDecision::Hold);
        assert_eq!(
            acc.tick(start + Duration::from_secs(9)),
            FlushDecision::Hold
        );
        assert_eq!(
            acc.tick(start + Duration::from_secs(10)),
            FlushDecision::Flush(FlushTrigger::Age)
        );
    }

    #[test]
    fn test_age_trigger_on_absorb() {
        let start = Instant::now();
        let mut acc = accumulator(100, start);

        let late = start + Duration::from_secs(12);
        assert_eq!(
            acc.absorb(event(0), late),
            FlushDecision::Flush(FlushTrigger::Age)
        );
    }

    #[test]
    fn test_empty_buffer_never_flushes() {
        let start = Instant::now();
        let acc = accumulator(100, start);

        assert_eq!(
            acc.tick(start + Duration::from_secs(60)),
            FlushDecision::Hold
        );
    }

    #[test]
    fn test_flush_restarts_age_clock() {
        let start = Instant::now();
        let mut acc = accumulator(100, start);
        acc.absorb(event(0), start);

        let flushed_at = start + Duration::from_secs(10);
        acc.flush(flushed_at);
        assert_eq!(acc.deadline(), flushed_at + Duration::from_secs(10));

        acc.absorb(event(1), flushed_at + Duration::from_secs(5));
        assert_eq!(
            acc.tick(flushed_at + Duration::from_secs(5)),
            FlushDecision::Hold
        );
    }

    #[test]
    fn test_drain_keeps_age_clock() {
        let start = Instant::now();
        let mut acc = accumulator(100, start);

        assert!(acc.drain().is_empty());
        acc.absorb(event(0), start);
        acc.absorb(event(1), start);

        assert_eq!(acc.drain().len(), 2);
        assert!(acc.is_empty());
        assert_eq!(acc.deadline(), start + Duration::from_secs(10));
    }

    #[test]
    fn test_restore_keeps_order() {
        let start = Instant::now();
        let mut acc = accumulator(100, start);
        acc.absorb(event(0), start);
        acc.absorb(event(1), start);
        let batch = acc.flush(start);

        acc.absorb(event(2), start);
        acc.restore(batch);

        let users = acc
            .drain()
            .into_iter()
            .map(|e| e.user_id)
            .collect::<Vec<_>>();
        assert_eq!(users, vec!["u0", "u1", "u2"]);
    }
}
