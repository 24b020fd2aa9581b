use chrono::{Duration, NaiveDateTime};

/// A simulation clock producing nominal tick timestamps.
///
/// Tick `n` is stamped `start + n * tick`. The clock is either bounded to a
/// fixed number of ticks (history backfill) or unbounded (live runs, where
/// the caller stops on interrupt).
///
/// # Examples
///
/// ```
/// use chrono::{Duration, NaiveDate};
/// use microgrid_sim::sim::clock::TickClock;
///
/// let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let mut clock = TickClock::bounded(start, Duration::seconds(5), 3);
/// let mut stamps = Vec::new();
///
/// clock.run(|_, at| stamps.push(at));
/// assert_eq!(stamps.len(), 3);
/// assert_eq!(stamps[2] - stamps[0], Duration::seconds(10));
/// ```
#[derive(Debug, Clone)]
pub struct TickClock {
    /// Timestamp of tick 0
    start: NaiveDateTime,
    /// Nominal tick length
    tick: Duration,
    /// Next tick index
    current: u64,
    /// Total ticks, `None` for an unbounded clock
    total: Option<u64>,
}

impl TickClock {
    /// Creates a clock that stops after `total` ticks.
    ///
    /// # Arguments
    ///
    /// * `start` - Timestamp of the first tick
    /// * `tick` - Nominal tick length
    /// * `total` - The total number of ticks the clock will run
    ///
    /// # Panics
    ///
    /// Panics if `tick` is not positive.
    pub fn bounded(start: NaiveDateTime, tick: Duration, total: u64) -> Self {
        assert!(tick > Duration::zero());
        Self {
            start,
            tick,
            current: 0,
            total: Some(total),
        }
    }

    /// Creates a clock that never runs out.
    ///
    /// # Panics
    ///
    /// Panics if `tick` is not positive.
    pub fn unbounded(start: NaiveDateTime, tick: Duration) -> Self {
        assert!(tick > Duration::zero());
        Self {
            start,
            tick,
            current: 0,
            total: None,
        }
    }

    /// Advances the clock by one tick.
    ///
    /// # Returns
    ///
    /// * `Some((index, timestamp))` - The tick before advancing
    /// * `None` - If a bounded clock has reached its total ticks, or the
    ///   next timestamp is not representable
    pub fn tick(&mut self) -> Option<(u64, NaiveDateTime)> {
        if self.total.is_some_and(|total| self.current >= total) {
            return None;
        }
        let index = self.current;
        let at = i32::try_from(index)
            .ok()
            .and_then(|i| self.tick.checked_mul(i))
            .and_then(|offset| self.start.checked_add_signed(offset))?;
        self.current += 1;
        Some((index, at))
    }

    /// Runs a function for each remaining tick.
    ///
    /// On an unbounded clock this only returns if the timestamp arithmetic
    /// overflows, so live loops drive [`TickClock::tick`] themselves.
    pub fn run(&mut self, mut f: impl FnMut(u64, NaiveDateTime)) {
        while let Some((index, at)) = self.tick() {
            f(index, at);
        }
    }

    /// Nominal tick length.
    pub fn tick_length(&self) -> Duration {
        self.tick
    }
}

/// Keeps wall-clock timestamps strictly increasing.
///
/// Readings are keyed by timestamp, so a clock that stalls or steps
/// backwards would make distinct readings collide. When `now` does not
/// move past the previous stamp, the previous stamp plus one microsecond
/// is used instead.
#[derive(Debug, Clone, Default)]
pub struct MonotonicStamp {
    last: Option<NaiveDateTime>,
}

impl MonotonicStamp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a timestamp strictly after every one returned before.
    pub fn next(&mut self, now: NaiveDateTime) -> NaiveDateTime {
        let stamp = match self.last {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last = Some(stamp);
        stamp
    }
}
