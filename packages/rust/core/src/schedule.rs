//! Publish-time assignment across the configured daily window.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use feedmill_shared::PublishWindow;

/// Windows narrower than one hour are widened to it.
fn min_window() -> Duration {
    Duration::hours(1)
}

/// Spreads a batch of records evenly across one day's publish window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishScheduler {
    start: DateTime<Utc>,
    width: Duration,
}

impl PublishScheduler {
    /// Window anchored to today's local date.
    pub fn today(window: PublishWindow) -> Self {
        Self::for_date(window, Local::now().date_naive())
    }

    /// Window anchored to `date`, with hours interpreted in local time.
    pub fn for_date(window: PublishWindow, date: NaiveDate) -> Self {
        let start = local_hour(date, window.start_hour);
        let end = local_hour(date, window.end_hour);
        Self::between(start, end)
    }

    /// Window between two explicit instants.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            width: (end - start).max(min_window()),
        }
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn window_end(&self) -> DateTime<Utc> {
        self.start + self.width
    }

    /// Timestamp for record `index` of a batch of `total`.
    ///
    /// Always inside `[window_start, window_end)` for `index < total`.
    pub fn schedule(&self, index: usize, total: usize) -> DateTime<Utc> {
        let total = total.max(1) as i128;
        let index = index as i128;
        let width_us = self.width.num_microseconds().unwrap_or(i64::MAX) as i128;
        let offset_us = width_us * index / total;
        self.start + Duration::microseconds(offset_us.min(i64::MAX as i128) as i64)
    }
}

fn local_hour(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    let naive = date
        .and_hms_opt(hour.min(23), 0, 0)
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN));
    match Local.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // The hour does not exist locally (DST gap).
        None => Utc.from_utc_datetime(&naive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start_hour: u32, end_hour: u32) -> PublishWindow {
        PublishWindow {
            start_hour,
            end_hour,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn stays_inside_window_and_never_decreases() {
        let scheduler = PublishScheduler::for_date(window(9, 23), date());
        for total in [1usize, 2, 5, 26, 1000] {
            let mut previous = None;
            for index in 0..total {
                let at = scheduler.schedule(index, total);
                assert!(at >= scheduler.window_start());
                assert!(at < scheduler.window_end());
                if let Some(prev) = previous {
                    assert!(at > prev, "index {index} of {total} not increasing");
                }
                previous = Some(at);
            }
        }
    }

    #[test]
    fn even_steps() {
        let start = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 10, 18, 23, 0, 0).unwrap();
        let scheduler = PublishScheduler::between(start, end);

        assert_eq!(scheduler.schedule(0, 2), start);
        assert_eq!(
            scheduler.schedule(1, 2),
            Utc.with_ymd_and_hms(2026, 10, 18, 16, 0, 0).unwrap()
        );
        assert_eq!(
            scheduler.schedule(1, 14),
            Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn narrow_or_inverted_window_is_one_hour() {
        for (s, e) in [(12, 12), (20, 8)] {
            let scheduler = PublishScheduler::for_date(window(s, e), date());
            assert_eq!(
                scheduler.window_end() - scheduler.window_start(),
                Duration::hours(1)
            );
        }
    }

    #[test]
    fn zero_total_is_treated_as_one() {
        let scheduler = PublishScheduler::for_date(window(9, 23), date());
        assert_eq!(scheduler.schedule(0, 0), scheduler.window_start());
    }

    #[test]
    fn anchored_to_local_hours() {
        let scheduler = PublishScheduler::for_date(window(9, 23), date());
        let local = scheduler.window_start().with_timezone(&Local);
        assert_eq!(local.date_naive(), date());
        assert_eq!(chrono::Timelike::hour(&local), 9);
    }
}
