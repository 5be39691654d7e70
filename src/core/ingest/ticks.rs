//! Drift-corrected tick arithmetic.

use std::time::Duration;

use tokio::time::Instant;

/// The next firing time strictly after `now` on the grid `start + k * period`.
///
/// Missed ticks are skipped, never replayed: however late the loop wakes,
/// the result is the next grid point in the future.
#[must_use]
pub fn next_tick(start: Instant, period: Duration, now: Instant) -> Instant {
    if now < start {
        return start;
    }
    let elapsed = now.duration_since(start);
    let k = elapsed.as_nanos() / period.as_nanos().max(1) + 1;
    start + period * (k as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_on_the_grid() {
        let start = Instant::now();
        let period = Duration::from_secs(10);

        let t1 = next_tick(start, period, start);
        assert_eq!(t1, start + Duration::from_secs(10));

        let t2 = next_tick(start, period, t1);
        assert_eq!(t2, start + Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn skips_missed_ticks_instead_of_catching_up() {
        let start = Instant::now();
        let period = Duration::from_secs(10);

        // The loop wakes 37 seconds in; ticks at 10, 20, 30 are gone.
        let late = start + Duration::from_secs(37);
        assert_eq!(next_tick(start, period, late), start + Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn mid_interval_progress_does_not_drift() {
        let start = Instant::now();
        let period = Duration::from_secs(10);

        // Work finished 3 seconds into the interval; the grid holds.
        let now = start + Duration::from_secs(13);
        assert_eq!(next_tick(start, period, now), start + Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn before_start_fires_at_start() {
        let start = Instant::now() + Duration::from_secs(5);
        assert_eq!(next_tick(start, Duration::from_secs(10), Instant::now()), start);
    }
}
