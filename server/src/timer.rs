//! Phased round countdown
//!
//! A countdown never touches game state. It posts [`GameEvent::Timer`]
//! events into the engine queue, tagged with the round they belong to, and
//! the engine decides what they mean. Dropping a [`RoundTimer`] aborts the
//! pending task, so replacing the engine's handle cancels the old countdown.

use crate::game::GameEvent;
use log::{debug, error};
use shared::WARNING_SECONDS;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Phase change reported by a countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// `WARNING_SECONDS` remain
    Warning,
    /// Countdown finished
    Expired,
}

/// Splits a countdown into the segments it is armed in.
///
/// Longer countdowns get a warning segment followed by the final
/// `WARNING_SECONDS`; short ones expire in a single segment.
pub fn segments(seconds: u64) -> Vec<(Duration, TimerTick)> {
    if seconds > WARNING_SECONDS {
        vec![
            (
                Duration::from_secs(seconds - WARNING_SECONDS),
                TimerTick::Warning,
            ),
            (Duration::from_secs(WARNING_SECONDS), TimerTick::Expired),
        ]
    } else {
        vec![(Duration::from_secs(seconds), TimerTick::Expired)]
    }
}

/// Handle to one armed countdown
#[derive(Debug)]
pub struct RoundTimer {
    handle: JoinHandle<()>,
}

impl RoundTimer {
    /// Arms a countdown of `seconds` for `round`
    pub fn arm(seconds: u64, round: u64, events: mpsc::UnboundedSender<GameEvent>) -> Self {
        debug!("Arming {}s countdown for round {}", seconds, round);
        let handle = tokio::spawn(async move {
            for (delay, tick) in segments(seconds) {
                sleep(delay).await;
                if let Err(e) = events.send(GameEvent::Timer { round, tick }) {
                    error!("Failed to post timer event: {}", e);
                    return;
                }
            }
        });

        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_tick(event: Option<GameEvent>) -> (u64, TimerTick) {
        match event {
            Some(GameEvent::Timer { round, tick }) => (round, tick),
            other => panic!("Expected timer event, got {:?}", other),
        }
    }

    #[test]
    fn test_segments_with_warning() {
        let parts = segments(15);
        assert_eq!(
            parts,
            vec![
                (Duration::from_secs(10), TimerTick::Warning),
                (Duration::from_secs(5), TimerTick::Expired),
            ]
        );
    }

    #[test]
    fn test_segments_without_warning() {
        assert_eq!(segments(5), vec![(Duration::from_secs(5), TimerTick::Expired)]);
        assert_eq!(segments(0), vec![(Duration::from_secs(0), TimerTick::Expired)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_posts_warning_then_expiry() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _timer = RoundTimer::arm(15, 3, tx);

        sleep(Duration::from_millis(9_900)).await;
        assert!(rx.try_recv().is_err());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(expect_tick(rx.try_recv().ok()), (3, TimerTick::Warning));

        sleep(Duration::from_secs(5)).await;
        assert_eq!(expect_tick(rx.try_recv().ok()), (3, TimerTick::Expired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_countdown_has_no_warning() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _timer = RoundTimer::arm(3, 1, tx);

        assert_eq!(expect_tick(rx.recv().await), (1, TimerTick::Expired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_handle_cancels() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = RoundTimer::arm(2, 1, tx);
        drop(timer);

        sleep(Duration::from_secs(10)).await;
        // Aborted task dropped its sender without posting anything
        assert!(rx.recv().await.is_none());
    }
}
