//! Pausable elapsed-time counter

use std::time::Duration;
use tokio::time::Instant;

/// Accumulates time spent between `start` and `stop` calls
///
/// Built on `tokio::time::Instant` so a paused test clock controls it.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    started: Option<Instant>,
    elapsed: Duration,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting. No-op when already running.
    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    /// Stop counting and bank the running interval. No-op when stopped.
    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed += started.elapsed();
        }
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Total counted time, including the running interval
    pub fn elapsed(&self) -> Duration {
        match self.started {
            Some(started) => self.elapsed + started.elapsed(),
            None => self.elapsed,
        }
    }

    /// Stop and zero the counter
    pub fn reset(&mut self) {
        self.started = None;
        self.elapsed = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counts_only_running_intervals() {
        let mut sw = Stopwatch::new();
        sw.start();
        tokio::time::advance(Duration::from_secs(10)).await;
        sw.stop();

        // Time while stopped is not counted
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(sw.elapsed(), Duration::from_secs(10));

        sw.start();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(sw.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_keeps_first_instant() {
        let mut sw = Stopwatch::new();
        sw.start();
        tokio::time::advance(Duration::from_secs(4)).await;
        sw.start();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(sw.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_zeroes_and_stops() {
        let mut sw = Stopwatch::new();
        sw.start();
        tokio::time::advance(Duration::from_secs(3)).await;
        sw.reset();
        assert!(!sw.is_running());
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(sw.elapsed(), Duration::ZERO);
    }
}
