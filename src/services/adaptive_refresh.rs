//! Adaptive refresh interval
//!
//! Recommends how long to wait before the next poll from the recent segment
//! success rates: stable streams are polled less often, unstable ones more.

use std::time::Duration;

use crate::config::RefreshConfig;
use crate::config::defaults::{DEFAULT_SLOWDOWN_FACTOR, DEFAULT_SPEEDUP_FACTOR};
use crate::services::history_buffer::HistoryBuffer;

#[derive(Debug, Clone)]
pub struct AdaptiveRefresh {
    success_history: HistoryBuffer<f64>,
    base_interval: Duration,
    min_interval: Duration,
    max_interval: Duration,
    sample_window: usize,
    stable_threshold: f64,
    unstable_threshold: f64,
}

impl Default for AdaptiveRefresh {
    fn default() -> Self {
        Self::new(&RefreshConfig::default())
    }
}

impl AdaptiveRefresh {
    pub fn new(config: &RefreshConfig) -> Self {
        Self {
            success_history: HistoryBuffer::new(config.history_capacity),
            base_interval: config.base_interval,
            min_interval: config.min_interval,
            max_interval: config.max_interval,
            sample_window: config.sample_window.max(1),
            stable_threshold: config.stable_threshold,
            unstable_threshold: config.unstable_threshold,
        }
    }

    /// Record one poll's success rate, in percent
    pub fn record(&mut self, success_rate: f64) {
        self.success_history.push(success_rate);
    }

    pub fn samples(&self) -> usize {
        self.success_history.len()
    }

    /// Interval to wait before the next poll
    pub fn recommend(&self) -> Duration {
        let recent = self.success_history.get_recent(self.sample_window);
        if recent.is_empty() {
            return self.base_interval;
        }

        let mean = recent.iter().sum::<f64>() / recent.len() as f64;
        if mean > self.stable_threshold {
            self.base_interval
                .mul_f64(DEFAULT_SLOWDOWN_FACTOR)
                .min(self.max_interval)
        } else if mean < self.unstable_threshold {
            self.base_interval
                .mul_f64(DEFAULT_SPEEDUP_FACTOR)
                .max(self.min_interval)
        } else {
            self.base_interval
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[], 10.0)]
    #[case(&[100.0, 100.0, 100.0], 15.0)]
    #[case(&[50.0, 60.0], 7.0)]
    #[case(&[90.0, 85.0], 10.0)]
    #[case(&[95.0], 10.0)]
    #[case(&[80.0], 10.0)]
    fn test_recommend_buckets(#[case] rates: &[f64], #[case] expected_secs: f64) {
        let mut refresh = AdaptiveRefresh::default();
        for rate in rates {
            refresh.record(*rate);
        }

        assert_eq!(refresh.recommend().as_secs_f64(), expected_secs);
    }

    #[rstest]
    #[case(100.0, 15.0)]
    #[case(50.0, 7.0)]
    #[case(88.0, 10.0)]
    fn test_full_window_of_equal_rates(#[case] rate: f64, #[case] expected_secs: f64) {
        let mut refresh = AdaptiveRefresh::default();
        for _ in 0..10 {
            refresh.record(rate);
        }

        assert_eq!(refresh.recommend().as_secs_f64(), expected_secs);
    }

    #[test]
    fn test_only_recent_window_counts() {
        let mut refresh = AdaptiveRefresh::default();
        for _ in 0..10 {
            refresh.record(0.0);
        }
        for _ in 0..10 {
            refresh.record(100.0);
        }

        assert_eq!(refresh.recommend(), Duration::from_secs(15));
    }

    #[test]
    fn test_bounds_clamp_recommendation() {
        let config = RefreshConfig {
            base_interval: Duration::from_secs(50),
            ..RefreshConfig::default()
        };
        let mut refresh = AdaptiveRefresh::new(&config);
        refresh.record(100.0);
        assert_eq!(refresh.recommend(), Duration::from_secs(60));

        let config = RefreshConfig {
            base_interval: Duration::from_secs(6),
            ..RefreshConfig::default()
        };
        let mut refresh = AdaptiveRefresh::new(&config);
        refresh.record(0.0);
        assert_eq!(refresh.recommend(), Duration::from_secs(5));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut refresh = AdaptiveRefresh::default();
        for _ in 0..25 {
            refresh.record(100.0);
        }
        assert_eq!(refresh.samples(), 20);
    }
}
