//! In-process performance monitoring
//!
//! [`PerformanceMonitor`] keeps bounded windows of request latencies and
//! memory samples plus error and probe-cache counters. It is shared by the
//! probe adapter and the poll orchestrator and read through [`PerformanceMonitor::stats`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use sysinfo::System;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::HistoryConfig;
use crate::services::history_buffer::HistoryBuffer;

/// Read-only view of the monitor's counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    /// Seconds
    pub avg_request_time: f64,
    /// Seconds
    pub max_request_time: f64,
    /// Percent of system memory in use
    pub avg_memory_usage: f64,
    pub error_count: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// `hits / max(1, hits + misses) * 100`
    pub cache_hit_rate: f64,
}

pub struct PerformanceMonitor {
    request_times: Mutex<HistoryBuffer<f64>>,
    memory_usage: Mutex<HistoryBuffer<f64>>,
    error_count: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

impl PerformanceMonitor {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            request_times: Mutex::new(HistoryBuffer::new(config.request_time_capacity)),
            memory_usage: Mutex::new(HistoryBuffer::new(config.memory_sample_capacity)),
            error_count: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    /// Record how long an operation took, in seconds
    pub async fn record_request_time(&self, seconds: f64) {
        self.request_times.lock().await.push(seconds);
    }

    pub async fn record_memory_usage(&self, percent: f64) {
        self.memory_usage.lock().await.push(percent);
    }

    pub fn increment_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub async fn stats(&self) -> PerformanceStats {
        let request_times = self.request_times.lock().await.to_vec();
        let memory_usage = self.memory_usage.lock().await.to_vec();
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);

        PerformanceStats {
            avg_request_time: mean(&request_times),
            max_request_time: request_times.iter().copied().fold(0.0, f64::max),
            avg_memory_usage: mean(&memory_usage),
            error_count: self.error_count(),
            cache_hits,
            cache_misses,
            cache_hit_rate: cache_hits as f64 / (cache_hits + cache_misses).max(1) as f64 * 100.0,
        }
    }

    /// Sample system memory usage and record it
    pub async fn sample_memory(&self) -> f64 {
        let percent = system_memory_percent();
        debug!("System memory usage: {:.1}%", percent);
        self.record_memory_usage(percent).await;
        percent
    }
}

/// Percent of total system memory currently used
pub fn system_memory_percent() -> f64 {
    let mut sys = System::new();
    sys.refresh_memory();

    let total = sys.total_memory();
    if total == 0 {
        return 0.0;
    }
    sys.used_memory() as f64 / total as f64 * 100.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
