//! Request and scoring statistics for the fraud scoring service.

use crate::types::PredictionResponse;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector shared by all request handlers
pub struct ServiceMetrics {
    /// Successfully scored requests
    pub requests_served: AtomicU64,
    /// Requests that failed (bad input or inference error)
    pub requests_failed: AtomicU64,
    /// Total rows scored
    pub rows_scored: AtomicU64,
    /// Rows flagged as fraud
    pub high_risk_rows: AtomicU64,
    /// Request processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Prediction distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_served: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            rows_scored: AtomicU64::new(0),
            high_risk_rows: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a scored batch
    pub fn record_batch(&self, processing_time: Duration, response: &PredictionResponse) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
        self.rows_scored
            .fetch_add(response.summary.total_transactions as u64, Ordering::Relaxed);
        self.high_risk_rows
            .fetch_add(response.summary.high_risk as u64, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if let Ok(mut buckets) = self.score_buckets.write() {
            for &score in &response.predictions {
                let bucket = ((score * 10.0) as usize).min(9);
                buckets[bucket] += 1;
            }
        }
    }

    /// Record a failed request
    pub fn record_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: sorted[count - 1],
        }
    }

    /// Rows scored per second since startup
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.rows_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Point-in-time view for the metrics endpoint
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            requests_served: self.requests_served.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            rows_scored: self.rows_scored.load(Ordering::Relaxed),
            high_risk_rows: self.high_risk_rows.load(Ordering::Relaxed),
            rows_per_sec: self.get_throughput(),
            processing: self.get_processing_stats(),
            score_distribution: self.get_score_distribution(),
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let flag_rate = if snapshot.rows_scored > 0 {
            (snapshot.high_risk_rows as f64 / snapshot.rows_scored as f64) * 100.0
        } else {
            0.0
        };
        let processing = &snapshot.processing;

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            FRAUD SCORING SERVICE - METRICS SUMMARY           ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests Served: {:>8}  │  Failed: {:>8}                 ║",
            snapshot.requests_served, snapshot.requests_failed
        );
        info!(
            "║ Rows Scored:     {:>8}  │  Throughput: {:>8.1} rows/s   ║",
            snapshot.rows_scored, snapshot.rows_per_sec
        );
        info!(
            "║ High Risk Rows:  {:>8}  │  Flag Rate: {:>6.1}%             ║",
            snapshot.high_risk_rows, flag_rate
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Request Time (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Prediction Distribution:                                     ║");
        let total: u64 = snapshot.score_distribution.iter().sum();
        for (i, &count) in snapshot.score_distribution.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar_len = (pct / 2.0) as usize;
            let bar: String = "█".repeat(bar_len.min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Serializable metrics view
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub requests_served: u64,
    pub requests_failed: u64,
    pub rows_scored: u64,
    pub high_risk_rows: u64,
    pub rows_per_sec: f64,
    pub processing: ProcessingStats,
    pub score_distribution: [u64; 10],
}

/// Periodic metrics reporter that logs summaries
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
