//! Polling monitor and stability classification
//!
//! The monitor drives a [`DeviceSession`] on a fixed interval, forwarding
//! each sample to an optional [`BroadcastHub`] and [`LogSink`]. Waits are
//! raced against a [`CancellationToken`]; cancelling ends the loop at the
//! next check point with whatever was collected so far.

use super::broadcast::BroadcastHub;
use super::logger::LogSink;
use super::sample::Sample;
use super::session::DeviceSession;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling interval in ms
    pub interval_ms: u64,
    /// Default sampling duration in seconds
    pub duration_secs: u64,
    /// Reads per stability check
    pub stability_window: usize,
    /// Standard deviation below which readings count as stable
    pub stability_threshold: f64,
    /// Distance from the mean, in standard deviations, beyond which a sample is an outlier
    pub outlier_sigma: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            duration_secs: 10,
            stability_window: 5,
            stability_threshold: 0.5,
            outlier_sigma: 3.0,
        }
    }
}

impl MonitorConfig {
    /// Sampling interval
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Default sampling duration
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

/// Result of a stability check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityReport {
    /// Values that made it into the window
    pub values: Vec<f64>,
    /// Arithmetic mean, if any value was collected
    pub mean: Option<f64>,
    /// Population standard deviation, if any value was collected
    pub std_dev: Option<f64>,
    /// Threshold the deviation was compared against
    pub threshold: f64,
    /// Verdict
    pub stable: bool,
    /// Readings farther than the configured sigma from the mean
    #[serde(default)]
    pub outliers: Vec<Sample>,
}

/// Mean and population standard deviation
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Classify a window of values. An empty window is not stable.
pub fn assess_stability(values: &[f64], threshold: f64) -> StabilityReport {
    let stats = mean_std(values);
    StabilityReport {
        values: values.to_vec(),
        mean: stats.map(|(m, _)| m),
        std_dev: stats.map(|(_, s)| s),
        threshold,
        stable: stats.is_some_and(|(_, s)| s < threshold),
        outliers: Vec::new(),
    }
}

/// Samples farther than `sigma` standard deviations from the mean
pub fn find_outliers(samples: &[Sample], sigma: f64) -> Vec<Sample> {
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let Some((mean, std_dev)) = mean_std(&values) else {
        return Vec::new();
    };
    samples
        .iter()
        .filter(|s| (s.value - mean).abs() > sigma * std_dev)
        .copied()
        .collect()
}

/// Periodic sampler for one device
pub struct Monitor {
    device_id: String,
    session: Arc<DeviceSession>,
    hub: Option<Arc<BroadcastHub>>,
    log: Option<Arc<dyn LogSink>>,
    config: MonitorConfig,
}

impl Monitor {
    /// Create a monitor for `session`, published under `device_id`
    pub fn new(device_id: &str, session: Arc<DeviceSession>) -> Self {
        Self {
            device_id: device_id.to_string(),
            session,
            hub: None,
            log: None,
            config: MonitorConfig::default(),
        }
    }

    /// Forward samples to a broadcast hub
    #[must_use]
    pub fn with_hub(mut self, hub: Arc<BroadcastHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Append samples to a log sink
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = Some(log);
        self
    }

    /// Set configuration
    #[must_use]
    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Get configuration
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Device identifier
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Take one reading and forward it; `None` when the read failed
    async fn acquire(&self) -> Option<Sample> {
        match self.session.get_temperature().await {
            Ok(value) => {
                let sample = Sample::now(value);
                debug!(device = %self.device_id, value, "sample");
                if let Some(hub) = &self.hub {
                    hub.publish(&self.device_id, &sample);
                }
                if let Some(log) = &self.log {
                    log.append(&self.device_id, sample.timestamp, sample.value);
                }
                Some(sample)
            }
            Err(e) => {
                warn!(device = %self.device_id, error = %e, "read skipped");
                None
            }
        }
    }

    /// Sleep for `period`; false if cancelled first
    async fn wait(period: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(period) => true,
        }
    }

    /// Poll until `duration` elapses or `cancel` fires.
    ///
    /// Failed reads are skipped. Returns the samples collected, which is
    /// a partial sequence on cancellation.
    pub async fn sample(
        &self,
        duration: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Vec<Sample> {
        let mut samples = Vec::new();
        if duration.is_zero() {
            return samples;
        }

        info!(device = %self.device_id, ?duration, ?interval, "sampling started");
        let start = Instant::now();
        loop {
            if cancel.is_cancelled() {
                break;
            }
            if let Some(sample) = self.acquire().await {
                samples.push(sample);
            }

            let elapsed = start.elapsed();
            if elapsed >= duration {
                break;
            }
            let period = interval.min(duration - elapsed);
            if !Self::wait(period, cancel).await {
                break;
            }
            if start.elapsed() >= duration {
                break;
            }
        }

        info!(
            device = %self.device_id,
            count = samples.len(),
            cancelled = cancel.is_cancelled(),
            "sampling finished"
        );
        samples
    }

    /// Sample with the configured duration and interval
    pub async fn sample_default(&self, cancel: &CancellationToken) -> Vec<Sample> {
        self.sample(self.config.duration(), self.config.interval(), cancel)
            .await
    }

    /// Take `window` reads `interval` apart and classify their spread.
    ///
    /// Skipped reads still consume their tick, so the window may hold fewer
    /// than `window` values.
    pub async fn check_stability(
        &self,
        window: usize,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> StabilityReport {
        let mut samples = Vec::with_capacity(window);
        for tick in 0..window {
            if cancel.is_cancelled() {
                break;
            }
            if let Some(sample) = self.acquire().await {
                samples.push(sample);
            }
            if tick + 1 < window && !Self::wait(interval, cancel).await {
                break;
            }
        }

        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let mut report = assess_stability(&values, self.config.stability_threshold);
        report.outliers = find_outliers(&samples, self.config.outlier_sigma);
        info!(
            device = %self.device_id,
            collected = values.len(),
            std_dev = ?report.std_dev,
            stable = report.stable,
            outliers = report.outliers.len(),
            "stability check"
        );
        report
    }

    /// Stability check with the configured window and interval
    pub async fn check_stability_default(&self, cancel: &CancellationToken) -> StabilityReport {
        self.check_stability(self.config.stability_window, self.config.interval(), cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::MockCommandChannel;
    use crate::core::logger::MemoryLog;
    use crate::core::simulator::SimulatorConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Session whose `TEMP?` answers cycle through `replies`
    async fn scripted(replies: &'static [&'static str]) -> Arc<DeviceSession> {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut mock = MockCommandChannel::new();
        mock.expect_open().returning(|| Ok(()));
        mock.expect_close().returning(|| ());
        mock.expect_connection_info().returning(|| "script".to_string());
        mock.expect_write().returning(|_| Ok(()));
        mock.expect_read().returning(move || {
            let i = counter.fetch_add(1, Ordering::SeqCst);
            Ok(replies[i % replies.len()].to_string())
        });
        let session = Arc::new(DeviceSession::new("dev1", mock));
        session.connect().await.unwrap();
        session
    }

    #[test]
    fn test_identical_values_stable() {
        let report = assess_stability(&[21.0; 5], 0.5);
        assert!(report.stable);
        assert_eq!(report.mean, Some(21.0));
        assert_eq!(report.std_dev, Some(0.0));
    }

    #[test]
    fn test_alternating_values_unstable() {
        let report = assess_stability(&[20.0, 25.0, 20.0, 25.0, 20.0], 0.5);
        assert!(!report.stable);
    }

    #[test]
    fn test_empty_window_unstable() {
        let report = assess_stability(&[], 0.5);
        assert!(!report.stable);
        assert_eq!(report.mean, None);
    }

    #[test]
    fn test_threshold_is_strict() {
        // population std of [0, 1] is exactly 0.5
        assert!(!assess_stability(&[0.0, 1.0], 0.5).stable);
    }

    #[test]
    fn test_find_outliers() {
        let mut samples: Vec<Sample> = (0..20).map(|_| Sample::now(20.0)).collect();
        samples.push(Sample::now(80.0));
        let outliers = find_outliers(&samples, 3.0);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].value, 80.0);
        assert!(find_outliers(&[], 3.0).is_empty());
    }

    #[tokio::test]
    async fn test_stability_reports_outliers() {
        static REPLIES: [&str; 10] = [
            "20.0", "20.0", "20.0", "20.0", "20.0", "20.0", "20.0", "20.0", "20.0", "80.0",
        ];
        let monitor = Monitor::new("dev1", scripted(&REPLIES).await).with_config(MonitorConfig {
            stability_window: 10,
            interval_ms: 1,
            outlier_sigma: 2.0,
            ..Default::default()
        });
        let report = monitor
            .check_stability_default(&CancellationToken::new())
            .await;

        assert!(!report.stable);
        assert_eq!(report.values.len(), 10);
        assert_eq!(report.outliers.len(), 1);
        assert_eq!(report.outliers[0].value, 80.0);
    }

    #[tokio::test]
    async fn test_zero_duration_returns_immediately() {
        let session = Arc::new(DeviceSession::new("dev1", MockCommandChannel::new()));
        let monitor = Monitor::new("dev1", session);
        let started = std::time::Instant::now();
        let samples = monitor
            .sample(Duration::ZERO, Duration::from_secs(5), &CancellationToken::new())
            .await;
        assert!(samples.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_sampling_collects_and_forwards() {
        let session = scripted(&["21.0", "21.1", "21.2"]).await;
        let hub = Arc::new(BroadcastHub::new());
        let log = Arc::new(MemoryLog::new(100));
        let mut sub = hub.subscribe_channel("dev1", 16);

        let monitor = Monitor::new("dev1", session)
            .with_hub(hub.clone())
            .with_log(log.clone());
        let samples = monitor
            .sample(
                Duration::from_millis(250),
                Duration::from_millis(100),
                &CancellationToken::new(),
            )
            .await;

        assert!((2..=4).contains(&samples.len()), "got {}", samples.len());
        assert_eq!(samples[0].value, 21.0);
        for sample in &samples {
            assert_eq!(sub.try_recv().unwrap(), *sample);
        }
        assert_eq!(log.len(), samples.len());
    }

    #[tokio::test]
    async fn test_failed_reads_skipped() {
        let session = scripted(&["ERROR: Unknown command", "22.0"]).await;
        let monitor = Monitor::new("dev1", session);
        let samples = monitor
            .sample(
                Duration::from_millis(180),
                Duration::from_millis(50),
                &CancellationToken::new(),
            )
            .await;
        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| s.value == 22.0));
    }

    #[tokio::test]
    async fn test_cancel_returns_partial() {
        let session = Arc::new(DeviceSession::simulated("dev1", &SimulatorConfig::default()));
        session.connect().await.unwrap();
        let monitor = Monitor::new("dev1", session);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let samples = monitor
            .sample(Duration::from_secs(30), Duration::from_millis(100), &cancel)
            .await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!((1..=3).contains(&samples.len()), "got {}", samples.len());
    }

    #[tokio::test]
    async fn test_stability_over_session() {
        let steady = Monitor::new("dev1", scripted(&["21.0"]).await);
        let report = steady
            .check_stability(5, Duration::from_millis(10), &CancellationToken::new())
            .await;
        assert_eq!(report.values.len(), 5);
        assert!(report.stable);

        let swinging = Monitor::new("dev1", scripted(&["20.0", "25.0"]).await);
        let report = swinging
            .check_stability(5, Duration::from_millis(10), &CancellationToken::new())
            .await;
        assert!(!report.stable);
    }

    #[tokio::test]
    async fn test_stability_skipped_reads_shrink_window() {
        let monitor = Monitor::new("dev1", scripted(&["21.0", "ERROR: busy"]).await);
        let report = monitor
            .check_stability(5, Duration::from_millis(10), &CancellationToken::new())
            .await;
        assert_eq!(report.values.len(), 3);
        assert!(report.stable);
    }

    #[tokio::test]
    async fn test_stability_no_values_not_stable() {
        let session = Arc::new(DeviceSession::new("dev1", MockCommandChannel::new()));
        let monitor = Monitor::new("dev1", session);
        let report = monitor
            .check_stability(3, Duration::from_millis(5), &CancellationToken::new())
            .await;
        assert!(report.values.is_empty());
        assert!(!report.stable);
    }

    #[tokio::test]
    async fn test_configured_threshold_used() {
        let config = MonitorConfig {
            stability_threshold: 10.0,
            ..Default::default()
        };
        let monitor = Monitor::new("dev1", scripted(&["20.0", "25.0"]).await).with_config(config);
        let report = monitor
            .check_stability(4, Duration::from_millis(5), &CancellationToken::new())
            .await;
        assert!(report.stable);
        assert_eq!(report.threshold, 10.0);
    }
}
