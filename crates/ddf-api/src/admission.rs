//! Admission control: rejects new queries with `503` when the event
//! loop is lagging or too many queries are already in flight, per the
//! `CPU_THROTTLE`/`DB_THROTTLE` knobs.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How often the lag sampler wakes up to measure scheduling delay.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionRejection {
    CpuLag,
    QueueDepth,
}

#[derive(Clone)]
pub struct AdmissionControl {
    inner: Arc<Inner>,
}

struct Inner {
    cpu_threshold: Option<Duration>,
    queue_cap: Option<usize>,
    observed_lag_micros: AtomicU64,
    in_flight: AtomicUsize,
}

impl AdmissionControl {
    pub fn new(cpu_threshold: Option<Duration>, queue_cap: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cpu_threshold,
                queue_cap,
                observed_lag_micros: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    /// Spawn the periodic sampler that measures scheduling lag by timing
    /// how late a `sleep(SAMPLE_INTERVAL)` actually wakes up.
    pub fn spawn_sampler(&self) {
        let Some(_threshold) = self.inner.cpu_threshold else { return };
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let start = tokio::time::Instant::now();
                tokio::time::sleep(SAMPLE_INTERVAL).await;
                let elapsed = start.elapsed();
                let lag = elapsed.saturating_sub(SAMPLE_INTERVAL);
                inner.observed_lag_micros.store(lag.as_micros() as u64, Ordering::Relaxed);
            }
        });
    }

    /// Attempt to admit one query. On success, returns a guard that
    /// decrements the in-flight counter when dropped.
    pub fn try_admit(&self) -> Result<AdmissionGuard, AdmissionRejection> {
        if let Some(threshold) = self.inner.cpu_threshold {
            let lag = Duration::from_micros(self.inner.observed_lag_micros.load(Ordering::Relaxed));
            if lag > threshold {
                return Err(AdmissionRejection::CpuLag);
            }
        }

        if let Some(cap) = self.inner.queue_cap {
            let current = self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
            if current >= cap {
                self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
                return Err(AdmissionRejection::QueueDepth);
            }
        }

        Ok(AdmissionGuard { inner: Arc::clone(&self.inner) })
    }

    #[cfg(test)]
    fn set_observed_lag(&self, lag: Duration) {
        self.inner.observed_lag_micros.store(lag.as_micros() as u64, Ordering::Relaxed);
    }
}

/// Released on drop: returns the connection/query slot to the pool as
/// soon as a streaming query completes, fails, or is aborted.
pub struct AdmissionGuard {
    inner: Arc<Inner>,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        if self.inner.queue_cap.is_some() {
            self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_admission_always_admits() {
        let control = AdmissionControl::disabled();
        for _ in 0..100 {
            assert!(control.try_admit().is_ok());
        }
    }

    #[test]
    fn queue_depth_cap_rejects_past_limit() {
        let control = AdmissionControl::new(None, Some(2));
        let g1 = control.try_admit().unwrap();
        let g2 = control.try_admit().unwrap();
        assert_eq!(control.try_admit().unwrap_err(), AdmissionRejection::QueueDepth);
        drop(g1);
        assert!(control.try_admit().is_ok());
        drop(g2);
    }

    #[test]
    fn cpu_lag_above_threshold_rejects() {
        let control = AdmissionControl::new(Some(Duration::from_millis(10)), None);
        control.set_observed_lag(Duration::from_millis(50));
        assert_eq!(control.try_admit().unwrap_err(), AdmissionRejection::CpuLag);

        control.set_observed_lag(Duration::from_millis(1));
        assert!(control.try_admit().is_ok());
    }
}
