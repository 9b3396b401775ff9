//! Simulated progress. The numbers shown in the overlay are not derived from
//! any real transfer; they only keep the user company while the wait lasts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::DiagnosisTimings;
use crate::constants::diagnosis::PROGRESS_COMPLETE;

use super::state::SessionCell;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProgressCurve {
    /// Fixed step per tick
    Linear { step: f64 },
    /// Fast, then crawling, then frozen until the reply arrives
    Tiered {
        fast_ceiling: f64,
        slow_ceiling: f64,
        fast_max_step: f64,
        slow_max_step: f64,
    },
}

impl ProgressCurve {
    pub fn linear(timings: &DiagnosisTimings) -> Self {
        ProgressCurve::Linear {
            step: timings.simulated_step,
        }
    }

    pub fn tiered(timings: &DiagnosisTimings) -> Self {
        ProgressCurve::Tiered {
            fast_ceiling: timings.fast_tier_ceiling,
            slow_ceiling: timings.slow_tier_ceiling,
            fast_max_step: timings.fast_tier_max_step,
            slow_max_step: timings.slow_tier_max_step,
        }
    }

    /// Value after one tick, never above 100.
    pub fn next<R: Rng + ?Sized>(&self, current: f64, rng: &mut R) -> f64 {
        let next = match *self {
            ProgressCurve::Linear { step } => current + step,
            ProgressCurve::Tiered {
                fast_ceiling,
                slow_ceiling,
                fast_max_step,
                slow_max_step,
            } => {
                if current < fast_ceiling {
                    current + rng.gen::<f64>() * fast_max_step
                } else if current < slow_ceiling {
                    current + rng.gen::<f64>() * slow_max_step
                } else {
                    current
                }
            }
        };
        next.min(PROGRESS_COMPLETE)
    }
}

/// A spawned task that is aborted when stopped or dropped, so no exit path of
/// a diagnosis run can leave it ticking.
pub struct TaskGuard {
    handle: Option<JoinHandle<()>>,
}

impl TaskGuard {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(future)),
        }
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the task to finish on its own.
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            // A cancelled hand-off has nothing left to do
            let _ = handle.await;
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Tick `curve` into the session every `tick` until progress completes or
/// the attempt is superseded.
pub fn spawn_animator(cell: SessionCell, epoch: u64, curve: ProgressCurve, tick: Duration) -> TaskGuard {
    TaskGuard::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
        loop {
            interval.tick().await;
            match cell.bump_progress(epoch, |current| curve.next(current, &mut rng)) {
                Some(progress) if progress < PROGRESS_COMPLETE => {}
                _ => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::diagnosis::state::DiagnosisState;

    fn tiered() -> ProgressCurve {
        ProgressCurve::tiered(&DiagnosisTimings::default())
    }

    #[test]
    fn test_linear_curve_steps_and_caps() {
        let curve = ProgressCurve::Linear { step: 5.0 };
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(curve.next(0.0, &mut rng), 5.0);
        assert_eq!(curve.next(97.0, &mut rng), 100.0);
    }

    #[test]
    fn test_tiered_curve_bands() {
        let curve = tiered();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            let fast = curve.next(10.0, &mut rng);
            assert!((10.0..25.0).contains(&fast));

            let slow = curve.next(90.0, &mut rng);
            assert!((90.0..92.0).contains(&slow));

            assert_eq!(curve.next(95.0, &mut rng), 95.0);
            assert_eq!(curve.next(99.5, &mut rng), 99.5);
        }
    }

    #[test]
    fn test_tiered_curve_never_reaches_complete_by_itself() {
        let curve = tiered();
        let mut rng = StdRng::seed_from_u64(1);
        let mut progress = 0.0;
        for _ in 0..10_000 {
            let next = curve.next(progress, &mut rng);
            assert!(next >= progress);
            progress = next;
        }
        assert!(progress < 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_animator_reaches_complete_in_twenty_ticks() {
        let cell = SessionCell::new(EventBus::new(256));
        let epoch = cell.begin("7203").unwrap();
        let guard = spawn_animator(cell.clone(), epoch, ProgressCurve::Linear { step: 5.0 }, Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(1050)).await;
        assert_eq!(cell.snapshot().progress, 50.0);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(cell.snapshot().progress, 100.0);
        assert!(!guard.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_animator_leaves_progress_alone() {
        let cell = SessionCell::new(EventBus::new(256));
        let epoch = cell.begin("7203").unwrap();
        let mut guard = spawn_animator(cell.clone(), epoch, ProgressCurve::Linear { step: 5.0 }, Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(350)).await;
        guard.stop();
        let frozen = cell.snapshot().progress;
        assert_eq!(frozen, 15.0);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(cell.snapshot().progress, frozen);
        assert_eq!(cell.state(), DiagnosisState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_guard_aborts_task() {
        let cell = SessionCell::new(EventBus::new(256));
        let epoch = cell.begin("7203").unwrap();
        {
            let _guard = spawn_animator(cell.clone(), epoch, tiered(), Duration::from_millis(100));
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        let frozen = cell.snapshot().progress;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(cell.snapshot().progress, frozen);
    }
}
