//! Cosmetic progress for an in-flight restoration.
//!
//! The image API is a single request with no incremental progress, so the
//! value shown to the user is simulated:
//!
//! ```text
//!   0 ──(+1.5 / tick)──▶ 60 ──(+0.5 / tick)──▶ 98 ── hold ──▶ 100 ─(delay)─▶ 0
//!   start                                     pending   result   reveal
//! ```
//!
//! The 98 → 100 headroom is only closed by [`ProgressSimulator::finish`], i.e.
//! when the real result has arrived.
//!
//! The value is published on a [`tokio::sync::watch`] channel. The ticker
//! task is the only writer while it runs; `start`, `finish` and `reset` bump a
//! generation counter that the ticker checks under the channel's write lock,
//! so a tick racing with a stop can never land after it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

/// Step per tick below [`FAST_PHASE_END`].
pub const FAST_STEP: f32 = 1.5;
/// Step per tick from [`FAST_PHASE_END`] up to [`PENDING_CEILING`].
pub const SLOW_STEP: f32 = 0.5;
pub const FAST_PHASE_END: f32 = 60.0;
/// Highest value reachable while the request is still pending.
pub const PENDING_CEILING: f32 = 98.0;
pub const COMPLETE: f32 = 100.0;

/// One tick of the simulated curve.
pub fn next_progress(current: f32) -> f32 {
    if current >= PENDING_CEILING {
        return current;
    }
    let step = if current < FAST_PHASE_END {
        FAST_STEP
    } else {
        SLOW_STEP
    };
    (current + step).min(PENDING_CEILING)
}

/// Drives the simulated progress value for one workflow.
pub struct ProgressSimulator {
    tx: Arc<watch::Sender<f32>>,
    generation: Arc<AtomicU64>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    interval: Duration,
}

impl ProgressSimulator {
    pub fn new(interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(0.0);
        Self {
            tx: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
            ticker: Mutex::new(None),
            interval,
        }
    }

    /// Reset to 0 and start ticking. Must be called inside a tokio runtime.
    pub fn start(&self) {
        let mut slot = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        let my_gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(old) = slot.take() {
            old.abort();
        }
        self.tx.send_replace(0.0);

        let tx = Arc::clone(&self.tx);
        let generation = Arc::clone(&self.generation);
        let period = self.interval;
        *slot = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let mut reached_ceiling = false;
                tx.send_if_modified(|p| {
                    if generation.load(Ordering::SeqCst) != my_gen {
                        return false;
                    }
                    let next = next_progress(*p);
                    reached_ceiling = next >= PENDING_CEILING;
                    if next != *p {
                        *p = next;
                        true
                    } else {
                        false
                    }
                });
                if reached_ceiling || generation.load(Ordering::SeqCst) != my_gen {
                    break;
                }
            }
        }));
        debug!("Progress ticker started (generation {})", my_gen);
    }

    /// The real result is in: stop ticking and jump to 100.
    pub fn finish(&self) {
        self.stop_ticker();
        self.tx.send_replace(COMPLETE);
    }

    /// Leave Processing: stop ticking and drop back to 0.
    pub fn reset(&self) {
        self.stop_ticker();
        self.tx.send_replace(0.0);
    }

    pub fn current(&self) -> f32 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<f32> {
        self.tx.subscribe()
    }

    /// Progress updates as a stream, starting with the current value.
    pub fn stream(&self) -> WatchStream<f32> {
        WatchStream::new(self.subscribe())
    }

    /// Whether a ticker task is installed and not yet finished.
    pub fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    fn stop_ticker(&self) {
        let mut slot = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

impl Drop for ProgressSimulator {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_matches_reference_cadence() {
        let mut p = 0.0;
        for _ in 0..40 {
            p = next_progress(p);
        }
        assert_eq!(p, 60.0);
        for _ in 0..76 {
            p = next_progress(p);
        }
        assert_eq!(p, 98.0);
        assert_eq!(next_progress(p), 98.0);
    }

    #[test]
    fn curve_is_monotonic_and_capped() {
        let mut p = 0.0;
        for _ in 0..10_000 {
            let next = next_progress(p);
            assert!(next >= p);
            assert!(next <= PENDING_CEILING);
            p = next;
        }
        // Odd starting points still clamp to the ceiling.
        assert_eq!(next_progress(97.9), 98.0);
        assert_eq!(next_progress(99.0), 99.0);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_advance_then_hold_at_ceiling() {
        let sim = ProgressSimulator::new(Duration::from_millis(100));
        sim.start();
        assert_eq!(sim.current(), 0.0);

        tokio::time::sleep(Duration::from_millis(1_050)).await;
        assert_eq!(sim.current(), 15.0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(sim.current(), PENDING_CEILING);
        assert!(!sim.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn finish_then_reset_stops_ticker() {
        let sim = ProgressSimulator::new(Duration::from_millis(100));
        sim.start();
        tokio::time::sleep(Duration::from_millis(550)).await;
        assert!(sim.is_ticking());

        sim.finish();
        assert_eq!(sim.current(), COMPLETE);
        assert!(!sim.is_ticking());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sim.current(), COMPLETE, "no stale tick after finish");

        sim.reset();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sim.current(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_resets_to_zero() {
        let sim = ProgressSimulator::new(Duration::from_millis(100));
        sim.start();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(sim.current() > 0.0);

        sim.start();
        assert_eq!(sim.current(), 0.0);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(sim.current(), 1.5);
    }

    #[tokio::test(start_paused = true)]
    async fn ceiling_holds_at_fast_cadence() {
        let sim = ProgressSimulator::new(Duration::from_millis(7));
        let mut rx = sim.subscribe();
        let observed = tokio::spawn(async move {
            let mut values = Vec::new();
            while rx.changed().await.is_ok() {
                let v = *rx.borrow_and_update();
                values.push(v);
                if v >= COMPLETE {
                    break;
                }
            }
            values
        });

        sim.start();
        tokio::time::sleep(Duration::from_millis(7 * 40 + 3)).await;
        assert_eq!(sim.current(), FAST_PHASE_END);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(sim.current(), PENDING_CEILING);
        assert!(!sim.is_ticking());

        sim.finish();
        let values = observed.await.unwrap();
        let (last, pending) = values.split_last().unwrap();
        assert_eq!(*last, COMPLETE);
        assert!(!pending.is_empty());
        assert!(pending.iter().all(|v| *v <= PENDING_CEILING), "{pending:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_updates() {
        let sim = ProgressSimulator::new(Duration::from_millis(100));
        let mut rx = sim.subscribe();
        sim.start();
        rx.changed().await.unwrap();
        let seen = *rx.borrow_and_update();
        assert!(seen == 0.0 || seen == 1.5, "got {seen}");
        let v = *rx.wait_for(|p| *p >= 30.0).await.unwrap();
        assert!((30.0..=PENDING_CEILING).contains(&v), "got {v}");
    }
}
