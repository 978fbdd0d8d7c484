//! Sampling loop orchestrating the capture → average → correct → gate →
//! publish pipeline at a fixed cadence.
//!
//! The loop is the only owner of cross-tick state: which of the two loop
//! states it is in and the last color actually delivered to the controller.

use crate::capture::{FocusTracker, PixelSource};
use crate::color::{self, Rgb};
use crate::gamma::GammaCorrector;
use crate::gate::ChangeGate;
use crate::publisher::LightPublisher;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Loop state driven by window focus.
///
/// `Idle` when no window holds focus, `Sampling` otherwise. There is no
/// terminal state; the loop runs until the process is told to shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Idle,
    Sampling,
}

/// What a single tick did, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No window held focus; nothing was captured or published.
    Idle,
    /// A per-tick failure (focus query, capture, degenerate geometry)
    /// caused the tick to be skipped.
    Skipped,
    /// The corrected color stayed within the gate threshold of the last
    /// published color; nothing was sent.
    Suppressed(Rgb),
    /// The corrected color was delivered and recorded as published state.
    Published(Rgb),
    /// The gate passed but the controller could not be reached. The
    /// published state is left untouched so the next tick retries.
    PublishFailed(Rgb),
}

/// The fixed-cadence sampling loop.
pub struct SamplingLoop<W, P> {
    windows: W,
    publisher: P,
    corrector: GammaCorrector,
    gate: ChangeGate,
    scale_factor: u32,
    interval: Duration,
    state: LoopState,
    last_published: Rgb,
}

impl<W, P> SamplingLoop<W, P>
where
    W: FocusTracker + PixelSource,
    P: LightPublisher,
{
    /// Create a loop in the `Idle` state with a black published-color
    /// sentinel, so the first real color always clears the gate.
    pub fn new(
        windows: W,
        publisher: P,
        corrector: GammaCorrector,
        gate: ChangeGate,
        scale_factor: u32,
        interval: Duration,
    ) -> Self {
        Self {
            windows,
            publisher,
            corrector,
            gate,
            scale_factor,
            interval,
            state: LoopState::Idle,
            last_published: Rgb::BLACK,
        }
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The last color actually delivered to the controller.
    pub fn last_published(&self) -> Rgb {
        self.last_published
    }

    fn set_state(&mut self, next: LoopState) {
        if self.state != next {
            match next {
                LoopState::Sampling => info!("window focused, sampling"),
                LoopState::Idle => info!("no focused window, idling"),
            }
            self.state = next;
        }
    }

    /// Run one tick of the pipeline.
    ///
    /// Every failure mode is contained here: the tick is skipped with a log
    /// line and the loop carries on. Nothing propagates out.
    pub async fn tick(&mut self) -> TickOutcome {
        let window = match self.windows.current_focus() {
            Ok(Some(window)) => window,
            Ok(None) => {
                self.set_state(LoopState::Idle);
                return TickOutcome::Idle;
            }
            Err(e) => {
                warn!("focus query failed: {}", e);
                return TickOutcome::Skipped;
            }
        };
        self.set_state(LoopState::Sampling);

        let buffer = match self.windows.capture(&window) {
            Ok(buffer) => buffer,
            Err(e) => {
                // The window can vanish between the focus query and the
                // capture; that is a skipped tick, not a crash.
                warn!("capture of window 0x{:08x} failed: {}", window.id, e);
                return TickOutcome::Skipped;
            }
        };

        let averaged = match color::average(&buffer, self.scale_factor) {
            Ok(color) => color,
            Err(e) => {
                // Persistent for windows smaller than the stride, so keep
                // it out of the default log level.
                debug!("skipping tick: {}", e);
                return TickOutcome::Skipped;
            }
        };

        let corrected = self.corrector.correct(averaged);
        if !self.gate.should_publish(corrected, self.last_published) {
            return TickOutcome::Suppressed(corrected);
        }

        match self.publisher.publish(corrected).await {
            Ok(()) => {
                debug!("published color {}", corrected);
                self.last_published = corrected;
                TickOutcome::Published(corrected)
            }
            Err(e) => {
                warn!("publish failed, next change will retry: {}", e);
                TickOutcome::PublishFailed(corrected)
            }
        }
    }

    /// Run ticks at the fixed cadence until the shutdown flag flips.
    ///
    /// The sleep is unconditional: idle ticks and failed ticks wait just
    /// like successful ones, which rate-limits both the display server and
    /// the controller.
    pub async fn run(&mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            "sampling loop running at {:.1} Hz",
            1.0 / self.interval.as_secs_f64()
        );

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // A closed channel means no shutdown signal can ever
                    // arrive; stop rather than spin.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("sampling loop shutting down");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.tick().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FocusedWindow, PixelBuffer};
    use crate::error::{CaptureError, PublishError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Fake windowing surface producing a uniformly colored focused window.
    struct FakeWindows {
        focus: Arc<Mutex<Option<FocusedWindow>>>,
        color: Rgb,
        captures: Arc<AtomicUsize>,
    }

    impl FakeWindows {
        fn new(focus: Option<FocusedWindow>, color: Rgb) -> Self {
            Self {
                focus: Arc::new(Mutex::new(focus)),
                color,
                captures: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn focus_handle(&self) -> Arc<Mutex<Option<FocusedWindow>>> {
            Arc::clone(&self.focus)
        }

        fn capture_count(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.captures)
        }
    }

    impl FocusTracker for FakeWindows {
        fn current_focus(&self) -> Result<Option<FocusedWindow>, CaptureError> {
            Ok(*self.focus.lock().unwrap())
        }
    }

    impl PixelSource for FakeWindows {
        fn capture(&self, window: &FocusedWindow) -> Result<PixelBuffer, CaptureError> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            let pixels = vec![self.color; (window.width * window.height) as usize];
            Ok(PixelBuffer::from_rgb_pixels(window.width, window.height, &pixels))
        }
    }

    /// Publisher that records every delivered color and can be told to fail.
    struct RecordingPublisher {
        sent: Arc<Mutex<Vec<Rgb>>>,
        fail: Arc<AtomicBool>,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                fail: Arc::new(AtomicBool::new(false)),
            }
        }

        fn sent_handle(&self) -> Arc<Mutex<Vec<Rgb>>> {
            Arc::clone(&self.sent)
        }

        fn fail_handle(&self) -> Arc<AtomicBool> {
            Arc::clone(&self.fail)
        }
    }

    fn transport_error() -> PublishError {
        // An empty-host URL fails request construction synchronously,
        // yielding a real reqwest error without any network involvement.
        let source = reqwest::Client::new().get("http://").build().unwrap_err();
        PublishError::Transport {
            url: "http://".to_string(),
            source,
        }
    }

    #[async_trait]
    impl LightPublisher for RecordingPublisher {
        async fn publish(&self, rgb: Rgb) -> Result<(), PublishError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(transport_error());
            }
            self.sent.lock().unwrap().push(rgb);
            Ok(())
        }
    }

    fn focused(width: u32, height: u32) -> Option<FocusedWindow> {
        Some(FocusedWindow {
            id: 0x0040_0001,
            width,
            height,
        })
    }

    fn test_loop(
        windows: FakeWindows,
        publisher: RecordingPublisher,
    ) -> SamplingLoop<FakeWindows, RecordingPublisher> {
        SamplingLoop::new(
            windows,
            publisher,
            GammaCorrector::tabulated(1.8),
            ChangeGate::new(5),
            10,
            Duration::from_millis(33),
        )
    }

    #[tokio::test]
    async fn test_first_tick_publishes_corrected_color() {
        let screen_color = Rgb::new(200, 100, 50);
        let windows = FakeWindows::new(focused(64, 48), screen_color);
        let publisher = RecordingPublisher::new();
        let sent = publisher.sent_handle();
        let mut sampler = test_loop(windows, publisher);

        let expected = GammaCorrector::tabulated(1.8).correct(screen_color);
        assert_eq!(sampler.tick().await, TickOutcome::Published(expected));
        assert_eq!(sampler.last_published(), expected);
        assert_eq!(sampler.state(), LoopState::Sampling);
        assert_eq!(*sent.lock().unwrap(), vec![expected]);
    }

    #[tokio::test]
    async fn test_second_identical_tick_is_suppressed() {
        let windows = FakeWindows::new(focused(64, 48), Rgb::new(200, 100, 50));
        let publisher = RecordingPublisher::new();
        let sent = publisher.sent_handle();
        let mut sampler = test_loop(windows, publisher);

        let first = sampler.tick().await;
        let expected = match first {
            TickOutcome::Published(color) => color,
            other => panic!("first tick should publish, got {:?}", other),
        };

        assert_eq!(sampler.tick().await, TickOutcome::Suppressed(expected));
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unfocused_tick_neither_captures_nor_publishes() {
        let windows = FakeWindows::new(None, Rgb::new(200, 100, 50));
        let captures = windows.capture_count();
        let publisher = RecordingPublisher::new();
        let sent = publisher.sent_handle();
        let mut sampler = test_loop(windows, publisher);

        assert_eq!(sampler.tick().await, TickOutcome::Idle);
        assert_eq!(sampler.state(), LoopState::Idle);
        assert_eq!(captures.load(Ordering::SeqCst), 0);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_focus_changes_drive_state_transitions() {
        let windows = FakeWindows::new(None, Rgb::new(10, 20, 30));
        let focus = windows.focus_handle();
        let publisher = RecordingPublisher::new();
        let mut sampler = test_loop(windows, publisher);

        sampler.tick().await;
        assert_eq!(sampler.state(), LoopState::Idle);

        *focus.lock().unwrap() = focused(100, 100);
        sampler.tick().await;
        assert_eq!(sampler.state(), LoopState::Sampling);

        *focus.lock().unwrap() = None;
        sampler.tick().await;
        assert_eq!(sampler.state(), LoopState::Idle);
    }

    #[tokio::test]
    async fn test_degenerate_window_skips_tick() {
        // 5x5 window with stride 10 has an empty sampling grid.
        let windows = FakeWindows::new(focused(5, 5), Rgb::new(200, 100, 50));
        let publisher = RecordingPublisher::new();
        let sent = publisher.sent_handle();
        let mut sampler = test_loop(windows, publisher);

        assert_eq!(sampler.tick().await, TickOutcome::Skipped);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_publish_retries_on_next_tick() {
        let windows = FakeWindows::new(focused(64, 48), Rgb::new(200, 100, 50));
        let publisher = RecordingPublisher::new();
        let sent = publisher.sent_handle();
        let fail = publisher.fail_handle();
        let mut sampler = test_loop(windows, publisher);

        fail.store(true, Ordering::SeqCst);
        let outcome = sampler.tick().await;
        assert!(matches!(outcome, TickOutcome::PublishFailed(_)));
        // Published state is untouched, so the delta still exceeds the gate.
        assert_eq!(sampler.last_published(), Rgb::BLACK);

        fail.store(false, Ordering::SeqCst);
        let outcome = sampler.tick().await;
        assert!(matches!(outcome, TickOutcome::Published(_)));
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_small_color_drift_is_suppressed_until_threshold() {
        let windows = FakeWindows::new(focused(64, 48), Rgb::new(200, 200, 200));
        let publisher = RecordingPublisher::new();
        let mut sampler = test_loop(windows, publisher);

        let published = match sampler.tick().await {
            TickOutcome::Published(color) => color,
            other => panic!("expected publish, got {:?}", other),
        };

        // A corrected color within the threshold of the published one must
        // not pass the gate, regardless of which side it drifts to.
        let gate = ChangeGate::new(5);
        let drifted = Rgb::new(published.r.saturating_add(5), published.g, published.b);
        assert!(!gate.should_publish(drifted, sampler.last_published()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_shutdown() {
        let windows = FakeWindows::new(focused(64, 48), Rgb::new(200, 100, 50));
        let captures = windows.capture_count();
        let publisher = RecordingPublisher::new();
        let sent = publisher.sent_handle();
        let mut sampler = test_loop(windows, publisher);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = async {
            // Let a handful of 33ms ticks elapse on the paused clock.
            tokio::time::sleep(Duration::from_millis(200)).await;
            shutdown_tx.send(true).unwrap();
        };

        tokio::join!(sampler.run(shutdown_rx), driver);

        // Several ticks ran, but only the first one published.
        assert!(captures.load(Ordering::SeqCst) >= 2);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }
}
