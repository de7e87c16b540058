//! Position acquisition.
//!
//! A [`LocationProvider`] answers one-shot queries and hands out a
//! [`PositionWatch`]: a lazy stream of fixes that ends once its
//! [`WatchCanceller`] fires or the watch is dropped.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use futures_util::task::AtomicWaker;
use geoshare_common::geo::offset;
use geoshare_common::LngLat;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{self, Instant, Sleep};

/// One position sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64, accuracy: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
        }
    }

    pub fn position(&self) -> LngLat {
        LngLat::new(self.longitude, self.latitude)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    Unavailable(String),
    #[error("no position within {0:?}")]
    Timeout(Duration),
}

/// Acquisition parameters handed to the provider.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    /// Oldest cached fix the provider may return. Zero means always fresh.
    pub maximum_age: Duration,
    /// How long a watch may go without a fix before reporting a timeout.
    pub timeout: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age: Duration::ZERO,
            timeout: Duration::from_millis(5000),
        }
    }
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self, options: &WatchOptions) -> Result<Fix, LocationError>;

    fn watch_position(&self, options: &WatchOptions) -> PositionWatch;
}

// ---------------------------------------------------------------------------
// PositionWatch
// ---------------------------------------------------------------------------

/// Cloneable handle that stops a [`PositionWatch`] from anywhere.
#[derive(Debug, Clone, Default)]
pub struct WatchCanceller {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    waker: AtomicWaker,
}

impl WatchCanceller {
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.waker.wake();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

/// Stream of fixes. Yields `Err(Timeout)` whenever `timeout` passes without a
/// fix, then keeps watching.
pub struct PositionWatch {
    fixes: BoxStream<'static, Result<Fix, LocationError>>,
    timeout: Duration,
    deadline: Pin<Box<Sleep>>,
    canceller: WatchCanceller,
}

impl PositionWatch {
    /// Must be called inside a Tokio runtime.
    pub fn new<S>(fixes: S, timeout: Duration) -> Self
    where
        S: Stream<Item = Result<Fix, LocationError>> + Send + 'static,
    {
        Self {
            fixes: fixes.boxed(),
            timeout,
            deadline: Box::pin(time::sleep(timeout)),
            canceller: WatchCanceller::default(),
        }
    }

    pub fn canceller(&self) -> WatchCanceller {
        self.canceller.clone()
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }
}

impl Stream for PositionWatch {
    type Item = Result<Fix, LocationError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.canceller.is_cancelled() {
            return Poll::Ready(None);
        }
        self.canceller.inner.waker.register(cx.waker());
        if self.canceller.is_cancelled() {
            return Poll::Ready(None);
        }

        let next_deadline = Instant::now() + self.timeout;
        match self.fixes.poll_next_unpin(cx) {
            Poll::Ready(Some(item)) => {
                self.deadline.as_mut().reset(next_deadline);
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => match self.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    self.deadline.as_mut().reset(next_deadline);
                    Poll::Ready(Some(Err(LocationError::Timeout(self.timeout))))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        self.canceller.cancel();
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Random walk around a starting point. Stands in for a device sensor.
#[derive(Debug, Clone)]
pub struct SimulatedLocation {
    current: Arc<Mutex<LngLat>>,
    step_meters: f64,
    interval: Duration,
    accuracy: f64,
}

impl SimulatedLocation {
    pub fn new(start: LngLat, step_meters: f64, interval: Duration, accuracy: f64) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
            step_meters,
            interval,
            accuracy,
        }
    }

    fn here(&self) -> LngLat {
        *self.current.lock()
    }
}

#[async_trait]
impl LocationProvider for SimulatedLocation {
    async fn current_position(&self, _options: &WatchOptions) -> Result<Fix, LocationError> {
        let at = self.here();
        Ok(Fix::new(at.lat, at.lon, Some(self.accuracy)))
    }

    fn watch_position(&self, options: &WatchOptions) -> PositionWatch {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let state = (ticker, StdRng::from_entropy(), self.clone());

        let fixes = stream::unfold(state, |(mut ticker, mut rng, sim)| async move {
            ticker.tick().await;
            let theta = rng.gen_range(0.0..std::f64::consts::TAU);
            let jitter = rng.gen_range(0.5..1.5);
            let next = {
                let mut current = sim.current.lock();
                *current = offset(*current, sim.step_meters, theta);
                *current
            };
            let fix = Fix::new(next.lat, next.lon, Some(sim.accuracy * jitter));
            Some((Ok(fix), (ticker, rng, sim)))
        });

        PositionWatch::new(fixes, options.timeout)
    }
}

/// Provider driven by explicit updates. Each watcher sees the current value
/// first, then every later change.
#[derive(Debug, Clone)]
pub struct ManualLocation {
    tx: Arc<watch::Sender<Result<Fix, LocationError>>>,
}

impl ManualLocation {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Err(LocationError::Unavailable("no fix yet".into())));
        Self { tx: Arc::new(tx) }
    }

    pub fn starting_at(fix: Fix) -> Self {
        let location = Self::new();
        location.set(fix);
        location
    }

    pub fn set(&self, fix: Fix) {
        let _previous = self.tx.send_replace(Ok(fix));
    }

    pub fn fail(&self, error: LocationError) {
        let _previous = self.tx.send_replace(Err(error));
    }
}

impl Default for ManualLocation {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationProvider for ManualLocation {
    async fn current_position(&self, _options: &WatchOptions) -> Result<Fix, LocationError> {
        self.tx.borrow().clone()
    }

    fn watch_position(&self, options: &WatchOptions) -> PositionWatch {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        let fixes = stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let value = rx.borrow_and_update().clone();
            Some((value, rx))
        });
        PositionWatch::new(fixes, options.timeout)
    }
}
