//! Concurrent collection of random bounded delays.
//!
//! A [`DelaySource`] produces one random bounded wait per call.  The [`DelayCollector`] launches
//! `n` of those waits at once, suspends until the slowest one finishes, and hands back every
//! sampled duration in ascending order.

use std::{convert::Infallible, future::Future, time::Duration};

use tracing::debug;

use crate::executor::Executor;
use crate::join::join_all;
use crate::time;

/// One random bounded wait per call: an implementation suspends the caller for a duration of its
/// choosing in `[0, max_delay]` seconds, then reports the duration it waited.
pub trait DelaySource {
    /// Failure raised by a wait.  Surfaced to collector callers unchanged.
    type Error;

    /// Suspends for a duration in `[0, max_delay]` seconds and returns that duration.
    fn wait_random(&self, max_delay: f64) -> impl Future<Output = Result<f64, Self::Error>>;
}

/// The default [`DelaySource`]: samples uniformly over `[0, max_delay]` with the process RNG and
/// suspends on the runtime's timer queue.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomDelaySource;

impl DelaySource for RandomDelaySource {
    type Error = Infallible;

    async fn wait_random(&self, max_delay: f64) -> Result<f64, Infallible> {
        use rand::Rng;

        let delay = rand::rng().random_range(0.0..=max_delay);

        // A sample too large for `Duration` is clamped rather than rejected.
        let wait = Duration::try_from_secs_f64(delay).unwrap_or(Duration::MAX);
        time::sleep(wait).await;

        Ok(delay)
    }
}

/// Error from collecting a batch of delays.
#[derive(Debug, thiserror::Error)]
pub enum CollectError<E> {
    /// The delay bound was negative or not finite.
    #[error("max_delay must be finite and non-negative, got {0}")]
    InvalidMaxDelay(f64),

    /// A wait failed; the source's error is surfaced unchanged.
    #[error(transparent)]
    Source(E),
}

/// Launches batches of concurrent waits against a [`DelaySource`] and returns the sampled
/// durations in ascending order.
pub struct DelayCollector<S> {
    source: S,
}

impl<S: DelaySource> DelayCollector<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Launches `n` concurrent waits bounded by `max_delay` seconds and returns every sampled
    /// duration, sorted ascending.
    ///
    /// The waits overlap in wall-clock time but all run on the calling task; the future suspends
    /// until the slowest wait finishes.  `n == 0` resolves immediately to an empty batch without
    /// consulting the source.  If any wait fails, the whole collection fails with that error and
    /// there are no partial results.
    ///
    /// `n` is unsigned, so the "negative count" failure mode of similar APIs cannot arise here.
    pub async fn collect(
        &self,
        n: usize,
        max_delay: f64,
    ) -> Result<Vec<f64>, CollectError<S::Error>> {
        check_max_delay(max_delay)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        debug!(n, max_delay, "collecting delay batch");

        let outcomes = join_all((0..n).map(|_| self.source.wait_random(max_delay))).await;
        let mut delays = outcomes
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(CollectError::Source)?;

        insertion_sort(&mut delays);

        Ok(delays)
    }

    /// Like [`collect`](Self::collect), but each wait runs as its own spawned executor task
    /// instead of inline on the calling task, and the results are gathered back through the
    /// tasks' join handles.
    ///
    /// A failed wait fails the collection; sibling tasks that are still sleeping stay spawned
    /// and finish detached.
    pub async fn collect_spawned<'e>(
        &self,
        executor: &Executor<'e>,
        n: usize,
        max_delay: f64,
    ) -> Result<Vec<f64>, CollectError<S::Error>>
    where
        S: Clone + 'e,
        S::Error: 'e,
    {
        check_max_delay(max_delay)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        debug!(n, max_delay, "collecting delay batch from spawned tasks");

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let source = self.source.clone();
                executor.spawn(async move { source.wait_random(max_delay).await })
            })
            .collect();

        let mut delays = Vec::with_capacity(n);
        for handle in handles {
            delays.push(handle.await.map_err(CollectError::Source)?);
        }

        insertion_sort(&mut delays);

        Ok(delays)
    }
}

fn check_max_delay<E>(max_delay: f64) -> Result<(), CollectError<E>> {
    if max_delay.is_finite() && max_delay >= 0.0 {
        Ok(())
    } else {
        Err(CollectError::InvalidMaxDelay(max_delay))
    }
}

/// In-place ascending insertion sort: each value shifts left past every larger value already
/// placed.  Valid sources never produce NaN, so `<` is a total order over the batch.
fn insertion_sort(values: &mut [f64]) {
    for end in 1..values.len() {
        let mut i = end;
        while i > 0 && values[i] < values[i - 1] {
            values.swap(i, i - 1);
            i -= 1;
        }
    }
}
