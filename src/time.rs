use std::{
    future::Future,
    io,
    pin::Pin,
    task::{Context, Poll},
    time::{Duration, Instant},
};

use crate::reactor;

/// Future returned by [`sleep`].  Arms a one-shot kernel timer with the reactor the first time
/// it polls pending; later polls only refresh the parked waker, so a task that is woken early by
/// a sibling future does not re-arm anything.
pub struct Sleep {
    deadline: Instant,
    timer_key: Option<usize>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if Instant::now() >= self.deadline {
            if let Some(key) = self.timer_key.take() {
                reactor::REACTOR.with_borrow_mut(|r| r.remove_timer(key));
            }

            return Poll::Ready(());
        }

        reactor::REACTOR
            .with_borrow_mut(|r| -> io::Result<()> {
                match self.timer_key {
                    Some(key) => {
                        r.refresh_waker(key, cx.waker().clone());
                        Ok(())
                    }
                    None => {
                        let key = r.next_key();
                        let remaining = self.deadline.saturating_duration_since(Instant::now());
                        r.register_timer(key, remaining, cx.waker().clone())?;
                        self.timer_key = Some(key);
                        Ok(())
                    }
                }
            })
            .expect("could not arm timer with the OS timer queue");

        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        // An abandoned sleep must not keep holding a kernel timer.  The reactor may already be
        // gone if we are dropped during thread teardown.
        if let Some(key) = self.timer_key.take() {
            let _ = reactor::REACTOR.try_with(|r| r.borrow_mut().remove_timer(key));
        }
    }
}

/// Suspends the calling task for `duration`.
pub fn sleep(duration: Duration) -> Sleep {
    // A duration too large to be representable as a deadline is clamped to roughly thirty
    // years out.
    let deadline = Instant::now()
        .checked_add(duration)
        .unwrap_or_else(|| Instant::now() + Duration::from_secs(60 * 60 * 24 * 365 * 30));

    Sleep {
        deadline,
        timer_key: None,
    }
}

/// Runs `future` to completion and reports its output along with the wall-clock time it took.
pub async fn timed<F: Future>(future: F) -> (F::Output, Duration) {
    let start = Instant::now();
    let output = future.await;

    (output, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::{sleep, timed};
    use crate::executor::Executor;
    use crate::join::join_all;
    use std::time::{Duration, Instant};

    #[test]
    fn sleep_waits_for_roughly_the_requested_duration() {
        let executor = Executor::new();

        let now = Instant::now();
        executor.block_on(sleep(Duration::from_millis(50)));

        assert!(now.elapsed().as_millis() > 49);
    }

    #[test]
    fn zero_duration_sleep_completes_on_first_poll() {
        let executor = Executor::new();
        executor.block_on(sleep(Duration::ZERO));
    }

    #[test]
    fn concurrent_sleeps_overlap_instead_of_serializing() {
        let executor = Executor::new();

        let ((), elapsed) = executor.block_on(timed(async {
            join_all([
                sleep(Duration::from_millis(10)),
                sleep(Duration::from_millis(50)),
                sleep(Duration::from_millis(20)),
            ])
            .await;
        }));

        // All three waits overlap, so total wall time tracks the slowest one (50ms), not the
        // 80ms sum.
        assert!(elapsed.as_millis() > 49);
        assert!(elapsed.as_millis() < 80);
    }

    #[test]
    fn timed_reports_output_and_elapsed() {
        let executor = Executor::new();

        let (value, elapsed) = executor.block_on(timed(async {
            sleep(Duration::from_millis(10)).await;
            "done"
        }));

        assert_eq!(value, "done");
        assert!(elapsed.as_millis() > 9);
    }
}
