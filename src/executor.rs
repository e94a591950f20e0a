use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use tracing::trace;

use crate::queue::TaskQueue;
use crate::reactor;
use crate::task::{JoinHandle, JoinState, Task};

/// Single-threaded executor.  Maintains a queue of runnable top-level tasks and polls whichever
/// ones are scheduled, in response to timer events from the reactor.  Tasks are responsible for
/// rescheduling themselves when their `Waker` is woken during `block_until_events`.
pub struct Executor<'a> {
    queue: TaskQueue<Arc<Task<'a>>>,
}

impl<'a> Default for Executor<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Executor<'a> {
    /// Creates a new executor with an empty task queue.
    pub fn new() -> Self {
        Self {
            queue: TaskQueue::new(),
        }
    }

    /// Spawns `future` as a new top-level task, returning a handle that resolves to its output.
    /// Dropping the handle detaches the task.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'a,
        F::Output: 'a,
    {
        trace!("spawning task");

        let handle = JoinHandle::new();
        let state = handle.state();

        Task::spawn(
            async move {
                let value = future.await;
                JoinState::complete(&state, value);
            },
            &self.queue,
        );

        handle
    }

    /// Runs `future` to completion on the current thread and returns its output, driving any
    /// other spawned tasks in the meantime.
    ///
    /// Panics if `future` goes to sleep while no tasks are runnable and no timers are armed,
    /// since nothing could ever wake it again.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        let mut future = pin!(future);
        let main = Arc::new(MainTask {
            ready: AtomicBool::new(true),
        });
        let waker = Waker::from(main.clone());
        let mut context = Context::from_waker(&waker);

        loop {
            // Make progress on the main future whenever something has woken it:
            if main.ready.swap(false, Ordering::AcqRel) {
                if let Poll::Ready(output) = future.as_mut().poll(&mut context) {
                    return output;
                }
            }

            // Then on every other task that is scheduled.  These may complete join handles the
            // main future is waiting on, which marks it ready again:
            while let Some(task) = self.queue.pop() {
                task.poll();
            }

            if main.ready.load(Ordering::Acquire) {
                continue;
            }

            // Nothing is runnable, so block until at least one timer we care about fires:
            reactor::REACTOR
                .with_borrow_mut(|r| r.block_until_events())
                .expect("i/o error while waiting for timer events");

            // If blocking for events left us with nothing runnable either, no amount of waiting
            // will ever produce more work:
            if !main.ready.load(Ordering::Acquire) && self.queue.is_empty() {
                panic!("`block_on` future stalled: no runnable tasks and no armed timers");
            }
        }
    }

    /// Drives every spawned task to completion.  Returns once the task queue stays empty and no
    /// timers remain armed.
    pub fn run_until_idle(&self) {
        loop {
            // Make progress on everything that we can:
            while let Some(task) = self.queue.pop() {
                task.poll();
            }

            // Then block until we have at least one event that we care about:
            reactor::REACTOR
                .with_borrow_mut(|r| r.block_until_events())
                .expect("i/o error while waiting for timer events");

            // Finally, if blocking for events didn't result in any work being pushed onto our
            // queue, then we are done:
            if self.queue.is_empty() {
                break;
            }
        }
    }
}

/// Waker state for the future driven by `block_on`.  Waking it just flags it ready; the
/// executor's loop picks the flag up after the current queue drain.
struct MainTask {
    ready: AtomicBool,
}

impl Wake for MainTask {
    fn wake(self: Arc<Self>) {
        self.ready.store(true, Ordering::Release);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.ready.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::Executor;
    use crate::time::sleep;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn block_on_returns_the_future_output() {
        let executor = Executor::new();
        assert_eq!(executor.block_on(async { 7 }), 7);
    }

    #[test]
    fn join_handle_resolves_to_the_task_output() {
        let executor = Executor::new();

        let handle = executor.spawn(async {
            sleep(Duration::from_millis(5)).await;
            42
        });

        assert_eq!(executor.block_on(handle), 42);
    }

    #[test]
    fn dropping_a_handle_detaches_the_task() {
        let executor = Executor::new();
        let ran = Rc::new(Cell::new(false));

        let flag = ran.clone();
        drop(executor.spawn(async move {
            flag.set(true);
        }));

        executor.run_until_idle();
        assert!(ran.get());
    }

    #[test]
    fn run_until_idle_drives_all_spawned_tasks() {
        let executor = Executor::new();
        let finished = Rc::new(Cell::new(0));

        for ms in [5u64, 15, 10] {
            let finished = finished.clone();
            executor.spawn(async move {
                sleep(Duration::from_millis(ms)).await;
                finished.set(finished.get() + 1);
            });
        }

        executor.run_until_idle();
        assert_eq!(finished.get(), 3);
    }

    #[test]
    #[should_panic(expected = "stalled")]
    fn block_on_panics_when_nothing_can_wake_the_future() {
        let executor = Executor::new();
        executor.block_on(std::future::pending::<()>());
    }
}
