use std::{
    cell::RefCell,
    future::Future,
    mem::ManuallyDrop,
    pin::Pin,
    rc::Rc,
    sync::Arc,
    task::{Context, Poll, RawWaker, RawWakerVTable, Waker},
};

use crate::queue::TaskQueue;

/// A top-level unit of work scheduled on the executor.  The task doubles as its own `Waker`:
/// when a timer fires, the reactor wakes it and the task pushes itself back onto the executor's
/// queue to be polled on the next tick.
pub(crate) struct Task<'a> {
    /// The executor's queue of runnable tasks; a woken task reschedules itself here.
    queue: TaskQueue<Arc<Task<'a>>>,

    /// The top-level future this task drives.
    future: RefCell<TaskFuture<'a>>,
}

impl<'a> Task<'a> {
    /// Wraps `future` in a new task and schedules it onto `queue`.
    pub(crate) fn spawn<F>(future: F, queue: &TaskQueue<Arc<Task<'a>>>)
    where
        F: Future<Output = ()> + 'a,
    {
        // Safety(clippy::arc_with_non_send_sync): the task is only ever polled from the
        // executor's thread, so it does not need to be `Send + Sync` itself.  It still lives in
        // an `Arc` because `Waker` is `Send + Sync`: other threads may clone the waker and bump
        // the refcount even though they never poll.
        #[allow(clippy::arc_with_non_send_sync)]
        let task = Arc::new(Task {
            queue: queue.clone(),
            future: RefCell::new(TaskFuture::new(future)),
        });

        queue.push(task);
    }

    /// Polls the task's future, with the task itself acting as the waker.
    pub(crate) fn poll(self: Arc<Self>) {
        let raw = Arc::into_raw(self.clone()).cast::<()>();
        let waker = unsafe { Waker::from_raw(RawWaker::new(raw, task_vtable())) };
        let mut context = Context::from_waker(&waker);

        self.future.borrow_mut().poll(&mut context);
    }

    /// Schedules the task to be polled on the next tick of the executor's loop.
    fn schedule(self: &Arc<Self>) {
        self.queue.push(self.clone());
    }
}

// Waker plumbing.  `RawWakerVTable` operates on a type-erased `*const ()` that we know is really
// a leaked `Arc<Task>`, so each entry reconstructs the `Arc` and proxies to the matching refcount
// or scheduling operation.  `ManuallyDrop` keeps the reconstructed `Arc` from running its
// destructor in the entries whose contract says the refcount must not change.

unsafe fn vtable_clone(data: *const ()) -> RawWaker {
    let task = ManuallyDrop::new(Arc::from_raw(data.cast::<Task>()));
    let _bumped: ManuallyDrop<_> = task.clone();

    RawWaker::new(data, task_vtable())
}

unsafe fn vtable_wake(data: *const ()) {
    // wake() consumes the waker, so let the Arc drop afterwards and release its count.
    let task = Arc::from_raw(data.cast::<Task>());
    Task::schedule(&task);
}

unsafe fn vtable_wake_by_ref(data: *const ()) {
    let task = ManuallyDrop::new(Arc::from_raw(data.cast::<Task>()));
    Task::schedule(&task);
}

unsafe fn vtable_drop(data: *const ()) {
    drop(Arc::from_raw(data.cast::<Task>()));
}

fn task_vtable() -> &'static RawWakerVTable {
    &RawWakerVTable::new(vtable_clone, vtable_wake, vtable_wake_by_ref, vtable_drop)
}

/// Boxes a task's future and remembers the last poll result.  The executor is free to wake a
/// task spuriously after it finished, and a finished future must not be polled again.
struct TaskFuture<'a> {
    future: Pin<Box<dyn Future<Output = ()> + 'a>>,
    state: Poll<()>,
}

impl<'a> TaskFuture<'a> {
    fn new<F>(future: F) -> Self
    where
        F: Future<Output = ()> + 'a,
    {
        Self {
            future: Box::pin(future),
            state: Poll::Pending,
        }
    }

    fn poll(&mut self, cx: &mut Context<'_>) {
        if self.state.is_pending() {
            self.state = self.future.as_mut().poll(cx);
        }
    }
}

/// Completion slot shared between a spawned task and its [`JoinHandle`].  Single-threaded, so
/// plain `Rc<RefCell<..>>` state is enough.
pub(crate) struct JoinState<T> {
    value: Option<T>,
    waker: Option<Waker>,
}

impl<T> JoinState<T> {
    /// Stores the task's output and wakes the handle if it is being awaited.
    pub(crate) fn complete(state: &Rc<RefCell<Self>>, value: T) {
        let waker = {
            let mut slot = state.borrow_mut();
            slot.value = Some(value);
            slot.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// A future resolving to the output of a spawned task.  Dropping the handle detaches the task:
/// it keeps running and its output is discarded.
pub struct JoinHandle<T> {
    state: Rc<RefCell<JoinState<T>>>,
}

impl<T> JoinHandle<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(JoinState {
                value: None,
                waker: None,
            })),
        }
    }

    pub(crate) fn state(&self) -> Rc<RefCell<JoinState<T>>> {
        self.state.clone()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut state = self.state.borrow_mut();

        match state.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
