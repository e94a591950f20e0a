use std::{cell::RefCell, collections::HashMap, io, task::Waker, time::Duration};

use tracing::trace;

use crate::poll::{Events, Poller};

/// Maps armed timer keys to the wakers to run when they fire.  Futures register their interest
/// here, and the executor asks the reactor to block until at least one registered timer expires.
pub(crate) struct Reactor {
    /// Binding to the OS timer queue
    poller: Poller,

    /// Storage for fired events, reused across polls
    events: Events,

    /// Maps timer keys to the waker to wake when that key fires
    wakers: HashMap<usize, Waker>,

    /// The next key to hand out for a new timer
    current_key: usize,
}

// Thread-local singleton reactor.  The whole point of this runtime is to never have any threads,
// so one reactor per executor thread is all there is, and no locking is needed.
thread_local! {
    pub(crate) static REACTOR: RefCell<Reactor> = RefCell::new(Reactor {
        poller: Poller::new().expect("could not initialize OS timer queue"),
        events: Events::new(),
        wakers: HashMap::new(),
        current_key: 0,
    });
}

impl Reactor {
    /// Arms a one-shot timer for `duration` and parks `waker` under `key`.
    pub(crate) fn register_timer(
        &mut self,
        key: usize,
        duration: Duration,
        waker: Waker,
    ) -> io::Result<()> {
        self.poller.arm_timer(key, duration)?;
        self.wakers.insert(key, waker);

        Ok(())
    }

    /// Replaces the waker parked under `key`.  A key whose timer already fired is gone from the
    /// map; its future will observe the passed deadline on this same poll, so there is nothing
    /// left to park.
    pub(crate) fn refresh_waker(&mut self, key: usize, waker: Waker) {
        if let Some(slot) = self.wakers.get_mut(&key) {
            *slot = waker;
        }
    }

    /// Releases `key`: forgets its waker and disarms the underlying timer if it has not fired.
    pub(crate) fn remove_timer(&mut self, key: usize) {
        self.wakers.remove(&key);
        self.poller.disarm_timer(key);
    }

    /// Blocks until at least one armed timer fires, then wakes every waker whose key fired.
    /// Returns immediately if nothing is registered, since there would be nothing to wake.
    pub(crate) fn block_until_events(&mut self) -> io::Result<()> {
        if self.wakers.is_empty() {
            return Ok(());
        }

        self.poller.wait(&mut self.events)?;

        for key in self.events.keys() {
            if let Some(waker) = self.wakers.remove(&key) {
                trace!(key, "timer fired");
                waker.wake();
            }
        }

        Ok(())
    }

    pub(crate) fn next_key(&mut self) -> usize {
        let key = self.current_key;
        self.current_key += 1;

        key
    }
}
