use rustix::event::epoll;
use rustix::fd::OwnedFd;
use rustix::time::{
    timerfd_create, timerfd_settime, Itimerspec, TimerfdClockId, TimerfdFlags, TimerfdTimerFlags,
    Timespec,
};
use std::collections::HashMap;
use std::io;
use std::time::Duration;

/// Binding to the OS timer queue.  Every armed timer is a one-shot `timerfd` registered with a
/// single `epoll` instance; the integer key passed at arm time comes back as the fired event's
/// userdata, so callers can tell their timers apart.
pub(crate) struct Poller {
    /// File descriptor pointing to our epoll instance
    queue: OwnedFd,

    /// The timerfd backing each armed key.  Dropping an entry closes the descriptor, which also
    /// removes it from the epoll interest list.
    timers: HashMap<usize, OwnedFd>,
}

impl Poller {
    /// Creates a new poller with an underlying epoll instance.
    pub(crate) fn new() -> io::Result<Self> {
        let queue = epoll::create(epoll::CreateFlags::CLOEXEC)?;

        Ok(Self {
            queue,
            timers: HashMap::new(),
        })
    }

    /// Arms a one-shot timer that fires `duration` from now and is reported under `key`.
    pub(crate) fn arm_timer(&mut self, key: usize, duration: Duration) -> io::Result<()> {
        let timer = timerfd_create(
            TimerfdClockId::Monotonic,
            TimerfdFlags::CLOEXEC | TimerfdFlags::NONBLOCK,
        )?;

        timerfd_settime(
            &timer,
            TimerfdTimerFlags::empty(),
            &Itimerspec {
                it_interval: Timespec {
                    tv_sec: 0,
                    tv_nsec: 0,
                },
                it_value: timer_value(duration),
            },
        )?;

        epoll::add(
            &self.queue,
            &timer,
            epoll::EventData::new_u64(key as u64),
            epoll::EventFlags::IN | epoll::EventFlags::ONESHOT,
        )?;

        self.timers.insert(key, timer);

        Ok(())
    }

    /// Disarms `key` if it is still armed.  Unknown keys are fine: a timer that already fired has
    /// been released by `wait`.
    pub(crate) fn disarm_timer(&mut self, key: usize) {
        if let Some(timer) = self.timers.remove(&key) {
            let _ = epoll::delete(&self.queue, &timer);
        }
    }

    /// Blocks until at least one armed timer fires, recording the fired keys into `events`.
    /// Fired timers are one-shot, so their descriptors are released before returning.
    pub(crate) fn wait(&mut self, events: &mut Events) -> io::Result<()> {
        events.list.clear();
        epoll::wait(&self.queue, &mut events.list, -1)?;

        for event in events.list.iter() {
            self.disarm_timer(event.data.u64() as usize);
        }

        Ok(())
    }
}

/// timerfd treats a zero `it_value` as "disarm", so the shortest armable wait is one nanosecond.
fn timer_value(duration: Duration) -> Timespec {
    if duration.is_zero() {
        return Timespec {
            tv_sec: 0,
            tv_nsec: 1,
        };
    }

    Timespec {
        tv_sec: duration.as_secs() as _,
        tv_nsec: duration.subsec_nanos() as _,
    }
}

/// Storage for fired events, reusable across calls to `Poller::wait`.
pub(crate) struct Events {
    list: epoll::EventVec,
}

const DEFAULT_EVENT_CAP: usize = 64;

impl Events {
    pub(crate) fn new() -> Self {
        Self {
            list: epoll::EventVec::with_capacity(DEFAULT_EVENT_CAP),
        }
    }

    /// Iterates over the keys of the timers that fired during the last `wait`.
    pub(crate) fn keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.list.iter().map(|event| event.data.u64() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::{Events, Poller};
    use std::time::{Duration, Instant};

    #[test]
    fn fired_timer_reports_its_key() {
        let mut poller = Poller::new().unwrap();
        poller.arm_timer(1234, Duration::from_millis(50)).unwrap();

        // Record the current clock time so we can get a ballpark idea whether we blocked for as
        // long as we should have:
        let now = Instant::now();

        let mut events = Events::new();
        poller.wait(&mut events).unwrap();

        let keys: Vec<usize> = events.keys().collect();
        assert_eq!(keys, vec![1234]);
        assert!(now.elapsed().as_millis() > 49);
    }

    #[test]
    fn disarmed_timer_does_not_fire() {
        let mut poller = Poller::new().unwrap();
        poller.arm_timer(1, Duration::from_millis(10)).unwrap();
        poller.arm_timer(2, Duration::from_millis(60)).unwrap();
        poller.disarm_timer(1);

        let mut events = Events::new();
        poller.wait(&mut events).unwrap();

        let keys: Vec<usize> = events.keys().collect();
        assert_eq!(keys, vec![2]);
    }

    #[test]
    fn zero_duration_timer_still_fires() {
        let mut poller = Poller::new().unwrap();
        poller.arm_timer(7, Duration::ZERO).unwrap();

        let mut events = Events::new();
        poller.wait(&mut events).unwrap();

        assert_eq!(events.keys().collect::<Vec<_>>(), vec![7]);
    }
}
