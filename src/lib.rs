//! A little single-threaded async runtime for timer-driven workloads.
//!
//! The runtime half is a cooperative [`executor::Executor`] fed by a thread-local reactor that
//! maps one-shot kernel timers to task wakeups, with [`time::sleep`] as the suspension point and
//! [`join::join_all`] as the barrier primitive.  The [`delay`] half builds on those: a
//! [`delay::DelayCollector`] launches a batch of random bounded waits concurrently, suspends
//! until the slowest finishes, and returns every sampled duration in ascending order.
//!
//! ```
//! use naptime::delay::{DelayCollector, RandomDelaySource};
//! use naptime::executor::Executor;
//!
//! let executor = Executor::new();
//! let collector = DelayCollector::new(RandomDelaySource);
//!
//! let batch = executor
//!     .block_on(collector.collect(3, 0.05))
//!     .expect("the default source cannot fail");
//!
//! assert_eq!(batch.len(), 3);
//! assert!(batch.windows(2).all(|pair| pair[0] <= pair[1]));
//! ```

mod poll;
mod queue;
mod reactor;
mod task;

pub mod delay;
pub mod executor;
pub mod join;
pub mod time;

pub use task::JoinHandle;
