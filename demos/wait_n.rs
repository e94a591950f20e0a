//! Collects a batch of random delays concurrently and prints the sorted result.

use naptime::delay::{DelayCollector, RandomDelaySource};
use naptime::executor::Executor;
use naptime::time;

fn main() {
    tracing_subscriber::fmt::init();

    let executor = Executor::new();
    let collector = DelayCollector::new(RandomDelaySource);

    let (batch, elapsed) = executor.block_on(time::timed(collector.collect(5, 2.0)));
    let batch = batch.expect("the default source cannot fail");

    println!("collected {} delays (seconds, ascending): {batch:?}", batch.len());
    println!(
        "wall clock: {}ms, tracking the slowest single delay rather than the sum",
        elapsed.as_millis()
    );
}
