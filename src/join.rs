use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

/// Future returned by [`join_all`].  Resolves once every input future has resolved, yielding
/// their outputs in submission order.
pub struct JoinAll<F: Future> {
    futures: Vec<Pin<Box<F>>>,
    outputs: Vec<Option<F::Output>>,
}

/// Drives a collection of futures concurrently, collecting their outputs into a `Vec` in
/// submission order.  This is a barrier: nothing is yielded until the slowest input finishes.
pub fn join_all<I>(futures: I) -> JoinAll<I::Item>
where
    I: IntoIterator,
    I::Item: Future,
{
    let futures: Vec<_> = futures.into_iter().map(Box::pin).collect();
    let outputs = futures.iter().map(|_| None).collect();

    JoinAll { futures, outputs }
}

impl<F: Future> Future for JoinAll<F> {
    type Output = Vec<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // SAFETY: every pinned future is already heap-pinned behind `Pin<Box<F>>`; we never move
        // an `F` out of its box, so it is sound to get a mutable reference to `Self` even though
        // `Self` is not `Unpin` (which would otherwise be required by `get_mut`).
        let this = unsafe { self.get_unchecked_mut() };

        let mut pending = 0;
        for (future, slot) in this.futures.iter_mut().zip(this.outputs.iter_mut()) {
            // A filled slot means this future already resolved on an earlier poll; it must not
            // be polled again.
            if slot.is_some() {
                continue;
            }

            match future.as_mut().poll(cx) {
                Poll::Ready(output) => *slot = Some(output),
                Poll::Pending => pending += 1,
            }
        }

        if pending > 0 {
            return Poll::Pending;
        }

        Poll::Ready(
            this.outputs
                .iter_mut()
                .map(|slot| slot.take().expect("all futures resolved"))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::join_all;
    use crate::executor::Executor;
    use crate::time::sleep;
    use std::future;
    use std::time::Duration;

    #[test]
    fn outputs_come_back_in_submission_order() {
        let executor = Executor::new();

        let outputs = executor.block_on(join_all([
            future::ready(1),
            future::ready(2),
            future::ready(3),
        ]));

        assert_eq!(outputs, vec![1, 2, 3]);
    }

    #[test]
    fn empty_input_resolves_immediately() {
        let executor = Executor::new();
        let outputs = executor.block_on(join_all(Vec::<future::Ready<i32>>::new()));

        assert!(outputs.is_empty());
    }

    #[test]
    fn order_is_submission_order_not_completion_order() {
        let executor = Executor::new();

        let outputs = executor.block_on(join_all([
            wait_then(30, "slow"),
            wait_then(5, "fast"),
        ]));

        assert_eq!(outputs, vec!["slow", "fast"]);
    }

    async fn wait_then(ms: u64, tag: &'static str) -> &'static str {
        sleep(Duration::from_millis(ms)).await;
        tag
    }
}
