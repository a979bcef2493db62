//! Caller-facing futures for coalesced fetches
//!
//! Every caller of a fetch gets its own [`Pending`], backed by the receiving
//! half of an unbounded channel whose sender is registered as an observer in
//! the intent map. Dropping a `Pending` abandons interest only; the fetch
//! itself keeps running for the other observers.

use crate::error::FetchError;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// The sending half handed to the intent map
pub type Observer<V> = mpsc::UnboundedSender<V>;

/// Outcome of a fetch: `Ok(None)` is "not found" or "could not fetch"
pub type FetchResult<T> = Result<Option<T>, FetchError>;

/// Outcome of a list mutation: `Ok(false)` when nothing changed
pub type MutationResult = Result<bool, FetchError>;

/// Values that have a "no data" form, delivered when an intent closes empty
pub trait Settle: Send + 'static {
    fn unresolved() -> Self;
}

impl<T: Send + 'static> Settle for FetchResult<T> {
    fn unresolved() -> Self {
        Ok(None)
    }
}

impl Settle for MutationResult {
    fn unresolved() -> Self {
        Ok(false)
    }
}

enum Inner<V> {
    Waiting(mpsc::UnboundedReceiver<V>),
    Ready(Option<V>),
}

/// A value that some background fetch will deliver
///
/// Resolves to the first value delivered, or to [`Settle::unresolved`] when
/// every sender is dropped without delivering.
#[must_use = "a Pending does nothing unless awaited"]
pub struct Pending<V> {
    inner: Inner<V>,
}

impl<V: Settle> Pending<V> {
    /// A connected observer/future pair
    pub fn channel() -> (Observer<V>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                inner: Inner::Waiting(rx),
            },
        )
    }

    /// An already resolved future
    pub fn ready(value: V) -> Self {
        Self {
            inner: Inner::Ready(Some(value)),
        }
    }

    /// A future resolving to the "no data" value
    pub fn unresolved() -> Self {
        Self::ready(V::unresolved())
    }

    /// Runs `future` in the background and resolves with its output
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = V> + Send + 'static,
    {
        let (observer, pending) = Self::channel();
        tokio::spawn(async move {
            let _ = observer.send(future.await);
        });
        pending
    }
}

// Values are only ever moved out, never pinned
impl<V> Unpin for Pending<V> {}

impl<V: Settle> Future for Pending<V> {
    type Output = V;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<V> {
        let this = self.get_mut();
        match &mut this.inner {
            Inner::Ready(value) => Poll::Ready(value.take().unwrap_or_else(V::unresolved)),
            Inner::Waiting(rx) => match rx.poll_recv(cx) {
                Poll::Ready(Some(value)) => {
                    this.inner = Inner::Ready(None);
                    Poll::Ready(value)
                }
                Poll::Ready(None) => {
                    this.inner = Inner::Ready(None);
                    Poll::Ready(V::unresolved())
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

/// A sequence of values delivered by a background enumeration
///
/// Ends when the enumeration closes its intent.
#[must_use = "streams do nothing unless polled"]
pub struct PendingStream<T> {
    rx: Option<mpsc::UnboundedReceiver<T>>,
}

impl<T> PendingStream<T> {
    pub fn channel() -> (Observer<T>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx: Some(rx) })
    }

    /// A stream that ends immediately
    pub fn empty() -> Self {
        Self { rx: None }
    }
}

impl<T> Stream for PendingStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        match &mut self.get_mut().rx {
            Some(rx) => rx.poll_recv(cx),
            None => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_first_value_wins() {
        let (tx, pending) = Pending::<FetchResult<u32>>::channel();
        tx.send(Ok(Some(1))).unwrap();
        tx.send(Ok(Some(2))).unwrap();
        assert_eq!(pending.await, Ok(Some(1)));
    }

    #[tokio::test]
    async fn test_closed_without_value() {
        let (tx, pending) = Pending::<FetchResult<u32>>::channel();
        drop(tx);
        assert_eq!(pending.await, Ok(None));

        let (tx, pending) = Pending::<MutationResult>::channel();
        drop(tx);
        assert_eq!(pending.await, Ok(false));
    }

    #[tokio::test]
    async fn test_ready() {
        let pending = Pending::<FetchResult<&str>>::ready(Ok(Some("x")));
        assert_eq!(pending.await, Ok(Some("x")));
        assert_eq!(Pending::<FetchResult<u8>>::unresolved().await, Ok(None));
    }

    #[tokio::test]
    async fn test_stream_ends_on_close() {
        let (tx, stream) = PendingStream::channel();
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        drop(tx);
        assert_eq!(stream.collect::<Vec<_>>().await, vec![1, 2]);
        assert!(PendingStream::<u8>::empty().next().await.is_none());
    }
}
