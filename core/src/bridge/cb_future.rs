use futures::channel::oneshot;
use futures::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::engine::{Callback, EngineResult};
use crate::error::EngineError;

/// Issues a one-shot request and returns a future for its terminal event.
///
/// `issue` receives the callback to hand to the engine.
pub fn request<T, F>(issue: F) -> CBFuture<T>
where
    T: Send + 'static,
    F: FnOnce(Callback<T>),
{
    let (future, callback) = CBFuture::new();
    issue(callback);
    future
}

/// A future that resolves with the terminal event of one request.
pub struct CBFuture<T> {
    receiver: oneshot::Receiver<EngineResult<T>>,
}

impl<T: Send + 'static> CBFuture<T> {
    /// Creates the future together with the callback that resolves it.
    pub fn new() -> (Self, Callback<T>) {
        let (sender, receiver) = oneshot::channel();
        let callback: Callback<T> = Box::new(move |result| {
            // the receiver may already be gone if the caller stopped waiting
            let _ = sender.send(result);
        });
        (Self { receiver }, callback)
    }
}

impl<T> Future for CBFuture<T> {
    type Output = EngineResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver.poll_unpin(cx).map(|result| match result {
            Ok(result) => result,
            Err(oneshot::Canceled) => Err(EngineError::Aborted("request dropped without a terminal event".into())),
        })
    }
}
