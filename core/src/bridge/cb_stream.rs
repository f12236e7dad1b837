use futures::channel::mpsc;
use futures::stream::{FusedStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::engine::{Cursor, CursorCallback, EngineResult};
use crate::error::EngineError;
use crate::value::Record;

type CursorEvent = EngineResult<Option<Box<dyn Cursor>>>;

/// Issues a cursor request and returns a stream over the visited records.
pub fn cursor_stream<F: FnOnce(CursorCallback)>(open: F) -> CursorStream {
    let (sender, receiver) = mpsc::unbounded();
    open(Box::new(move |event: CursorEvent| {
        let _ = sender.unbounded_send(event);
    }));
    CursorStream { events: receiver, current: None, done: false }
}

/// A lazy, finite, non-restartable stream over a cursor request.
///
/// The cursor is advanced only when the next item is polled, so dropping the
/// stream stops the scan. An engine error is yielded once and ends the stream.
pub struct CursorStream {
    events: mpsc::UnboundedReceiver<CursorEvent>,
    current: Option<Box<dyn Cursor>>,
    done: bool,
}

impl std::fmt::Debug for CursorStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorStream").field("done", &self.done).finish_non_exhaustive()
    }
}

impl Stream for CursorStream {
    type Item = EngineResult<Record>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        if let Some(cursor) = self.current.take() {
            cursor.continue_();
        }
        let event = ready!(self.events.poll_next_unpin(cx));
        match event {
            Some(Ok(Some(cursor))) => {
                let record = Record::new(cursor.key().clone(), cursor.value().clone());
                self.current = Some(cursor);
                Poll::Ready(Some(Ok(record)))
            }
            Some(Ok(None)) => {
                self.done = true;
                Poll::Ready(None)
            }
            Some(Err(err)) => {
                self.done = true;
                Poll::Ready(Some(Err(err)))
            }
            None => {
                self.done = true;
                Poll::Ready(Some(Err(EngineError::Aborted("cursor request dropped before exhaustion".into()))))
            }
        }
    }
}

impl FusedStream for CursorStream {
    fn is_terminated(&self) -> bool { self.done }
}
