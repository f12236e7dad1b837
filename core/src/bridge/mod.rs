//! Adapters from engine callbacks to futures and streams.
//!
//! - [`cb_future`] wraps a one-shot request: its single terminal event
//!   resolves the returned future exactly once.
//! - [`cb_stream`] wraps a cursor request: each cursor event becomes one
//!   stream item, and the cursor is only advanced when the consumer pulls.

pub mod cb_future;
pub mod cb_stream;

pub use cb_future::{request, CBFuture};
pub use cb_stream::{cursor_stream, CursorStream};
