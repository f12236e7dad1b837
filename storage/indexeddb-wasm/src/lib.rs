//! Shelf storage engine backed by the browser's IndexedDB.

mod engine;
mod error;
mod session;
mod store;
mod util;

pub use engine::{factory, IndexedDbEngine};
pub use session::IdbSession;

/// Routes panics and `tracing` output to the browser console.
pub fn init_logging() {
    console_error_panic_hook::set_once();
    let _ = tracing_wasm::try_set_as_global_default();
}
