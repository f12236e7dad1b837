use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs engine requests, and therefore their callbacks, one at a time on a
/// dedicated thread, in submission order.
///
/// The thread exits once every handle is dropped and the queue is drained.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    sender: mpsc::UnboundedSender<Job>,
}

impl Dispatcher {
    pub fn spawn(thread_name: &str) -> std::io::Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let name = thread_name.to_owned();
        thread::Builder::new().name(name.clone()).spawn(move || {
            while let Some(job) = receiver.blocking_recv() {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!("{}: a request callback panicked", name);
                }
            }
            debug!("{}: dispatcher stopped", name);
        })?;
        Ok(Self { sender })
    }

    /// Queues a job. If the dispatcher is gone the job is dropped, and with it
    /// any callback it owns.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if self.sender.send(Box::new(job)).is_err() {
            error!("dispatcher thread is gone, dropping request");
        }
    }
}
