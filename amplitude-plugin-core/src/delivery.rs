//! Fire-and-callback delivery of plugin calls
//!
//! Hooks return futures resolving to [`Result<()>`]. Hosts that do not want to
//! wait for the network hand those futures to a [`Dispatcher`], which runs
//! them in the background and reports each outcome to an optional callback.
//!
//! A dispatcher owns one worker task that drains a queue, awaiting each call
//! before starting the next. Calls dispatched in sequence therefore reach
//! Amplitude in that sequence, e.g. an `identify` followed by a `track` sends
//! the event with the new user id. Use one dispatcher per adapter.

use std::future::Future;
use std::pin::Pin;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// Receives the outcome of a detached call.
pub type Callback = Box<dyn FnOnce(Result<()>) + Send + 'static>;

type Call = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Ordered background queue for plugin calls.
pub struct Dispatcher {
    sender: mpsc::UnboundedSender<(Call, Option<Callback>)>,
    worker: JoinHandle<()>,
}

impl Dispatcher {
    /// Start the worker on the current tokio runtime.
    ///
    /// Fails when no runtime is available.
    pub fn new() -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        let (sender, mut receiver) = mpsc::unbounded_channel::<(Call, Option<Callback>)>();

        let worker = handle.spawn(async move {
            while let Some((call, callback)) = receiver.recv().await {
                report(call.await, callback);
            }
            tracing::debug!("Dispatcher queue closed");
        });

        Ok(Self { sender, worker })
    }

    /// Queue `future` behind every call dispatched before it.
    ///
    /// Without a callback the call is fire-and-forget and any error is
    /// dropped. Fails only when the worker has stopped.
    pub fn dispatch<F>(&self, future: F, callback: Option<Callback>) -> Result<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.sender
            .send((Box::pin(future), callback))
            .map_err(|_| Error::Runtime("dispatcher worker has stopped".to_string()))
    }

    /// Stop accepting calls and wait for the queued ones to finish.
    pub async fn close(self) -> Result<()> {
        drop(self.sender);
        self.worker
            .await
            .map_err(|e| Error::Runtime(format!("dispatcher worker failed: {}", e)))
    }
}

fn report(result: Result<()>, callback: Option<Callback>) {
    match callback {
        Some(callback) => callback(result),
        None => {
            if let Err(e) = result {
                tracing::debug!(error = %e, "Detached Amplitude call failed without a callback");
            }
        }
    }
}
