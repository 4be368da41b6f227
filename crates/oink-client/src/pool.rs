//! Bounded worker pool for outbound sends.
//!
//! Each send blocks a worker until its exchange finishes, so sends run on a
//! tokio runtime's blocking pool. `max_blocking_threads` caps how many run at
//! once; the rest queue.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use oink_core::Address;

use crate::dispatcher::{ClientDispatcher, Outgoing};
use crate::error::ClientResult;

/// Default cap on concurrent sends.
pub const DEFAULT_MAX_CONCURRENT_SENDS: usize = 256;

/// Name given to pool threads.
pub const DISPATCH_THREAD_NAME: &str = "oink-dispatch";

/// Something that can send a request without waiting for it.
pub trait Dispatch {
    /// Queues `outgoing` for `to`. Never reports failure.
    fn dispatch(&self, to: Address, outgoing: Outgoing);
}

/// Sends on a bounded blocking pool.
#[derive(Debug)]
pub struct DispatchPool {
    runtime: Runtime,
    dispatcher: Arc<ClientDispatcher>,
}

impl DispatchPool {
    /// Creates a pool running at most `max_concurrent` sends at once.
    pub fn new(max_concurrent: usize, poll_interval: Duration) -> ClientResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(max_concurrent.max(1))
            .thread_name(DISPATCH_THREAD_NAME)
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            dispatcher: Arc::new(ClientDispatcher::new(poll_interval)),
        })
    }

    /// Runs a future to completion on the pool's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Waits up to `timeout` for queued sends, then drops the pool.
    pub fn shutdown(self, timeout: Duration) {
        debug!(?timeout, "shutting down dispatch pool");
        self.runtime.shutdown_timeout(timeout);
    }
}

impl Dispatch for DispatchPool {
    fn dispatch(&self, to: Address, outgoing: Outgoing) {
        let dispatcher = Arc::clone(&self.dispatcher);
        self.runtime
            .spawn_blocking(move || dispatcher.send(&to, &outgoing));
    }
}
