use std::future::Future;

use perfana_core::prelude::{ShutdownHandle, ShutdownSignalError};
use tokio::task::JoinHandle;

use crate::error::PerfanaError;

/// Owns the runtime that drives HTTP calls and the session's background tasks so that the public
/// client API can stay synchronous.
///
/// Must not be used from inside another Tokio runtime: [Executor::execute_in_place] blocks the
/// calling thread.
#[derive(Debug)]
pub(crate) struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(shutdown_handle: ShutdownHandle) -> Result<Self, PerfanaError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("perfana-client")
            .enable_all()
            .build()
            .map_err(PerfanaError::Runtime)?;

        Ok(Self {
            runtime,
            shutdown_handle,
        })
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// The future is cancelled if the client is shut down, in which case
    /// [PerfanaError::Shutdown] is returned.
    pub(crate) fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = Result<T, PerfanaError>>,
    ) -> Result<T, PerfanaError> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(ShutdownSignalError::default().into())
                },
            }
        })
    }

    /// Submit async code to be run in the background.
    ///
    /// Background tasks are expected to watch a shutdown listener themselves. Any task still
    /// running when the executor is dropped is cancelled with the runtime.
    pub(crate) fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) -> JoinHandle<()> {
        self.runtime.spawn(fut)
    }
}
