use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

/// Tokio runtime that drives one archive batch at a time, with a
/// cancellation token tripped by Ctrl-C.
pub struct ArchiveRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

impl ArchiveRuntime {
    /// ```
    /// use docarchive_runtime::ArchiveRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = ArchiveRuntime::build("doctest-runtime", Some(1)).expect("runtime builds");
    /// let value = runtime.run_batch(|_cancel| async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        Ok(Self {
            runtime: builder.build()?,
            cancel: CancellationToken::new(),
        })
    }

    /// Token shared with every batch run on this runtime.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run a batch to completion. The batch receives the shared token, which
    /// is cancelled if Ctrl-C arrives while it runs; the signal watcher is
    /// torn down when the batch returns.
    ///
    /// ```
    /// use docarchive_runtime::ArchiveRuntime;
    ///
    /// let runtime = ArchiveRuntime::build("batch-example", Some(1)).unwrap();
    /// let seen = runtime.run_batch(|cancel| async move { cancel.is_cancelled() });
    /// assert!(!seen);
    /// ```
    pub fn run_batch<F, Fut, T>(&self, batch: F) -> T
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T>,
    {
        let cancel = self.cancel.clone();
        self.runtime.block_on(async move {
            let watcher = tokio::spawn(interrupt_on_ctrl_c(cancel.clone()));
            let out = batch(cancel).await;
            watcher.abort();
            out
        })
    }

    /// Cancel outstanding work and shut the runtime down.
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

async fn interrupt_on_ctrl_c(cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        res = tokio::signal::ctrl_c() => {
            if res.is_ok() {
                tracing::warn!("runtime.interrupted");
                cancel.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_sees_an_earlier_cancellation() {
        let runtime = ArchiveRuntime::build("cancelled-batch", Some(1)).unwrap();
        runtime.cancellation().cancel();
        let seen = runtime.run_batch(|cancel| async move { cancel.is_cancelled() });
        assert!(seen);
    }

    #[test]
    fn watcher_exits_with_the_token() {
        let runtime = ArchiveRuntime::build("watcher", Some(1)).unwrap();
        let cancel = runtime.cancellation();
        runtime.run_batch(|_| async move {
            let watcher = tokio::spawn(interrupt_on_ctrl_c(cancel.clone()));
            cancel.cancel();
            tokio::time::timeout(Duration::from_secs(1), watcher)
                .await
                .expect("watcher stops once cancelled")
                .unwrap();
        });
    }

    #[test]
    fn batches_run_back_to_back() {
        let runtime = ArchiveRuntime::build("sequential", Some(1)).unwrap();
        let first = runtime.run_batch(|_| async { 1 });
        let second = runtime.run_batch(|_| async { first + 1 });
        assert_eq!(second, 2);
        runtime.shutdown(Duration::from_millis(5));
    }
}
