//! Blocking bridge for hosts without their own async runtime

use once_cell::sync::Lazy;
use tokio::runtime::Runtime;

use crate::error::{CaptureError, CaptureResult};

/// Global tokio runtime for blocking on async operations (only used when not in an existing runtime)
static RUNTIME: Lazy<Result<Runtime, String>> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(|e| e.to_string())
});

/// Run an async operation synchronously using the global runtime
///
/// If the caller is already inside a tokio runtime the future is driven on a
/// helper thread to avoid a nested-runtime panic.
pub fn block_on<F>(f: F) -> CaptureResult<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    if tokio::runtime::Handle::try_current().is_ok() {
        run_in_thread(move || block_on_global(f))?
    } else {
        block_on_global(f)
    }
}

fn block_on_global<F: std::future::Future>(f: F) -> CaptureResult<F::Output> {
    match &*RUNTIME {
        Ok(runtime) => Ok(runtime.block_on(f)),
        Err(e) => Err(CaptureError::Runtime(format!("Failed to create tokio runtime: {}", e))),
    }
}

/// Run a sync closure in a separate thread to avoid nested runtime issues
fn run_in_thread<F, T>(f: F) -> CaptureResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    std::thread::spawn(f)
        .join()
        .map_err(|_| CaptureError::Runtime("Sampling thread panicked".to_string()))
}
