use crate::{Error, ErrorContext, Result};
use std::future::Future;

/// Run a future to completion from synchronous code.
///
/// The future is driven on a scoped worker thread with a private
/// current-thread runtime, so this works both outside any runtime and from a
/// thread that is already inside one (where `block_on` would panic).
pub fn run_async<F>(fut: F) -> Result<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    std::thread::scope(|scope| -> Result<F::Output> {
        let handle = std::thread::Builder::new()
            .name("nt-run-async".into())
            .spawn_scoped(scope, move || -> std::io::Result<F::Output> {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                Ok(rt.block_on(fut))
            })?;
        match handle.join() {
            Ok(output) => Ok(output?),
            Err(_) => Err(Error::runtime_with_context(
                "future panicked",
                ErrorContext::new().with_source("run_async"),
            )),
        }
    })
}
