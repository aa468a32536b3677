use anyhow::Result;

/// Everything in punchclock runs on one thread: timers, the console and log writes share a
/// single event loop.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
