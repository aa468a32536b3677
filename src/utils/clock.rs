use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, Timelike};
use tokio::time::Instant;

/// Represents an entity responsible for providing time across application. Wall-clock time is
/// used for log rows and screenshot names, instants drive the timers. Swapping it out allows
/// tests to control both.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    /// Local time truncated to whole seconds, matching the precision of the work log.
    fn now(&self) -> NaiveDateTime;

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: Instant);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}
