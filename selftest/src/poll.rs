use log::debug;
use model::clients::HttpStatusCode;
use snafu::Snafu;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Attempts made for one update before a conflict is reported.
const CONFLICT_RETRY_STEPS: u32 = 4;
const CONFLICT_RETRY_BASE: Duration = Duration::from_millis(10);
const CONFLICT_RETRY_FACTOR: u32 = 5;

#[derive(Debug, Snafu)]
pub enum PollError<E>
where
    E: Debug + Display,
{
    #[snafu(display("Timed out after {:?} waiting for the condition", timeout))]
    Timeout { timeout: Duration },

    #[snafu(display("Condition failed: {}", error))]
    Condition { error: E },
}

/// Checks `condition` immediately and then every `interval` until it returns `true`. Stops with an
/// error when the condition fails or when `timeout` elapses first.
pub async fn poll_immediate<F, Fut, E>(
    interval: Duration,
    timeout: Duration,
    mut condition: F,
) -> Result<(), PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Debug + Display,
{
    let deadline = Instant::now() + timeout;
    loop {
        match condition().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(error) => return ConditionSnafu { error }.fail(),
        }
        if Instant::now() + interval > deadline {
            return TimeoutSnafu { timeout }.fail();
        }
        tokio::time::sleep(interval).await;
    }
}

/// Runs a read-modify-write `update`, running it again with a growing delay while the server
/// answers `409 Conflict`. The conflict is returned once the attempts are used up.
pub async fn retry_on_conflict<F, Fut, T, E>(what: &str, mut update: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: HttpStatusCode,
{
    let mut delay = CONFLICT_RETRY_BASE;
    let mut attempt = 1;
    loop {
        match update().await {
            Err(e) if e.is_conflict() && attempt < CONFLICT_RETRY_STEPS => {
                debug!("conflict updating {}, attempt {}", what, attempt);
                tokio::time::sleep(delay).await;
                delay *= CONFLICT_RETRY_FACTOR;
                attempt += 1;
            }
            result => return result,
        }
    }
}
