//! Bounded retry as a post-action.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::{BoxFuture, PostActionMiddleware};
use crate::error::{BoxError, Error};
use crate::model::{Request, Response};

/// Post-action that nacks a failed request until it has run `retries + 1`
/// times, then acknowledges it whatever the outcome.
///
/// `is_failure` decides from the cycle's error and result whether the cycle
/// failed. Because a queue only ever cycles its head, the attempt count
/// belongs to the current head and resets when it is acknowledged. Give each
/// queue its own `Retry`.
pub struct Retry<F> {
    retries: u32,
    is_failure: F,
    attempts: Mutex<u32>,
}

impl<F> Retry<F> {
    pub fn new(retries: u32, is_failure: F) -> Self {
        Self {
            retries,
            is_failure,
            attempts: Mutex::new(0),
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    fn decide(&self, failed: bool) -> Result<(), BoxError> {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        *attempts += 1;

        if failed && *attempts <= self.retries {
            debug!(attempt = *attempts, retries = self.retries, "cycle failed, retrying");
            return Err(format!("attempt {} of {} failed", *attempts, self.retries + 1).into());
        }
        *attempts = 0;
        Ok(())
    }
}

impl<T, E, F> PostActionMiddleware<T, E> for Retry<F>
where
    F: Fn(Option<&E>, Option<&T>) -> bool + Send + Sync,
{
    fn handle<'a>(
        &'a self,
        error: Option<&'a E>,
        result: Option<&'a T>,
        _request: Option<&'a Request>,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        let failed = (self.is_failure)(error, result);
        Box::pin(std::future::ready(self.decide(failed)))
    }
}

/// Failure test for the default payload types: any exchange error, or a 5xx
/// response.
pub fn is_server_failure(error: Option<&Error>, response: Option<&Response>) -> bool {
    error.is_some() || response.is_some_and(|response| response.status >= 500)
}
