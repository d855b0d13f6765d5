//! Ranked locator resolution.
//!
//! Controls on the registry form have no stable identifiers, so each one is
//! described by an ordered list of candidate selectors. [`locate`] tries
//! them in order and acts on the first that resolves. The same routine
//! serves both field fills and clicks.

use std::time::Duration;

use crate::error::SearchError;
use crate::page::PageDriver;

/// What to do with the element once a candidate resolves.
#[derive(Debug, Clone, Copy)]
pub enum LocatorAction<'a> {
    Fill(&'a str),
    Click,
}

/// Try `candidates` in order and perform `action` on the first match.
///
/// Only the lookup of each candidate runs under `timeout_per_candidate`;
/// a candidate that times out, errors, or matches nothing is skipped. The
/// action itself runs once, unbounded here, so a slow submission is never
/// cancelled and sent again through the next candidate. An action that
/// reports nothing done falls through to the next candidate.
///
/// Returns the index of the candidate acted on, or `None` if none was.
///
/// # Errors
///
/// Returns the action's error when a resolved control fails to act. No
/// further candidate is tried in that case.
pub async fn locate<P: PageDriver, S: AsRef<str>>(
    driver: &mut P,
    candidates: &[S],
    action: LocatorAction<'_>,
    timeout_per_candidate: Duration,
) -> Result<Option<usize>, SearchError> {
    for (index, candidate) in candidates.iter().enumerate() {
        let selector = candidate.as_ref();
        match tokio::time::timeout(timeout_per_candidate, driver.resolve(selector)).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => {
                tracing::debug!(selector, "locator matched nothing");
                continue;
            }
            Ok(Err(err)) => {
                tracing::debug!(selector, error = %err, "locator lookup failed");
                continue;
            }
            Err(_) => {
                tracing::debug!(
                    selector,
                    timeout_ms = timeout_per_candidate.as_millis() as u64,
                    "locator lookup timed out"
                );
                continue;
            }
        }

        let acted = match action {
            LocatorAction::Fill(value) => driver.fill(selector, value).await?,
            LocatorAction::Click => driver.click(selector).await?,
        };
        if acted {
            tracing::debug!(selector, "locator resolved");
            return Ok(Some(index));
        }
        tracing::debug!(selector, "control resolved but does not accept the action");
    }
    Ok(None)
}
