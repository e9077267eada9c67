// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bounded retry of optimistic-concurrency writes.
//!
//! A write conflict means another writer changed the object between our read
//! and our write. The fix is never to resend the same payload: the whole
//! read → compute → write cycle is re-run against the fresh state. Callers
//! therefore pass a closure performing the complete cycle.
//!
//! Retries happen immediately. The conflicting writer already finished, so
//! waiting buys nothing, and the attempt count bounds the work.

use crate::errors::StoreError;
use crate::metrics;
use std::future::Future;
use tracing::{debug, warn};

/// Run `operation` until it succeeds, fails with a non-conflict error, or
/// `max_attempts` conflicts have been observed.
///
/// A `max_attempts` of zero is treated as one attempt.
///
/// # Arguments
///
/// * `max_attempts` - Upper bound on the number of times `operation` runs
/// * `operation_name` - Human-readable name for logging (e.g., "sync DNSData ovsdbserver-nb-0")
/// * `operation` - Async closure performing one full read-compute-write cycle
///
/// # Errors
///
/// Returns the first non-conflict error, or the last conflict once the
/// attempts are exhausted.
///
/// # Example
///
/// ```no_run
/// use ovndb_operator::crd::DNSData;
/// use ovndb_operator::reconcilers::retry::retry_on_conflict;
/// use ovndb_operator::store::{MemoryStore, Store};
///
/// # async fn example() -> Result<(), ovndb_operator::errors::StoreError> {
/// let store = &MemoryStore::<DNSData>::new();
/// let record = retry_on_conflict(5, "get DNSData", || async move {
///     store.get("openstack", "ovsdbserver-nb-0").await
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_on_conflict<T, F, Fut>(
    max_attempts: u32,
    operation_name: &str,
    mut operation: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Write succeeded after conflict retries"
                    );
                }
                return Ok(value);
            }
            Err(e) if e.is_conflict() => {
                metrics::record_write_conflict(operation_name);
                if attempt >= max_attempts {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        error = %e,
                        "Write conflict persisted, giving up"
                    );
                    return Err(e);
                }
                debug!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %e,
                    "Write conflict, re-reading and retrying"
                );
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
