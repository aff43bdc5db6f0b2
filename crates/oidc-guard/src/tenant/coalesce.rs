//! Single-flight de-duplication of remote fetches
//!
//! [`FetchCoalescer`] maps a key to the in-progress fetch for that key. The
//! first caller for a key creates a shared future and stores it; callers that
//! arrive while it is pending clone and await the same future instead of
//! starting another fetch. Every caller observes the same outcome. The entry
//! is removed once the fetch completes, so the next miss starts a new fetch
//! and failures are never remembered.
//!
//! Only callers for the same key wait on each other; the in-flight table lock
//! is held just long enough to look up or insert an entry, never across an
//! `.await`.

use std::collections::HashMap;
use std::future::Future;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::debug;

type InFlight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Coalesces concurrent fetches that share a key
pub struct FetchCoalescer<T, E> {
    in_flight: Mutex<HashMap<String, InFlight<T, E>>>,
}

impl<T, E> std::fmt::Debug for FetchCoalescer<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoalescer")
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}

impl<T, E> Default for FetchCoalescer<T, E> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

impl<T, E> FetchCoalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create an empty coalescer
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fetch` for `key`, or join the fetch already running for it
    ///
    /// `fetch` is only invoked when no fetch for `key` is in flight. Its
    /// result, success or error, is handed to every caller that joined.
    ///
    /// # Errors
    ///
    /// Returns the error produced by the (possibly shared) fetch.
    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let shared = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key) {
                Some(pending) => {
                    debug!(key, "Joining in-flight fetch");
                    pending.clone()
                }
                None => {
                    let shared = fetch().boxed().shared();
                    in_flight.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };

        let outcome = shared.clone().await;

        // Whoever finishes first clears the entry; a newer fetch under the
        // same key is left alone.
        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(key)
            .is_some_and(|current| current.ptr_eq(&shared))
        {
            in_flight.remove(key);
        }

        outcome
    }

    /// Number of keys with a fetch in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}
