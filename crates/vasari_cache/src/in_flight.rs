//! Single-flight registry keyed by request identity.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinError;
use vasari_error::{CoalesceError, CoalesceErrorKind};

type SharedOutcome<V> = Shared<BoxFuture<'static, Result<V, CoalesceError>>>;

struct Ticket<V>
where
    V: Clone,
{
    id: u64,
    outcome: SharedOutcome<V>,
}

/// Coalesces concurrent computations that share a key.
///
/// The first caller for a key starts the computation on the runtime; callers
/// arriving while it is in flight await the same outcome instead of starting
/// their own. Keys compare case-insensitively. The ticket for a key is removed
/// as soon as its computation finishes, panics, or is aborted, so a later
/// caller starts fresh.
///
/// The computation runs as its own task: a waiter that goes away does not
/// cancel it for the others.
///
/// # Example
///
/// ```
/// use vasari_cache::InFlightRegistry;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry: InFlightRegistry<u32> = InFlightRegistry::new();
///
/// let (a, b) = tokio::join!(
///     registry.run("abc.jpg", || async { 42 }),
///     registry.run("ABC.JPG", || async { 7 }),
/// );
///
/// // Both callers observe the first computation's value
/// assert_eq!(a.unwrap(), 42);
/// assert_eq!(b.unwrap(), 42);
/// assert_eq!(registry.in_flight(), 0);
/// # }
/// ```
pub struct InFlightRegistry<V>
where
    V: Clone,
{
    tickets: Arc<DashMap<String, Ticket<V>>>,
    next_id: Arc<AtomicU64>,
}

impl<V> InFlightRegistry<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tickets: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Join the in-flight computation for `key`, or start one with `work`.
    ///
    /// `work` is only invoked when no computation for the key is in flight.
    ///
    /// # Errors
    ///
    /// Returns a [`CoalesceError`] if the computation panicked or its task was
    /// aborted. Every waiter on that computation receives the same error.
    #[tracing::instrument(skip(self, work))]
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<V, CoalesceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let key = normalize(key);

        // The entry lock must be released before awaiting.
        let outcome = match self.tickets.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!(ticket = entry.get().id, "Joining in-flight computation");
                entry.get().outcome.clone()
            }
            Entry::Vacant(entry) => {
                let work = work();
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let guard = TicketGuard {
                    tickets: Arc::clone(&self.tickets),
                    key: key.clone(),
                    id,
                };
                let outcome = start(key, guard, work);
                tracing::debug!(ticket = id, "Started computation");
                entry.insert(Ticket {
                    id,
                    outcome: outcome.clone(),
                });
                outcome
            }
        };

        outcome.await
    }

    /// Number of computations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.tickets.len()
    }

    /// Whether a computation for `key` is in flight.
    pub fn contains(&self, key: &str) -> bool {
        self.tickets.contains_key(&normalize(key))
    }
}

impl<V> Default for InFlightRegistry<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for InFlightRegistry<V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        Self {
            tickets: Arc::clone(&self.tickets),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<V> std::fmt::Debug for InFlightRegistry<V>
where
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("in_flight", &self.tickets.len())
            .finish()
    }
}

fn normalize(key: &str) -> String {
    key.to_lowercase()
}

/// Build the shared outcome. The task is spawned on first poll and owns the
/// guard, so the ticket goes away with the task however it ends.
fn start<V, Fut>(key: String, guard: TicketGuard<V>, work: Fut) -> SharedOutcome<V>
where
    V: Clone + Send + Sync + 'static,
    Fut: Future<Output = V> + Send + 'static,
{
    async move {
        let handle = tokio::spawn(async move {
            let _guard = guard;
            work.await
        });
        handle.await.map_err(|e| join_failure(&key, e))
    }
    .boxed()
    .shared()
}

#[track_caller]
fn join_failure(key: &str, error: JoinError) -> CoalesceError {
    if error.is_panic() {
        let payload = error.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(key, message = %message, "In-flight computation panicked");
        CoalesceError::new(CoalesceErrorKind::Panicked {
            key: key.to_string(),
            message,
        })
    } else {
        tracing::error!(key, "In-flight computation was aborted");
        CoalesceError::new(CoalesceErrorKind::Aborted(key.to_string()))
    }
}

/// Removes its ticket when dropped, unless the key has been reused.
struct TicketGuard<V>
where
    V: Clone,
{
    tickets: Arc<DashMap<String, Ticket<V>>>,
    key: String,
    id: u64,
}

impl<V> Drop for TicketGuard<V>
where
    V: Clone,
{
    fn drop(&mut self) {
        if self
            .tickets
            .remove_if(&self.key, |_, ticket| ticket.id == self.id)
            .is_some()
        {
            tracing::debug!(key = %self.key, ticket = self.id, "Removed ticket");
        }
    }
}
