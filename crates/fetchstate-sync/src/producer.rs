//! # Producer Contract
//!
//! A producer is the async function the synchronizer calls. It receives
//! [`ProducerOptions`] carrying the cancellation signal of its invocation
//! and settles with a [`Resolved`] or rejects with a [`FetchError`].
//!
//! Any `Fn(ProducerOptions) -> impl Future<Output = ProducerResult<T>>`
//! that is `Send + Sync + 'static` is a producer.
//!
//! ## Identity
//! Producers are shared as [`ProducerRef`] (`Arc<dyn Produce<T>>`).
//! Two refs are the same producer when they point at the same allocation;
//! handing the synchronizer a different allocation counts as a producer
//! change, even if the closure inside is identical.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

use fetchstate_core::{FetchError, InvocationId, Resolved};

/// What a producer settles with.
pub type ProducerResult<T> = Result<Resolved<T>, FetchError>;

/// Shared, type-erased producer.
pub type ProducerRef<T> = Arc<dyn Produce<T>>;

// =============================================================================
// Producer Options
// =============================================================================

/// Per-invocation options passed to a producer.
#[derive(Debug, Clone)]
pub struct ProducerOptions {
    /// Invocation this call belongs to.
    pub invocation: InvocationId,

    /// Fired when the invocation is superseded or torn down.
    pub signal: CancellationToken,
}

impl ProducerOptions {
    /// Returns true once the invocation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Completes when the invocation is cancelled.
    pub async fn cancelled(&self) {
        self.signal.cancelled().await
    }
}

// =============================================================================
// Produce Trait
// =============================================================================

/// The producer calling contract.
pub trait Produce<T>: Send + Sync + 'static {
    /// Starts one invocation.
    fn produce(&self, opts: ProducerOptions) -> BoxFuture<'static, ProducerResult<T>>;
}

impl<T, F, Fut> Produce<T> for F
where
    F: Fn(ProducerOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProducerResult<T>> + Send + 'static,
{
    fn produce(&self, opts: ProducerOptions) -> BoxFuture<'static, ProducerResult<T>> {
        (self)(opts).boxed()
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// Wraps a closure as a [`ProducerRef`].
pub fn producer<T, F, Fut>(f: F) -> ProducerRef<T>
where
    T: 'static,
    F: Fn(ProducerOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProducerResult<T>> + Send + 'static,
{
    Arc::new(f)
}

/// Wraps a closure that settles with a plain value.
///
/// This is the common case: the closure returns `Result<T, FetchError>` and
/// every `Ok` becomes [`Resolved::Value`].
pub fn value_producer<T, F, Fut>(f: F) -> ProducerRef<T>
where
    T: Send + 'static,
    F: Fn(ProducerOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    producer(move |opts| f(opts).map(|result| result.map(Resolved::Value)))
}

/// Returns true if both refs point at the same producer.
pub fn same_producer<T>(a: &ProducerRef<T>, b: &ProducerRef<T>) -> bool {
    // Compare data pointers only; vtable pointers are not unique.
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
