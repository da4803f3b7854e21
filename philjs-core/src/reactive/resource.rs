//! Async data tied to reactive inputs.
//!
//! A [`Resource`] watches a source closure. Whenever the signals the source
//! reads change, the resource moves to `Loading` and queues a fetch for the
//! new input. The runtime has no executor of its own, so the queued fetch is
//! driven by awaiting [`Resource::ready`] on the thread that owns the
//! signals. A response that arrives after a newer fetch was queued is
//! dropped.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::batch::untrack;
use super::effect::Effect;
use super::signal::Signal;

/// Where a resource is in its load cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState<T, E = String> {
    /// Nothing requested yet.
    Idle,
    Loading,
    Ready(T),
    Error(E),
}

impl<T, E> ResourceState<T, E> {
    pub fn is_loading(&self) -> bool {
        matches!(self, ResourceState::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ResourceState::Ready(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResourceState::Error(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            ResourceState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            ResourceState::Error(err) => Some(err),
            _ => None,
        }
    }
}

type Fetcher<S, T, E> = dyn Fn(S) -> BoxFuture<'static, Result<T, E>> + Send + Sync;

struct Pending<T, E> {
    generation: u64,
    fetch: BoxFuture<'static, Result<T, E>>,
}

struct ResourceInner<T, S, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    source: Box<dyn Fn() -> S + Send + Sync>,
    fetcher: Box<Fetcher<S, T, E>>,
    state: Signal<ResourceState<T, E>>,
    generation: AtomicU64,
    pending: Mutex<Option<Pending<T, E>>>,
    effect: Mutex<Option<Effect>>,
}

impl<T, S, E> ResourceInner<T, S, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn start(&self, input: S) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let fetch = untrack(|| (self.fetcher)(input));
        *self.pending.lock() = Some(Pending { generation, fetch });
        trace!(generation, "resource fetch queued");
        self.state.set(ResourceState::Loading);
    }
}

impl<T, S, E> Drop for ResourceInner<T, S, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(effect) = self.effect.get_mut().take() {
            effect.dispose();
        }
    }
}

/// Async data that refetches when its source changes.
///
/// ```rust
/// use philjs_core::reactive::{Resource, ResourceState, Signal};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let id = Signal::new(1);
/// let i = id.clone();
/// let user = Resource::new(move || i.get(), |id: u32| async move {
///     Ok::<_, String>(format!("user-{id}"))
/// });
/// assert!(user.loading());
///
/// user.ready().await;
/// assert_eq!(user.get().as_deref(), Some("user-1"));
///
/// id.set(2);
/// assert_eq!(user.state(), ResourceState::Loading);
/// # }
/// ```
pub struct Resource<T, S = (), E = String>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    inner: Arc<ResourceInner<T, S, E>>,
}

impl<T, S, E> Resource<T, S, E>
where
    T: Clone + Send + Sync + 'static,
    S: Send + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a resource and queue the first fetch.
    ///
    /// `source` runs tracked; a change to anything it reads queues a new
    /// fetch. `fetcher` runs untracked.
    pub fn new<Src, F, Fut>(source: Src, fetcher: F) -> Self
    where
        Src: Fn() -> S + Send + Sync + 'static,
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let inner = Arc::new(ResourceInner {
            source: Box::new(source),
            fetcher: Box::new(move |input| fetcher(input).boxed()),
            state: Signal::new(ResourceState::Idle),
            generation: AtomicU64::new(0),
            pending: Mutex::new(None),
            effect: Mutex::new(None),
        });

        let weak: Weak<ResourceInner<T, S, E>> = Arc::downgrade(&inner);
        let effect = Effect::new(move || {
            if let Some(inner) = weak.upgrade() {
                let input = (inner.source)();
                untrack(|| inner.start(input));
            }
        });
        *inner.effect.lock() = Some(effect);

        Self { inner }
    }

    /// Tracked read of the load state.
    pub fn state(&self) -> ResourceState<T, E> {
        self.inner.state.get()
    }

    /// The state as a signal, for views that match on it.
    pub fn state_signal(&self) -> Signal<ResourceState<T, E>> {
        self.inner.state.clone()
    }

    /// The loaded value, if any. Tracked.
    pub fn get(&self) -> Option<T> {
        self.inner.state.with(|state| state.value().cloned())
    }

    pub fn error(&self) -> Option<E> {
        self.inner.state.with(|state| state.error().cloned())
    }

    pub fn loading(&self) -> bool {
        self.inner.state.with(ResourceState::is_loading)
    }

    /// Queue a fetch for the current input even though it did not change.
    pub fn refetch(&self) {
        let input = untrack(|| (self.inner.source)());
        self.inner.start(input);
    }

    /// Edit a loaded value in place without fetching. Ignored unless ready.
    pub fn mutate(&self, f: impl FnOnce(&mut T)) {
        let mut ready = false;
        self.inner.state.modify(|state| {
            if let ResourceState::Ready(value) = state {
                f(value);
                ready = true;
            }
        });
        if !ready {
            debug!("resource mutate ignored while not ready");
        }
    }

    /// Replace the state with a loaded value, dropping any queued fetch.
    pub fn set(&self, value: T) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.pending.lock().take();
        self.inner.state.set(ResourceState::Ready(value));
    }

    /// Drive queued fetches until none is left.
    ///
    /// Must be awaited on the thread that owns the resource's signals.
    pub async fn ready(&self) {
        loop {
            let Some(Pending { generation, fetch }) = self.inner.pending.lock().take() else {
                return;
            };
            let result = fetch.await;
            if generation != self.inner.generation.load(Ordering::SeqCst) {
                trace!(generation, "dropping stale resource response");
                continue;
            }
            self.inner.state.set(match result {
                Ok(value) => ResourceState::Ready(value),
                Err(err) => ResourceState::Error(err),
            });
        }
    }
}

impl<T, E> Resource<T, (), E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// A resource with no input; it fetches once and on `refetch`.
    pub fn once<F, Fut>(fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::new(|| (), move |()| fetcher())
    }
}

impl<T, S, E> Clone for Resource<T, S, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Shorthand for [`Resource::new`].
pub fn create_resource<T, S, E, Src, F, Fut>(source: Src, fetcher: F) -> Resource<T, S, E>
where
    T: Clone + Send + Sync + 'static,
    S: Send + 'static,
    E: Clone + Send + Sync + 'static,
    Src: Fn() -> S + Send + Sync + 'static,
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    Resource::new(source, fetcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Signal};
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn loads_and_refetches_when_the_source_changes() {
        let id = Signal::new(1_u32);
        let calls = Arc::new(AtomicUsize::new(0));

        let (i, c) = (id.clone(), calls.clone());
        let user = create_resource(
            move || i.get(),
            move |id| {
                c.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, String>(format!("user-{id}")) }
            },
        );
        assert_eq!(user.state(), ResourceState::Loading);

        user.ready().await;
        assert_eq!(user.get().as_deref(), Some("user-1"));

        id.set(2);
        assert!(user.loading());
        user.ready().await;
        assert_eq!(user.get().as_deref(), Some("user-2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_kept_in_the_state() {
        let user: Resource<String> = Resource::once(|| async { Err("offline".to_string()) });
        user.ready().await;
        assert!(user.state().is_error());
        assert_eq!(user.error().as_deref(), Some("offline"));
        assert_eq!(user.get(), None);
    }

    #[tokio::test]
    async fn only_the_newest_response_lands() {
        let id = Signal::new(1_u32);
        let (i, moved) = (id.clone(), id.clone());
        let user = Resource::new(
            move || i.get(),
            move |value| {
                let moved = moved.clone();
                async move {
                    // The input moves on while the first request is in flight.
                    if value == 1 {
                        moved.set(2);
                    }
                    Ok::<_, String>(value * 10)
                }
            },
        );

        user.ready().await;
        assert_eq!(user.get(), Some(20));

        id.set(3);
        id.set(4);
        user.ready().await;
        assert_eq!(user.get(), Some(40));
    }

    #[tokio::test]
    async fn refetch_and_mutate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let list = Resource::once(move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, String>(vec![n]) }
        });

        list.mutate(|items| items.push(99));
        list.ready().await;
        assert_eq!(list.get(), Some(vec![0]));

        list.mutate(|items| items.push(7));
        assert_eq!(list.get(), Some(vec![0, 7]));

        list.refetch();
        list.ready().await;
        assert_eq!(list.get(), Some(vec![1]));

        list.set(vec![5]);
        assert_eq!(list.get(), Some(vec![5]));
    }

    #[tokio::test]
    async fn views_react_to_state_changes() {
        let user: Resource<u32> = Resource::once(|| async { Ok(7) });
        let u = user.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let effect = Effect::new(move || {
            s.lock().push(u.loading());
        });

        user.ready().await;
        assert_eq!(*seen.lock(), vec![true, false]);
        effect.dispose();
    }

    #[test]
    fn dropping_the_resource_stops_watching() {
        let id = Signal::new(1_u32);
        let i = id.clone();
        let user = Resource::new(move || i.get(), |id| async move { Ok::<_, String>(id) });
        assert_eq!(id.subscriber_count(), 1);
        drop(user);
        assert_eq!(id.subscriber_count(), 0);
    }
}
