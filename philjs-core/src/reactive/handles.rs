//! Read-only, write-only and combined signal handles.
//!
//! [`create_signal`] hands out the two halves of one signal so that a
//! component can pass the getter down without giving away the setter.

use std::fmt::Debug;

use super::signal::{Signal, Subscription};
use crate::graph::NodeId;

/// The reading half of a signal.
pub struct ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Signal<T>,
}

impl<T> ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn id(&self) -> NodeId {
        self.inner.id()
    }

    /// Tracked read.
    pub fn get(&self) -> T {
        self.inner.get()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.get_untracked()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.with(f)
    }

    pub fn subscribe<F>(&self, notify: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.subscribe(notify)
    }
}

/// The writing half of a signal.
pub struct WriteSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Signal<T>,
}

impl<T> WriteSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn id(&self) -> NodeId {
        self.inner.id()
    }

    pub fn set(&self, value: T) {
        self.inner.set(value);
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        self.inner.update(f);
    }

    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        self.inner.modify(f);
    }
}

/// A signal passed around as one value that can be read, written, or split.
///
/// ```rust
/// use philjs_core::reactive::RwSignal;
///
/// let count = RwSignal::new(1);
/// let (read, write) = count.clone().split();
/// write.set(2);
/// assert_eq!(read.get(), 2);
/// assert_eq!(count.get(), 2);
/// ```
pub struct RwSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Signal<T>,
}

impl<T> RwSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            inner: Signal::new(value),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id()
    }

    pub fn get(&self) -> T {
        self.inner.get()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.get_untracked()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.with(f)
    }

    pub fn set(&self, value: T) {
        self.inner.set(value);
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        self.inner.update(f);
    }

    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        self.inner.modify(f);
    }

    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            inner: self.inner.clone(),
        }
    }

    pub fn write_only(&self) -> WriteSignal<T> {
        WriteSignal {
            inner: self.inner.clone(),
        }
    }

    pub fn split(self) -> (ReadSignal<T>, WriteSignal<T>) {
        (self.read_only(), WriteSignal { inner: self.inner })
    }

    /// The underlying signal.
    pub fn signal(&self) -> Signal<T> {
        self.inner.clone()
    }
}

impl<T> From<Signal<T>> for RwSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(inner: Signal<T>) -> Self {
        Self { inner }
    }
}

macro_rules! handle_traits {
    ($($handle:ident),*) => {
        $(
            impl<T> Clone for $handle<T>
            where
                T: Clone + Send + Sync + 'static,
            {
                fn clone(&self) -> Self {
                    Self {
                        inner: self.inner.clone(),
                    }
                }
            }

            impl<T> PartialEq for $handle<T>
            where
                T: Clone + Send + Sync + 'static,
            {
                fn eq(&self, other: &Self) -> bool {
                    self.inner == other.inner
                }
            }

            impl<T> Debug for $handle<T>
            where
                T: Clone + Send + Sync + Debug + 'static,
            {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.debug_struct(stringify!($handle))
                        .field("id", &self.inner.id())
                        .field("value", &self.inner.get_untracked())
                        .finish()
                }
            }
        )*
    };
}

handle_traits!(ReadSignal, WriteSignal, RwSignal);

impl<T> Default for RwSignal<T>
where
    T: Clone + Send + Sync + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Create a signal and return its read and write halves.
///
/// ```rust
/// use philjs_core::reactive::create_signal;
///
/// let (count, set_count) = create_signal(0);
/// set_count.update(|n| n + 1);
/// assert_eq!(count.get(), 1);
/// ```
pub fn create_signal<T>(value: T) -> (ReadSignal<T>, WriteSignal<T>)
where
    T: Clone + Send + Sync + 'static,
{
    RwSignal::new(value).split()
}

pub fn create_rw_signal<T>(value: T) -> RwSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    RwSignal::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, Memo};
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn halves_share_one_signal() {
        let (count, set_count) = create_signal(1);
        assert_eq!(count.id(), set_count.id());

        let seen = Arc::new(AtomicI32::new(0));
        let s = seen.clone();
        let c = count.clone();
        effect(move || {
            s.store(c.get(), Ordering::SeqCst);
        });

        set_count.set(5);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
        set_count.modify(|n| *n *= 2);
        assert_eq!(count.get_untracked(), 10);
    }

    #[test]
    fn rw_signal_views_track_the_same_node() {
        let value = create_rw_signal(String::from("a"));
        let read = value.read_only();
        let write = value.write_only();

        let r = read.clone();
        let upper = Memo::new(move || r.with(|text| text.to_uppercase()));
        assert_eq!(upper.get(), "A");

        write.set("b".into());
        assert_eq!(upper.get(), "B");
        assert_eq!(value.get(), "b");
        assert_eq!(value.signal().subscriber_count(), 1);
        assert_eq!(read, value.read_only());
    }

    #[test]
    fn read_half_can_subscribe() {
        let (count, set_count) = create_signal(0);
        let last = Arc::new(AtomicI32::new(-1));
        let l = last.clone();
        let _subscription = count.subscribe(move |value| l.store(*value, Ordering::SeqCst));
        set_count.set(3);
        assert_eq!(last.load(Ordering::SeqCst), 3);
    }
}
