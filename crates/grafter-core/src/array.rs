//! # Element Arrays
//!
//! Dense, auto-resizing per-element storage keyed by node, edge or component identity.
//!
//! Every array registers itself with the [`ArrayRegistry`] of the graph (or component
//! manager) that allocates its identifiers. When the host's capacity grows, the registry
//! grows every live array in the same critical section, so an array is never shorter
//! than its host's capacity. Arrays deregister on drop.
//!
//! ## Locking
//!
//! The registry lock is always taken before an array's storage lock. Do not mutate the
//! host graph while holding an [`ArrayWriteGuard`] or [`ArrayReadGuard`] on one of its
//! arrays from the same thread.

use crate::types::{ComponentId, EdgeId, ElementId, ElementKind, NodeId};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

// =============================================================================
// REGISTRY
// =============================================================================

/// A collaborator that follows its host's capacity.
pub trait ResizableArray: Send + Sync {
    /// Grow to at least `capacity` slots. Never shrinks.
    fn grow(&self, capacity: usize);
}

#[derive(Default)]
struct RegistryInner {
    capacity: usize,
    slots: Vec<Option<Weak<dyn ResizableArray>>>,
    free: Vec<usize>,
}

/// The registration list of every live array for one element kind of one host.
pub struct ArrayRegistry {
    kind: ElementKind,
    inner: Mutex<RegistryInner>,
}

impl ArrayRegistry {
    /// Create an empty registry with zero capacity.
    #[must_use]
    pub fn new(kind: ElementKind) -> Arc<Self> {
        Self::with_capacity(kind, 0)
    }

    /// Create an empty registry starting at `capacity`.
    #[must_use]
    pub fn with_capacity(kind: ElementKind, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            kind,
            inner: Mutex::new(RegistryInner {
                capacity,
                ..RegistryInner::default()
            }),
        })
    }

    /// The element kind of the identifiers this registry covers.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// The host's current capacity for this kind.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Number of arrays currently registered.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.inner.lock().slots.iter().filter(|s| s.is_some()).count()
    }

    /// Raise the capacity and synchronously grow every registered array.
    ///
    /// Requests that do not exceed the current capacity are ignored.
    pub fn grow(&self, capacity: usize) {
        let mut inner = self.inner.lock();
        if capacity <= inner.capacity {
            return;
        }
        inner.capacity = capacity;

        for slot in &inner.slots {
            if let Some(array) = slot.as_ref().and_then(Weak::upgrade) {
                array.grow(capacity);
            }
        }
    }

    fn register(&self, array: &Arc<dyn ResizableArray>) -> usize {
        let mut inner = self.inner.lock();
        array.grow(inner.capacity);

        let weak = Arc::downgrade(array);
        match inner.free.pop() {
            Some(key) => {
                inner.slots[key] = Some(weak);
                key
            }
            None => {
                inner.slots.push(Some(weak));
                inner.slots.len() - 1
            }
        }
    }

    fn deregister(&self, key: usize) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.slots.get_mut(key) {
            if slot.take().is_some() {
                inner.free.push(key);
            }
        }
    }
}

impl fmt::Debug for ArrayRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRegistry")
            .field("kind", &self.kind)
            .field("capacity", &self.capacity())
            .field("registered", &self.registered())
            .finish()
    }
}

/// Anything that allocates identifiers of kind `I` and hosts arrays keyed by them.
pub trait ArrayHost<I: ElementId> {
    fn array_registry(&self) -> &Arc<ArrayRegistry>;
}

// =============================================================================
// STORAGE
// =============================================================================

struct ArrayStorage<T> {
    data: RwLock<Vec<T>>,
    default: T,
}

impl<T: Clone + Send + Sync> ResizableArray for ArrayStorage<T> {
    fn grow(&self, capacity: usize) {
        let mut data = self.data.write();
        if data.len() < capacity {
            data.resize(capacity, self.default.clone());
        }
    }
}

// =============================================================================
// ELEMENT ARRAY
// =============================================================================

/// A dense array of `T` indexed by identifiers of kind `I`.
///
/// Accessing an id that is not live on the host is legal but meaningless; callers
/// intersect with the host's live ids themselves.
pub struct ElementArray<I: ElementId, T: Clone + Send + Sync + 'static> {
    storage: Arc<ArrayStorage<T>>,
    registry: Arc<ArrayRegistry>,
    key: usize,
    flag: AtomicBool,
    _id: PhantomData<fn(I) -> I>,
}

/// An array keyed by node identity.
pub type NodeArray<T> = ElementArray<NodeId, T>;

/// An array keyed by edge identity.
pub type EdgeArray<T> = ElementArray<EdgeId, T>;

/// An array keyed by component identity.
pub type ComponentArray<T> = ElementArray<ComponentId, T>;

impl<I: ElementId, T: Clone + Send + Sync + 'static> ElementArray<I, T> {
    /// Create an array on `host`, with new slots holding `T::default()`.
    pub fn new<H: ArrayHost<I> + ?Sized>(host: &H) -> Self
    where
        T: Default,
    {
        Self::with_default(host, T::default())
    }

    /// Create an array on `host`, with every slot (present and future) starting at `value`.
    pub fn with_default<H: ArrayHost<I> + ?Sized>(host: &H, value: T) -> Self {
        Self::on_registry(host.array_registry().clone(), Vec::new(), value)
    }

    fn on_registry(registry: Arc<ArrayRegistry>, data: Vec<T>, default: T) -> Self {
        debug_assert_eq!(registry.kind(), I::KIND);

        let storage = Arc::new(ArrayStorage {
            data: RwLock::new(data),
            default,
        });
        let resizable: Arc<dyn ResizableArray> = storage.clone();
        let key = registry.register(&resizable);

        Self {
            storage,
            registry,
            key,
            flag: AtomicBool::new(false),
            _id: PhantomData,
        }
    }

    /// Read the value stored for `id`.
    pub fn get(&self, id: I) -> T {
        self.storage.data.read()[id.index()].clone()
    }

    /// Store `value` for `id`.
    pub fn set(&self, id: I, value: T) {
        self.storage.data.write()[id.index()] = value;
    }

    /// Reset every slot to `value`.
    pub fn fill(&self, value: T) {
        self.storage.data.write().fill(value);
    }

    /// Number of slots (always at least the host's capacity).
    pub fn len(&self) -> usize {
        self.storage.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow to at least `capacity` slots, independently of the host.
    pub fn resize(&self, capacity: usize) {
        self.storage.grow(capacity);
    }

    /// Whether the per-array flag is set.
    pub fn flagged(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn flag(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn reset_flag(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Take the shared scoped lock.
    pub fn read(&self) -> ArrayReadGuard<'_, I, T> {
        ArrayReadGuard {
            data: self.storage.data.read(),
            _id: PhantomData,
        }
    }

    /// Take the exclusive scoped lock.
    pub fn write(&self) -> ArrayWriteGuard<'_, I, T> {
        ArrayWriteGuard {
            data: self.storage.data.write(),
            _id: PhantomData,
        }
    }

    /// Copy every value out.
    pub fn to_vec(&self) -> Vec<T> {
        self.storage.data.read().clone()
    }
}

impl<I: ElementId, T: Clone + Send + Sync + 'static> Clone for ElementArray<I, T> {
    fn clone(&self) -> Self {
        let data = self.storage.data.read().clone();
        let copy = Self::on_registry(self.registry.clone(), data, self.storage.default.clone());
        copy.flag.store(self.flagged(), Ordering::Release);
        copy
    }
}

impl<I: ElementId, T: Clone + Send + Sync + 'static> Drop for ElementArray<I, T> {
    fn drop(&mut self) {
        self.registry.deregister(self.key);
    }
}

impl<I: ElementId, T: Clone + Send + Sync + 'static> fmt::Debug for ElementArray<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementArray")
            .field("kind", &I::KIND)
            .field("len", &self.len())
            .field("flagged", &self.flagged())
            .finish()
    }
}

// =============================================================================
// SCOPED GUARDS
// =============================================================================

/// Shared access to an array's slots for the guard's lifetime.
pub struct ArrayReadGuard<'a, I: ElementId, T> {
    data: RwLockReadGuard<'a, Vec<T>>,
    _id: PhantomData<fn(I) -> I>,
}

impl<I: ElementId, T> ArrayReadGuard<'_, I, T> {
    pub fn get(&self, id: I) -> &T {
        &self.data[id.index()]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.data.iter().enumerate().map(|(i, v)| (I::from_index(i), v))
    }
}

impl<I: ElementId, T> Index<I> for ArrayReadGuard<'_, I, T> {
    type Output = T;

    fn index(&self, id: I) -> &T {
        &self.data[id.index()]
    }
}

/// Exclusive access to an array's slots for the guard's lifetime.
pub struct ArrayWriteGuard<'a, I: ElementId, T> {
    data: RwLockWriteGuard<'a, Vec<T>>,
    _id: PhantomData<fn(I) -> I>,
}

impl<I: ElementId, T: Clone> ArrayWriteGuard<'_, I, T> {
    pub fn set(&mut self, id: I, value: T) {
        self.data[id.index()] = value;
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<I: ElementId, T> Index<I> for ArrayWriteGuard<'_, I, T> {
    type Output = T;

    fn index(&self, id: I) -> &T {
        &self.data[id.index()]
    }
}

impl<I: ElementId, T> IndexMut<I> for ArrayWriteGuard<'_, I, T> {
    fn index_mut(&mut self, id: I) -> &mut T {
        &mut self.data[id.index()]
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Host {
        nodes: Arc<ArrayRegistry>,
    }

    impl Host {
        fn new(capacity: usize) -> Self {
            Self {
                nodes: ArrayRegistry::with_capacity(ElementKind::Node, capacity),
            }
        }
    }

    impl ArrayHost<NodeId> for Host {
        fn array_registry(&self) -> &Arc<ArrayRegistry> {
            &self.nodes
        }
    }

    #[test]
    fn new_array_matches_host_capacity() {
        let host = Host::new(4);
        let array: NodeArray<i32> = NodeArray::new(&host);
        assert_eq!(array.len(), 4);
        assert_eq!(array.get(NodeId(3)), 0);
    }

    #[test]
    fn growth_preserves_values_and_defaults_new_slots() {
        let host = Host::new(2);
        let array = NodeArray::with_default(&host, 9u8);
        array.set(NodeId(1), 5);

        host.nodes.grow(6);

        assert_eq!(array.len(), 6);
        assert_eq!(array.get(NodeId(1)), 5);
        assert_eq!(array.get(NodeId(0)), 9);
        assert_eq!(array.get(NodeId(5)), 9);
    }

    #[test]
    fn capacity_never_shrinks() {
        let host = Host::new(8);
        let array: NodeArray<u8> = NodeArray::new(&host);
        host.nodes.grow(3);
        array.resize(2);
        assert_eq!(host.nodes.capacity(), 8);
        assert_eq!(array.len(), 8);
    }

    #[test]
    fn drop_deregisters() {
        let host = Host::new(1);
        let a: NodeArray<u8> = NodeArray::new(&host);
        {
            let _b: NodeArray<u8> = NodeArray::new(&host);
            assert_eq!(host.nodes.registered(), 2);
        }
        assert_eq!(host.nodes.registered(), 1);
        drop(a);
        assert_eq!(host.nodes.registered(), 0);
    }

    #[test]
    fn clone_is_independent_and_registered() {
        let host = Host::new(3);
        let original: NodeArray<i64> = NodeArray::new(&host);
        original.set(NodeId(0), 1);
        original.flag();

        let copy = original.clone();
        copy.set(NodeId(0), 2);

        assert_eq!(original.get(NodeId(0)), 1);
        assert_eq!(copy.get(NodeId(0)), 2);
        assert!(copy.flagged());
        assert_eq!(host.nodes.registered(), 2);

        host.nodes.grow(10);
        assert_eq!(copy.len(), 10);
    }

    #[test]
    fn fill_resets_every_slot() {
        let host = Host::new(3);
        let array = NodeArray::with_default(&host, false);
        array.set(NodeId(2), true);
        array.fill(true);
        assert!(array.to_vec().iter().all(|v| *v));
    }

    #[test]
    fn flag_round_trip() {
        let host = Host::new(0);
        let array: NodeArray<u8> = NodeArray::new(&host);
        assert!(!array.flagged());
        array.flag();
        assert!(array.flagged());
        array.reset_flag();
        assert!(!array.flagged());
    }

    #[test]
    fn guards_index_by_id() {
        let host = Host::new(3);
        let array: NodeArray<u32> = NodeArray::new(&host);
        {
            let mut guard = array.write();
            guard[NodeId(1)] = 7;
            guard.set(NodeId(2), 8);
        }
        let guard = array.read();
        assert_eq!(guard[NodeId(1)], 7);
        assert_eq!(*guard.get(NodeId(2)), 8);
        let collected: Vec<_> = guard.iter().map(|(id, v)| (id, *v)).collect();
        assert_eq!(collected, vec![(NodeId(0), 0), (NodeId(1), 7), (NodeId(2), 8)]);
    }

    #[test]
    fn concurrent_growth_and_writes() {
        let host = Arc::new(Host::new(1));
        let array = Arc::new(NodeArray::<u64>::new(host.as_ref()));

        let grower = {
            let host = host.clone();
            std::thread::spawn(move || {
                for capacity in 2..200 {
                    host.nodes.grow(capacity);
                }
            })
        };

        for _ in 0..200 {
            array.set(NodeId(0), array.get(NodeId(0)).saturating_add(1));
        }
        grower.join().expect("grower thread");

        assert_eq!(array.len(), 199);
        assert_eq!(array.get(NodeId(0)), 200);
    }
}
