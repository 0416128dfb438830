use std::fmt;

use crate::{HandleVisitor, ObjectPointerVisitor, Value, Visitable};

/// Runs once when a weak handle's referent is released. Receives the peer
/// registered with the handle.
pub type WeakHandleFinalizer = Box<dyn FnOnce(usize) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistentHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeakPersistentHandle(usize);

/// A host-held reference that does not keep its referent alive.
///
/// Prologue handles are roots for a partial walk; the rest are only ever
/// seen by the weak handle visit.
pub struct FinalizablePersistentHandle {
    referent: Value,
    peer: usize,
    prologue: bool,
    finalizer: Option<WeakHandleFinalizer>,
}

impl fmt::Debug for FinalizablePersistentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizablePersistentHandle")
            .field("referent", &self.referent)
            .field("peer", &self.peer)
            .field("prologue", &self.prologue)
            .field("finalized", &self.finalizer.is_none())
            .finish()
    }
}

impl FinalizablePersistentHandle {
    pub fn referent(&self) -> Value {
        self.referent
    }

    /// For collectors that move or clear the referent.
    pub fn referent_mut(&mut self) -> &mut Value {
        &mut self.referent
    }

    pub fn peer(&self) -> usize {
        self.peer
    }

    pub fn is_prologue(&self) -> bool {
        self.prologue
    }

    /// Clear the referent and run the finalizer. Later calls do nothing.
    pub fn finalize(&mut self) {
        self.referent = Value::Null;
        if let Some(finalizer) = self.finalizer.take() {
            finalizer(self.peer);
        }
    }
}

/// Handles the embedder holds into an isolate's heap.
#[derive(Debug, Default)]
pub struct ApiState {
    persistent: Vec<Option<Value>>,
    weak: Vec<Option<FinalizablePersistentHandle>>,
    local_scopes: Vec<Vec<Value>>,
}

impl ApiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_persistent(&mut self, value: Value) -> PersistentHandle {
        if let Some(index) = self.persistent.iter().position(Option::is_none) {
            self.persistent[index] = Some(value);
            return PersistentHandle(index);
        }
        self.persistent.push(Some(value));
        PersistentHandle(self.persistent.len() - 1)
    }

    pub fn persistent(&self, handle: PersistentHandle) -> Option<Value> {
        self.persistent.get(handle.0).copied().flatten()
    }

    pub fn delete_persistent(&mut self, handle: PersistentHandle) {
        if let Some(slot) = self.persistent.get_mut(handle.0) {
            *slot = None;
        }
    }

    pub fn new_weak(
        &mut self,
        referent: Value,
        peer: usize,
        prologue: bool,
        finalizer: Option<WeakHandleFinalizer>,
    ) -> WeakPersistentHandle {
        let handle = FinalizablePersistentHandle {
            referent,
            peer,
            prologue,
            finalizer,
        };
        if let Some(index) = self.weak.iter().position(Option::is_none) {
            self.weak[index] = Some(handle);
            return WeakPersistentHandle(index);
        }
        self.weak.push(Some(handle));
        WeakPersistentHandle(self.weak.len() - 1)
    }

    pub fn weak(
        &self,
        handle: WeakPersistentHandle,
    ) -> Option<&FinalizablePersistentHandle> {
        self.weak.get(handle.0).and_then(Option::as_ref)
    }

    /// Free a weak handle without running its finalizer.
    pub fn delete_weak(&mut self, handle: WeakPersistentHandle) {
        if let Some(slot) = self.weak.get_mut(handle.0) {
            *slot = None;
        }
    }

    pub fn weak_count(&self) -> usize {
        self.weak.iter().flatten().count()
    }

    pub fn enter_scope(&mut self) {
        self.local_scopes.push(Vec::new());
    }

    pub fn exit_scope(&mut self) {
        assert!(self.local_scopes.pop().is_some(), "api scope underflow");
    }

    pub fn scope_depth(&self) -> usize {
        self.local_scopes.len()
    }

    pub fn new_local(&mut self, value: Value) -> usize {
        let scope = self
            .local_scopes
            .last_mut()
            .expect("local handle outside an api scope");
        scope.push(value);
        scope.len() - 1
    }

    pub fn local(&self, index: usize) -> Option<Value> {
        self.local_scopes.last()?.get(index).copied()
    }

    /// Strong roots: persistent and local handles, plus prologue weak
    /// handles when asked.
    pub fn visit_roots(
        &mut self,
        visitor: &mut dyn ObjectPointerVisitor,
        visit_prologue_weak_handles: bool,
    ) {
        for value in self.persistent.iter_mut().flatten() {
            visitor.visit_pointer(value);
        }
        for scope in &mut self.local_scopes {
            visitor.visit_pointers(scope);
        }
        if visit_prologue_weak_handles {
            for handle in self.weak.iter_mut().flatten() {
                if handle.prologue {
                    visitor.visit_pointer(&mut handle.referent);
                }
            }
        }
    }

    /// Weak handles; prologue ones only when asked.
    pub fn visit_weak_handles(
        &mut self,
        visitor: &mut dyn HandleVisitor,
        visit_prologue: bool,
    ) {
        for handle in self.weak.iter_mut().flatten() {
            if !handle.prologue || visit_prologue {
                visitor.visit_handle(handle);
            }
        }
    }

    /// Finalize and free every weak handle whose referent is still set.
    /// Returns how many finalizers ran.
    pub fn finalize_weak_handles(&mut self) -> usize {
        let mut finalized = 0;
        for slot in &mut self.weak {
            if let Some(handle) = slot {
                if !handle.referent.is_null() {
                    handle.finalize();
                    finalized += 1;
                }
            }
            *slot = None;
        }
        finalized
    }
}

impl Visitable for ApiState {
    fn visit_object_pointers(&mut self, visitor: &mut dyn ObjectPointerVisitor) {
        self.visit_roots(visitor, false);
    }
}
