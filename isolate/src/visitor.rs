use crate::{FinalizablePersistentHandle, Value};

/// Drives a collector over isolate-owned reference slots.
///
/// Each owning structure hands over its own typed slots. A visitor may
/// rewrite a slot in place (relocation during compaction); visiting the same
/// slot twice must be harmless.
pub trait ObjectPointerVisitor {
    fn visit_pointer(&mut self, slot: &mut Value);

    fn visit_pointers(&mut self, slots: &mut [Value]) {
        for slot in slots {
            self.visit_pointer(slot);
        }
    }
}

impl<F> ObjectPointerVisitor for F
where
    F: FnMut(&mut Value),
{
    #[inline]
    fn visit_pointer(&mut self, slot: &mut Value) {
        self(slot)
    }
}

/// Structures that own reference slots.
pub trait Visitable {
    fn visit_object_pointers(&mut self, visitor: &mut dyn ObjectPointerVisitor);
}

/// Visitor over weak persistent handles, used by the collector to pick
/// finalization candidates.
pub trait HandleVisitor {
    fn visit_handle(&mut self, handle: &mut FinalizablePersistentHandle);
}

impl<F> HandleVisitor for F
where
    F: FnMut(&mut FinalizablePersistentHandle),
{
    #[inline]
    fn visit_handle(&mut self, handle: &mut FinalizablePersistentHandle) {
        self(handle)
    }
}
