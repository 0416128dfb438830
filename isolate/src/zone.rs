use crate::{ObjectPointerVisitor, Value, Visitable};

/// Index of a handle in the zone stack. Only valid while its zone is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneHandle {
    zone: usize,
    index: usize,
}

/// Scratch handle area for one unit of work.
#[derive(Debug, Default)]
struct Zone {
    handles: Vec<Value>,
}

/// The stack of open zones. The innermost zone receives new handles.
#[derive(Debug, Default)]
pub struct Zones {
    stack: Vec<Zone>,
}

impl Zones {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self) {
        self.stack.push(Zone::default());
    }

    pub(crate) fn pop(&mut self) {
        assert!(self.stack.pop().is_some(), "zone stack underflow");
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn new_handle(&mut self, value: Value) -> ZoneHandle {
        let zone = self.stack.len().checked_sub(1).expect("no open zone");
        let handles = &mut self.stack[zone].handles;
        handles.push(value);
        ZoneHandle {
            zone,
            index: handles.len() - 1,
        }
    }

    pub fn get(&self, handle: ZoneHandle) -> Value {
        self.stack[handle.zone].handles[handle.index]
    }

    pub fn set(&mut self, handle: ZoneHandle, value: Value) {
        self.stack[handle.zone].handles[handle.index] = value;
    }
}

impl Visitable for Zones {
    fn visit_object_pointers(&mut self, visitor: &mut dyn ObjectPointerVisitor) {
        for zone in &mut self.stack {
            visitor.visit_pointers(&mut zone.handles);
        }
    }
}
