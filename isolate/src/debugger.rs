use crate::{ObjectPointerVisitor, Value, Visitable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub id: u32,
    pub function: String,
    pub line: u32,
}

/// Per-isolate debugger bookkeeping: breakpoints and objects the debugger
/// keeps alive while paused.
#[derive(Debug, Default)]
pub struct Debugger {
    isolate_name: String,
    breakpoints: Vec<Breakpoint>,
    retained: Vec<Value>,
    next_id: u32,
    active: bool,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn initialize(&mut self, isolate_name: &str) {
        assert!(!self.active, "debugger initialized twice");
        self.isolate_name = isolate_name.to_owned();
        self.active = true;
    }

    /// Release everything. Needs a zone on the isolate.
    pub(crate) fn shutdown(&mut self) {
        if !self.active {
            return;
        }
        log::debug!(
            "{}: debugger shutdown, {} breakpoints removed",
            self.isolate_name,
            self.breakpoints.len()
        );
        self.breakpoints.clear();
        self.retained.clear();
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_breakpoint(&mut self, function: &str, line: u32) -> u32 {
        self.next_id += 1;
        self.breakpoints.push(Breakpoint {
            id: self.next_id,
            function: function.to_owned(),
            line,
        });
        self.next_id
    }

    pub fn remove_breakpoint(&mut self, id: u32) -> bool {
        let before = self.breakpoints.len();
        self.breakpoints.retain(|bp| bp.id != id);
        before != self.breakpoints.len()
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn retain(&mut self, value: Value) {
        self.retained.push(value);
    }

    pub fn retained(&self) -> &[Value] {
        &self.retained
    }
}

impl Visitable for Debugger {
    fn visit_object_pointers(&mut self, visitor: &mut dyn ObjectPointerVisitor) {
        visitor.visit_pointers(&mut self.retained);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_releases_everything() {
        let mut debugger = Debugger::new();
        debugger.initialize("test-1");
        let id = debugger.set_breakpoint("main", 3);
        debugger.set_breakpoint("main", 4);
        assert!(debugger.remove_breakpoint(id));
        assert!(!debugger.remove_breakpoint(id));
        debugger.retain(Value::Smi(1));
        debugger.shutdown();
        assert!(debugger.breakpoints().is_empty());
        assert!(debugger.retained().is_empty());
        assert!(!debugger.is_active());
    }
}
