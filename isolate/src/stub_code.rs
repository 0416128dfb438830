use crate::{ObjectPointerVisitor, Value, Visitable};

/// Per-isolate generated stubs, by name.
#[derive(Debug, Default)]
pub struct StubCode {
    entries: Vec<(&'static str, Value)>,
}

impl StubCode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, name: &'static str, code: Value) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = code,
            None => self.entries.push((name, code)),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, code)| code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Visitable for StubCode {
    fn visit_object_pointers(&mut self, visitor: &mut dyn ObjectPointerVisitor) {
        for (_, code) in &mut self.entries {
            visitor.visit_pointer(code);
        }
    }
}
