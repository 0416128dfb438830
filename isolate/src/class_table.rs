use crate::{Heap, HeapError, Object, ObjectPointerVisitor, Value, Visitable};

/// Registry of class objects, indexed by class id.
#[derive(Debug, Default)]
pub struct ClassTable {
    classes: Vec<Value>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        heap: &mut Heap,
        name: &str,
    ) -> Result<u32, HeapError> {
        let class = heap.allocate(Object::Class { name: name.into() })?;
        let id = self.classes.len() as u32;
        self.classes.push(Value::Ref(class));
        Ok(id)
    }

    pub fn at(&self, id: u32) -> Option<Value> {
        self.classes.get(id as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class name lookup through the heap.
    pub fn name<'h>(&self, heap: &'h Heap, id: u32) -> Option<&'h str> {
        match heap.get(self.at(id)?.as_object()?) {
            Some(Object::Class { name }) => Some(name),
            _ => None,
        }
    }
}

impl Visitable for ClassTable {
    fn visit_object_pointers(&mut self, visitor: &mut dyn ObjectPointerVisitor) {
        visitor.visit_pointers(&mut self.classes);
    }
}
