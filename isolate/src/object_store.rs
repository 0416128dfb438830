use crate::{
    ClassTable, Failure, Heap, HeapError, Library, Object, ObjectPointerVisitor,
    Value, Visitable,
};

/// Name looked up when no handler name is configured.
pub const DEFAULT_UNHANDLED_EXCEPTION_HANDLER: &str =
    "_unhandledExceptionCallback";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryId(usize);

/// Isolate-wide well-known objects and program state.
#[derive(Debug)]
pub struct ObjectStore {
    sticky_error: Option<Failure>,
    out_of_memory: Value,
    stack_overflow: Value,
    isolate_unhandled_exception_class: u32,
    unhandled_exception_handler: Option<String>,
    libraries: Vec<Library>,
    isolate_library: Option<LibraryId>,
    root_library: Option<LibraryId>,
}

impl ObjectStore {
    /// Allocate the preallocated exceptions and the wrapper class used by
    /// the unhandled exception callback.
    pub fn new(heap: &mut Heap, classes: &mut ClassTable) -> Result<Self, HeapError> {
        let oom_class = classes.register(heap, "OutOfMemoryError")?;
        let overflow_class = classes.register(heap, "StackOverflowError")?;
        let wrapper_class = classes.register(heap, "IsolateUnhandledException")?;
        let out_of_memory = heap.allocate(Object::Instance {
            class: oom_class,
            fields: Vec::new(),
        })?;
        let stack_overflow = heap.allocate(Object::Instance {
            class: overflow_class,
            fields: Vec::new(),
        })?;
        Ok(Self {
            sticky_error: None,
            out_of_memory: Value::Ref(out_of_memory),
            stack_overflow: Value::Ref(stack_overflow),
            isolate_unhandled_exception_class: wrapper_class,
            unhandled_exception_handler: None,
            libraries: Vec::new(),
            isolate_library: None,
            root_library: None,
        })
    }

    pub fn sticky_error(&self) -> Option<&Failure> {
        self.sticky_error.as_ref()
    }

    pub fn set_sticky_error(&mut self, failure: Failure) {
        self.sticky_error = Some(failure);
    }

    pub fn clear_sticky_error(&mut self) -> Option<Failure> {
        self.sticky_error.take()
    }

    pub fn out_of_memory(&self) -> Value {
        self.out_of_memory
    }

    pub fn stack_overflow(&self) -> Value {
        self.stack_overflow
    }

    /// The preallocated exceptions are compared by identity.
    pub fn is_preallocated_exception(&self, exception: Value) -> bool {
        exception == self.out_of_memory || exception == self.stack_overflow
    }

    pub fn isolate_unhandled_exception_class(&self) -> u32 {
        self.isolate_unhandled_exception_class
    }

    pub fn unhandled_exception_handler(&self) -> &str {
        self.unhandled_exception_handler
            .as_deref()
            .unwrap_or(DEFAULT_UNHANDLED_EXCEPTION_HANDLER)
    }

    pub fn set_unhandled_exception_handler(&mut self, name: Option<String>) {
        self.unhandled_exception_handler = name;
    }

    pub fn add_library(&mut self, library: Library) -> LibraryId {
        self.libraries.push(library);
        LibraryId(self.libraries.len() - 1)
    }

    pub fn library(&self, id: LibraryId) -> &Library {
        &self.libraries[id.0]
    }

    pub fn library_mut(&mut self, id: LibraryId) -> &mut Library {
        &mut self.libraries[id.0]
    }

    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }

    pub fn set_isolate_library(&mut self, id: LibraryId) {
        self.isolate_library = Some(id);
    }

    pub fn isolate_library(&self) -> Option<&Library> {
        self.isolate_library.map(|id| self.library(id))
    }

    pub fn set_root_library(&mut self, id: LibraryId) {
        self.root_library = Some(id);
    }

    pub fn root_library(&self) -> Option<&Library> {
        self.root_library.map(|id| self.library(id))
    }
}

impl Visitable for ObjectStore {
    fn visit_object_pointers(&mut self, visitor: &mut dyn ObjectPointerVisitor) {
        visitor.visit_pointer(&mut self.out_of_memory);
        visitor.visit_pointer(&mut self.stack_overflow);
        if let Some(slots) = self.sticky_error.as_mut().and_then(Failure::slots_mut) {
            for slot in slots {
                visitor.visit_pointer(slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeapCreateInfo;

    #[test]
    fn bootstrap_allocates_distinct_sentinels() {
        let mut heap = Heap::new(HeapCreateInfo::default());
        let mut classes = ClassTable::new();
        let store = ObjectStore::new(&mut heap, &mut classes).unwrap();
        assert_ne!(store.out_of_memory(), store.stack_overflow());
        assert!(store.is_preallocated_exception(store.stack_overflow()));
        assert!(!store.is_preallocated_exception(Value::Null));
        assert_eq!(
            classes.name(&heap, store.isolate_unhandled_exception_class()),
            Some("IsolateUnhandledException")
        );
        assert_eq!(
            store.unhandled_exception_handler(),
            DEFAULT_UNHANDLED_EXCEPTION_HANDLER
        );
    }

    #[test]
    fn bootstrap_reports_a_tiny_heap() {
        let mut heap = Heap::new(HeapCreateInfo { capacity: 2 });
        assert!(ObjectStore::new(&mut heap, &mut ClassTable::new()).is_err());
    }
}
