use crate::{HeapError, ObjectRef, Value};

/// Objects an isolate heap can hold.
///
/// The layout is plain. Allocation policy and collection live
/// outside this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Instance { class: u32, fields: Vec<Value> },
    Array(Vec<Value>),
    String(String),
    Bytes(Vec<u8>),
    Class { name: String },
}

impl Object {
    /// Whether program code may observe this object as a value.
    pub fn is_instance(&self) -> bool {
        !matches!(self, Object::Class { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Object::Instance { .. } => "instance",
            Object::Array(_) => "array",
            Object::String(_) => "string",
            Object::Bytes(_) => "bytes",
            Object::Class { .. } => "class",
        }
    }

    fn edges(&self) -> &[Value] {
        match self {
            Object::Instance { fields, .. } => fields,
            Object::Array(values) => values,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeapCreateInfo {
    /// Maximum number of live objects.
    pub capacity: usize,
}

impl Default for HeapCreateInfo {
    fn default() -> Self {
        Self { capacity: 1 << 16 }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapSizes {
    pub instances: usize,
    pub arrays: usize,
    pub strings: usize,
    pub bytes: usize,
    pub classes: usize,
}

impl HeapSizes {
    pub fn total(&self) -> usize {
        self.instances + self.arrays + self.strings + self.bytes + self.classes
    }
}

#[derive(Debug)]
pub struct Heap {
    objects: Vec<Option<Object>>,
    free: Vec<u32>,
    used: usize,
    capacity: usize,
}

impl Heap {
    pub fn new(info: HeapCreateInfo) -> Self {
        Self {
            objects: Vec::new(),
            free: Vec::new(),
            used: 0,
            capacity: info.capacity,
        }
    }

    pub fn allocate(&mut self, object: Object) -> Result<ObjectRef, HeapError> {
        if self.used >= self.capacity {
            return Err(HeapError::OutOfMemory {
                used: self.used,
                capacity: self.capacity,
            });
        }
        if let Some(index) = self.free.pop() {
            self.objects[index as usize] = Some(object);
            self.used += 1;
            return Ok(ObjectRef(index));
        }
        let index = u32::try_from(self.objects.len()).map_err(|_| {
            HeapError::OutOfMemory {
                used: self.used,
                capacity: self.capacity,
            }
        })?;
        self.objects.push(Some(object));
        self.used += 1;
        Ok(ObjectRef(index))
    }

    pub fn allocate_array(
        &mut self,
        values: &[Value],
    ) -> Result<ObjectRef, HeapError> {
        self.allocate(Object::Array(values.to_vec()))
    }

    pub fn allocate_string(
        &mut self,
        s: impl Into<String>,
    ) -> Result<ObjectRef, HeapError> {
        self.allocate(Object::String(s.into()))
    }

    /// Release an object. The collector owns the decision; this only updates
    /// bookkeeping.
    pub fn free(&mut self, r: ObjectRef) {
        let slot = &mut self.objects[r.index()];
        assert!(slot.is_some(), "double free of {:?}", r);
        *slot = None;
        self.used -= 1;
        self.free.push(r.0);
    }

    pub fn get(&self, r: ObjectRef) -> Option<&Object> {
        self.objects.get(r.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, r: ObjectRef) -> Option<&mut Object> {
        self.objects.get_mut(r.index()).and_then(Option::as_mut)
    }

    pub fn string(&self, value: Value) -> Option<&str> {
        match self.get(value.as_object()?) {
            Some(Object::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn array(&self, value: Value) -> Option<&[Value]> {
        match self.get(value.as_object()?) {
            Some(Object::Array(values)) => Some(values),
            _ => None,
        }
    }

    /// Null and immediates count as instances; references must point at an
    /// instance object.
    pub fn is_instance(&self, value: Value) -> bool {
        match value {
            Value::Ref(r) => self.get(r).is_some_and(Object::is_instance),
            _ => true,
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sizes(&self) -> HeapSizes {
        let mut sizes = HeapSizes::default();
        for object in self.objects.iter().flatten() {
            match object {
                Object::Instance { .. } => sizes.instances += 1,
                Object::Array(_) => sizes.arrays += 1,
                Object::String(_) => sizes.strings += 1,
                Object::Bytes(_) => sizes.bytes += 1,
                Object::Class { .. } => sizes.classes += 1,
            }
        }
        sizes
    }

    pub fn print_sizes(&self, name: &str) {
        let sizes = self.sizes();
        log::info!(
            "{name}: heap {}/{} objects \
             (instances {}, arrays {}, strings {}, bytes {}, classes {})",
            self.used,
            self.capacity,
            sizes.instances,
            sizes.arrays,
            sizes.strings,
            sizes.bytes,
            sizes.classes
        );
    }

    /// Every reference stored inside a live object must point at a live
    /// object.
    pub fn verify(&self) -> bool {
        self.objects.iter().flatten().all(|object| {
            object.edges().iter().all(|edge| match edge {
                Value::Ref(r) => self.get(*r).is_some(),
                _ => true,
            })
        })
    }
}
