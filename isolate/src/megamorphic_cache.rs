use crate::{ObjectPointerVisitor, Value, Visitable};

/// A polymorphic call-site cache: receiver class to target.
#[derive(Debug, Default)]
pub struct MegamorphicCache {
    selector: Value,
    entries: Vec<(Value, Value)>,
}

impl MegamorphicCache {
    pub fn selector(&self) -> Value {
        self.selector
    }

    pub fn insert(&mut self, class: Value, target: Value) {
        match self.entries.iter_mut().find(|(c, _)| *c == class) {
            Some(entry) => entry.1 = target,
            None => self.entries.push((class, target)),
        }
    }

    pub fn lookup(&self, class: Value) -> Option<Value> {
        self.entries
            .iter()
            .find(|(c, _)| *c == class)
            .map(|&(_, target)| target)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct MegamorphicCacheTable {
    caches: Vec<MegamorphicCache>,
}

impl MegamorphicCacheTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or create the cache for `selector`.
    pub fn lookup_or_insert(&mut self, selector: Value) -> &mut MegamorphicCache {
        let index = match self.caches.iter().position(|c| c.selector == selector) {
            Some(index) => index,
            None => {
                self.caches.push(MegamorphicCache {
                    selector,
                    entries: Vec::new(),
                });
                self.caches.len() - 1
            }
        };
        &mut self.caches[index]
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    pub fn print_sizes(&self, name: &str) {
        let entries: usize = self.caches.iter().map(MegamorphicCache::len).sum();
        log::info!(
            "{name}: {} megamorphic caches, {entries} entries",
            self.caches.len()
        );
    }
}

impl Visitable for MegamorphicCacheTable {
    fn visit_object_pointers(&mut self, visitor: &mut dyn ObjectPointerVisitor) {
        for cache in &mut self.caches {
            visitor.visit_pointer(&mut cache.selector);
            for (class, target) in &mut cache.entries {
                visitor.visit_pointer(class);
                visitor.visit_pointer(target);
            }
        }
    }
}
