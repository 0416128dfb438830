use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{Isolate, Outcome, Value};

/// Host-implemented program code.
pub type NativeFunction =
    Arc<dyn Fn(&mut Isolate, &[Value]) -> Outcome + Send + Sync>;

pub struct Function {
    name: Arc<str>,
    entry: NativeFunction,
    usage_counter: AtomicU64,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("usage_counter", &self.usage_count())
            .finish_non_exhaustive()
    }
}

impl Function {
    pub fn new(name: &str, entry: NativeFunction) -> Self {
        Self {
            name: name.into(),
            entry,
            usage_counter: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        self.name.clone()
    }

    pub(crate) fn entry(&self) -> &NativeFunction {
        &self.entry
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_counter.load(Ordering::Relaxed)
    }

    pub(crate) fn record_invocation(&self) {
        self.usage_counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// A named collection of functions in insertion order.
#[derive(Debug)]
pub struct Library {
    url: String,
    functions: Vec<Arc<Function>>,
    index: HashMap<Arc<str>, usize>,
}

impl Library {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            functions: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Define `name`, replacing any earlier definition in place.
    pub fn add_function<F>(&mut self, name: &str, entry: F) -> Arc<Function>
    where
        F: Fn(&mut Isolate, &[Value]) -> Outcome + Send + Sync + 'static,
    {
        let function = Arc::new(Function::new(name, Arc::new(entry)));
        match self.index.get(name) {
            Some(&i) => self.functions[i] = function.clone(),
            None => {
                self.index.insert(function.shared_name(), self.functions.len());
                self.functions.push(function.clone());
            }
        }
        function
    }

    pub fn lookup_local_function(&self, name: &str) -> Option<Arc<Function>> {
        self.index.get(name).map(|&i| self.functions[i].clone())
    }

    pub fn functions(&self) -> &[Arc<Function>] {
        &self.functions
    }
}
