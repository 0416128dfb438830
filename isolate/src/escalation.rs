use crate::{Failure, Isolate, Object, Value, callbacks};

impl Isolate {
    /// Resolve a failure that escaped message handling.
    ///
    /// The program handler sees ordinary unhandled exceptions first and may
    /// continue by returning true. Otherwise the host callback is notified
    /// and the failure becomes the sticky error. Returns whether the isolate
    /// should keep handling messages.
    pub fn process_unhandled_exception(&mut self, message: Value, failure: Failure) -> bool {
        self.counters.failures_escalated += 1;
        if let Failure::UnhandledException {
            exception,
            stacktrace,
        } = failure
        {
            if !self.object_store.is_preallocated_exception(exception)
                && self.call_unhandled_exception_handler(message, exception, stacktrace)
            {
                self.counters.failures_recovered += 1;
                return true;
            }
        }

        if let Some(callback) = callbacks::unhandled_exception_callback() {
            self.api_state.enter_scope();
            callback(self, &failure);
            self.api_state.exit_scope();
        }
        log::debug!("{}: sticky error set: {failure}", self.name());
        self.object_store.set_sticky_error(failure);
        false
    }

    fn call_unhandled_exception_handler(
        &mut self,
        message: Value,
        exception: Value,
        stacktrace: Value,
    ) -> bool {
        let name = self.object_store.unhandled_exception_handler().to_owned();
        let Some(function) = self.lookup_function(&name) else {
            return false;
        };
        let wrapped = match self.heap.allocate(Object::Instance {
            class: self.object_store.isolate_unhandled_exception_class(),
            fields: vec![message, exception, stacktrace],
        }) {
            Ok(wrapped) => wrapped,
            Err(err) => {
                log::error!("{}: cannot wrap unhandled exception: {err}", self.name());
                return false;
            }
        };
        match self.invoke_static(&function, &[Value::Ref(wrapped)]) {
            Ok(Value::Bool(true)) => {
                self.object_store.clear_sticky_error();
                true
            }
            Ok(_) => false,
            Err(err) => {
                log::error!(
                    "{}: failed calling unhandled exception callback {name}: {err}",
                    self.name()
                );
                false
            }
        }
    }
}
