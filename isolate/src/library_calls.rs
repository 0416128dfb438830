//! Entry points the runtime calls in program code.

use std::sync::Arc;

use crate::{Failure, Function, Isolate, Outcome, PortId, Value};

/// Maps a port id to the program's receive port object, or null when the
/// program has closed it.
pub const LOOKUP_RECEIVE_PORT: &str = "_lookupReceivePort";
/// Delivers `(receive_port, reply_port, message)` to program code.
pub const HANDLE_MESSAGE: &str = "_handleMessage";

impl Isolate {
    /// Look `name` up in the isolate library, then the root library.
    pub fn lookup_function(&self, name: &str) -> Option<Arc<Function>> {
        self.object_store
            .isolate_library()
            .and_then(|lib| lib.lookup_local_function(name))
            .or_else(|| {
                self.object_store
                    .root_library()
                    .and_then(|lib| lib.lookup_local_function(name))
            })
    }

    /// Without a program lookup function, open ports resolve to their id.
    pub(crate) fn lookup_receive_port(&mut self, port: PortId) -> Outcome {
        match self.lookup_function(LOOKUP_RECEIVE_PORT) {
            Some(function) => self.invoke_static(&function, &[Value::Smi(port.0)]),
            None if self.registry.is_live(port) => Ok(Value::Smi(port.0)),
            None => Ok(Value::Null),
        }
    }

    pub(crate) fn call_handle_message(
        &mut self,
        receive_port: Value,
        reply_port: PortId,
        message: Value,
    ) -> Outcome {
        let function = self.lookup_function(HANDLE_MESSAGE).ok_or_else(|| {
            Failure::Language(format!("{}: no {HANDLE_MESSAGE} defined", self.name()))
        })?;
        self.invoke_static(
            &function,
            &[receive_port, Value::Smi(reply_port.0), message],
        )
    }
}
