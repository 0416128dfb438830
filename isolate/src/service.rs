//! Administrative commands carried by OOB messages.
//!
//! A request is an array whose first element names the command. The reply
//! goes to the message's reply port; errors are replied as strings.

use crate::{
    Failure, HeapError, ILLEGAL_PORT, Isolate, ObjectRef, Outcome, PortId,
    Priority, Value, invoked_functions,
};

impl Isolate {
    pub(crate) fn handle_service_message(&mut self, reply_port: PortId, request: Value) {
        let reply = match self.service_request(request) {
            Ok(reply) => reply,
            Err(failure) => match self.heap.allocate_string(failure.to_string()) {
                Ok(s) => Value::Ref(s),
                Err(err) => {
                    log::warn!("{}: cannot reply to service request: {err}", self.name());
                    return;
                }
            },
        };
        if reply_port.is_illegal() {
            return;
        }
        match self.send(reply_port, ILLEGAL_PORT, reply, Priority::Normal) {
            Ok(true) => {}
            Ok(false) => log::debug!("{}: service reply port {reply_port} is closed", self.name()),
            Err(err) => log::warn!("{}: cannot encode service reply: {err}", self.name()),
        }
    }

    fn service_request(&mut self, request: Value) -> Outcome {
        let command = self
            .heap
            .array(request)
            .and_then(|items| items.first().copied())
            .and_then(|first| self.heap.string(first))
            .map(str::to_owned)
            .ok_or_else(|| Failure::Api("service request must start with a command".into()))?;

        let reply = match command.as_str() {
            "name" => {
                let name = self.name().to_owned();
                self.heap.allocate_string(name)
            }
            "heap" => {
                let sizes = [
                    Value::Smi(self.heap.used() as i64),
                    Value::Smi(self.heap.capacity() as i64),
                ];
                self.heap.allocate_array(&sizes)
            }
            "sticky-error" => match self.sticky_error().map(Failure::to_string) {
                Some(error) => self.heap.allocate_string(error),
                None => return Ok(Value::Null),
            },
            "usage" => self.usage_reply(),
            other => return Err(Failure::Api(format!("unknown service command '{other}'"))),
        };
        reply.map(Value::Ref).map_err(|_| self.out_of_memory_failure())
    }

    fn usage_reply(&mut self) -> Result<ObjectRef, HeapError> {
        let mut rows = Vec::new();
        for (count, function) in invoked_functions(&self.object_store) {
            let name = self.heap.allocate_string(function)?;
            let row = self
                .heap
                .allocate_array(&[Value::Ref(name), Value::Smi(count as i64)])?;
            rows.push(Value::Ref(row));
        }
        self.heap.allocate_array(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_info, encode_request, install_library};
    use crate::{Message, SnapshotCodec, MessageCodec};

    /// Send `parts` as an OOB request and decode the reply.
    fn request(isolate: &mut Isolate, parts: &[&str]) -> Value {
        let replies = isolate.create_port();
        isolate.post_message(Message::new(
            isolate.main_port(),
            replies,
            encode_request(parts),
            Priority::Oob,
        ));
        assert!(isolate.handle_oob_messages());
        let reply = isolate.inbox().dequeue().expect("no service reply");
        assert_eq!(reply.dest_port(), replies);
        isolate.close_port(replies);
        SnapshotCodec.decode(reply.data(), isolate.heap_mut()).unwrap()
    }

    #[test]
    fn name_heap_and_sticky_error_commands() {
        let mut isolate = Isolate::new(create_info());

        let name = request(&mut isolate, &["name"]);
        assert_eq!(isolate.heap().string(name), Some("test-1"));

        let heap = request(&mut isolate, &["heap"]);
        let sizes = isolate.heap().array(heap).unwrap().to_vec();
        assert_eq!(sizes[1], Value::Smi(isolate.heap().capacity() as i64));
        assert!(sizes[0].as_smi().unwrap() > 0);

        assert_eq!(request(&mut isolate, &["sticky-error"]), Value::Null);
        isolate
            .object_store_mut()
            .set_sticky_error(Failure::Api("bad".into()));
        let error = request(&mut isolate, &["sticky-error"]);
        assert_eq!(isolate.heap().string(error), Some("api error: bad"));

        isolate.clear_sticky_error();
        isolate.shutdown();
    }

    #[test]
    fn usage_lists_invoked_functions_busiest_first() {
        let mut isolate = Isolate::new(create_info());
        install_library(&mut isolate, |lib| {
            lib.add_function("once", |_, _| Ok(Value::Null));
            lib.add_function("twice", |_, _| Ok(Value::Null));
            lib.add_function("never", |_, _| Ok(Value::Null));
        });
        for name in ["once", "twice", "twice"] {
            let function = isolate.lookup_function(name).unwrap();
            isolate.invoke_static(&function, &[]).unwrap();
        }

        let usage = request(&mut isolate, &["usage"]);
        let rows = isolate.heap().array(usage).unwrap().to_vec();
        let rows: Vec<(String, Value)> = rows
            .iter()
            .map(|&row| {
                let row = isolate.heap().array(row).unwrap();
                (isolate.heap().string(row[0]).unwrap().to_owned(), row[1])
            })
            .collect();
        assert_eq!(
            rows,
            [
                ("test:main::twice".to_owned(), Value::Smi(2)),
                ("test:main::once".to_owned(), Value::Smi(1)),
            ]
        );
        isolate.shutdown();
    }

    #[test]
    fn bad_requests_get_an_error_reply() {
        let mut isolate = Isolate::new(create_info());
        let reply = request(&mut isolate, &["reload"]);
        assert_eq!(
            isolate.heap().string(reply),
            Some("api error: unknown service command 'reload'")
        );
        let reply = request(&mut isolate, &[]);
        assert!(isolate.heap().string(reply).unwrap().contains("must start with a command"));
        assert!(isolate.sticky_error().is_none());
        isolate.shutdown();
    }
}
