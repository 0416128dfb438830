use std::time::Duration;

use crate::{CodecError, Failure, HeapError, Isolate, IsolateScope, Message, Value};

/// How long an idle dispatch loop sleeps before rechecking its ports.
const IDLE_WAIT: Duration = Duration::from_millis(10);

impl Isolate {
    /// Process one message to completion. Returns false when a failure was
    /// not recovered by the program.
    ///
    /// An isolate that is not entered is entered on the calling thread for
    /// the duration. Panics if it is entered on another thread.
    pub fn handle_message(&mut self, message: Message) -> bool {
        let mut scope = IsolateScope::enter(self);
        scope.with_zone(|isolate| isolate.dispatch(message))
    }

    fn dispatch(&mut self, message: Message) -> bool {
        let oob = message.is_oob();
        let mut receive_port = Value::Null;
        if !oob {
            match self.lookup_receive_port(message.dest_port()) {
                Err(failure) => return self.process_unhandled_exception(Value::Null, failure),
                Ok(Value::Null) => {
                    log::trace!(
                        "{}: dropping message to closed port {}",
                        self.name(),
                        message.dest_port()
                    );
                    self.counters.messages_dropped += 1;
                    return true;
                }
                Ok(port) => receive_port = port,
            }
        }
        let port_handle = self.new_handle(receive_port);

        let decoded = self.codec.decode(message.data(), &mut self.heap);
        let msg = match decoded {
            Ok(msg) => msg,
            Err(err) => {
                let failure = self.decode_failure(err);
                return self.process_unhandled_exception(Value::Null, failure);
            }
        };
        assert!(
            self.heap.is_instance(msg),
            "{}: decoded message {msg} is not an instance",
            self.name()
        );
        let msg_handle = self.new_handle(msg);

        if oob {
            self.handle_service_message(message.reply_port(), msg);
            self.counters.oob_messages_handled += 1;
            return true;
        }

        let receive_port = self.handle(port_handle);
        let result = self.call_handle_message(receive_port, message.reply_port(), msg);
        self.counters.messages_handled += 1;
        let every = self.flags().report_counters_every;
        if self.counters.report_periodically(self.name(), every) {
            self.counters.periodic_reports += 1;
        }
        match result {
            Ok(_) => true,
            Err(failure) => {
                let msg = self.handle(msg_handle);
                self.process_unhandled_exception(msg, failure)
            }
        }
    }

    fn decode_failure(&self, err: CodecError) -> Failure {
        match err {
            CodecError::Heap(HeapError::OutOfMemory { .. }) => self.out_of_memory_failure(),
            err => Failure::Api(format!("{}: cannot decode message: {err}", self.name())),
        }
    }

    /// Drain OOB messages only.
    pub fn handle_oob_messages(&mut self) -> bool {
        self.drain_oob_messages().1
    }

    /// Number of OOB messages handled, and whether all of them succeeded.
    pub(crate) fn drain_oob_messages(&mut self) -> (usize, bool) {
        let inbox = self.inbox();
        let mut handled = 0;
        let mut ok = true;
        while let Some(message) = inbox.dequeue_oob() {
            ok &= self.handle_message(message);
            handled += 1;
        }
        (handled, ok)
    }

    /// Pending OOB messages, then at most one normal message.
    pub fn handle_next_message(&mut self) -> bool {
        if !self.handle_oob_messages() {
            return false;
        }
        match self.inbox().dequeue() {
            Some(message) => self.handle_message(message),
            None => true,
        }
    }

    /// Pump messages until no live port remains (true) or a failure is not
    /// recovered (false). Blocks while idle.
    pub fn run(&mut self) -> bool {
        let inbox = self.inbox();
        loop {
            while let Some(message) = inbox.dequeue() {
                if !self.handle_message(message) {
                    return false;
                }
            }
            if !self.registry.has_live_ports(&inbox) {
                return true;
            }
            inbox.wait_for_work(IDLE_WAIT);
        }
    }
}
