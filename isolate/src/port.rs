use std::{
    collections::HashMap,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicI64, Ordering},
    },
};

use parking_lot::Mutex;

use crate::{Inbox, Message, PortId};

/// Process-wide mapping from port to the inbox that owns it.
///
/// Many threads post concurrently; each inbox is drained by one thread.
pub trait PortRegistry: Send + Sync {
    /// Open a new port delivering into `inbox`. New ports are not live.
    fn create_port(&self, inbox: &Arc<Inbox>) -> PortId;

    /// Mark a port as held by a receiver in program code.
    fn set_live(&self, port: PortId);

    fn is_live(&self, port: PortId) -> bool;

    fn has_live_ports(&self, inbox: &Inbox) -> bool;

    /// Returns false if the port was not open.
    fn close_port(&self, port: PortId) -> bool;

    /// Close every port delivering into `inbox`. Nothing can be delivered
    /// to it afterwards.
    fn close_ports(&self, inbox: &Inbox);

    /// Returns false, dropping the message, if the destination is closed.
    fn post_message(&self, message: Message) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortState {
    New,
    Live,
}

#[derive(Debug)]
struct PortEntry {
    inbox: Arc<Inbox>,
    state: PortState,
}

#[derive(Debug)]
pub struct PortMap {
    ports: Mutex<HashMap<PortId, PortEntry>>,
    next_port: AtomicI64,
}

impl Default for PortMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PortMap {
    pub fn new() -> Self {
        Self {
            ports: Mutex::new(HashMap::new()),
            // 0 is ILLEGAL_PORT
            next_port: AtomicI64::new(1),
        }
    }

    /// The registry shared by every isolate in this process.
    pub fn global() -> Arc<PortMap> {
        static GLOBAL: OnceLock<Arc<PortMap>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(PortMap::new())).clone()
    }

    pub fn port_count(&self) -> usize {
        self.ports.lock().len()
    }

    pub fn ports_of(&self, inbox: &Inbox) -> Vec<PortId> {
        let mut ports: Vec<_> = self
            .ports
            .lock()
            .iter()
            .filter(|(_, entry)| entry.inbox.id() == inbox.id())
            .map(|(&port, _)| port)
            .collect();
        ports.sort_unstable();
        ports
    }
}

impl PortRegistry for PortMap {
    fn create_port(&self, inbox: &Arc<Inbox>) -> PortId {
        let port = PortId(self.next_port.fetch_add(1, Ordering::Relaxed));
        self.ports.lock().insert(
            port,
            PortEntry {
                inbox: Arc::clone(inbox),
                state: PortState::New,
            },
        );
        log::trace!("created port {port} for handler {:?}", inbox.id());
        port
    }

    fn set_live(&self, port: PortId) {
        if let Some(entry) = self.ports.lock().get_mut(&port) {
            entry.state = PortState::Live;
        }
    }

    fn is_live(&self, port: PortId) -> bool {
        self.ports
            .lock()
            .get(&port)
            .is_some_and(|entry| entry.state == PortState::Live)
    }

    fn has_live_ports(&self, inbox: &Inbox) -> bool {
        self.ports.lock().values().any(|entry| {
            entry.inbox.id() == inbox.id() && entry.state == PortState::Live
        })
    }

    fn close_port(&self, port: PortId) -> bool {
        let closed = self.ports.lock().remove(&port).is_some();
        if closed {
            log::trace!("closed port {port}");
        }
        closed
    }

    fn close_ports(&self, inbox: &Inbox) {
        let mut ports = self.ports.lock();
        let before = ports.len();
        ports.retain(|_, entry| entry.inbox.id() != inbox.id());
        log::trace!(
            "closed {} ports of handler {:?}",
            before - ports.len(),
            inbox.id()
        );
    }

    fn post_message(&self, message: Message) -> bool {
        let dest = message.dest_port();
        let (inbox, priority) = {
            let ports = self.ports.lock();
            let Some(entry) = ports.get(&dest) else {
                log::trace!("dropping message to closed port {dest}");
                return false;
            };
            // enqueue under the map lock so a concurrent close_ports cannot
            // tear the handler down between lookup and delivery
            let priority = entry.inbox.enqueue(message);
            (Arc::clone(&entry.inbox), priority)
        };
        inbox.notify(priority);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ILLEGAL_PORT, InterruptWord, MessageHandler, Priority};
    use std::thread;

    fn handler() -> MessageHandler {
        MessageHandler::new(Arc::new(InterruptWord::new(0x1000)))
    }

    fn message(port: PortId, byte: u8) -> Message {
        Message::new(port, ILLEGAL_PORT, vec![byte], Priority::Normal)
    }

    #[test]
    fn ports_are_monotonic_and_start_past_illegal() {
        let map = PortMap::new();
        let h = handler();
        let a = map.create_port(h.inbox());
        let b = map.create_port(h.inbox());
        assert_eq!(a, PortId(1));
        assert_eq!(b, PortId(2));
        assert_eq!(map.ports_of(h.inbox()), vec![a, b]);
    }

    #[test]
    fn liveness_is_tracked_per_port() {
        let map = PortMap::new();
        let h = handler();
        let a = map.create_port(h.inbox());
        assert!(!map.has_live_ports(h.inbox()));
        map.set_live(a);
        assert!(map.is_live(a));
        assert!(map.has_live_ports(h.inbox()));
        assert!(map.close_port(a));
        assert!(!map.close_port(a), "second close finds nothing");
        assert!(!map.has_live_ports(h.inbox()));
    }

    #[test]
    fn posting_to_closed_port_drops_the_message() {
        let map = PortMap::new();
        let h = handler();
        let port = map.create_port(h.inbox());
        assert!(map.post_message(message(port, 1)));
        map.close_ports(h.inbox());
        assert!(!map.post_message(message(port, 2)));
        assert_eq!(h.inbox().pending(), (1, 0));
        assert_eq!(map.port_count(), 0);
    }

    #[test]
    fn close_ports_only_touches_one_handler() {
        let map = PortMap::new();
        let h1 = handler();
        let h2 = handler();
        map.create_port(h1.inbox());
        let keep = map.create_port(h2.inbox());
        map.close_ports(h1.inbox());
        assert_eq!(map.ports_of(h2.inbox()), vec![keep]);
        assert!(map.ports_of(h1.inbox()).is_empty());
    }

    #[test]
    #[serial_test::serial]
    fn notify_hook_runs_on_the_posting_thread() {
        let map = Arc::new(PortMap::new());
        let h = handler();
        let port = map.create_port(h.inbox());
        h.inbox().set_main_port(port);

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let record = seen.clone();
        crate::callbacks::set_message_notify_callback(Some(Arc::new(move |main| {
            // ids repeat across the private registries of other tests
            if thread::current().name() == Some("poster") {
                record.lock().push(main);
            }
        })));
        let poster = {
            let map = map.clone();
            thread::Builder::new()
                .name("poster".into())
                .spawn(move || map.post_message(message(port, 1)))
                .unwrap()
        };
        assert!(poster.join().unwrap());
        crate::callbacks::set_message_notify_callback(None);
        assert_eq!(*seen.lock(), [port]);
    }

    #[test]
    fn concurrent_posters_keep_per_sender_order() {
        let map = Arc::new(PortMap::new());
        let h = handler();
        let port = map.create_port(h.inbox());

        let joins: Vec<_> = (0..4u8)
            .map(|sender| {
                let map = map.clone();
                thread::spawn(move || {
                    for i in 0..50u8 {
                        let payload = vec![sender, i];
                        assert!(map.post_message(Message::new(
                            port,
                            ILLEGAL_PORT,
                            payload,
                            Priority::Normal
                        )));
                    }
                })
            })
            .collect();
        for j in joins {
            j.join().unwrap();
        }

        let mut last = [None::<u8>; 4];
        let mut count = 0;
        while let Some(m) = h.inbox().dequeue() {
            let (sender, i) = (m.data()[0] as usize, m.data()[1]);
            if let Some(prev) = last[sender] {
                assert!(i > prev, "sender {sender} reordered: {prev} then {i}");
            }
            last[sender] = Some(i);
            count += 1;
        }
        assert_eq!(count, 200);
    }
}
