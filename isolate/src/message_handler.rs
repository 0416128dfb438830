use std::{
    collections::VecDeque,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::{Condvar, Mutex};

use crate::{InterruptKind, InterruptWord, Message, PortId, Priority, callbacks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct Queues {
    normal: VecDeque<Message>,
    oob: VecDeque<Message>,
    closed: bool,
}

/// The shared half of an isolate's message handler.
///
/// Any thread may enqueue (through the port registry); only the owning
/// isolate's thread dequeues. Besides the queues, the only isolate state an
/// enqueuer touches is the interrupt word.
#[derive(Debug)]
pub struct Inbox {
    id: HandlerId,
    queues: Mutex<Queues>,
    has_work: Condvar,
    interrupts: Arc<InterruptWord>,
    main_port: OnceLock<PortId>,
}

impl Inbox {
    fn new(interrupts: Arc<InterruptWord>) -> Arc<Self> {
        Arc::new(Self {
            id: HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed)),
            queues: Mutex::new(Queues::default()),
            has_work: Condvar::new(),
            interrupts,
            main_port: OnceLock::new(),
        })
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn main_port(&self) -> Option<PortId> {
        self.main_port.get().copied()
    }

    pub(crate) fn set_main_port(&self, port: PortId) {
        assert!(
            self.main_port.set(port).is_ok(),
            "main port can only be set once"
        );
    }

    /// Append a message. Registries call this while holding whatever lock
    /// orders them against `close`; `notify` follows once that lock is gone.
    pub fn enqueue(&self, message: Message) -> Priority {
        let priority = message.priority();
        {
            let mut queues = self.queues.lock();
            assert!(!queues.closed, "message posted to a dead message handler");
            match priority {
                Priority::Normal => queues.normal.push_back(message),
                Priority::Oob => queues.oob.push_back(message),
            }
        }
        self.has_work.notify_one();
        priority
    }

    /// Arrival hook. OOB traffic raises an interrupt so a busy isolate sees it
    /// at its next safe point; the host hook runs on the posting thread.
    pub fn notify(&self, priority: Priority) {
        if priority == Priority::Oob {
            self.interrupts.schedule_interrupts(InterruptKind::MESSAGE);
        }
        if let Some(callback) = callbacks::message_notify_callback() {
            callback(self.main_port().unwrap_or(crate::ILLEGAL_PORT));
        }
    }

    pub fn post(&self, message: Message) {
        let priority = self.enqueue(message);
        self.notify(priority);
    }

    pub(crate) fn dequeue_oob(&self) -> Option<Message> {
        self.queues.lock().oob.pop_front()
    }

    /// OOB messages always come first.
    pub(crate) fn dequeue(&self) -> Option<Message> {
        let mut queues = self.queues.lock();
        queues.oob.pop_front().or_else(|| queues.normal.pop_front())
    }

    pub fn pending(&self) -> (usize, usize) {
        let queues = self.queues.lock();
        (queues.normal.len(), queues.oob.len())
    }

    /// Block until a message is queued or `timeout` passes. Returns whether
    /// anything is waiting.
    pub(crate) fn wait_for_work(&self, timeout: Duration) -> bool {
        let mut queues = self.queues.lock();
        if queues.normal.is_empty() && queues.oob.is_empty() {
            let _ = self.has_work.wait_for(&mut queues, timeout);
        }
        !(queues.normal.is_empty() && queues.oob.is_empty())
    }

    fn close(&self) -> usize {
        let mut queues = self.queues.lock();
        queues.closed = true;
        let dropped = queues.normal.len() + queues.oob.len();
        queues.normal.clear();
        queues.oob.clear();
        dropped
    }
}

/// The isolate-owned half. Dropping it closes the inbox: undelivered mail is
/// discarded and any later post panics.
#[derive(Debug)]
pub struct MessageHandler {
    inbox: Arc<Inbox>,
}

impl MessageHandler {
    pub fn new(interrupts: Arc<InterruptWord>) -> Self {
        Self {
            inbox: Inbox::new(interrupts),
        }
    }

    pub fn inbox(&self) -> &Arc<Inbox> {
        &self.inbox
    }

    pub fn id(&self) -> HandlerId {
        self.inbox.id
    }
}

impl Drop for MessageHandler {
    fn drop(&mut self) {
        let dropped = self.inbox.close();
        if dropped > 0 {
            log::debug!(
                "message handler {:?} closed with {dropped} undelivered messages",
                self.inbox.id
            );
        }
    }
}
