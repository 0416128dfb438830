use std::fmt;

/// Port identifier. Ports are the only address an isolate is known by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub i64);

pub const ILLEGAL_PORT: PortId = PortId(0);

impl PortId {
    pub fn is_illegal(self) -> bool {
        self == ILLEGAL_PORT
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Normal,
    /// Out of band: handled ahead of normal traffic, even mid-execution.
    Oob,
}

/// A unit of cross-isolate communication.
///
/// The payload is the sender's encoded copy; nothing in a message points
/// into any isolate's heap. Ownership moves from sender to registry to inbox
/// and the message is dropped once processing ends.
#[derive(Debug, PartialEq, Eq)]
pub struct Message {
    dest_port: PortId,
    reply_port: PortId,
    priority: Priority,
    data: Box<[u8]>,
}

impl Message {
    pub fn new(
        dest_port: PortId,
        reply_port: PortId,
        data: impl Into<Box<[u8]>>,
        priority: Priority,
    ) -> Self {
        Self {
            dest_port,
            reply_port,
            priority,
            data: data.into(),
        }
    }

    pub fn dest_port(&self) -> PortId {
        self.dest_port
    }

    pub fn reply_port(&self) -> PortId {
        self.reply_port
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn is_oob(&self) -> bool {
        self.priority == Priority::Oob
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
