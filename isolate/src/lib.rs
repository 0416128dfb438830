mod api_state;
pub mod callbacks;
mod class_table;
mod codec;
mod debugger;
mod diagnostics;
mod dispatch;
mod error;
mod escalation;
mod heap;
mod interrupt;
mod isolate;
mod library;
mod library_calls;
mod megamorphic_cache;
mod message;
mod message_handler;
mod object_store;
mod port;
mod scope;
mod service;
mod spawn;
mod stack;
mod stub_code;
mod value;
mod visitor;
mod zone;

pub use api_state::*;
pub use class_table::ClassTable;
pub use codec::{CodecError, MAX_DEPTH, MessageCodec, SnapshotCodec};
pub use debugger::{Breakpoint, Debugger};
pub use diagnostics::*;
pub use error::*;
pub use heap::*;
pub use interrupt::*;
pub use isolate::*;
pub use library::*;
pub use library_calls::{HANDLE_MESSAGE, LOOKUP_RECEIVE_PORT};
pub use megamorphic_cache::*;
pub use message::*;
pub use message_handler::*;
pub use object_store::*;
pub use port::*;
pub use scope::{IsolateId, IsolateScope, current_isolate_id};
pub use spawn::*;
pub use stack::*;
pub use stub_code::StubCode;
pub use value::*;
pub use visitor::*;
pub use zone::{ZoneHandle, Zones};

#[cfg(test)]
mod testing;
