//! Host registration points. Each slot is process wide and the last
//! registration wins. All of them run on the isolate's own thread except the
//! message notify hook, which runs on whichever thread posted.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{Failure, Isolate, PortId};

/// Receives the main port of the isolate a message was posted to.
pub type MessageNotifyCallback = Arc<dyn Fn(PortId) + Send + Sync>;
pub type UnhandledExceptionCallback =
    Arc<dyn Fn(&Isolate, &Failure) + Send + Sync>;
pub type CreateCallback = Arc<dyn Fn(&Isolate) + Send + Sync>;
/// Returning false asks the isolate to unwind out of program code.
pub type InterruptCallback = Arc<dyn Fn(&Isolate) -> bool + Send + Sync>;
pub type ShutdownCallback = Arc<dyn Fn(&Isolate) + Send + Sync>;

struct HostCallbacks {
    message_notify: Option<MessageNotifyCallback>,
    unhandled_exception: Option<UnhandledExceptionCallback>,
    create: Option<CreateCallback>,
    interrupt: Option<InterruptCallback>,
    shutdown: Option<ShutdownCallback>,
}

static CALLBACKS: RwLock<HostCallbacks> = RwLock::new(HostCallbacks {
    message_notify: None,
    unhandled_exception: None,
    create: None,
    interrupt: None,
    shutdown: None,
});

pub fn set_message_notify_callback(cb: Option<MessageNotifyCallback>) {
    CALLBACKS.write().message_notify = cb;
}

pub fn message_notify_callback() -> Option<MessageNotifyCallback> {
    CALLBACKS.read().message_notify.clone()
}

pub fn set_unhandled_exception_callback(
    cb: Option<UnhandledExceptionCallback>,
) {
    CALLBACKS.write().unhandled_exception = cb;
}

pub fn unhandled_exception_callback() -> Option<UnhandledExceptionCallback> {
    CALLBACKS.read().unhandled_exception.clone()
}

pub fn set_create_callback(cb: Option<CreateCallback>) {
    CALLBACKS.write().create = cb;
}

pub fn create_callback() -> Option<CreateCallback> {
    CALLBACKS.read().create.clone()
}

pub fn set_interrupt_callback(cb: Option<InterruptCallback>) {
    CALLBACKS.write().interrupt = cb;
}

pub fn interrupt_callback() -> Option<InterruptCallback> {
    CALLBACKS.read().interrupt.clone()
}

pub fn set_shutdown_callback(cb: Option<ShutdownCallback>) {
    CALLBACKS.write().shutdown = cb;
}

pub fn shutdown_callback() -> Option<ShutdownCallback> {
    CALLBACKS.read().shutdown.clone()
}

/// Drop every registration.
pub fn clear_callbacks() {
    let mut callbacks = CALLBACKS.write();
    callbacks.message_notify = None;
    callbacks.unhandled_exception = None;
    callbacks.create = None;
    callbacks.interrupt = None;
    callbacks.shutdown = None;
}
