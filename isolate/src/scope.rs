//! Thread to isolate binding.
//!
//! Every operation takes its isolate explicitly; the binding only enforces
//! that an isolate runs on at most one thread and a thread runs at most one
//! isolate at a time.

use std::{
    cell::Cell,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::Isolate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IsolateId(u64);

static NEXT_ISOLATE_ID: AtomicU64 = AtomicU64::new(1);

impl IsolateId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ISOLATE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

thread_local! {
    static CURRENT: Cell<Option<IsolateId>> = const { Cell::new(None) };
}

/// The isolate bound to the calling thread, if any.
pub fn current_isolate_id() -> Option<IsolateId> {
    CURRENT.with(Cell::get)
}

pub(crate) fn bind(id: IsolateId) {
    CURRENT.with(|current| {
        if let Some(other) = current.get() {
            panic!("thread already runs isolate {other:?}, cannot enter {id:?}");
        }
        current.set(Some(id));
    });
}

pub(crate) fn unbind(id: IsolateId) {
    CURRENT.with(|current| {
        assert_eq!(current.get(), Some(id), "isolate is not current on this thread");
        current.set(None);
    });
}

/// Enter an isolate for the lifetime of the guard.
///
/// Entering sets the stack limit from the current stack position. Leaving
/// sets it to all ones, so nothing can run program code until the isolate
/// is entered again. Entering an isolate that is already current is a no-op.
pub struct IsolateScope<'a> {
    isolate: &'a mut Isolate,
    entered: bool,
}

impl<'a> IsolateScope<'a> {
    pub fn enter(isolate: &'a mut Isolate) -> Self {
        let entered = !isolate.is_current();
        if entered {
            isolate.enter();
        }
        Self { isolate, entered }
    }
}

impl Deref for IsolateScope<'_> {
    type Target = Isolate;

    fn deref(&self) -> &Isolate {
        self.isolate
    }
}

impl DerefMut for IsolateScope<'_> {
    fn deref_mut(&mut self) -> &mut Isolate {
        self.isolate
    }
}

impl Drop for IsolateScope<'_> {
    fn drop(&mut self) {
        if self.entered {
            self.isolate.exit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::create_info;

    #[test]
    fn scope_on_the_current_isolate_is_a_no_op() {
        let mut isolate = Isolate::new(create_info());
        let limit = isolate.stack_limit();
        {
            let scope = IsolateScope::enter(&mut isolate);
            assert_eq!(current_isolate_id(), Some(scope.id()));
        }
        assert!(isolate.is_current());
        assert_eq!(isolate.stack_limit(), limit);
        isolate.shutdown();
        assert_eq!(current_isolate_id(), None);
    }

    #[test]
    fn scopes_hand_a_thread_between_isolates() {
        let mut a = Isolate::new(create_info());
        a.exit();
        let mut b = Isolate::new(create_info());
        b.exit();
        for _ in 0..2 {
            {
                let scope = IsolateScope::enter(&mut a);
                assert_eq!(current_isolate_id(), Some(scope.id()));
            }
            let scope = IsolateScope::enter(&mut b);
            assert_eq!(current_isolate_id(), Some(scope.id()));
        }
        assert_eq!(current_isolate_id(), None);
        assert_eq!(a.stack_limit(), usize::MAX);
        a.enter();
        a.shutdown();
        b.enter();
        b.shutdown();
    }
}
