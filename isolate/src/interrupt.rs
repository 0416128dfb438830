use std::sync::atomic::{AtomicUsize, Ordering};

use bitflags::bitflags;
use parking_lot::Mutex;

bitflags! {
    /// Interrupt kinds. They live in the low bits of the active stack limit,
    /// which a real ceiling never uses since it is word aligned.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InterruptKind: usize {
        /// Requested by the embedder through the API.
        const API = 0x1;
        /// An out-of-band message is waiting.
        const MESSAGE = 0x2;
        /// The store buffer needs processing.
        const STORE_BUFFER = 0x4;
    }
}

pub const INTERRUPTS_MASK: usize = InterruptKind::all().bits();

/// Active limit seeded while an interrupt is pending: above any real stack
/// address, so every stack check trips.
const INTERRUPT_SENTINEL: usize = !INTERRUPTS_MASK;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptState {
    NoInterrupt { limit: usize },
    Pending { saved: usize, kinds: InterruptKind },
}

impl InterruptState {
    #[inline]
    fn active(self) -> usize {
        match self {
            InterruptState::NoInterrupt { limit } => limit,
            InterruptState::Pending { kinds, .. } => {
                INTERRUPT_SENTINEL | kinds.bits()
            }
        }
    }

    #[inline]
    fn saved(self) -> usize {
        match self {
            InterruptState::NoInterrupt { limit } => limit,
            InterruptState::Pending { saved, .. } => saved,
        }
    }
}

/// The per-isolate control word: stack-depth ceiling and pending interrupts.
///
/// Every write happens under `state`; the raw active value is mirrored into
/// `stack_limit` so safe points can compare against it without locking. A
/// stale read only delays the interrupt to a later safe point.
#[derive(Debug)]
pub struct InterruptWord {
    state: Mutex<InterruptState>,
    stack_limit: AtomicUsize,
}

impl InterruptWord {
    pub fn new(limit: usize) -> Self {
        Self {
            state: Mutex::new(InterruptState::NoInterrupt { limit }),
            stack_limit: AtomicUsize::new(limit),
        }
    }

    #[inline]
    fn publish(&self, state: InterruptState) {
        self.stack_limit.store(state.active(), Ordering::Release);
    }

    /// Change the stack ceiling. A pending interrupt survives: only the saved
    /// baseline moves until the interrupt is consumed.
    pub fn set_stack_limit(&self, limit: usize) {
        let mut state = self.state.lock();
        *state = match *state {
            InterruptState::NoInterrupt { .. } => {
                InterruptState::NoInterrupt { limit }
            }
            InterruptState::Pending { kinds, .. } => InterruptState::Pending {
                saved: limit,
                kinds,
            },
        };
        self.publish(*state);
    }

    /// Raise `kinds`. Callable from any thread.
    pub fn schedule_interrupts(&self, kinds: InterruptKind) {
        assert_eq!(
            kinds.bits() & !INTERRUPTS_MASK,
            0,
            "interrupt bits must fit in the mask"
        );
        let mut state = self.state.lock();
        *state = match *state {
            InterruptState::NoInterrupt { limit } => InterruptState::Pending {
                saved: limit,
                kinds,
            },
            InterruptState::Pending { saved, kinds: pending } => {
                InterruptState::Pending {
                    saved,
                    kinds: pending | kinds,
                }
            }
        };
        self.publish(*state);
    }

    /// Consume every kind raised since the last call and restore the saved
    /// ceiling. Kinds raised in between are coalesced into one batch.
    pub fn get_and_clear_interrupts(&self) -> InterruptKind {
        let mut state = self.state.lock();
        match *state {
            InterruptState::NoInterrupt { .. } => InterruptKind::empty(),
            InterruptState::Pending { saved, kinds } => {
                *state = InterruptState::NoInterrupt { limit: saved };
                self.publish(*state);
                kinds
            }
        }
    }

    /// The raw active limit. Interrupt bits are visible in the low bits
    /// while one is pending.
    #[inline]
    pub fn stack_limit(&self) -> usize {
        self.stack_limit.load(Ordering::Relaxed)
    }

    /// The true ceiling, regardless of pending interrupts.
    pub fn saved_stack_limit(&self) -> usize {
        self.state.lock().saved()
    }

    pub fn has_pending(&self) -> bool {
        matches!(*self.state.lock(), InterruptState::Pending { .. })
    }

    /// Unlocked safe-point check. One comparison catches both a stack
    /// overflow and a pending interrupt.
    #[inline(always)]
    pub fn stack_overflow_or_interrupt(&self, sp: usize) -> bool {
        sp <= self.stack_limit()
    }
}
