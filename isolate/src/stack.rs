use std::sync::Arc;

use crate::{ObjectPointerVisitor, Value};

/// Approximate address of the current stack top.
#[inline(never)]
pub fn current_stack_pointer() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

/// An activation of a native function on behalf of the program.
#[derive(Debug)]
pub struct Frame {
    function: Arc<str>,
    sp: usize,
    slots: Vec<Value>,
}

impl Frame {
    pub fn new(function: Arc<str>, sp: usize, slots: Vec<Value>) -> Self {
        Self { function, sp, slots }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn slots(&self) -> &[Value] {
        &self.slots
    }
}

#[derive(Debug, Default)]
pub struct Stack {
    frames: Vec<Frame>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Innermost frame first.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter().rev()
    }

    /// Frames must be named and their stack pointers must not increase from
    /// caller to callee.
    pub fn validate(&self) -> Result<(), String> {
        let mut caller_sp = usize::MAX;
        for (depth, frame) in self.frames.iter().enumerate() {
            if frame.function.is_empty() {
                return Err(format!("frame {depth} has no function"));
            }
            if frame.sp > caller_sp {
                return Err(format!(
                    "frame {depth} ({}) sits above its caller: {:#x} > {:#x}",
                    frame.function, frame.sp, caller_sp
                ));
            }
            caller_sp = frame.sp;
        }
        Ok(())
    }

    pub fn visit_frames(
        &mut self,
        visitor: &mut dyn ObjectPointerVisitor,
        validate: bool,
    ) {
        if validate {
            if let Err(err) = self.validate() {
                panic!("invalid stack: {err}");
            }
        }
        for frame in self.frames.iter_mut().rev() {
            visitor.visit_pointers(&mut frame.slots);
        }
    }
}
