//! The interpreter's thread of control (spec.md §3 "Thread", §5). Built
//! entirely from `Rc`/`RefCell`, so `Thread` is neither `Send` nor `Sync`
//! by construction -- this VM runs one thread of Java bytecode at a time,
//! matching the single-threaded embedded host described in spec.md §5.

use crate::runtime::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u64);

pub struct Thread {
    pub id: ThreadId,
    pub name: String,
    pub call_stack: Vec<Frame>,
}

impl Thread {
    pub fn new(id: ThreadId, name: impl Into<String>) -> Thread {
        Thread {
            id,
            name: name.into(),
            call_stack: Vec::new(),
        }
    }

    pub fn current_frame(&self) -> &Frame {
        self.call_stack
            .last()
            .expect("current_frame called with an empty call stack")
    }

    pub fn current_frame_mut(&mut self) -> &mut Frame {
        self.call_stack
            .last_mut()
            .expect("current_frame_mut called with an empty call stack")
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.call_stack.push(frame);
    }

    pub fn pop_frame(&mut self) -> Frame {
        self.call_stack
            .pop()
            .expect("pop_frame called with an empty call stack")
    }

    pub fn depth(&self) -> usize {
        self.call_stack.len()
    }
}
