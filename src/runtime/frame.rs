//! One activation record per spec.md §3 "Frame": a private operand stack
//! and local-variable array sized from the method's `Code` attribute,
//! plus enough context (owning class, declared method) to resolve
//! constant-pool references and perform access checks while executing.

use crate::object::class::ClassRef;
use crate::object::method::MethodPtr;
use crate::runtime::value::Slot;

pub struct Frame {
    pub class: ClassRef,
    pub method: MethodPtr,
    pub locals: Vec<Slot>,
    pub operand_stack: Vec<Slot>,
    pub pc: usize,
}

impl Frame {
    pub fn new(class: ClassRef, method: MethodPtr) -> Frame {
        let code = method
            .code
            .as_ref()
            .expect("frames are only created for methods with a Code attribute");
        let mut locals = Vec::with_capacity(code.max_locals as usize);
        locals.resize_with(code.max_locals as usize, || Slot::None);
        Frame {
            class,
            method,
            locals,
            operand_stack: Vec::with_capacity(code.max_stack as usize),
            pc: 0,
        }
    }

    pub fn push(&mut self, slot: Slot) {
        self.operand_stack.push(slot);
    }

    pub fn pop(&mut self) -> Slot {
        self.operand_stack
            .pop()
            .expect("operand stack underflow indicates a malformed or miscompiled method")
    }

    pub fn code(&self) -> &[u8] {
        &self.method.code.as_ref().unwrap().code
    }
}
