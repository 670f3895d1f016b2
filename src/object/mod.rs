//! Runtime object model: classes, fields, methods, instances, and the
//! resolved-constant cache that gives each constant-pool entry "resolve
//! once, reuse" semantics (spec.md §3, §4.5, §8).

pub mod class;
pub mod field;
pub mod instance;
pub mod method;
pub mod primitive;

use crate::classfile::descriptor::MethodDescriptor;
use crate::runtime::thread::ThreadId;
use class::ClassRef;
use field::FieldRef;
use instance::InstanceRef;
use method::MethodRef;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Structured-locking state every runtime reference carries (spec.md §3):
/// owning thread plus re-entry count. Only `Class` and `Instance` runtime
/// references are ever pushed as `monitorenter`/`monitorexit` operands in
/// practice (a `Field`/`Method` constant never reaches the operand stack as
/// an object reference), so only those two variants allocate storage for
/// one; `RtRef::monitor()` returns `None` for the others, which is the
/// pragmatic reading of "carries a monitor record even when unused"
/// recorded in DESIGN.md.
#[derive(Debug, Default)]
pub struct Monitor {
    pub owner: Option<ThreadId>,
    pub entry_count: u32,
}

/// A symbolic constant-pool reference once resolved to something live
/// (spec.md §3's "Runtime reference").
#[derive(Clone)]
pub enum RtRef {
    Null,
    Class(ClassRef),
    Field(FieldRef),
    ClassMethod(MethodRef),
    InterfaceMethod(MethodRef),
    Instance(InstanceRef),
    /// A resolved `MethodType` constant (spec.md §4.5): the parsed
    /// signature a `MethodHandle`/`invokedynamic` call site was built
    /// against. Resolved natively rather than as a `java.lang.invoke`
    /// object, per DESIGN.md.
    MethodType(Rc<MethodDescriptor>),
    /// An interned `String` constant, carried as decoded text rather than
    /// a `java.lang.String` heap instance -- full `String` object layout
    /// is out of scope (DESIGN.md).
    InternedString(Rc<str>),
}

impl RtRef {
    pub fn monitor(&self) -> Option<&RefCell<Monitor>> {
        match self {
            RtRef::Class(ClassRef::Loaded(class)) => Some(&class.monitor),
            RtRef::Instance(instance) => Some(&instance.monitor),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RtRef::Null)
    }
}

/// Per-class-reference cache mapping a constant-pool index to the runtime
/// reference it resolved to (spec.md §3 "Resolved-constant cache", §8
/// "a second `resolve(R)` returns the identical runtime reference").
#[derive(Default)]
pub struct ResolvedCache {
    entries: RefCell<HashMap<u16, RtRef>>,
}

impl ResolvedCache {
    pub fn get(&self, index: u16) -> Option<RtRef> {
        self.entries.borrow().get(&index).cloned()
    }

    pub fn insert(&self, index: u16, value: RtRef) -> RtRef {
        self.entries.borrow_mut().insert(index, value.clone());
        value
    }
}
