//! Declared methods and resolved method references (spec.md §3, §4.5).

use super::class::ClassRef;
use crate::classfile::attributes::Code;
use crate::classfile::descriptor::MethodDescriptor;
use std::rc::{Rc, Weak};

/// A method as declared in a class file, independent of how it was
/// reached (spec.md §3's "Declared member").
pub struct Method {
    pub access_flags: u16,
    pub name: Rc<str>,
    pub descriptor: Rc<str>,
    pub parsed_descriptor: MethodDescriptor,
    pub code: Option<Code>,
    pub exceptions: Vec<Rc<str>>,
    pub owner: Weak<super::class::Class>,
}

pub type MethodPtr = Rc<Method>;

impl Method {
    pub fn is_static(&self) -> bool {
        self.access_flags & 0x0008 != 0
    }

    pub fn is_native(&self) -> bool {
        self.access_flags & 0x0100 != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & 0x0400 != 0
    }

    pub fn is_private(&self) -> bool {
        self.access_flags & 0x0002 != 0
    }

    pub fn is_synchronized(&self) -> bool {
        self.access_flags & 0x0020 != 0
    }
}

/// A resolved `Methodref`/`InterfaceMethodref` (spec.md §4.5): the
/// searched-for signature plus the declared method it bottomed out at,
/// cached so repeat resolution is free (spec.md §8).
pub struct ResolvedMethod {
    pub name: Rc<str>,
    pub descriptor: Rc<str>,
    pub return_type: ClassRef,
    pub argument_types: Vec<ClassRef>,
    /// The class or interface the lookup actually found the method
    /// declared on, which may differ from the reference's nominal owner.
    pub owner: ClassRef,
    pub method: MethodPtr,
}

pub type MethodRef = Rc<ResolvedMethod>;
